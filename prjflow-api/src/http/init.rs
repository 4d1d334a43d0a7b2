//! System initialization: status and the persisted WeChat settings

use axum::{extract::State, Json};
use prjflow_core::{
    models::setting_keys,
    wechat::{mask_secret, AccountType},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{middleware::AuthUser, AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct InitStatus {
    pub initialized: bool,
}

pub async fn status(State(state): State<AppState>) -> AppResult<Json<InitStatus>> {
    let initialized = state.settings.is_initialized().await?;
    Ok(Json(InitStatus { initialized }))
}

#[derive(Debug, Deserialize)]
pub struct WeChatConfigRequest {
    pub app_id: String,
    pub app_secret: String,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Effective provider settings; the secret never leaves the server unmasked
#[derive(Debug, Serialize)]
pub struct WeChatConfigView {
    pub configured: bool,
    pub app_id: String,
    pub app_secret: String,
    pub account_type: String,
    pub scope: String,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: String,
}

/// Persist WeChat settings
///
/// Open while the system is uninitialized so the first administrator can be
/// created; afterwards only administrators may change them.
pub async fn save_wechat_config(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Json(req): Json<WeChatConfigRequest>,
) -> AppResult<Json<SaveResponse>> {
    if state.settings.is_initialized().await? {
        let auth = auth.ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;
        auth.require_admin(&state).await?;
    }

    let app_id = req.app_id.trim();
    let app_secret = req.app_secret.trim();
    if app_id.is_empty() || app_secret.is_empty() {
        return Err(AppError::bad_request("app_id and app_secret are required"));
    }

    let account_type = req
        .account_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::parse::<AccountType>)
        .transpose()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    state.settings.set_setting(setting_keys::WECHAT_APP_ID, app_id).await?;
    state
        .settings
        .set_setting(setting_keys::WECHAT_APP_SECRET, app_secret)
        .await?;
    if let Some(account_type) = account_type {
        state
            .settings
            .set_setting(setting_keys::WECHAT_ACCOUNT_TYPE, account_type.as_str())
            .await?;
    }
    if let Some(scope) = req.scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        state.settings.set_setting(setting_keys::WECHAT_SCOPE, scope).await?;
    }

    info!(app_id = %app_id, "WeChat configuration saved");

    Ok(Json(SaveResponse {
        message: "WeChat configuration saved".to_string(),
    }))
}

pub async fn get_wechat_config(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<WeChatConfigView>> {
    auth.require_admin(&state).await?;

    let view = match state.orchestrator.credentials().resolve().await {
        Ok(creds) => WeChatConfigView {
            configured: true,
            app_secret: mask_secret(&creds.app_secret),
            account_type: creds.account_type.to_string(),
            app_id: creds.app_id,
            scope: creds.scope,
        },
        Err(_) => WeChatConfigView {
            configured: false,
            app_id: String::new(),
            app_secret: String::new(),
            account_type: AccountType::default().to_string(),
            scope: String::new(),
        },
    };
    Ok(Json(view))
}
