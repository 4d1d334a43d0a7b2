use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{nickname_or_username, FlowDeps, FlowError, FlowOutcome};
use crate::{
    callback::UsernameMaterializer,
    error::UniqueField,
    models::{AccountStatus, NewAccount, ADMIN_ROLE},
    repository::SettingsStore,
    service::TokenIssuer,
    wechat::RemoteIdentity,
    Error,
};

const ALREADY_INITIALIZED: &str = "system already initialized";

/// First-run setup: the scanning WeChat user becomes the administrator
pub struct BootstrapFlow {
    settings: Arc<dyn SettingsStore>,
    tokens: TokenIssuer,
    usernames: UsernameMaterializer,
}

impl BootstrapFlow {
    pub(super) fn new(deps: &FlowDeps) -> Self {
        Self {
            settings: deps.settings.clone(),
            tokens: deps.tokens.clone(),
            usernames: deps.usernames,
        }
    }

    pub(super) async fn validate(&self) -> Result<(), FlowError> {
        if self.settings.is_initialized().await? {
            return Err(FlowError::Precondition(ALREADY_INITIALIZED.to_string()));
        }
        Ok(())
    }

    pub(super) async fn process(&self, identity: &RemoteIdentity) -> Result<FlowOutcome, FlowError> {
        let username = self.usernames.materialize(&identity.open_id);
        let account = NewAccount {
            nickname: nickname_or_username(identity, &username),
            username: username.clone(),
            avatar: identity.avatar_url.clone(),
            wechat_open_id: Some(identity.open_id.clone()),
            status: AccountStatus::Active,
        };

        let admin = self
            .settings
            .initialize_with_admin(&account)
            .await
            .map_err(|e| match e {
                Error::AlreadyExists(_) => FlowError::Precondition(ALREADY_INITIALIZED.to_string()),
                Error::UniqueViolation(UniqueField::Username) => FlowError::UsernameConflict(username),
                Error::UniqueViolation(UniqueField::OpenId) => FlowError::AlreadyExists(
                    "this WeChat account is already bound to another user".to_string(),
                ),
                other => FlowError::Storage(other),
            })?;

        let roles = vec![ADMIN_ROLE.to_string()];
        let token = self.tokens.issue(admin.id, &roles)?;

        info!(user_id = %admin.id, username = %admin.username, "Administrator created through WeChat");

        Ok(FlowOutcome::new(
            json!({
                "user": admin.summary(),
                "roles": roles,
                "token": token,
            }),
            "system initialized",
        ))
    }
}
