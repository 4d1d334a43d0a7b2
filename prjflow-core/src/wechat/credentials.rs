use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::{AccountType, ProviderError, DEFAULT_SCOPE};
use crate::{config::WeChatConfig, models::setting_keys, repository::SettingsStore};

/// Provider settings in effect for one callback
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub app_id: String,
    pub app_secret: String,
    pub account_type: AccountType,
    pub scope: String,
}

impl ProviderCredentials {
    /// Human-readable summary safe to show to users and logs
    #[must_use]
    pub fn diagnostic(&self) -> String {
        format!(
            "AppID={}, AppSecret={}, AccountType={}, Scope={}",
            self.app_id,
            mask_secret(&self.app_secret),
            self.account_type,
            self.scope
        )
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &mask_secret(&self.app_secret))
            .field("account_type", &self.account_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Keep the first and last four characters of secrets longer than eight
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}****{tail}")
    } else {
        "****".to_string()
    }
}

/// Layers persisted provider settings over the static configuration
///
/// A persisted app id switches the whole credential pair to the persisted
/// values, with the static secret as the fallback when none was stored.
/// Account type and scope fall back independently.
#[derive(Clone)]
pub struct CredentialResolver {
    settings: Arc<dyn SettingsStore>,
    defaults: WeChatConfig,
}

impl CredentialResolver {
    pub fn new(settings: Arc<dyn SettingsStore>, defaults: WeChatConfig) -> Self {
        Self { settings, defaults }
    }

    pub async fn resolve(&self) -> Result<ProviderCredentials, ProviderError> {
        let static_secret = non_empty(&self.defaults.app_secret);

        let (app_id, app_secret) = match self.stored(setting_keys::WECHAT_APP_ID).await {
            Some(app_id) => {
                let secret = self
                    .stored(setting_keys::WECHAT_APP_SECRET)
                    .await
                    .or(static_secret);
                (Some(app_id), secret)
            }
            None => (non_empty(&self.defaults.app_id), static_secret),
        };

        let app_id = app_id.ok_or_else(|| {
            ProviderError::Configuration("WeChat AppID is not configured".to_string())
        })?;
        let app_secret = app_secret.ok_or_else(|| {
            ProviderError::Configuration("WeChat AppSecret is not configured".to_string())
        })?;

        let account_type = match self.stored(setting_keys::WECHAT_ACCOUNT_TYPE).await {
            Some(value) => value.parse()?,
            None => match non_empty(&self.defaults.account_type) {
                Some(value) => value.parse()?,
                None => AccountType::default(),
            },
        };

        let scope = match self.stored(setting_keys::WECHAT_SCOPE).await {
            Some(scope) => scope,
            None => non_empty(&self.defaults.scope).unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        };

        Ok(ProviderCredentials {
            app_id,
            app_secret,
            account_type,
            scope,
        })
    }

    /// Trimmed persisted value; read failures count as absent
    async fn stored(&self, key: &str) -> Option<String> {
        match self.settings.get_setting(key).await {
            Ok(value) => value.as_deref().and_then(non_empty),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read WeChat setting, using static configuration");
                None
            }
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
