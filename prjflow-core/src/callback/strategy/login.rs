use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{FlowDeps, FlowError, FlowOutcome};
use crate::{repository::AccountStore, service::TokenIssuer, wechat::RemoteIdentity};

/// Sign in with a WeChat identity already bound to an account
pub struct LoginFlow {
    accounts: Arc<dyn AccountStore>,
    tokens: TokenIssuer,
}

impl LoginFlow {
    pub(super) fn new(deps: &FlowDeps) -> Self {
        Self {
            accounts: deps.accounts.clone(),
            tokens: deps.tokens.clone(),
        }
    }

    pub(super) async fn process(&self, identity: &RemoteIdentity) -> Result<FlowOutcome, FlowError> {
        let account = self
            .accounts
            .find_by_open_id(&identity.open_id, false)
            .await?
            .ok_or_else(|| {
                FlowError::Precondition("WeChat account is not bound to any user".to_string())
            })?;

        if !account.is_active() {
            return Err(FlowError::Precondition("account is disabled".to_string()));
        }

        let roles = self.accounts.role_codes(account.id).await?;
        let token = self.tokens.issue(account.id, &roles)?;

        info!(user_id = %account.id, "User signed in with WeChat");

        Ok(FlowOutcome::new(
            json!({
                "user": account.summary(),
                "roles": roles,
                "token": token,
            }),
            "login succeeded",
        ))
    }
}
