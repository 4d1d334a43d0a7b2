use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{FlowDeps, FlowError, FlowOutcome};
use crate::{
    error::UniqueField,
    models::{Account, UserId},
    repository::AccountStore,
    service::PendingBindings,
    wechat::RemoteIdentity,
    Error,
};

const BOUND_ELSEWHERE: &str = "this WeChat account is already bound to another user";
const EXPIRED: &str = "bind request expired, request a new QR code";
const TICKET_IN_USE: &str = "bind ticket is already in use, request a new QR code";

/// Attach a WeChat identity to the signed-in account that asked for it
pub struct BindFlow {
    accounts: Arc<dyn AccountStore>,
    bindings: PendingBindings,
}

impl BindFlow {
    pub(super) fn new(deps: &FlowDeps) -> Self {
        Self {
            accounts: deps.accounts.clone(),
            bindings: deps.bindings.clone(),
        }
    }

    async fn bindable_account(&self, user_id: UserId) -> Result<Account, FlowError> {
        let account = self
            .accounts
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| FlowError::Precondition("user not found".to_string()))?;

        if account.wechat_open_id.is_some() {
            return Err(FlowError::AlreadyExists(
                "this account is already bound to a WeChat account".to_string(),
            ));
        }
        Ok(account)
    }

    pub(super) async fn register(
        &self,
        ticket: &str,
        acting_user: Option<UserId>,
    ) -> Result<(), FlowError> {
        let user_id =
            acting_user.ok_or_else(|| FlowError::Precondition("login required".to_string()))?;
        self.bindable_account(user_id).await?;
        if !self.bindings.register(ticket, user_id) {
            return Err(FlowError::AlreadyExists(TICKET_IN_USE.to_string()));
        }
        Ok(())
    }

    pub(super) async fn validate(&self, ticket: &str) -> Result<(), FlowError> {
        let user_id = self
            .bindings
            .peek(ticket)
            .ok_or_else(|| FlowError::Precondition(EXPIRED.to_string()))?;
        self.bindable_account(user_id).await.map(|_| ())
    }

    pub(super) async fn process(
        &self,
        ticket: &str,
        identity: &RemoteIdentity,
    ) -> Result<FlowOutcome, FlowError> {
        let user_id = self
            .bindings
            .take(ticket)
            .ok_or_else(|| FlowError::Precondition(EXPIRED.to_string()))?;

        if let Some(owner) = self.accounts.find_by_open_id(&identity.open_id, true).await? {
            if owner.id != user_id {
                return Err(FlowError::AlreadyExists(BOUND_ELSEWHERE.to_string()));
            }
        }

        let account = self.bindable_account(user_id).await?;
        let nickname = (account.nickname.is_empty() && !identity.nickname.is_empty())
            .then_some(identity.nickname.as_str());

        let bound = self
            .accounts
            .bind_open_id(user_id, &identity.open_id, &identity.avatar_url, nickname)
            .await
            .map_err(|e| match e {
                Error::UniqueViolation(UniqueField::OpenId) => {
                    FlowError::AlreadyExists(BOUND_ELSEWHERE.to_string())
                }
                other => FlowError::Storage(other),
            })?;

        info!(user_id = %bound.id, "WeChat account bound");

        Ok(FlowOutcome::new(
            json!({ "user": bound.summary() }),
            "WeChat account bound",
        ))
    }
}
