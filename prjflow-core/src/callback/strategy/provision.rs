use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::{nickname_or_username, FlowDeps, FlowError, FlowOutcome};
use crate::{
    callback::UsernameMaterializer,
    error::UniqueField,
    models::{Account, AccountStatus, NewAccount, UserId, PERMISSION_USER_CREATE},
    repository::AccountStore,
    wechat::RemoteIdentity,
};

const ALREADY_EXISTS: &str = "a user bound to this WeChat account already exists";

/// An authorized user creates (or restores) the account of whoever scans
///
/// | account for the open id | action                          |
/// |-------------------------|---------------------------------|
/// | none                    | create with a derived username  |
/// | soft-deleted            | restore, refresh avatar/nickname|
/// | active                  | fail, already exists            |
pub struct ProvisionFlow {
    accounts: Arc<dyn AccountStore>,
    usernames: UsernameMaterializer,
}

impl ProvisionFlow {
    pub(super) fn new(deps: &FlowDeps) -> Self {
        Self {
            accounts: deps.accounts.clone(),
            usernames: deps.usernames,
        }
    }

    pub(super) async fn ensure_can_create(&self, user_id: UserId) -> Result<(), FlowError> {
        if self.accounts.get_by_id(user_id).await?.is_none() {
            return Err(FlowError::Precondition("requesting user not found".to_string()));
        }
        if !self
            .accounts
            .has_permission(user_id, PERMISSION_USER_CREATE)
            .await?
        {
            return Err(FlowError::Precondition(format!(
                "permission denied: {PERMISSION_USER_CREATE} required"
            )));
        }
        Ok(())
    }

    pub(super) async fn validate(&self, requester: Option<UserId>) -> Result<(), FlowError> {
        let user_id = requester
            .ok_or_else(|| FlowError::Precondition("missing requesting user".to_string()))?;
        self.ensure_can_create(user_id).await
    }

    pub(super) async fn process(
        &self,
        requester: Option<UserId>,
        identity: &RemoteIdentity,
    ) -> Result<FlowOutcome, FlowError> {
        // the requester may have lost the permission while the user was scanning
        self.validate(requester).await?;

        match self.accounts.find_by_open_id(&identity.open_id, true).await? {
            Some(existing) if existing.is_deleted() => self.restore(existing, identity).await,
            Some(_) => Err(FlowError::AlreadyExists(ALREADY_EXISTS.to_string())),
            None => self.create(identity).await,
        }
    }

    async fn restore(
        &self,
        existing: Account,
        identity: &RemoteIdentity,
    ) -> Result<FlowOutcome, FlowError> {
        let nickname = if !identity.nickname.is_empty() {
            identity.nickname.as_str()
        } else if !existing.nickname.is_empty() {
            existing.nickname.as_str()
        } else {
            existing.username.as_str()
        };

        let restored = self
            .accounts
            .restore(existing.id, &identity.avatar_url, nickname)
            .await?;

        info!(user_id = %restored.id, username = %restored.username, "Soft-deleted user restored");

        Ok(FlowOutcome::new(
            json!({ "user": restored.summary(), "restored": true }),
            "user restored",
        ))
    }

    async fn create(&self, identity: &RemoteIdentity) -> Result<FlowOutcome, FlowError> {
        let username = self.usernames.materialize(&identity.open_id);
        let account = NewAccount {
            nickname: nickname_or_username(identity, &username),
            username: username.clone(),
            avatar: identity.avatar_url.clone(),
            wechat_open_id: Some(identity.open_id.clone()),
            status: AccountStatus::Active,
        };

        let created = match self.accounts.create(&account).await {
            Ok(created) => created,
            Err(e) => {
                let Some(field) = e.unique_field() else {
                    return Err(FlowError::Storage(e));
                };

                // A concurrent callback for the same open id may have won; whichever
                // constraint fired first, its row is the account we meant to create.
                match self.accounts.find_by_open_id(&identity.open_id, false).await? {
                    Some(winner) => {
                        warn!(
                            user_id = %winner.id,
                            constraint = %field,
                            "Lost provisioning race, adopting existing account"
                        );
                        winner
                    }
                    None if field == UniqueField::Username => {
                        return Err(FlowError::UsernameConflict(username));
                    }
                    None => return Err(FlowError::AlreadyExists(ALREADY_EXISTS.to_string())),
                }
            }
        };

        info!(user_id = %created.id, username = %created.username, "User provisioned through WeChat");

        Ok(FlowOutcome::new(
            json!({ "user": created.summary(), "restored": false }),
            "user added",
        ))
    }
}
