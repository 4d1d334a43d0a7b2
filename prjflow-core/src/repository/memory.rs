use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{AccountStore, SettingsStore};
use crate::{
    error::UniqueField,
    models::{setting_keys, Account, NewAccount, UserId, ADMIN_ROLE},
    Error, Result,
};

#[derive(Debug, Default)]
struct Inner {
    accounts: BTreeMap<UserId, Account>,
    next_id: i64,
    user_roles: HashMap<UserId, HashSet<String>>,
    role_permissions: HashMap<String, HashSet<String>>,
    settings: HashMap<String, String>,
}

impl Inner {
    fn insert_account(&mut self, account: &NewAccount) -> Result<Account> {
        // Open id is checked first, matching the column order of the unique constraints
        if let Some(open_id) = account.wechat_open_id.as_deref() {
            if self
                .accounts
                .values()
                .any(|a| a.wechat_open_id.as_deref() == Some(open_id))
            {
                return Err(Error::UniqueViolation(UniqueField::OpenId));
            }
        }
        if self.accounts.values().any(|a| a.username == account.username) {
            return Err(Error::UniqueViolation(UniqueField::Username));
        }

        self.next_id += 1;
        let now = Utc::now();
        let created = Account {
            id: UserId(self.next_id),
            username: account.username.clone(),
            nickname: account.nickname.clone(),
            email: None,
            avatar: account.avatar.clone(),
            wechat_open_id: account.wechat_open_id.clone(),
            status: account.status,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    fn active_mut(&mut self, id: UserId) -> Result<&mut Account> {
        self.accounts
            .get_mut(&id)
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| Error::NotFound(format!("user {id}")))
    }
}

/// In-process account and settings store
///
/// Enforces the same uniqueness rules as the PostgreSQL schema: open id and
/// username are unique across all rows, soft-deleted ones included.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account directly, bypassing the flows
    pub fn seed_account(&self, account: &NewAccount) -> Result<Account> {
        self.inner.lock().insert_account(account)
    }

    pub fn assign_role(&self, id: UserId, role: &str) {
        self.inner
            .lock()
            .user_roles
            .entry(id)
            .or_default()
            .insert(role.to_string());
    }

    pub fn grant_permission(&self, role: &str, permission: &str) {
        self.inner
            .lock()
            .role_permissions
            .entry(role.to_string())
            .or_default()
            .insert(permission.to_string());
    }

    /// Every row including soft-deleted ones
    #[must_use]
    pub fn all_accounts(&self) -> Vec<Account> {
        self.inner.lock().accounts.values().cloned().collect()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_open_id(
        &self,
        open_id: &str,
        include_deleted: bool,
    ) -> Result<Option<Account>> {
        Ok(self
            .inner
            .lock()
            .accounts
            .values()
            .find(|a| {
                a.wechat_open_id.as_deref() == Some(open_id) && (include_deleted || !a.is_deleted())
            })
            .cloned())
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<Account>> {
        Ok(self
            .inner
            .lock()
            .accounts
            .get(&id)
            .filter(|a| !a.is_deleted())
            .cloned())
    }

    async fn create(&self, account: &NewAccount) -> Result<Account> {
        self.inner.lock().insert_account(account)
    }

    async fn restore(&self, id: UserId, avatar: &str, nickname: &str) -> Result<Account> {
        let mut inner = self.inner.lock();
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("user {id}")))?;
        account.deleted_at = None;
        account.avatar = avatar.to_string();
        account.nickname = nickname.to_string();
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn soft_delete(&self, id: UserId) -> Result<()> {
        let mut inner = self.inner.lock();
        let account = inner.active_mut(id)?;
        account.deleted_at = Some(Utc::now());
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn bind_open_id(
        &self,
        id: UserId,
        open_id: &str,
        avatar: &str,
        nickname: Option<&str>,
    ) -> Result<Account> {
        let mut inner = self.inner.lock();
        if inner
            .accounts
            .values()
            .any(|a| a.id != id && a.wechat_open_id.as_deref() == Some(open_id))
        {
            return Err(Error::UniqueViolation(UniqueField::OpenId));
        }

        let account = inner.active_mut(id)?;
        account.wechat_open_id = Some(open_id.to_string());
        account.avatar = avatar.to_string();
        if let Some(nickname) = nickname {
            account.nickname = nickname.to_string();
        }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn role_codes(&self, id: UserId) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        let mut codes: Vec<String> = inner
            .user_roles
            .get(&id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default();
        codes.sort();
        Ok(codes)
    }

    async fn has_permission(&self, id: UserId, permission: &str) -> Result<bool> {
        let inner = self.inner.lock();
        let Some(roles) = inner.user_roles.get(&id) else {
            return Ok(false);
        };
        Ok(roles.iter().any(|role| {
            role == ADMIN_ROLE
                || inner
                    .role_permissions
                    .get(role)
                    .is_some_and(|perms| perms.contains(permission))
        }))
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn initialize_with_admin(&self, account: &NewAccount) -> Result<Account> {
        let mut inner = self.inner.lock();
        if inner
            .settings
            .get(setting_keys::INITIALIZED)
            .is_some_and(|v| v == "true")
        {
            return Err(Error::AlreadyExists("system already initialized".to_string()));
        }

        let admin = inner.insert_account(account)?;
        inner
            .user_roles
            .entry(admin.id)
            .or_default()
            .insert(ADMIN_ROLE.to_string());
        inner
            .settings
            .insert(setting_keys::INITIALIZED.to_string(), "true".to_string());
        Ok(admin)
    }
}
