//! Persistence seams used by the sign-in flows
//!
//! Business data (projects, tasks, bugs...) is owned elsewhere; the traits
//! here cover only the account and system-config access the WeChat flows
//! need. `Pg*` types run against PostgreSQL, [`MemoryStore`] keeps everything
//! in process for tests and database-less runs.

pub mod account;
pub mod memory;
pub mod settings;

use async_trait::async_trait;

use crate::{
    models::{setting_keys, Account, NewAccount, UserId},
    Result,
};

pub use account::PgAccountStore;
pub use memory::MemoryStore;
pub use settings::PgSettingsStore;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up the account owning `open_id`; soft-deleted rows only when asked
    async fn find_by_open_id(&self, open_id: &str, include_deleted: bool)
        -> Result<Option<Account>>;

    /// Active (not soft-deleted) account by id
    async fn get_by_id(&self, id: UserId) -> Result<Option<Account>>;

    /// Insert an account
    ///
    /// Collisions surface as [`crate::Error::UniqueViolation`] carrying which
    /// field collided.
    async fn create(&self, account: &NewAccount) -> Result<Account>;

    /// Clear the soft-delete marker and overwrite avatar and nickname
    async fn restore(&self, id: UserId, avatar: &str, nickname: &str) -> Result<Account>;

    async fn soft_delete(&self, id: UserId) -> Result<()>;

    /// Attach a WeChat identity to an existing account
    ///
    /// `nickname` replaces the stored one only when given.
    async fn bind_open_id(
        &self,
        id: UserId,
        open_id: &str,
        avatar: &str,
        nickname: Option<&str>,
    ) -> Result<Account>;

    async fn role_codes(&self, id: UserId) -> Result<Vec<String>>;

    /// Whether the account holds `permission`; the admin role holds all of them
    async fn has_permission(&self, id: UserId, permission: &str) -> Result<bool>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    async fn is_initialized(&self) -> Result<bool> {
        Ok(self
            .get_setting(setting_keys::INITIALIZED)
            .await?
            .is_some_and(|v| v == "true"))
    }

    /// Create the first administrator and mark the system initialized
    ///
    /// Runs as one unit: the admin role (created when missing), the account,
    /// the role assignment and the `initialized` marker all land or none do.
    /// Fails with [`crate::Error::AlreadyExists`] once initialized.
    async fn initialize_with_admin(&self, account: &NewAccount) -> Result<Account>;
}
