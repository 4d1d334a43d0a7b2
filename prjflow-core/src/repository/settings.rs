//! System configuration key/value store (`system_configs`)

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use super::{account::row_to_account, account::ACCOUNT_COLUMNS, SettingsStore};
use crate::{
    models::{setting_keys, Account, NewAccount, ADMIN_ROLE},
    Error, Result,
};

#[derive(Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM system_configs WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO system_configs (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!(key = %key, "Setting stored");
        Ok(())
    }

    async fn initialize_with_admin(&self, account: &NewAccount) -> Result<Account> {
        let mut tx = self.pool.begin().await?;

        // Claiming the marker first serializes concurrent bootstraps on its row lock;
        // no row back means someone already finished.
        let claimed = sqlx::query_scalar::<_, String>(
            r"
            INSERT INTO system_configs (key, value)
            VALUES ($1, 'true')
            ON CONFLICT (key) DO UPDATE SET value = 'true', updated_at = NOW()
            WHERE system_configs.value <> 'true'
            RETURNING key
            ",
        )
        .bind(setting_keys::INITIALIZED)
        .fetch_optional(&mut *tx)
        .await?;

        if claimed.is_none() {
            tx.rollback().await?;
            return Err(Error::AlreadyExists("system already initialized".to_string()));
        }

        let role_id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO roles (code, name)
            VALUES ($1, 'Administrator')
            ON CONFLICT (code) DO UPDATE SET code = EXCLUDED.code
            RETURNING id
            ",
        )
        .bind(ADMIN_ROLE)
        .fetch_one(&mut *tx)
        .await?;

        let sql = format!(
            "INSERT INTO users (username, nickname, avatar, wechat_open_id, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&account.username)
            .bind(&account.nickname)
            .bind(&account.avatar)
            .bind(account.wechat_open_id.as_deref())
            .bind(account.status.as_i16())
            .fetch_one(&mut *tx)
            .await?;
        let admin = row_to_account(&row)?;

        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(admin.id)
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(user_id = %admin.id, username = %admin.username, "System initialized with administrator");
        Ok(admin)
    }
}
