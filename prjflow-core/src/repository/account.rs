use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::AccountStore;
use crate::{
    models::{Account, AccountStatus, NewAccount, UserId, ADMIN_ROLE},
    Error, Result,
};

pub(crate) const ACCOUNT_COLUMNS: &str = "id, username, nickname, email, avatar, wechat_open_id, \
     status, created_at, updated_at, deleted_at";

/// Account access over PostgreSQL
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_account(row: &PgRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        nickname: row.try_get("nickname")?,
        email: row.try_get("email")?,
        avatar: row.try_get("avatar")?,
        wechat_open_id: row.try_get("wechat_open_id")?,
        status: AccountStatus::from_i16(row.try_get("status")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_open_id(
        &self,
        open_id: &str,
        include_deleted: bool,
    ) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE wechat_open_id = $1 \
             AND ($2 OR deleted_at IS NULL)"
        );
        let row = sqlx::query(&sql)
            .bind(open_id)
            .bind(include_deleted)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn create(&self, account: &NewAccount) -> Result<Account> {
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
            .fetch_one(&self.pool)
            .await?;

        row_to_account(&row)
    }

    async fn restore(&self, id: UserId, avatar: &str, nickname: &str) -> Result<Account> {
        let sql = format!(
            "UPDATE users SET deleted_at = NULL, avatar = $2, nickname = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(avatar)
            .bind(nickname)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {id}")))?;

        row_to_account(&row)
    }

    async fn soft_delete(&self, id: UserId) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn bind_open_id(
        &self,
        id: UserId,
        open_id: &str,
        avatar: &str,
        nickname: Option<&str>,
    ) -> Result<Account> {
        let sql = format!(
            "UPDATE users SET wechat_open_id = $2, avatar = $3, \
             nickname = COALESCE($4, nickname), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(open_id)
            .bind(avatar)
            .bind(nickname)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {id}")))?;

        row_to_account(&row)
    }

    async fn role_codes(&self, id: UserId) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>(
            "SELECT r.code FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 ORDER BY r.code",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    async fn has_permission(&self, id: UserId, permission: &str) -> Result<bool> {
        let allowed = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM user_roles ur
                JOIN roles r ON r.id = ur.role_id
                LEFT JOIN role_permissions rp ON rp.role_id = r.id
                LEFT JOIN permissions p ON p.id = rp.permission_id
                WHERE ur.user_id = $1 AND (r.code = $2 OR p.code = $3)
            )
            ",
        )
        .bind(id)
        .bind(ADMIN_ROLE)
        .bind(permission)
        .fetch_one(&self.pool)
        .await?;

        Ok(allowed)
    }
}
