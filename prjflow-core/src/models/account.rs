use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Account status as stored in `users.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Disabled,
    Active,
}

impl AccountStatus {
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::Disabled => 0,
            Self::Active => 1,
        }
    }

    /// Unknown codes are treated as disabled
    #[must_use]
    pub const fn from_i16(code: i16) -> Self {
        match code {
            1 => Self::Active,
            _ => Self::Disabled,
        }
    }
}

/// A local account row, including soft-deleted ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: UserId,
    pub username: String,
    pub nickname: String,
    pub email: Option<String>,
    pub avatar: String,
    pub wechat_open_id: Option<String>,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_deleted() && self.status == AccountStatus::Active
    }

    /// Client-facing view of the account
    #[must_use]
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            username: self.username.clone(),
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            email: self.email.clone(),
            wechat_bound: self.wechat_open_id.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: UserId,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub wechat_bound: bool,
}

/// Fields supplied when inserting an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    pub wechat_open_id: Option<String>,
    pub status: AccountStatus,
}
