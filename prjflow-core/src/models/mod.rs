pub mod account;
pub mod id;
pub mod notification;

pub use account::{Account, AccountStatus, AccountSummary, NewAccount};
pub use id::{InvalidUserId, UserId};
pub use notification::{NotificationKind, NotificationMessage};

/// Role code that implies every permission
pub const ADMIN_ROLE: &str = "admin";

/// Permission required to provision accounts through WeChat
pub const PERMISSION_USER_CREATE: &str = "user:create";

/// Keys in `system_configs` read or written by the sign-in flows
pub mod setting_keys {
    pub const INITIALIZED: &str = "initialized";
    pub const WECHAT_APP_ID: &str = "wechat_app_id";
    pub const WECHAT_APP_SECRET: &str = "wechat_app_secret";
    pub const WECHAT_ACCOUNT_TYPE: &str = "wechat_account_type";
    pub const WECHAT_SCOPE: &str = "wechat_scope";
}
