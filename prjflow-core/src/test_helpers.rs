//! Fixtures shared by the unit tests in this crate

use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    callback::{CallbackOrchestrator, FlowDeps, UsernameMaterializer},
    config::WeChatConfig,
    models::{AccountStatus, NewAccount},
    repository::MemoryStore,
    service::{PendingBindings, TicketHub, TokenIssuer},
    wechat::{AccessToken, IdentityProviderFactory, RemoteIdentity},
};

pub fn new_account(username: &str, open_id: Option<&str>) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        nickname: String::new(),
        avatar: String::new(),
        wechat_open_id: open_id.map(str::to_string),
        status: AccountStatus::Active,
    }
}

pub fn identity(open_id: &str, nickname: &str) -> RemoteIdentity {
    RemoteIdentity {
        open_id: open_id.to_string(),
        union_id: None,
        nickname: nickname.to_string(),
        avatar_url: format!("https://thirdwx.qlogo.cn/{open_id}.png"),
    }
}

pub fn access_token(open_id: &str) -> AccessToken {
    AccessToken {
        access_token: format!("token-{open_id}"),
        expires_in: 7200,
        refresh_token: String::new(),
        open_id: open_id.to_string(),
        scope: "snsapi_login".to_string(),
        union_id: None,
    }
}

pub fn test_tokens() -> TokenIssuer {
    TokenIssuer::new("unit-test-secret-0123456789", 1)
}

pub fn wechat_config() -> WeChatConfig {
    WeChatConfig {
        app_id: "wx-static-app".to_string(),
        app_secret: "static-secret-0123".to_string(),
        callback_base_url: "https://pm.example.com".to_string(),
        ..WeChatConfig::default()
    }
}

pub fn fixed_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

/// Everything a flow test needs, wired against one [`MemoryStore`]
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub hub: TicketHub,
    pub bindings: PendingBindings,
    pub tokens: TokenIssuer,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            hub: TicketHub::new(),
            bindings: PendingBindings::new(std::time::Duration::from_secs(60)),
            tokens: test_tokens(),
        }
    }

    pub fn deps(&self) -> FlowDeps {
        FlowDeps {
            accounts: self.store.clone(),
            settings: self.store.clone(),
            tokens: self.tokens.clone(),
            bindings: self.bindings.clone(),
            usernames: UsernameMaterializer::fixed(fixed_date()),
        }
    }

    pub fn orchestrator(&self, providers: impl IdentityProviderFactory + 'static) -> CallbackOrchestrator {
        CallbackOrchestrator::new(self.hub.clone(), Arc::new(providers), wechat_config(), self.deps())
    }
}
