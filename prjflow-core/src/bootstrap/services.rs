//! Service initialization and dependency injection

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    callback::{CallbackOrchestrator, FlowDeps, UsernameMaterializer},
    repository::{AccountStore, MemoryStore, PgAccountStore, PgSettingsStore, SettingsStore},
    service::{PendingBindings, TicketHub, TokenIssuer},
    wechat::{IdentityProviderFactory, WeChatClientFactory},
    Config,
};

/// Container for all initialized services
#[derive(Clone)]
pub struct Services {
    pub accounts: Arc<dyn AccountStore>,
    pub settings: Arc<dyn SettingsStore>,
    /// Ticket pub/sub shared by the callbacks and the websocket endpoint
    pub hub: TicketHub,
    pub bindings: PendingBindings,
    pub tokens: TokenIssuer,
    pub orchestrator: Arc<CallbackOrchestrator>,
}

/// Wire the services against PostgreSQL, or the in-memory store without a pool
pub fn init_services(pool: Option<PgPool>, config: &Config) -> anyhow::Result<Services> {
    info!("Initializing services...");

    let (accounts, settings): (Arc<dyn AccountStore>, Arc<dyn SettingsStore>) = match pool {
        Some(pool) => (
            Arc::new(PgAccountStore::new(pool.clone())),
            Arc::new(PgSettingsStore::new(pool)),
        ),
        None => {
            warn!("No database configured, accounts are kept in memory and lost on restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };

    let providers = WeChatClientFactory::new(
        &config.wechat.api_base,
        std::time::Duration::from_secs(config.wechat.request_timeout_secs),
    )?;

    Ok(assemble(accounts, settings, Arc::new(providers), config))
}

/// Build [`Services`] from already constructed stores and provider factory
pub fn assemble(
    accounts: Arc<dyn AccountStore>,
    settings: Arc<dyn SettingsStore>,
    providers: Arc<dyn IdentityProviderFactory>,
    config: &Config,
) -> Services {
    let hub = TicketHub::new();
    let bindings = PendingBindings::new(config.hub.bind_ticket_ttl());
    let tokens = TokenIssuer::new(&config.jwt.secret, config.jwt.access_token_duration_hours);
    info!(
        "Token issuer initialized (access tokens valid {}h)",
        config.jwt.access_token_duration_hours
    );

    let deps = FlowDeps {
        accounts: accounts.clone(),
        settings: settings.clone(),
        tokens: tokens.clone(),
        bindings: bindings.clone(),
        usernames: UsernameMaterializer::system(),
    };
    let orchestrator = Arc::new(CallbackOrchestrator::new(
        hub.clone(),
        providers,
        config.wechat.clone(),
        deps,
    ));
    info!("WeChat callback orchestrator initialized");

    Services {
        accounts,
        settings,
        hub,
        bindings,
        tokens,
        orchestrator,
    }
}
