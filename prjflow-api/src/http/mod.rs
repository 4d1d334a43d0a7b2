// Module: http
// HTTP/JSON endpoints, WeChat callbacks and the ticket WebSocket

pub mod error;
pub mod health;
pub mod init;
pub mod middleware;
pub mod websocket;
pub mod wechat;

use axum::{routing::get, Router};
use prjflow_core::{
    bootstrap::Services,
    callback::{CallbackOrchestrator, CallbackRoute},
    repository::{AccountStore, SettingsStore},
    service::{TicketHub, TokenIssuer},
    Config,
};
use std::{sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CallbackOrchestrator>,
    pub hub: TicketHub,
    pub accounts: Arc<dyn AccountStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub tokens: TokenIssuer,
    /// WebSocket connections with no traffic for this long are closed
    pub ws_idle_timeout: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(services: &Services, config: &Config) -> Self {
        Self {
            orchestrator: services.orchestrator.clone(),
            hub: services.hub.clone(),
            accounts: services.accounts.clone(),
            settings: services.settings.clone(),
            tokens: services.tokens.clone(),
            ws_idle_timeout: config.hub.ws_idle_timeout(),
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // Health check endpoints (for monitoring probes)
        .merge(health::create_health_router())
        // Ticket side channel
        .route("/ws", get(websocket::websocket_handler))
        // System initialization
        .route("/api/init/status", get(init::status))
        .route(
            "/api/init/wechat-config",
            get(init::get_wechat_config).post(init::save_wechat_config),
        )
        // Authorization URLs
        .route("/api/init/qrcode", get(wechat::init_qrcode))
        .route("/api/auth/wechat/qrcode", get(wechat::login_qrcode))
        .route("/api/auth/wechat/bind/qrcode", get(wechat::bind_qrcode))
        .route("/api/users/wechat/add/qrcode", get(wechat::add_user_qrcode))
        // Provider redirects
        .route(CallbackRoute::Init.path(), get(wechat::init_callback))
        .route(CallbackRoute::Login.path(), get(wechat::login_callback))
        .route(CallbackRoute::Bind.path(), get(wechat::bind_callback))
        .route(CallbackRoute::AddUser.path(), get(wechat::add_user_callback));

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
