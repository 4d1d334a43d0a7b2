//! Server lifecycle
//!
//! Starts the HTTP listener and the background sweepers, then waits for
//! Ctrl+C or SIGTERM and shuts everything down in order.

use prjflow_api::{create_router, AppState};
use prjflow_core::{bootstrap::Services, Config};
use sqlx::PgPool;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info};

pub struct PrjflowServer {
    config: Config,
    services: Services,
    pool: Option<PgPool>,
}

impl PrjflowServer {
    pub const fn new(config: Config, services: Services, pool: Option<PgPool>) -> Self {
        Self {
            config,
            services,
            pool,
        }
    }

    /// Start all components and wait for shutdown signal
    pub async fn start(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let hub_sweeper = self.services.hub.start_sweeper(
            self.config.hub.sweep_interval(),
            self.config.hub.subscription_ttl(),
        );
        let binding_sweeper = self.start_binding_sweeper();
        info!("Background sweepers started");

        let http_handle = self.start_http_server(shutdown_rx).await?;
        info!("All servers started successfully");

        tokio::select! {
            _ = http_handle => {
                error!("HTTP server stopped unexpectedly");
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        if shutdown_tx.send(true).is_err() {
            debug!("HTTP server already gone");
        }
        hub_sweeper.abort();
        binding_sweeper.abort();

        if let Some(pool) = &self.pool {
            info!("Closing database connection pool...");
            pool.close().await;
            info!("Database pool closed");
        }

        info!("PrjFlow server stopped");
        Ok(())
    }

    /// Drop bind requests nobody completed
    fn start_binding_sweeper(&self) -> JoinHandle<()> {
        let bindings = self.services.bindings.clone();
        let interval = self.config.hub.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let purged = bindings.purge_expired();
                if purged > 0 {
                    debug!(purged, "Expired bind requests removed");
                }
            }
        })
    }

    async fn start_http_server(
        &self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let http_address = self.config.http_address();
        let router = create_router(AppState::new(&self.services, &self.config));

        let listener = tokio::net::TcpListener::bind(&http_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_address}: {e}"))?;
        info!("HTTP server listening on {}", http_address);

        Ok(tokio::spawn(async move {
            let shutdown = async move {
                // any change, or the sender going away, means stop
                let _ = shutdown_rx.changed().await;
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("HTTP server error: {}", e);
            }
        }))
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
