mod server;

use anyhow::Result;
use tracing::{error, info};

use prjflow_core::{
    bootstrap::{init_database, init_services, load_config},
    logging,
};

use server::PrjflowServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("PrjFlow server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Initialize database (optional)
    let pool = init_database(&config).await?;

    // 4. Run migrations
    if let Some(pool) = &pool {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                anyhow::anyhow!("Migration failed: {e}")
            })?;
        info!("Migrations completed");
    }

    // 5. Initialize services
    let services = init_services(pool.clone(), &config)?;

    // 6. Serve until a shutdown signal arrives
    PrjflowServer::new(config, services, pool).start().await
}
