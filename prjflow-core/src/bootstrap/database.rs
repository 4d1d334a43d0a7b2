//! Database initialization

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

use crate::Config;

/// Open the connection pool
///
/// Returns `None` when no database URL is configured; the server then keeps
/// accounts in memory. Migrations are run by the binary crate.
pub async fn init_database(config: &Config) -> Result<Option<PgPool>> {
    let database_url = config.database_url();
    if database_url.is_empty() {
        return Ok(None);
    }

    info!("Connecting to database");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_seconds))
        .connect(database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            anyhow::anyhow!("Database connection failed: {}", e)
        })?;

    info!("Database connected successfully");

    Ok(Some(pool))
}
