//! Configuration loading

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::Config;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "PRJFLOW_CONFIG_PATH";

const CANDIDATE_PATHS: [&str; 2] = ["config.yaml", "/config/config.yaml"];

/// Load and validate the configuration
///
/// Config file search order:
/// 1. `PRJFLOW_CONFIG_PATH` (explicit path)
/// 2. ./config.yaml
/// 3. /config/config.yaml (container mount)
/// 4. environment variables only
///
/// `PRJFLOW__*` variables override file values in every case.
pub fn load_config() -> Result<Config> {
    let explicit = std::env::var(CONFIG_PATH_ENV).ok();
    let config_path = discover_config_path(explicit.as_deref());

    let config = match config_path.as_deref() {
        Some(path) => {
            eprintln!("Loading config from {path}");
            Config::from_file(path)
                .map_err(|e| anyhow::anyhow!("failed to load {path}: {e}"))?
        }
        None => {
            eprintln!("No config file found, using environment variables");
            Config::from_env()?
        }
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            tracing::error!("Config validation error: {}", error);
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    info!("Configuration loaded and validated successfully");
    info!("HTTP address: {}", config.http_address());

    Ok(config)
}

/// First existing file among the explicit path and the default locations
pub fn discover_config_path(explicit: Option<&str>) -> Option<String> {
    explicit
        .into_iter()
        .chain(CANDIDATE_PATHS)
        .find(|p| Path::new(p).exists())
        .map(str::to_string)
}
