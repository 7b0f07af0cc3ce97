//! Fraud Shield - service entry point
//!
//! Opens the store + model registry, starts background mining and the model
//! lifecycle loop, then runs until Ctrl-C.

use std::path::PathBuf;

use anyhow::Context;

use fraud_shield::constants::{self, APP_NAME, APP_VERSION};
use fraud_shield::{EngineConfig, FraudShield};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::var(constants::ENV_CONFIG_FILE) {
        Ok(path) => {
            let path = PathBuf::from(path);
            EngineConfig::load(&path).with_context(|| format!("loading config from {}", path.display()))?
        }
        Err(_) => EngineConfig::from_env(),
    };
    config.validate().context("invalid configuration")?;

    log::info!("Starting {} v{}...", APP_NAME, APP_VERSION);

    let shield = FraudShield::open(config).context("failed to initialize fraud shield")?;
    let scheduler = shield.start_scheduler();

    log::info!(
        "Active model {} | review >= {} | block >= {}",
        shield.registry().active_version(),
        shield.config().scoring.review_threshold,
        shield.config().scoring.block_threshold
    );

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    log::info!("Shutdown requested");

    scheduler.shutdown().await;
    Ok(())
}
