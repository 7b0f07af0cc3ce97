//! Central Configuration Constants
//!
//! Single source of truth for configuration defaults and the environment
//! variables that override them.

use std::path::PathBuf;
use std::str::FromStr;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Fraud-Shield";

/// Data directory name under the platform local data dir
pub const DATA_DIR_NAME: &str = "fraud-shield";

/// SQLite database file name
pub const DEFAULT_DATABASE_FILE: &str = "transactions.db";

/// Model artifact directory name
pub const DEFAULT_MODEL_DIR: &str = "models";

/// Guardian decision log file name
pub const DEFAULT_DECISION_LOG: &str = "guardian_decisions.jsonl";

/// Default review threshold (score >= this => review)
pub const DEFAULT_REVIEW_THRESHOLD: f64 = 0.5;

/// Default block threshold (score >= this => block)
pub const DEFAULT_BLOCK_THRESHOLD: f64 = 0.8;

/// Default mining interval (seconds)
pub const DEFAULT_MINING_INTERVAL: u64 = 300;

/// Default lifecycle check interval (seconds)
pub const DEFAULT_LIFECYCLE_INTERVAL: u64 = 60;

// ============================================
// Environment variable names
// ============================================

pub const ENV_CONFIG_FILE: &str = "FRAUD_CONFIG_FILE";
pub const ENV_DATA_DIR: &str = "FRAUD_DATA_DIR";
pub const ENV_IN_MEMORY: &str = "FRAUD_IN_MEMORY";
pub const ENV_REVIEW_THRESHOLD: &str = "FRAUD_REVIEW_THRESHOLD";
pub const ENV_BLOCK_THRESHOLD: &str = "FRAUD_BLOCK_THRESHOLD";
pub const ENV_MINING_INTERVAL: &str = "FRAUD_MINING_INTERVAL";
pub const ENV_MINING_WINDOW: &str = "FRAUD_MINING_WINDOW_MINUTES";
pub const ENV_VELOCITY_WINDOW: &str = "FRAUD_VELOCITY_WINDOW_MINUTES";
pub const ENV_LIFECYCLE_INTERVAL: &str = "FRAUD_LIFECYCLE_INTERVAL";
pub const ENV_LABEL_THRESHOLD: &str = "FRAUD_LABEL_THRESHOLD";
pub const ENV_DRIFT_BOUND: &str = "FRAUD_DRIFT_BOUND";
pub const ENV_PROMOTION_MARGIN: &str = "FRAUD_PROMOTION_MARGIN";
pub const ENV_RESULT_LOG: &str = "FRAUD_RESULT_LOG";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Read and parse an environment variable, falling back to `default`
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a boolean flag ("1"/"true"/"yes" => true)
pub fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// Get the data directory from environment or the platform default
pub fn get_data_dir() -> PathBuf {
    std::env::var(ENV_DATA_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DATA_DIR_NAME)
        })
}
