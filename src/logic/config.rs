//! Engine configuration + runtime kill-switches.
//!
//! `EngineConfig` is a serde tree with defaults for every field, so a partial
//! JSON file or a handful of `FRAUD_*` env vars is enough to run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::constants::{self, env_flag, env_or};
use crate::logic::error::{FraudError, FraudResult};

// ============================================================================
// SAFETY CONFIG (kill-switches)
// ============================================================================

// Default state: all systems enabled
static AUTO_RETRAIN_ENABLED: AtomicBool = AtomicBool::new(true);
static MINING_ENABLED: AtomicBool = AtomicBool::new(true);
static RESULT_LOG_ENABLED: AtomicBool = AtomicBool::new(true);

pub struct SafetyConfig;

impl SafetyConfig {
    pub fn is_auto_retrain_enabled() -> bool {
        AUTO_RETRAIN_ENABLED.load(Ordering::Relaxed)
    }

    pub fn is_mining_enabled() -> bool {
        MINING_ENABLED.load(Ordering::Relaxed)
    }

    pub fn is_result_log_enabled() -> bool {
        RESULT_LOG_ENABLED.load(Ordering::Relaxed)
    }

    // Setters (operator override / incident response)
    pub fn set_auto_retrain(val: bool) { AUTO_RETRAIN_ENABLED.store(val, Ordering::Relaxed); }
    pub fn set_mining(val: bool) { MINING_ENABLED.store(val, Ordering::Relaxed); }
    pub fn set_result_log(val: bool) { RESULT_LOG_ENABLED.store(val, Ordering::Relaxed); }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub mining: MiningConfig,
    pub guardian: GuardianConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub review_threshold: f64,
    pub block_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            review_threshold: constants::DEFAULT_REVIEW_THRESHOLD,
            block_threshold: constants::DEFAULT_BLOCK_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Sliding window of transactions fed to the graph (minutes)
    pub window_minutes: u32,
    /// Hard cap on transactions pulled per run
    pub max_window_transactions: usize,
    pub ring_min_size: usize,
    pub ring_min_flow: f64,
    /// Flow at which the flow factor reaches ~63%
    pub flow_scale: f64,
    pub hub_min_nodes: usize,
    pub hub_min_counterparties: usize,
    /// Hub threshold = mean + k * std of weighted degree
    pub hub_std_multiplier: f64,
    /// Velocity window W (minutes)
    pub velocity_window_minutes: u32,
    pub velocity_min_count: usize,
    pub dense_min_density: f64,
    pub dense_min_flow: f64,
    pub dense_max_cards: usize,
    /// Superseded cards kept for inspection
    pub history_limit: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            window_minutes: 120,
            max_window_transactions: 200_000,
            ring_min_size: 3,
            ring_min_flow: 0.0,
            flow_scale: 5_000.0,
            hub_min_nodes: 5,
            hub_min_counterparties: 3,
            hub_std_multiplier: 2.0,
            velocity_window_minutes: 10,
            velocity_min_count: 10,
            dense_min_density: 0.6,
            dense_min_flow: 0.0,
            dense_max_cards: 50,
            history_limit: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub folds: usize,
    pub min_class_samples: usize,
    pub holdout_fraction: f64,
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub seed: u64,
    pub decision_threshold: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            min_class_samples: 20,
            holdout_fraction: 0.2,
            epochs: 400,
            learning_rate: 0.1,
            l2: 1e-3,
            seed: 42,
            decision_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// New labels since the last cycle that trigger a retrain
    pub label_threshold: u64,
    /// PSI above which score drift is considered significant
    pub drift_bound: f64,
    /// Challenger AUC must reach champion AUC + margin
    pub promotion_margin: f64,
    pub max_consecutive_failures: u32,
    pub failure_cooldown_secs: u64,
    pub drift_window: usize,
    pub drift_min_samples: usize,
    pub training: TrainingConfig,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            label_threshold: 100,
            drift_bound: 0.2,
            promotion_margin: 0.0,
            max_consecutive_failures: 3,
            failure_cooldown_secs: 3_600,
            drift_window: 1_000,
            drift_min_samples: 200,
            training: TrainingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Keep everything in memory (tests, demos)
    pub in_memory: bool,
    /// Optional JSONL sink for every RiskResult
    pub result_log: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: constants::get_data_dir(),
            in_memory: false,
            result_log: None,
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(constants::DEFAULT_DATABASE_FILE)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.data_dir.join(constants::DEFAULT_MODEL_DIR)
    }

    pub fn decision_log_path(&self) -> PathBuf {
        self.data_dir.join(constants::DEFAULT_DECISION_LOG)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub mining_interval_secs: u64,
    pub lifecycle_interval_secs: u64,
    /// Granularity of the background loops
    pub tick_millis: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mining_interval_secs: constants::DEFAULT_MINING_INTERVAL,
            lifecycle_interval_secs: constants::DEFAULT_LIFECYCLE_INTERVAL,
            tick_millis: 1_000,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `FRAUD_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.scoring.review_threshold =
            env_or(constants::ENV_REVIEW_THRESHOLD, config.scoring.review_threshold);
        config.scoring.block_threshold =
            env_or(constants::ENV_BLOCK_THRESHOLD, config.scoring.block_threshold);

        config.mining.window_minutes = env_or(constants::ENV_MINING_WINDOW, config.mining.window_minutes);
        config.mining.velocity_window_minutes =
            env_or(constants::ENV_VELOCITY_WINDOW, config.mining.velocity_window_minutes);

        config.guardian.label_threshold =
            env_or(constants::ENV_LABEL_THRESHOLD, config.guardian.label_threshold);
        config.guardian.drift_bound = env_or(constants::ENV_DRIFT_BOUND, config.guardian.drift_bound);
        config.guardian.promotion_margin =
            env_or(constants::ENV_PROMOTION_MARGIN, config.guardian.promotion_margin);

        config.storage.in_memory = env_flag(constants::ENV_IN_MEMORY, false);
        config.storage.result_log = std::env::var(constants::ENV_RESULT_LOG).ok().map(PathBuf::from);

        config.scheduler.mining_interval_secs =
            env_or(constants::ENV_MINING_INTERVAL, config.scheduler.mining_interval_secs);
        config.scheduler.lifecycle_interval_secs =
            env_or(constants::ENV_LIFECYCLE_INTERVAL, config.scheduler.lifecycle_interval_secs);

        config
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: &Path) -> FraudResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// In-memory configuration used by tests and demos
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.storage.in_memory = true;
        config
    }

    pub fn validate(&self) -> FraudResult<()> {
        let s = &self.scoring;
        if !(0.0..=1.0).contains(&s.review_threshold)
            || !(0.0..=1.0).contains(&s.block_threshold)
            || s.review_threshold > s.block_threshold
        {
            return Err(FraudError::InvalidInput(format!(
                "thresholds must satisfy 0 <= review ({}) <= block ({}) <= 1",
                s.review_threshold, s.block_threshold
            )));
        }

        let m = &self.mining;
        if m.window_minutes == 0 || m.velocity_window_minutes == 0 {
            return Err(FraudError::InvalidInput("mining windows must be at least 1 minute".into()));
        }
        if m.ring_min_size < 2 {
            return Err(FraudError::InvalidInput("ring_min_size must be >= 2".into()));
        }
        if m.flow_scale <= 0.0 {
            return Err(FraudError::InvalidInput("flow_scale must be positive".into()));
        }

        let t = &self.guardian.training;
        if t.folds < 2 {
            return Err(FraudError::InvalidInput("training needs at least 2 folds".into()));
        }
        if !(t.holdout_fraction > 0.0 && t.holdout_fraction < 1.0) {
            return Err(FraudError::InvalidInput("holdout_fraction must be in (0, 1)".into()));
        }
        if self.guardian.max_consecutive_failures == 0 {
            return Err(FraudError::InvalidInput("max_consecutive_failures must be >= 1".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mining.velocity_min_count, 10);
        assert_eq!(config.guardian.training.min_class_samples, 20);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "scoring": { "review_threshold": 0.4 }, "mining": { "window_minutes": 60 } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.scoring.review_threshold, 0.4);
        assert_eq!(config.scoring.block_threshold, 0.8);
        assert_eq!(config.mining.window_minutes, 60);
        assert_eq!(config.mining.ring_min_size, 3);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.scoring.review_threshold = 0.9;
        config.scoring.block_threshold = 0.5;
        assert!(matches!(config.validate(), Err(FraudError::InvalidInput(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "guardian": { "label_threshold": 7 } }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.guardian.label_threshold, 7);
        assert_eq!(config.guardian.training.folds, 5);
    }

    #[test]
    fn test_kill_switch_toggle() {
        SafetyConfig::set_result_log(false);
        assert!(!SafetyConfig::is_result_log_enabled());
        SafetyConfig::set_result_log(true);
        assert!(SafetyConfig::is_result_log_enabled());
    }
}
