//! Fraud Shield Core
//!
//! Real-time transaction risk scoring, graph pattern mining and an autonomous
//! model lifecycle manager.
//!
//! ## Layout
//! - `logic::features` - fixed-schema feature vector shared by serving and training
//! - `logic::velocity` - SQLite transaction store and rolling-window aggregates
//! - `logic::patterns` - ring / hub / velocity / dense subgraph mining + entity index
//! - `logic::model` - classifier, version registry, atomic model swap, scorer
//! - `logic::guardian` - retrain triggers, training, champion/challenger, rollback
//! - `logic::engine` / `logic::scheduler` - scoring pipeline and background tasks

pub mod constants;
pub mod logic;

pub use logic::config::{EngineConfig, SafetyConfig};
pub use logic::engine::ScoringEngine;
pub use logic::error::{FraudError, FraudResult};
pub use logic::features::{compute_features, FeatureVector};
pub use logic::guardian::{CycleOutcome, DecisionType, Guardian, GuardianDecision};
pub use logic::model::{ModelRegistry, ModelVersion, ModelVersionId, Scorer};
pub use logic::patterns::{PatternCard, PatternIndex, PatternMiner, PatternType};
pub use logic::runtime::FraudShield;
pub use logic::transaction::{AnalystLabel, Decision, RiskResult, Transaction};
