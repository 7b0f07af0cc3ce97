//! Model Module - fraud classifier, versions, registry, scoring
//!
//! Tách scoring khỏi feature computation và lifecycle.
//! - `classifier` - weighted logistic regression
//! - `version` / `registry` - append-only versions + active pointer
//! - `scorer` - hot-path scoring with latency stats

pub mod classifier;
pub mod metrics;
pub mod registry;
pub mod scorer;
pub mod threshold;
pub mod version;

// Re-export common types
pub use classifier::{sigmoid, LogisticModel};
pub use metrics::{roc_auc, EvaluationMetrics};
pub use registry::{ModelRegistry, ModelVersion, VersionInfo, VersionStatus};
pub use scorer::{ScoreOutcome, Scorer, ScorerStatus};
pub use threshold::DecisionThresholds;
pub use version::ModelVersionId;
