//! Scorer - FeatureVector → probability + decision
//!
//! Reads the registry's active pointer (Arc clone under a short read lock),
//! scores outside the lock. Tracks latency like the inference status panel.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::registry::{ModelRegistry, ModelVersion};
use super::threshold::DecisionThresholds;
use super::version::ModelVersionId;
use crate::logic::error::FraudResult;
use crate::logic::features::FeatureVector;
use crate::logic::transaction::Decision;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub probability: f64,
    pub decision: Decision,
    pub model_version: ModelVersionId,
}

/// Scorer status for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerStatus {
    pub active_version: ModelVersionId,
    pub registered_versions: usize,
    pub thresholds: DecisionThresholds,
    pub avg_latency_us: f64,
    pub score_count: u64,
}

// ============================================================================
// SCORER
// ============================================================================

pub struct Scorer {
    registry: Arc<ModelRegistry>,
    thresholds: DecisionThresholds,
    latency_sum_us: AtomicU64,
    score_count: AtomicU64,
}

impl Scorer {
    pub fn new(registry: Arc<ModelRegistry>, thresholds: DecisionThresholds) -> Self {
        Self {
            registry,
            thresholds,
            latency_sum_us: AtomicU64::new(0),
            score_count: AtomicU64::new(0),
        }
    }

    /// Score a vector with the currently active model
    pub fn score(&self, features: &FeatureVector) -> FraudResult<ScoreOutcome> {
        features.validate()?;
        let started = Instant::now();

        let model: Arc<ModelVersion> = self.registry.active();
        let probability = model.classifier.predict_proba(features).clamp(0.0, 1.0);

        self.latency_sum_us
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.score_count.fetch_add(1, Ordering::Relaxed);

        Ok(ScoreOutcome {
            probability,
            decision: self.thresholds.decide(probability),
            model_version: model.version,
        })
    }

    /// Load an artifact, verify it, register it, then swap to it
    pub fn reload(&self, path: &Path) -> FraudResult<ModelVersionId> {
        let model = self.registry.load_artifact(path)?;
        self.registry.activate(model.version)?;
        log::info!("Scorer reloaded model {} from {:?}", model.version, path);
        Ok(model.version)
    }

    /// Swap to an already registered version. Returns the previous one.
    pub fn swap_to(&self, version: ModelVersionId) -> FraudResult<ModelVersionId> {
        self.registry.activate(version)
    }

    pub fn active_version(&self) -> ModelVersionId {
        self.registry.active_version()
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn thresholds(&self) -> DecisionThresholds {
        self.thresholds
    }

    pub fn status(&self) -> ScorerStatus {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.score_count.load(Ordering::Relaxed);
        let avg = if count > 0 { sum as f64 / count as f64 } else { 0.0 };

        ScorerStatus {
            active_version: self.registry.active_version(),
            registered_versions: self.registry.len(),
            thresholds: self.thresholds,
            avg_latency_us: avg,
            score_count: count,
        }
    }
}
