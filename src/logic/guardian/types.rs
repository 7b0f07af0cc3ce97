//! Guardian Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::model::{EvaluationMetrics, ModelVersionId};

// ============================================================================
// DECISION LOG ENTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    RetrainTriggered,
    RetrainSkipped,
    /// Challenger promoted, kept as the new active model
    ModelKept,
    ModelRolledBack,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::RetrainTriggered => "retrain_triggered",
            DecisionType::RetrainSkipped => "retrain_skipped",
            DecisionType::ModelKept => "model_kept",
            DecisionType::ModelRolledBack => "model_rolled_back",
        }
    }
}

/// Append-only audit record of one lifecycle decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianDecision {
    pub id: Uuid,
    pub decision: DecisionType,
    pub reasoning: String,
    pub old_version: Option<ModelVersionId>,
    pub new_version: Option<ModelVersionId>,
    pub metrics: Option<EvaluationMetrics>,
    pub timestamp: DateTime<Utc>,
}

impl GuardianDecision {
    pub fn new(decision: DecisionType, reasoning: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            decision,
            reasoning: reasoning.into(),
            old_version: None,
            new_version: None,
            metrics: None,
            timestamp,
        }
    }

    pub fn with_versions(mut self, old: Option<ModelVersionId>, new: Option<ModelVersionId>) -> Self {
        self.old_version = old;
        self.new_version = new;
        self
    }

    pub fn with_metrics(mut self, metrics: EvaluationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardianState {
    Idle,
    Evaluating,
    Training,
    Comparing,
    Promoting,
    RollingBack,
}

/// Result of one `check_triggers` / `run_cycle` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Trigger conditions not met (or auto-retrain suspended)
    NotTriggered { reason: String },
    Promoted {
        from: ModelVersionId,
        to: ModelVersionId,
    },
    RolledBack {
        champion: ModelVersionId,
        challenger: ModelVersionId,
        reason: String,
    },
    /// Lock contention or insufficient data; nothing written
    Skipped { reason: String },
    Failed { reason: String },
}

impl CycleOutcome {
    pub fn is_promoted(&self) -> bool {
        matches!(self, CycleOutcome::Promoted { .. })
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, CycleOutcome::RolledBack { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CycleOutcome::Skipped { .. })
    }
}

/// Guardian status for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianStatus {
    pub state: GuardianState,
    pub active_version: ModelVersionId,
    pub auto_retrain_enabled: bool,
    pub labels_total: u64,
    pub labels_at_last_cycle: u64,
    pub consecutive_failures: u32,
    pub suspended_until: Option<DateTime<Utc>>,
    pub drift_psi: Option<f64>,
    pub decisions_logged: usize,
}
