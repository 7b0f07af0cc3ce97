//! Guardian - autonomous model lifecycle
//!
//! Idle → Evaluating → Training → Comparing → {Promoting | RollingBack} → Idle
//!
//! - Trigger: enough new labels, or score drift with at least one new label
//! - One cycle at a time (`try_lock`); a concurrent caller logs
//!   `retrain_skipped` and returns immediately
//! - Promotion swaps the registry pointer; rollback quarantines the challenger
//! - Consecutive failures suspend automatic triggering for a cooldown
//!
//! Training never holds a lock the scoring path needs; only the pointer swap
//! inside `ModelRegistry::activate` takes the write lock.

pub mod audit;
pub mod backoff;
pub mod drift;
pub mod training;
pub mod trigger;
pub mod types;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::logic::config::{GuardianConfig, SafetyConfig};
use crate::logic::error::{FraudError, FraudResult};
use crate::logic::model::{ModelRegistry, ModelVersion, ModelVersionId};

pub use audit::{DecisionLog, DecisionStats};
pub use backoff::FailureBackoff;
pub use drift::{DriftReading, ScoreDriftMonitor};
pub use training::{LabeledExample, LogisticTrainer, ModelTrainer, TrainOutcome, TrainedModel};
pub use trigger::{TriggerDecision, TriggerPolicy};
pub use types::{CycleOutcome, DecisionType, GuardianDecision, GuardianState, GuardianStatus};

// ============================================================================
// DATA SOURCE SEAM
// ============================================================================

/// Where the guardian gets labeled training data from
pub trait TrainingDataSource: Send + Sync {
    /// Monotonic count of label events (new labels and corrections)
    fn label_count(&self) -> FraudResult<u64>;

    /// All labeled examples, features computed through the shared path
    fn labeled_examples(&self) -> FraudResult<Vec<LabeledExample>>;

    /// Label count consumed by the last completed cycle, as persisted
    fn consumed_labels(&self) -> FraudResult<u64> {
        Ok(0)
    }

    fn mark_labels_consumed(&self, _count: u64) -> FraudResult<()> {
        Ok(())
    }
}

/// Fixed set of examples held in memory
#[derive(Default)]
pub struct InMemoryDataSource {
    examples: RwLock<Vec<LabeledExample>>,
    consumed: AtomicU64,
}

impl InMemoryDataSource {
    pub fn new(examples: Vec<LabeledExample>) -> Self {
        Self {
            examples: RwLock::new(examples),
            consumed: AtomicU64::new(0),
        }
    }

    pub fn extend(&self, more: impl IntoIterator<Item = LabeledExample>) {
        self.examples.write().extend(more);
    }
}

impl TrainingDataSource for InMemoryDataSource {
    fn label_count(&self) -> FraudResult<u64> {
        Ok(self.examples.read().len() as u64)
    }

    fn labeled_examples(&self) -> FraudResult<Vec<LabeledExample>> {
        Ok(self.examples.read().clone())
    }

    fn consumed_labels(&self) -> FraudResult<u64> {
        Ok(self.consumed.load(Ordering::SeqCst))
    }

    fn mark_labels_consumed(&self, count: u64) -> FraudResult<()> {
        self.consumed.store(count, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// GUARDIAN
// ============================================================================

pub struct Guardian {
    config: GuardianConfig,
    policy: TriggerPolicy,
    registry: Arc<ModelRegistry>,
    trainer: Arc<dyn ModelTrainer>,
    source: Arc<dyn TrainingDataSource>,
    drift: Arc<ScoreDriftMonitor>,
    decisions: Arc<DecisionLog>,
    cycle_lock: Mutex<()>,
    state: RwLock<GuardianState>,
    backoff: Mutex<FailureBackoff>,
    /// Label count consumed by the last completed cycle
    labels_at_last_cycle: AtomicU64,
}

impl Guardian {
    pub fn new(
        config: GuardianConfig,
        registry: Arc<ModelRegistry>,
        trainer: Arc<dyn ModelTrainer>,
        source: Arc<dyn TrainingDataSource>,
        drift: Arc<ScoreDriftMonitor>,
        decisions: Arc<DecisionLog>,
    ) -> Self {
        let backoff = FailureBackoff::new(config.max_consecutive_failures, config.failure_cooldown_secs);
        let consumed = source.consumed_labels().unwrap_or_else(|e| {
            log::warn!("[Guardian] Cannot restore consumed label count, starting from 0: {}", e);
            0
        });
        if consumed > 0 {
            log::info!("[Guardian] Restored label watermark: {} labels already consumed", consumed);
        }
        Self {
            policy: TriggerPolicy::from_config(&config),
            config,
            registry,
            trainer,
            source,
            drift,
            decisions,
            cycle_lock: Mutex::new(()),
            state: RwLock::new(GuardianState::Idle),
            backoff: Mutex::new(backoff),
            labels_at_last_cycle: AtomicU64::new(consumed),
        }
    }

    pub fn state(&self) -> GuardianState {
        *self.state.read()
    }

    pub fn decisions(&self) -> &Arc<DecisionLog> {
        &self.decisions
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    /// Evaluate trigger conditions; run a cycle if they hold
    pub fn check_triggers(&self, now: DateTime<Utc>) -> CycleOutcome {
        if !SafetyConfig::is_auto_retrain_enabled() {
            return CycleOutcome::NotTriggered {
                reason: "auto-retrain disabled".into(),
            };
        }

        if let Err(until) = self.backoff.lock().check(now) {
            return CycleOutcome::NotTriggered {
                reason: format!("auto-retrain suspended until {}", until.to_rfc3339()),
            };
        }

        let total = match self.source.label_count() {
            Ok(n) => n,
            Err(e) => {
                log::warn!("[Guardian] Cannot read label count: {}", e);
                return CycleOutcome::NotTriggered {
                    reason: format!("label count unavailable: {e}"),
                };
            }
        };
        let new_labels = total.saturating_sub(self.labels_at_last_cycle.load(Ordering::SeqCst));

        match self.policy.evaluate(new_labels, self.drift.psi()) {
            TriggerDecision::Retrain { reason } => self.run_cycle(&reason, now),
            TriggerDecision::Hold { reason } => {
                log::debug!("[Guardian] Hold: {}", reason);
                CycleOutcome::NotTriggered { reason }
            }
        }
    }

    /// Run one full retrain cycle. Never blocks on another cycle.
    pub fn run_cycle(&self, reason: &str, now: DateTime<Utc>) -> CycleOutcome {
        let Some(_guard) = self.cycle_lock.try_lock() else {
            let err = FraudError::LockContention("another retrain cycle is running".into());
            self.decisions.append(
                GuardianDecision::new(DecisionType::RetrainSkipped, err.to_string(), now)
                    .with_versions(Some(self.registry.active_version()), None),
            );
            return CycleOutcome::Skipped { reason: err.to_string() };
        };

        let outcome = self.execute_cycle(reason, now);
        self.set_state(GuardianState::Idle);

        match &outcome {
            CycleOutcome::Promoted { .. } | CycleOutcome::RolledBack { .. } => self.backoff.lock().record_success(),
            CycleOutcome::Failed { reason } => {
                if let Some(until) = self.backoff.lock().record_failure(now) {
                    log::error!(
                        "[Guardian] {} consecutive failures, auto-retrain suspended until {} (last: {})",
                        self.config.max_consecutive_failures,
                        until.to_rfc3339(),
                        reason
                    );
                }
            }
            _ => {}
        }

        outcome
    }

    /// Manual rollback: pointer change only, logged as `model_rolled_back`
    pub fn rollback_to(&self, version: ModelVersionId, reason: &str, now: DateTime<Utc>) -> FraudResult<ModelVersionId> {
        let Some(_guard) = self.cycle_lock.try_lock() else {
            return Err(FraudError::LockContention("retrain cycle in progress".into()));
        };

        self.set_state(GuardianState::RollingBack);
        let result = self.registry.activate(version);
        self.set_state(GuardianState::Idle);
        let previous = result?;

        self.drift.reset_reference();
        self.decisions.append(
            GuardianDecision::new(
                DecisionType::ModelRolledBack,
                format!("manual rollback to {version}: {reason}"),
                now,
            )
            .with_versions(Some(previous), Some(version)),
        );
        Ok(previous)
    }

    pub fn status(&self, now: DateTime<Utc>) -> GuardianStatus {
        let (consecutive, suspended_until) = {
            let mut backoff = self.backoff.lock();
            let suspended = backoff.check(now).err();
            (backoff.consecutive_failures(), suspended)
        };

        GuardianStatus {
            state: self.state(),
            active_version: self.registry.active_version(),
            auto_retrain_enabled: SafetyConfig::is_auto_retrain_enabled(),
            labels_total: self.source.label_count().unwrap_or(0),
            labels_at_last_cycle: self.labels_at_last_cycle.load(Ordering::SeqCst),
            consecutive_failures: consecutive,
            suspended_until,
            drift_psi: self.drift.psi(),
            decisions_logged: self.decisions.len(),
        }
    }

    // ── Cycle ──────────────────────────────────────────────────

    fn execute_cycle(&self, reason: &str, now: DateTime<Utc>) -> CycleOutcome {
        self.set_state(GuardianState::Evaluating);
        let champion = self.registry.active();

        // read before loading so labels arriving mid-cycle still count as new
        let label_total = match self.source.label_count() {
            Ok(n) => n,
            Err(e) => return self.fail(format!("reading label count: {e}"), &champion, now),
        };
        let examples = match self.source.labeled_examples() {
            Ok(examples) => examples,
            Err(e) => return self.fail(format!("loading labeled data: {e}"), &champion, now),
        };

        self.decisions.append(
            GuardianDecision::new(
                DecisionType::RetrainTriggered,
                format!("{reason} ({} labeled examples)", examples.len()),
                now,
            )
            .with_versions(Some(champion.version), None),
        );

        // ── Train ──
        self.set_state(GuardianState::Training);
        let trained = match self.trainer.train(&examples) {
            TrainOutcome::Trained(trained) => trained,
            TrainOutcome::Skipped { reason } => {
                self.consume_labels(label_total);
                self.decisions.append(
                    GuardianDecision::new(DecisionType::RetrainSkipped, reason.clone(), now)
                        .with_versions(Some(champion.version), None),
                );
                return CycleOutcome::Skipped { reason };
            }
            TrainOutcome::Failed { reason } => return self.fail(reason, &champion, now),
        };

        // ── Compare ──
        self.set_state(GuardianState::Comparing);
        let challenger_id = self.registry.next_version();
        let mut challenger = ModelVersion::new(challenger_id, trained.classifier, trained.cv_metrics, trained.samples);

        let champion_metrics = match self.trainer.evaluate(&champion, &trained.holdout) {
            Ok(m) => m,
            Err(e) => return self.fail(format!("evaluating champion {}: {e}", champion.version), &champion, now),
        };
        let challenger_metrics = match self.trainer.evaluate(&challenger, &trained.holdout) {
            Ok(m) => m,
            Err(e) => return self.fail(format!("evaluating challenger {challenger_id}: {e}"), &champion, now),
        };
        challenger.metrics.holdout_auc = Some(challenger_metrics.auc);

        let challenger = match self.registry.register(challenger) {
            Ok(model) => model,
            Err(e) => return self.fail(format!("registering challenger {challenger_id}: {e}"), &champion, now),
        };
        self.consume_labels(label_total);

        let margin = self.config.promotion_margin;
        if challenger_metrics.auc >= champion_metrics.auc + margin {
            // ── Promote ──
            self.set_state(GuardianState::Promoting);
            let from = match self.registry.activate(challenger.version) {
                Ok(previous) => previous,
                Err(e) => return self.fail(format!("activating {}: {e}", challenger.version), &champion, now),
            };
            self.drift.reset_reference();

            self.decisions.append(
                GuardianDecision::new(
                    DecisionType::ModelKept,
                    format!(
                        "challenger {} promoted: holdout auc {:.4} >= champion {:.4} + margin {:.4}",
                        challenger.version, challenger_metrics.auc, champion_metrics.auc, margin
                    ),
                    now,
                )
                .with_versions(Some(from), Some(challenger.version))
                .with_metrics(challenger.metrics.clone()),
            );
            CycleOutcome::Promoted {
                from,
                to: challenger.version,
            }
        } else {
            // ── Roll back ──
            self.set_state(GuardianState::RollingBack);
            let regression = FraudError::EvaluationRegression {
                challenger: challenger_metrics.auc,
                champion: champion_metrics.auc,
                margin,
            };
            let reason = match self.registry.quarantine(challenger.version) {
                Ok(()) => regression.to_string(),
                Err(e) => {
                    log::error!("[Guardian] Failed to quarantine {}: {}", challenger.version, e);
                    format!("{regression}; quarantine of {} failed: {e}", challenger.version)
                }
            };
            self.decisions.append(
                GuardianDecision::new(DecisionType::ModelRolledBack, reason.clone(), now)
                    .with_versions(Some(champion.version), Some(challenger.version))
                    .with_metrics(challenger.metrics.clone()),
            );
            CycleOutcome::RolledBack {
                champion: champion.version,
                challenger: challenger.version,
                reason,
            }
        }
    }

    /// Advance the watermark in memory and in the data source
    fn consume_labels(&self, label_total: u64) {
        self.labels_at_last_cycle.store(label_total, Ordering::SeqCst);
        if let Err(e) = self.source.mark_labels_consumed(label_total) {
            log::warn!("[Guardian] Failed to persist label watermark {}: {}", label_total, e);
        }
    }

    fn fail(&self, reason: String, champion: &ModelVersion, now: DateTime<Utc>) -> CycleOutcome {
        log::error!("[Guardian] Retrain cycle failed: {}", reason);
        self.decisions.append(
            GuardianDecision::new(DecisionType::RetrainSkipped, format!("cycle failed: {reason}"), now)
                .with_versions(Some(champion.version), None),
        );
        CycleOutcome::Failed { reason }
    }

    fn set_state(&self, state: GuardianState) {
        let mut current = self.state.write();
        if *current != state {
            log::debug!("[Guardian] {:?} -> {:?}", *current, state);
            *current = state;
        }
    }
}
