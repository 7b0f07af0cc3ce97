//! Guardian lifecycle tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use parking_lot::Mutex;

use super::*;
use crate::logic::config::TrainingConfig;
use crate::logic::features::{Feature, FeatureVector};
use crate::logic::model::{EvaluationMetrics, LogisticModel, VersionStatus};

// ============================================================================
// FIXTURES
// ============================================================================

fn example(i: usize, fraud: bool, signal: Feature) -> LabeledExample {
    let jitter = ((i * 37) % 11) as f64 / 11.0;
    let mut fv = FeatureVector::new();
    fv.set(signal, if fraud { 0.5 + 0.5 * jitter } else { -0.5 - 0.5 * jitter });
    LabeledExample::new(format!("tx_{i}"), fv, fraud)
}

fn labeled(fraud: usize, legit: usize) -> Vec<LabeledExample> {
    (0..fraud)
        .map(|i| example(i, true, Feature::DeviceReuse24h))
        .chain((0..legit).map(|i| example(fraud + i, false, Feature::DeviceReuse24h)))
        .collect()
}

fn challenger_classifier() -> LogisticModel {
    let mut classifier = LogisticModel::bootstrap();
    classifier.bias = -3.5;
    classifier
}

fn trained(examples: &[LabeledExample]) -> TrainOutcome {
    TrainOutcome::Trained(TrainedModel {
        classifier: challenger_classifier(),
        cv_metrics: EvaluationMetrics::default(),
        samples: examples.len(),
        holdout: examples.to_vec(),
    })
}

/// Trains instantly; AUC depends only on which version is evaluated
struct ScriptedTrainer {
    champion: ModelVersionId,
    champion_auc: f64,
    challenger_auc: f64,
    trains: AtomicUsize,
}

impl ScriptedTrainer {
    fn new(champion_auc: f64, challenger_auc: f64) -> Self {
        Self {
            champion: ModelVersionId::bootstrap(),
            champion_auc,
            challenger_auc,
            trains: AtomicUsize::new(0),
        }
    }
}

impl ModelTrainer for ScriptedTrainer {
    fn train(&self, examples: &[LabeledExample]) -> TrainOutcome {
        self.trains.fetch_add(1, Ordering::SeqCst);
        trained(examples)
    }

    fn evaluate(&self, model: &ModelVersion, _examples: &[LabeledExample]) -> FraudResult<EvaluationMetrics> {
        let auc = if model.version == self.champion {
            self.champion_auc
        } else {
            self.challenger_auc
        };
        Ok(EvaluationMetrics {
            auc,
            ..EvaluationMetrics::default()
        })
    }
}

/// Blocks inside `train` until released
struct BlockingTrainer {
    started: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
    trains: AtomicUsize,
}

impl ModelTrainer for BlockingTrainer {
    fn train(&self, examples: &[LabeledExample]) -> TrainOutcome {
        self.trains.fetch_add(1, Ordering::SeqCst);
        let _ = self.started.lock().send(());
        let _ = self.release.lock().recv();
        trained(examples)
    }

    fn evaluate(&self, _model: &ModelVersion, _examples: &[LabeledExample]) -> FraudResult<EvaluationMetrics> {
        Ok(EvaluationMetrics {
            auc: 0.5,
            ..EvaluationMetrics::default()
        })
    }
}

struct FailingTrainer {
    trains: AtomicUsize,
}

impl ModelTrainer for FailingTrainer {
    fn train(&self, _examples: &[LabeledExample]) -> TrainOutcome {
        self.trains.fetch_add(1, Ordering::SeqCst);
        TrainOutcome::Failed {
            reason: "optimizer diverged".into(),
        }
    }

    fn evaluate(&self, _model: &ModelVersion, _examples: &[LabeledExample]) -> FraudResult<EvaluationMetrics> {
        Err(FraudError::TrainingFailure("unreachable".into()))
    }
}

fn guardian(
    config: GuardianConfig,
    registry: Arc<ModelRegistry>,
    trainer: Arc<dyn ModelTrainer>,
    source: Arc<dyn TrainingDataSource>,
) -> Guardian {
    let drift = Arc::new(ScoreDriftMonitor::from_config(&config));
    Guardian::new(config, registry, trainer, source, drift, Arc::new(DecisionLog::in_memory()))
}

// ============================================================================
// TRAINING OUTCOMES
// ============================================================================

#[test]
fn test_insufficient_fraud_labels_skip_without_new_version() {
    let registry = Arc::new(ModelRegistry::in_memory());
    let g = guardian(
        GuardianConfig::default(),
        registry.clone(),
        Arc::new(LogisticTrainer::new(TrainingConfig::default())),
        Arc::new(InMemoryDataSource::new(labeled(5, 60))),
    );

    let outcome = g.run_cycle("manual", Utc::now());

    let CycleOutcome::Skipped { reason } = outcome else {
        panic!("expected skipped cycle");
    };
    assert!(reason.contains("insufficient data"));
    assert!(reason.contains("5 fraud"));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.active_version(), ModelVersionId::bootstrap());
    assert_eq!(g.decisions().by_type(DecisionType::RetrainSkipped, 10).len(), 1);
    assert_eq!(g.state(), GuardianState::Idle);
}

#[test]
fn test_regressed_challenger_is_rolled_back_and_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ModelRegistry::open(dir.path()).unwrap());
    let g = guardian(
        GuardianConfig::default(),
        registry.clone(),
        Arc::new(ScriptedTrainer::new(0.93, 0.70)),
        Arc::new(InMemoryDataSource::new(labeled(40, 120))),
    );

    let outcome = g.run_cycle("manual", Utc::now());

    let challenger = ModelVersionId::new(0, 2, 0);
    assert_eq!(
        outcome,
        CycleOutcome::RolledBack {
            champion: ModelVersionId::bootstrap(),
            challenger,
            reason: FraudError::EvaluationRegression {
                challenger: 0.70,
                champion: 0.93,
                margin: 0.0,
            }
            .to_string(),
        }
    );
    assert_eq!(registry.active_version(), ModelVersionId::bootstrap());
    assert_eq!(registry.status(challenger), Some(VersionStatus::Quarantined));
    assert!(dir.path().join("v0.2.0.quarantined.json").exists());
    assert!(!dir.path().join("v0.2.0.json").exists());

    let rolled_back = g.decisions().by_type(DecisionType::ModelRolledBack, 10);
    assert_eq!(rolled_back.len(), 1);
    assert_eq!(rolled_back[0].new_version, Some(challenger));
    assert!(rolled_back[0].reasoning.contains("evaluation regression"));
}

#[test]
fn test_failed_quarantine_is_reported_in_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ModelRegistry::open(dir.path()).unwrap());
    let challenger = registry.next_version();
    // a directory in the way makes the rename fail
    std::fs::create_dir(registry.quarantined_path(challenger).unwrap()).unwrap();

    let g = guardian(
        GuardianConfig::default(),
        registry.clone(),
        Arc::new(ScriptedTrainer::new(0.93, 0.70)),
        Arc::new(InMemoryDataSource::new(labeled(40, 120))),
    );

    let CycleOutcome::RolledBack { reason, .. } = g.run_cycle("manual", Utc::now()) else {
        panic!("expected rollback");
    };
    assert!(reason.contains("quarantine of v0.2.0 failed"));
    assert_eq!(registry.active_version(), ModelVersionId::bootstrap());
    assert_eq!(registry.status(challenger), Some(VersionStatus::Candidate));

    let logged = &g.decisions().by_type(DecisionType::ModelRolledBack, 1)[0];
    assert_eq!(logged.reasoning, reason);
}

#[test]
fn test_better_challenger_is_promoted() {
    let registry = Arc::new(ModelRegistry::in_memory());
    let g = guardian(
        GuardianConfig::default(),
        registry.clone(),
        Arc::new(ScriptedTrainer::new(0.80, 0.85)),
        Arc::new(InMemoryDataSource::new(labeled(40, 120))),
    );

    let outcome = g.run_cycle("manual", Utc::now());

    let to = ModelVersionId::new(0, 2, 0);
    assert_eq!(
        outcome,
        CycleOutcome::Promoted {
            from: ModelVersionId::bootstrap(),
            to
        }
    );
    assert_eq!(registry.active_version(), to);
    assert_eq!(registry.status(ModelVersionId::bootstrap()), Some(VersionStatus::Retired));

    let kept = g.decisions().by_type(DecisionType::ModelKept, 10);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].metrics.as_ref().and_then(|m| m.holdout_auc), Some(0.85));
}

#[test]
fn test_promotion_margin_is_respected() {
    let config = GuardianConfig {
        promotion_margin: 0.05,
        ..GuardianConfig::default()
    };
    let registry = Arc::new(ModelRegistry::in_memory());
    let g = guardian(
        config,
        registry.clone(),
        Arc::new(ScriptedTrainer::new(0.80, 0.82)),
        Arc::new(InMemoryDataSource::new(labeled(40, 120))),
    );

    assert!(g.run_cycle("manual", Utc::now()).is_rolled_back());
    assert_eq!(registry.active_version(), ModelVersionId::bootstrap());
}

#[test]
fn test_real_trainer_promotes_over_bootstrap() {
    // signal lives on a feature the bootstrap prior ignores
    let examples: Vec<LabeledExample> = (0..40)
        .map(|i| example(i, true, Feature::HourSin))
        .chain((0..120).map(|i| example(40 + i, false, Feature::HourSin)))
        .collect();

    let registry = Arc::new(ModelRegistry::in_memory());
    let g = guardian(
        GuardianConfig::default(),
        registry.clone(),
        Arc::new(LogisticTrainer::new(TrainingConfig::default())),
        Arc::new(InMemoryDataSource::new(examples)),
    );

    let outcome = g.run_cycle("manual", Utc::now());
    assert!(outcome.is_promoted(), "got {outcome:?}");

    let active = registry.active();
    assert_eq!(active.version, ModelVersionId::new(0, 2, 0));
    assert!(active.metrics.holdout_auc.unwrap_or(0.0) > 0.9);
    assert!(active.metrics.folds >= 2);
    assert_eq!(active.trained_on, 128);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_cycles_train_once() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let trainer = Arc::new(BlockingTrainer {
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
        trains: AtomicUsize::new(0),
    });

    let g = Arc::new(guardian(
        GuardianConfig::default(),
        Arc::new(ModelRegistry::in_memory()),
        trainer.clone(),
        Arc::new(InMemoryDataSource::new(labeled(40, 120))),
    ));

    let first = {
        let g = g.clone();
        std::thread::spawn(move || g.run_cycle("first", Utc::now()))
    };
    started_rx.recv_timeout(StdDuration::from_secs(10)).unwrap();
    assert_eq!(g.state(), GuardianState::Training);

    let second = g.run_cycle("second", Utc::now());
    let CycleOutcome::Skipped { reason } = second else {
        panic!("expected skipped cycle");
    };
    assert!(reason.contains("lock contention"));

    release_tx.send(()).unwrap();
    let first = first.join().unwrap();
    assert!(first.is_promoted());

    assert_eq!(trainer.trains.load(Ordering::SeqCst), 1);
    assert_eq!(g.decisions().by_type(DecisionType::RetrainTriggered, 10).len(), 1);
    assert_eq!(g.decisions().by_type(DecisionType::RetrainSkipped, 10).len(), 1);
}

// ============================================================================
// TRIGGERS & BACKOFF
// ============================================================================

#[test]
fn test_label_trigger_uses_new_labels_only() {
    let config = GuardianConfig {
        label_threshold: 10,
        ..GuardianConfig::default()
    };
    let source = Arc::new(InMemoryDataSource::new(labeled(40, 120)));
    let trainer = Arc::new(ScriptedTrainer::new(0.5, 0.6));
    let g = guardian(config, Arc::new(ModelRegistry::in_memory()), trainer.clone(), source.clone());

    let now = Utc::now();
    assert!(g.check_triggers(now).is_promoted());
    assert!(matches!(g.check_triggers(now), CycleOutcome::NotTriggered { .. }));

    source.extend(labeled(5, 5));
    assert!(!matches!(g.check_triggers(now), CycleOutcome::NotTriggered { .. }));
    assert_eq!(trainer.trains.load(Ordering::SeqCst), 2);
}

#[test]
fn test_label_watermark_survives_restart() {
    let config = GuardianConfig {
        label_threshold: 10,
        ..GuardianConfig::default()
    };
    let source = Arc::new(InMemoryDataSource::new(labeled(40, 120)));
    let registry = Arc::new(ModelRegistry::in_memory());
    let first = guardian(config.clone(), registry.clone(), Arc::new(ScriptedTrainer::new(0.5, 0.6)), source.clone());
    assert!(first.check_triggers(Utc::now()).is_promoted());
    drop(first);

    let trainer = Arc::new(ScriptedTrainer::new(0.5, 0.6));
    let restarted = guardian(config, registry, trainer.clone(), source.clone());
    assert_eq!(restarted.status(Utc::now()).labels_at_last_cycle, 160);
    assert!(matches!(restarted.check_triggers(Utc::now()), CycleOutcome::NotTriggered { .. }));
    assert_eq!(trainer.trains.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failed_cycle_does_not_consume_labels() {
    let config = GuardianConfig {
        label_threshold: 1,
        ..GuardianConfig::default()
    };
    let source = Arc::new(InMemoryDataSource::new(labeled(10, 10)));
    let g = guardian(
        config,
        Arc::new(ModelRegistry::in_memory()),
        Arc::new(FailingTrainer {
            trains: AtomicUsize::new(0),
        }),
        source.clone(),
    );
    assert!(matches!(g.check_triggers(Utc::now()), CycleOutcome::Failed { .. }));
    assert_eq!(source.consumed_labels().unwrap(), 0);
}

#[test]
fn test_drift_alone_never_triggers() {
    let config = GuardianConfig {
        drift_window: 100,
        drift_min_samples: 100,
        ..GuardianConfig::default()
    };
    let trainer = Arc::new(ScriptedTrainer::new(0.5, 0.6));
    let source = Arc::new(InMemoryDataSource::default());
    let g = guardian(config, Arc::new(ModelRegistry::in_memory()), trainer.clone(), source.clone());

    for _ in 0..100 {
        g.drift.record(0.05);
    }
    for _ in 0..100 {
        g.drift.record(0.95);
    }
    assert!(g.drift.psi().unwrap() > 0.2);

    let outcome = g.check_triggers(Utc::now());
    assert!(matches!(outcome, CycleOutcome::NotTriggered { .. }));
    assert_eq!(trainer.trains.load(Ordering::SeqCst), 0);

    // one label + drift is enough
    source.extend(labeled(1, 0));
    assert!(!matches!(g.check_triggers(Utc::now()), CycleOutcome::NotTriggered { .. }));
    assert_eq!(trainer.trains.load(Ordering::SeqCst), 1);
}

#[test]
fn test_repeated_failures_suspend_auto_retrain() {
    let config = GuardianConfig {
        label_threshold: 1,
        max_consecutive_failures: 2,
        failure_cooldown_secs: 600,
        ..GuardianConfig::default()
    };
    let trainer = Arc::new(FailingTrainer {
        trains: AtomicUsize::new(0),
    });
    let registry = Arc::new(ModelRegistry::in_memory());
    let g = guardian(
        config,
        registry.clone(),
        trainer.clone(),
        Arc::new(InMemoryDataSource::new(labeled(10, 10))),
    );

    let now = Utc::now();
    assert!(matches!(g.check_triggers(now), CycleOutcome::Failed { .. }));
    assert!(matches!(g.check_triggers(now), CycleOutcome::Failed { .. }));

    let CycleOutcome::NotTriggered { reason } = g.check_triggers(now) else {
        panic!("expected suspension");
    };
    assert!(reason.contains("suspended"));
    assert!(g.status(now).suspended_until.is_some());
    assert_eq!(trainer.trains.load(Ordering::SeqCst), 2);

    // cooldown elapsed
    let later = now + Duration::seconds(601);
    assert!(matches!(g.check_triggers(later), CycleOutcome::Failed { .. }));
    assert_eq!(trainer.trains.load(Ordering::SeqCst), 3);

    // failures logged, active model untouched
    let failures = g.decisions().by_type(DecisionType::RetrainSkipped, 10);
    assert_eq!(failures.len(), 3);
    assert!(failures[0].reasoning.contains("optimizer diverged"));
    assert_eq!(registry.active_version(), ModelVersionId::bootstrap());
}

#[test]
fn test_manual_rollback() {
    let registry = Arc::new(ModelRegistry::in_memory());
    let g = guardian(
        GuardianConfig::default(),
        registry.clone(),
        Arc::new(ScriptedTrainer::new(0.5, 0.9)),
        Arc::new(InMemoryDataSource::new(labeled(40, 120))),
    );
    assert!(g.run_cycle("manual", Utc::now()).is_promoted());

    let previous = g
        .rollback_to(ModelVersionId::bootstrap(), "analyst request", Utc::now())
        .unwrap();
    assert_eq!(previous, ModelVersionId::new(0, 2, 0));
    assert_eq!(registry.active_version(), ModelVersionId::bootstrap());

    let entry = &g.decisions().by_type(DecisionType::ModelRolledBack, 1)[0];
    assert!(entry.reasoning.contains("manual rollback"));
    assert!(g.rollback_to(ModelVersionId::new(9, 9, 9), "missing", Utc::now()).is_err());
}
