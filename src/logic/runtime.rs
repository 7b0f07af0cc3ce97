//! Runtime wiring - builds every component from one `EngineConfig`
//!
//! store ─┬─ engine ── scorer ── registry ──┐
//!        └─ miner                            ├─ guardian
//!                 drift monitor ────────────┘

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::logic::config::EngineConfig;
use crate::logic::dataset::ResultWriter;
use crate::logic::engine::ScoringEngine;
use crate::logic::error::FraudResult;
use crate::logic::guardian::{CycleOutcome, DecisionLog, Guardian, LogisticTrainer, ScoreDriftMonitor};
use crate::logic::model::{DecisionThresholds, ModelRegistry, Scorer};
use crate::logic::patterns::{MiningSummary, PatternMiner};
use crate::logic::scheduler::{Scheduler, SchedulerHandle};
use crate::logic::transaction::{AnalystLabel, RiskResult, Transaction};
use crate::logic::velocity::TransactionStore;

pub struct FraudShield {
    config: EngineConfig,
    registry: Arc<ModelRegistry>,
    engine: Arc<ScoringEngine>,
    guardian: Arc<Guardian>,
}

impl FraudShield {
    pub fn open(config: EngineConfig) -> FraudResult<Self> {
        config.validate()?;

        let (store, registry, decisions) = if config.storage.in_memory {
            (
                TransactionStore::in_memory()?,
                ModelRegistry::in_memory(),
                DecisionLog::in_memory(),
            )
        } else {
            (
                TransactionStore::open(&config.storage.database_path())?,
                ModelRegistry::open(&config.storage.model_dir())?,
                DecisionLog::with_file(&config.storage.decision_log_path())?,
            )
        };

        let registry = Arc::new(registry);
        let scorer = Arc::new(Scorer::new(
            registry.clone(),
            DecisionThresholds::from_config(&config.scoring)?,
        ));
        let miner = Arc::new(PatternMiner::new(config.mining.clone()));
        let drift = Arc::new(ScoreDriftMonitor::from_config(&config.guardian));

        let mut engine = ScoringEngine::new(Arc::new(store), miner, scorer, drift.clone());
        if let Some(dir) = &config.storage.result_log {
            engine = engine.with_result_log(ResultWriter::new(dir)?);
        }
        let engine = Arc::new(engine);

        let guardian = Arc::new(Guardian::new(
            config.guardian.clone(),
            registry.clone(),
            Arc::new(LogisticTrainer::new(config.guardian.training.clone())),
            engine.clone(),
            drift,
            Arc::new(decisions),
        ));

        log::info!(
            "Fraud shield ready: active model {}, {} registered versions, storage {}",
            registry.active_version(),
            registry.len(),
            if config.storage.in_memory {
                "in-memory".to_string()
            } else {
                config.storage.data_dir.display().to_string()
            }
        );

        Ok(Self {
            config,
            registry,
            engine,
            guardian,
        })
    }

    pub fn score(&self, tx: &Transaction) -> FraudResult<RiskResult> {
        self.engine.score(tx)
    }

    pub fn record_label(&self, label: &AnalystLabel) -> FraudResult<()> {
        self.engine.record_label(label)
    }

    pub fn mine_patterns(&self, now: DateTime<Utc>) -> FraudResult<Option<MiningSummary>> {
        self.engine.mine_patterns(now)
    }

    pub fn check_lifecycle(&self, now: DateTime<Utc>) -> CycleOutcome {
        self.guardian.check_triggers(now)
    }

    /// Start background mining + lifecycle tasks (needs a tokio runtime)
    pub fn start_scheduler(&self) -> SchedulerHandle {
        Scheduler::new(self.engine.clone(), self.guardian.clone(), self.config.scheduler.clone()).start()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<ScoringEngine> {
        &self.engine
    }

    pub fn guardian(&self) -> &Arc<Guardian> {
        &self.guardian
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }
}
