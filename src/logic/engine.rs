//! Scoring Engine - the synchronous per-transaction pipeline
//!
//! validate → aggregates + pattern flags → FeatureVector → Scorer → RiskResult
//!
//! Every scored vector is persisted; training examples reuse that snapshot, so
//! serving and training vectors for a transaction are identical and pattern
//! cards mined later never leak into them. Transactions stored without being
//! scored fall back to the same `assemble_features` call.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::logic::config::SafetyConfig;
use crate::logic::dataset::ResultWriter;
use crate::logic::error::{FraudError, FraudResult};
use crate::logic::features::{assemble_features, FeatureVector};
use crate::logic::guardian::{LabeledExample, ScoreDriftMonitor, TrainingDataSource};
use crate::logic::model::Scorer;
use crate::logic::patterns::{MiningSummary, PatternIndex, PatternMiner};
use crate::logic::transaction::{validate_transaction, AnalystLabel, RiskResult, Transaction};
use crate::logic::velocity::TransactionStore;

pub struct ScoringEngine {
    store: Arc<TransactionStore>,
    miner: Arc<PatternMiner>,
    scorer: Arc<Scorer>,
    drift: Arc<ScoreDriftMonitor>,
    results: Option<ResultWriter>,
    label_tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
}

impl ScoringEngine {
    pub fn new(
        store: Arc<TransactionStore>,
        miner: Arc<PatternMiner>,
        scorer: Arc<Scorer>,
        drift: Arc<ScoreDriftMonitor>,
    ) -> Self {
        Self {
            store,
            miner,
            scorer,
            drift,
            results: None,
            label_tx: Mutex::new(None),
        }
    }

    /// Persist every RiskResult to a JSONL log
    pub fn with_result_log(mut self, writer: ResultWriter) -> Self {
        self.results = Some(writer);
        self
    }

    // ── Scoring ────────────────────────────────────────────────

    /// Score one transaction. Invalid input and replayed ids are rejected
    /// before any feature is computed or anything is stored.
    pub fn score(&self, tx: &Transaction) -> FraudResult<RiskResult> {
        let started = Instant::now();
        validate_transaction(tx)?;
        if self.store.contains_transaction(&tx.id)? {
            return Err(duplicate(&tx.id));
        }

        let features = self.serving_features(tx)?;
        let outcome = self.scorer.score(&features)?;

        // a concurrent call with the same id may have won the insert
        if !self.store.insert_transaction(tx)? {
            return Err(duplicate(&tx.id));
        }
        self.store.insert_features(&tx.id, &features)?;
        self.drift.record(outcome.probability);

        let result = RiskResult {
            transaction_id: tx.id.clone(),
            score: outcome.probability,
            decision: outcome.decision,
            features,
            model_version: outcome.model_version,
            scored_at: Utc::now(),
            latency_us: started.elapsed().as_micros() as u64,
        };

        if let Some(writer) = &self.results {
            if let Err(e) = writer.append(&result) {
                log::warn!("Failed to append result for {}: {}", tx.id, e);
            }
        }

        log::trace!(
            "Scored {} -> {:.4} {:?} ({}) in {}us",
            result.transaction_id,
            result.score,
            result.decision,
            result.model_version,
            result.latency_us
        );
        Ok(result)
    }

    /// Feature vector the scorer sees for `tx` right now
    pub fn serving_features(&self, tx: &Transaction) -> FraudResult<FeatureVector> {
        let index = self.miner.index();
        assemble_features(tx, self.store.as_ref(), &index)
    }

    // ── Training data ──────────────────────────────────────────

    /// Training example for a labeled transaction: the vector it was scored
    /// with, or (never scored / older layout) the serving path against `index`
    pub fn training_example(&self, tx: &Transaction, is_fraud: bool, index: &PatternIndex) -> FraudResult<LabeledExample> {
        validate_transaction(tx)?;
        let features = match self.store.feature_snapshot(&tx.id)? {
            Some(snapshot) if snapshot.is_compatible() => snapshot,
            _ => assemble_features(tx, self.store.as_ref(), index)?,
        };
        Ok(LabeledExample::new(tx.id.clone(), features, is_fraud))
    }

    /// Every labeled transaction turned into an example
    pub fn training_dataset(&self) -> FraudResult<Vec<LabeledExample>> {
        let labeled = self.store.labeled_transactions()?;
        let index = self.miner.index();
        labeled
            .iter()
            .map(|(tx, is_fraud)| self.training_example(tx, *is_fraud, &index))
            .collect()
    }

    // ── Labels ─────────────────────────────────────────────────

    /// Store an analyst label and wake the lifecycle task. A repeated
    /// verdict is stored but wakes nobody.
    pub fn record_label(&self, label: &AnalystLabel) -> FraudResult<()> {
        if !self.store.insert_label(label)? {
            return Ok(());
        }

        let mut tx = self.label_tx.lock();
        if let Some(sender) = tx.as_ref() {
            if sender.send(()).is_err() {
                // receiver dropped (scheduler stopped)
                *tx = None;
            }
        }
        Ok(())
    }

    /// Channel that receives one message per recorded label.
    /// A new subscription replaces the previous one.
    pub fn subscribe_labels(&self) -> mpsc::UnboundedReceiver<()> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.label_tx.lock() = Some(sender);
        receiver
    }

    // ── Patterns ───────────────────────────────────────────────

    /// Mine the configured window and publish a new index.
    /// `None` when mining is switched off.
    pub fn mine_patterns(&self, now: DateTime<Utc>) -> FraudResult<Option<MiningSummary>> {
        if !SafetyConfig::is_mining_enabled() {
            log::debug!("Pattern mining disabled, skipping run");
            return Ok(None);
        }
        self.miner.run_from_store(&self.store, now).map(Some)
    }

    pub fn pattern_index(&self) -> Arc<PatternIndex> {
        self.miner.index()
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn store(&self) -> &Arc<TransactionStore> {
        &self.store
    }

    pub fn miner(&self) -> &Arc<PatternMiner> {
        &self.miner
    }

    pub fn scorer(&self) -> &Arc<Scorer> {
        &self.scorer
    }

    pub fn drift(&self) -> &Arc<ScoreDriftMonitor> {
        &self.drift
    }

    pub fn result_log(&self) -> Option<&ResultWriter> {
        self.results.as_ref()
    }
}

const LABELS_CONSUMED_KEY: &str = "guardian.labels_consumed";

fn duplicate(id: &str) -> FraudError {
    FraudError::InvalidInput(format!("transaction '{id}' already scored"))
}

impl TrainingDataSource for ScoringEngine {
    fn label_count(&self) -> FraudResult<u64> {
        self.store.label_event_count()
    }

    fn labeled_examples(&self) -> FraudResult<Vec<LabeledExample>> {
        self.training_dataset()
    }

    fn consumed_labels(&self) -> FraudResult<u64> {
        Ok(self.store.state_value(LABELS_CONSUMED_KEY)?.unwrap_or(0))
    }

    fn mark_labels_consumed(&self, count: u64) -> FraudResult<()> {
        self.store.set_state_value(LABELS_CONSUMED_KEY, count)
    }
}
