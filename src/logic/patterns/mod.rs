//! Patterns Module - Graph Pattern Mining Engine
//!
//! Runs off the hot path over a bounded window of recent transactions and
//! publishes an immutable `PatternIndex` that the scoring path reads through
//! a swapped `Arc`.
//!
//! ## Detectors
//! - Ring: SCC (size >= 3) + shortest representative cycle
//! - Hub: weighted degree above mean + k·std of the window
//! - Velocity cluster: sliding-window send bursts per sender
//! - Dense subgraph: directed density of SCCs (size >= 2)

mod bursts;
mod dense;
mod graph;
mod hubs;
mod index;
mod registry;
mod rings;
mod scc;
mod types;


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::logic::config::MiningConfig;
use crate::logic::error::FraudResult;
use crate::logic::transaction::Transaction;
use crate::logic::velocity::TransactionStore;

pub use bursts::{max_window_count, Burst};
pub use graph::{EdgeStats, TransactionGraph};
pub use index::{PatternFlags, PatternIndex};
pub use registry::{MergeSummary, PatternRegistry};
pub use rings::ring_confidence;
pub use scc::strongly_connected_components;
pub use types::{structural_signature, CardStatus, PatternCard, PatternStats, PatternType};

// ============================================================================
// ONE-SHOT MINING
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MiningStats {
    pub transactions: usize,
    pub nodes: usize,
    pub edges: usize,
    pub components: usize,
    pub rings: usize,
    pub hubs: usize,
    pub velocity_clusters: usize,
    pub dense_subgraphs: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct MiningReport {
    pub cards: Vec<PatternCard>,
    pub stats: MiningStats,
}

/// Run every detector over one window of transactions
pub fn mine(transactions: &[Transaction], config: &MiningConfig, now: DateTime<Utc>) -> MiningReport {
    let started = Instant::now();
    let graph = TransactionGraph::from_transactions(transactions);
    let components = strongly_connected_components(&graph);

    let rings = rings::detect_rings(&graph, &components, config, now);
    let hubs = hubs::detect_hubs(&graph, config, now);
    let clusters = bursts::detect_velocity_clusters(&graph, config, now);
    let dense = dense::detect_dense_subgraphs(&graph, &components, config, now);

    let stats = MiningStats {
        transactions: graph.tx_count(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        components: components.len(),
        rings: rings.len(),
        hubs: hubs.len(),
        velocity_clusters: clusters.len(),
        dense_subgraphs: dense.len(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    let mut cards = rings;
    cards.extend(hubs);
    cards.extend(clusters);
    cards.extend(dense);

    MiningReport { cards, stats }
}

// ============================================================================
// PERIODIC MINER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningSummary {
    pub run: u64,
    pub stats: MiningStats,
    pub merge: MergeSummary,
    pub active_cards: usize,
    pub finished_at: DateTime<Utc>,
}

/// Owns card lifecycle and the published index
pub struct PatternMiner {
    config: MiningConfig,
    registry: Mutex<PatternRegistry>,
    index: RwLock<Arc<PatternIndex>>,
    runs: AtomicU64,
}

impl PatternMiner {
    pub fn new(config: MiningConfig) -> Self {
        let history_limit = config.history_limit;
        Self {
            config,
            registry: Mutex::new(PatternRegistry::new(history_limit)),
            index: RwLock::new(Arc::new(PatternIndex::empty())),
            runs: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Current index snapshot; cheap clone of the Arc
    pub fn index(&self) -> Arc<PatternIndex> {
        self.index.read().clone()
    }

    /// Mine a window, merge into the registry and publish a fresh index
    pub fn run_on(&self, transactions: &[Transaction], now: DateTime<Utc>) -> MiningSummary {
        let report = mine(transactions, &self.config, now);

        let (merge, index, active_cards) = {
            let mut registry = self.registry.lock();
            let merge = registry.merge(report.cards, now);
            let index = Arc::new(registry.index(now));
            let active = index.len();
            (merge, index, active)
        };

        *self.index.write() = index;
        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;

        log::info!(
            "Pattern mining run {}: {} tx, {} nodes, rings={} hubs={} velocity={} dense={} (+{} new, {} superseded) in {}ms",
            run,
            report.stats.transactions,
            report.stats.nodes,
            report.stats.rings,
            report.stats.hubs,
            report.stats.velocity_clusters,
            report.stats.dense_subgraphs,
            merge.new_cards,
            merge.superseded,
            report.stats.elapsed_ms
        );

        MiningSummary {
            run,
            stats: report.stats,
            merge,
            active_cards,
            finished_at: now,
        }
    }

    /// Copy the window out of the store, then mine without holding the store lock
    pub fn run_from_store(&self, store: &TransactionStore, now: DateTime<Utc>) -> FraudResult<MiningSummary> {
        let since = now - Duration::minutes(self.config.window_minutes as i64);
        let window = store.recent_window(since, now, self.config.max_window_transactions)?;
        Ok(self.run_on(&window, now))
    }

    pub fn active_cards(&self) -> Vec<PatternCard> {
        self.registry.lock().active_cards()
    }

    pub fn history(&self) -> Vec<PatternCard> {
        self.registry.lock().history()
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}
