//! Velocity clusters: senders with a burst of sends inside a sliding window.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::graph::TransactionGraph;
use super::types::{PatternCard, PatternStats, PatternType};
use crate::logic::config::MiningConfig;

/// Largest window count found by `max_window_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    pub count: usize,
    pub start: usize,
    pub end: usize,
}

pub fn detect_velocity_clusters(
    graph: &TransactionGraph,
    config: &MiningConfig,
    now: DateTime<Utc>,
) -> Vec<PatternCard> {
    let window_ms = config.velocity_window_minutes as i64 * 60_000;
    let min_count = config.velocity_min_count.max(1);
    let mut cards = Vec::new();

    for node in 0..graph.node_count() {
        let times = graph.sent_at(node);
        if times.len() < min_count {
            continue;
        }

        let burst = max_window_count(times, window_ms);
        if burst.count < min_count {
            continue;
        }

        let receivers: BTreeSet<&str> = graph.successors(node).iter().map(|&r| graph.id(r)).collect();

        let stats = PatternStats {
            flow_weight: graph
                .successors(node)
                .iter()
                .filter_map(|&r| graph.edge(node, r))
                .map(|e| e.weight)
                .sum(),
            tx_count: burst.count,
            edge_count: receivers.len(),
            window_minutes: Some(config.velocity_window_minutes),
            ..PatternStats::default()
        };

        cards.push(PatternCard::new(
            PatternType::VelocityCluster,
            BTreeSet::from([graph.id(node).to_string()]),
            receivers.into_iter().map(str::to_string).collect(),
            (burst.count as f64 / (2 * min_count) as f64).clamp(0.5, 1.0),
            stats,
            now,
        ));
    }

    cards
}

/// Two-pointer scan over sorted timestamps: max count with
/// `ts[end] - ts[start] <= window_ms`
pub fn max_window_count(sorted: &[i64], window_ms: i64) -> Burst {
    let mut best = Burst { count: 0, start: 0, end: 0 };
    let mut left = 0;

    for right in 0..sorted.len() {
        while sorted[right] - sorted[left] > window_ms {
            left += 1;
        }
        let count = right - left + 1;
        if count > best.count {
            best = Burst { count, start: left, end: right };
        }
    }

    best
}
