//! Hub detection relative to the window's own degree distribution.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::graph::TransactionGraph;
use super::types::{PatternCard, PatternStats, PatternType};
use crate::logic::config::MiningConfig;

pub fn detect_hubs(graph: &TransactionGraph, config: &MiningConfig, now: DateTime<Utc>) -> Vec<PatternCard> {
    let n = graph.node_count();
    if n < config.hub_min_nodes.max(2) {
        return Vec::new();
    }

    let degrees: Vec<f64> = (0..n).map(|node| graph.weighted_degree(node)).collect();
    let mean = degrees.iter().sum::<f64>() / n as f64;
    let variance = degrees.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();
    if std_dev <= f64::EPSILON {
        return Vec::new();
    }

    let threshold = mean + config.hub_std_multiplier * std_dev;
    let mut cards = Vec::new();

    for (node, &degree) in degrees.iter().enumerate() {
        if degree <= threshold {
            continue;
        }

        let counterparties: BTreeSet<&str> = graph
            .successors(node)
            .iter()
            .chain(graph.predecessors(node))
            .map(|&other| graph.id(other))
            .collect();
        if counterparties.len() < config.hub_min_counterparties {
            continue;
        }

        let z = (degree - mean) / std_dev;
        let excess = (z - config.hub_std_multiplier).max(0.0);
        let confidence = 0.5 + 0.5 * (1.0 - (-excess).exp());

        let tx_count = graph
            .successors(node)
            .iter()
            .filter_map(|&w| graph.edge(node, w))
            .chain(graph.predecessors(node).iter().filter_map(|&w| graph.edge(w, node)))
            .map(|e| e.count)
            .sum();

        let stats = PatternStats {
            flow_weight: degree,
            tx_count,
            edge_count: graph.successors(node).len() + graph.predecessors(node).len(),
            degree_zscore: Some(z),
            ..PatternStats::default()
        };

        cards.push(PatternCard::new(
            PatternType::Hub,
            BTreeSet::from([graph.id(node).to_string()]),
            counterparties.into_iter().map(str::to_string).collect(),
            confidence,
            stats,
            now,
        ));
    }

    cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::transaction::Transaction;

    fn star(leaves: usize, amount: f64) -> Vec<Transaction> {
        let now = Utc::now();
        (0..leaves)
            .map(|i| Transaction::new(format!("s{i}"), format!("leaf_{i}"), "mule", amount, now))
            .collect()
    }

    #[test]
    fn test_star_center_is_hub() {
        let g = TransactionGraph::from_transactions(&star(20, 100.0));
        let cards = detect_hubs(&g, &MiningConfig::default(), Utc::now());
        assert_eq!(cards.len(), 1);
        assert!(cards[0].has_member("mule"));
        assert_eq!(cards[0].members.len(), 1);
        assert_eq!(cards[0].context.len(), 20);
        assert!(cards[0].stats.degree_zscore.unwrap() > 2.0);
    }

    #[test]
    fn test_uniform_graph_has_no_hub() {
        let now = Utc::now();
        let txs: Vec<_> = (0..10)
            .map(|i| Transaction::new(format!("u{i}"), format!("a{i}"), format!("b{i}"), 50.0, now))
            .collect();
        let g = TransactionGraph::from_transactions(&txs);
        assert!(detect_hubs(&g, &MiningConfig::default(), now).is_empty());
    }

    #[test]
    fn test_threshold_scales_with_distribution() {
        // Same star with 1000x amounts: still exactly one hub, no constant cutoff
        let g = TransactionGraph::from_transactions(&star(20, 100_000.0));
        assert_eq!(detect_hubs(&g, &MiningConfig::default(), Utc::now()).len(), 1);
    }

    #[test]
    fn test_small_graph_skipped() {
        let g = TransactionGraph::from_transactions(&star(2, 100.0));
        assert!(detect_hubs(&g, &MiningConfig::default(), Utc::now()).is_empty());
    }
}
