//! Dense subgraphs on the directed graph.
//!
//! Candidates are SCCs of size >= 2: mutual reachability means money moves
//! both ways among the members. Directed density is `E / (n * (n - 1))`.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use super::graph::TransactionGraph;
use super::rings::internal_edges;
use super::types::{PatternCard, PatternStats, PatternType};
use crate::logic::config::MiningConfig;

pub fn detect_dense_subgraphs(
    graph: &TransactionGraph,
    components: &[Vec<usize>],
    config: &MiningConfig,
    now: DateTime<Utc>,
) -> Vec<PatternCard> {
    let mut ranked: Vec<(f64, PatternCard)> = Vec::new();

    for component in components.iter().filter(|c| c.len() >= 2) {
        let members: HashSet<usize> = component.iter().copied().collect();
        let n = members.len() as f64;
        let (edge_count, tx_count) = internal_edges(graph, &members);
        let density = edge_count as f64 / (n * (n - 1.0));

        let flow: f64 = members
            .iter()
            .flat_map(|&u| graph.successors(u).iter().map(move |&w| (u, w)))
            .filter(|(_, w)| members.contains(w))
            .filter_map(|(u, w)| graph.edge(u, w))
            .map(|e| e.weight)
            .sum();

        if density < config.dense_min_density || flow < config.dense_min_flow {
            continue;
        }

        let flow_factor = 1.0 - (-flow / config.flow_scale).exp();
        let rank = density * (0.5 + 0.5 * flow_factor);

        let stats = PatternStats {
            flow_weight: flow,
            tx_count,
            edge_count,
            density: Some(density),
            ..PatternStats::default()
        };

        let mut context: Vec<String> = component.iter().map(|&m| graph.id(m).to_string()).collect();
        context.sort();

        let card = PatternCard::new(
            PatternType::DenseSubgraph,
            context.iter().cloned().collect::<BTreeSet<_>>(),
            context,
            0.6 * density + 0.4 * flow_factor,
            stats,
            now,
        );
        ranked.push((rank, card));
    }

    ranked.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.signature.cmp(&b.1.signature))
    });
    ranked.truncate(config.dense_max_cards);
    ranked.into_iter().map(|(_, card)| card).collect()
}
