//! Ring detection: strongly connected components of size >= ring_min_size,
//! with one representative cycle per component.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use super::graph::TransactionGraph;
use super::types::{PatternCard, PatternStats, PatternType};
use crate::logic::config::MiningConfig;

/// Shortest ring length; a cycle of this length gets the full length factor
const BASE_RING_LENGTH: f64 = 3.0;

pub fn detect_rings(
    graph: &TransactionGraph,
    components: &[Vec<usize>],
    config: &MiningConfig,
    now: DateTime<Utc>,
) -> Vec<PatternCard> {
    let mut cards = Vec::new();

    for component in components.iter().filter(|c| c.len() >= config.ring_min_size) {
        let members: HashSet<usize> = component.iter().copied().collect();

        let Some(start) = highest_flow_node(graph, component) else {
            continue;
        };
        let Some(cycle) = shortest_cycle_through(graph, start, &members) else {
            continue;
        };

        let cycle_flow = cycle_flow(graph, &cycle);
        if cycle_flow < config.ring_min_flow {
            continue;
        }

        let (edge_count, tx_count) = internal_edges(graph, &members);
        let stats = PatternStats {
            flow_weight: cycle_flow,
            tx_count,
            edge_count,
            cycle_length: Some(cycle.len()),
            ..PatternStats::default()
        };

        cards.push(PatternCard::new(
            PatternType::Ring,
            component.iter().map(|&n| graph.id(n).to_string()).collect::<BTreeSet<_>>(),
            cycle.iter().map(|&n| graph.id(n).to_string()).collect(),
            ring_confidence(cycle.len(), cycle_flow, config.flow_scale),
            stats,
            now,
        ));
    }

    cards
}

/// Strictly decreasing in cycle length, strictly increasing in cycle flow
pub fn ring_confidence(cycle_length: usize, flow: f64, flow_scale: f64) -> f64 {
    let length_factor = (BASE_RING_LENGTH / cycle_length.max(1) as f64).min(1.0);
    let flow_factor = 1.0 - (-flow.max(0.0) / flow_scale).exp();
    (length_factor * (0.5 + 0.5 * flow_factor)).clamp(0.0, 1.0)
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

/// Ties resolved by entity id so the representative cycle is deterministic
fn highest_flow_node(graph: &TransactionGraph, component: &[usize]) -> Option<usize> {
    component.iter().copied().max_by(|&a, &b| {
        graph
            .weighted_degree(a)
            .total_cmp(&graph.weighted_degree(b))
            .then_with(|| graph.id(b).cmp(graph.id(a)))
    })
}

/// BFS inside the component; the first edge back to `start` closes the
/// shortest cycle. Returned in traversal order starting at `start`.
fn shortest_cycle_through(graph: &TransactionGraph, start: usize, members: &HashSet<usize>) -> Option<Vec<usize>> {
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    parent.insert(start, start);

    while let Some(u) = queue.pop_front() {
        for &w in graph.successors(u) {
            if w == start {
                let mut path = vec![u];
                let mut cur = u;
                while cur != start {
                    cur = parent[&cur];
                    path.push(cur);
                }
                path.reverse();
                return Some(path);
            }
            if members.contains(&w) && !parent.contains_key(&w) {
                parent.insert(w, u);
                queue.push_back(w);
            }
        }
    }

    None
}

fn cycle_flow(graph: &TransactionGraph, cycle: &[usize]) -> f64 {
    (0..cycle.len())
        .filter_map(|i| graph.edge(cycle[i], cycle[(i + 1) % cycle.len()]))
        .map(|e| e.weight)
        .sum()
}

pub(super) fn internal_edges(graph: &TransactionGraph, members: &HashSet<usize>) -> (usize, usize) {
    let mut edges = 0;
    let mut txs = 0;
    for &u in members {
        for &w in graph.successors(u) {
            if members.contains(&w) {
                if let Some(e) = graph.edge(u, w) {
                    edges += 1;
                    txs += e.count;
                }
            }
        }
    }
    (edges, txs)
}
