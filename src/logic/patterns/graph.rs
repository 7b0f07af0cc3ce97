//! Directed, flow-weighted transaction graph over a mining window.

use std::collections::HashMap;

use crate::logic::transaction::Transaction;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeStats {
    pub weight: f64,
    pub count: usize,
}

/// Entities are interned to dense indices; self-transfers add no edge
#[derive(Debug, Default)]
pub struct TransactionGraph {
    ids: Vec<String>,
    lookup: HashMap<String, usize>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    edges: HashMap<(usize, usize), EdgeStats>,
    out_flow: Vec<f64>,
    in_flow: Vec<f64>,
    /// Send times per sender (epoch ms, sorted)
    sent_at: Vec<Vec<i64>>,
    tx_count: usize,
}

impl TransactionGraph {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut graph = Self::default();

        for tx in transactions {
            let s = graph.intern(&tx.sender_id);
            let r = graph.intern(&tx.receiver_id);
            graph.sent_at[s].push(tx.timestamp.timestamp_millis());
            graph.tx_count += 1;

            if s == r {
                continue;
            }

            let edge = graph.edges.entry((s, r)).or_default();
            if edge.count == 0 {
                graph.successors[s].push(r);
                graph.predecessors[r].push(s);
            }
            edge.weight += tx.amount;
            edge.count += 1;
            graph.out_flow[s] += tx.amount;
            graph.in_flow[r] += tx.amount;
        }

        for times in &mut graph.sent_at {
            times.sort_unstable();
        }

        graph
    }

    fn intern(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.lookup.get(id) {
            return idx;
        }
        let idx = self.ids.len();
        self.ids.push(id.to_string());
        self.lookup.insert(id.to_string(), idx);
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        self.out_flow.push(0.0);
        self.in_flow.push(0.0);
        self.sent_at.push(Vec::new());
        idx
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn tx_count(&self) -> usize {
        self.tx_count
    }

    pub fn id(&self, node: usize) -> &str {
        &self.ids[node]
    }

    pub fn node(&self, id: &str) -> Option<usize> {
        self.lookup.get(id).copied()
    }

    pub fn successors(&self, node: usize) -> &[usize] {
        &self.successors[node]
    }

    pub fn predecessors(&self, node: usize) -> &[usize] {
        &self.predecessors[node]
    }

    pub fn edge(&self, from: usize, to: usize) -> Option<&EdgeStats> {
        self.edges.get(&(from, to))
    }

    /// In + out flow
    pub fn weighted_degree(&self, node: usize) -> f64 {
        self.out_flow[node] + self.in_flow[node]
    }

    pub fn sent_at(&self, node: usize) -> &[i64] {
        &self.sent_at[node]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_build_graph() {
        let now = Utc::now();
        let txs = vec![
            Transaction::new("1", "a", "b", 10.0, now),
            Transaction::new("2", "a", "b", 5.0, now),
            Transaction::new("3", "b", "c", 7.0, now),
            Transaction::new("4", "c", "c", 99.0, now),
        ];
        let g = TransactionGraph::from_transactions(&txs);

        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.tx_count(), 4);

        let (a, b, c) = (g.node("a").unwrap(), g.node("b").unwrap(), g.node("c").unwrap());
        assert_eq!(g.edge(a, b), Some(&EdgeStats { weight: 15.0, count: 2 }));
        assert_eq!(g.successors(a), &[b]);
        assert_eq!(g.predecessors(c), &[b]);
        assert_eq!(g.weighted_degree(b), 22.0);
        // self transfer: timestamp kept, no edge
        assert_eq!(g.sent_at(c).len(), 1);
        assert_eq!(g.weighted_degree(c), 7.0);
    }
}
