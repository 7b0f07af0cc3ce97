//! Card lifecycle across mining runs.
//!
//! A structure re-observed with the same signature keeps its card id and
//! `first_seen`; an active card that is not re-observed is superseded and moved
//! to bounded history, linked to the new cards of the same type that share
//! members with it.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::index::PatternIndex;
use super::types::{CardStatus, PatternCard};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub new_cards: usize,
    pub refreshed: usize,
    pub superseded: usize,
}

#[derive(Debug)]
pub struct PatternRegistry {
    /// signature → active card
    active: HashMap<String, PatternCard>,
    history: VecDeque<PatternCard>,
    history_limit: usize,
}

impl PatternRegistry {
    pub fn new(history_limit: usize) -> Self {
        Self {
            active: HashMap::new(),
            history: VecDeque::new(),
            history_limit,
        }
    }

    pub fn merge(&mut self, fresh: Vec<PatternCard>, now: DateTime<Utc>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let mut next: HashMap<String, PatternCard> = HashMap::with_capacity(fresh.len());

        for mut card in fresh {
            if next.contains_key(&card.signature) {
                continue;
            }
            match self.active.remove(&card.signature) {
                Some(existing) => {
                    card.id = existing.id;
                    card.first_seen = existing.first_seen;
                    summary.refreshed += 1;
                }
                None => summary.new_cards += 1,
            }
            card.last_seen = now;
            next.insert(card.signature.clone(), card);
        }

        let stale: Vec<PatternCard> = self.active.drain().map(|(_, card)| card).collect();
        for mut old in stale {
            let mut successors: Vec<String> = next
                .values()
                .filter(|c| c.pattern_type == old.pattern_type && !c.members.is_disjoint(&old.members))
                .map(|c| c.id.clone())
                .collect();
            successors.sort();

            old.status = CardStatus::Superseded;
            old.superseded_by = successors;
            old.superseded_at = Some(now);
            self.history.push_back(old);
            summary.superseded += 1;
        }

        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }

        self.active = next;
        summary
    }

    /// Active cards, highest confidence first
    pub fn active_cards(&self) -> Vec<PatternCard> {
        let mut cards: Vec<PatternCard> = self.active.values().cloned().collect();
        cards.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then_with(|| a.id.cmp(&b.id)));
        cards
    }

    pub fn history(&self) -> Vec<PatternCard> {
        self.history.iter().cloned().collect()
    }

    pub fn index(&self, now: DateTime<Utc>) -> PatternIndex {
        PatternIndex::build(self.active.values().cloned(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::patterns::types::{PatternStats, PatternType};
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn ring(members: &[&str], at: DateTime<Utc>) -> PatternCard {
        PatternCard::new(
            PatternType::Ring,
            members.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            vec![],
            0.8,
            PatternStats::default(),
            at,
        )
    }

    #[test]
    fn test_same_structure_keeps_identity() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);
        let mut registry = PatternRegistry::new(10);

        let first = ring(&["a", "b", "c"], t0);
        let first_id = first.id.clone();
        assert_eq!(registry.merge(vec![first], t0).new_cards, 1);

        let summary = registry.merge(vec![ring(&["c", "b", "a"], t1)], t1);
        assert_eq!(summary, MergeSummary { new_cards: 0, refreshed: 1, superseded: 0 });

        let active = registry.active_cards();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, first_id);
        assert_eq!(active[0].first_seen, t0);
        assert_eq!(active[0].last_seen, t1);
    }

    #[test]
    fn test_changed_structure_supersedes() {
        let t0 = Utc::now();
        let mut registry = PatternRegistry::new(10);
        registry.merge(vec![ring(&["a", "b", "c"], t0)], t0);

        let grown = ring(&["a", "b", "c", "d"], t0);
        let grown_id = grown.id.clone();
        let summary = registry.merge(vec![grown, ring(&["x", "y", "z"], t0)], t0);
        assert_eq!(summary.superseded, 1);
        assert_eq!(summary.new_cards, 2);

        let history = registry.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, CardStatus::Superseded);
        assert_eq!(history[0].superseded_by, vec![grown_id]);

        let index = registry.index(t0);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_duplicate_signatures_in_one_run() {
        let t0 = Utc::now();
        let mut registry = PatternRegistry::new(10);
        let summary = registry.merge(vec![ring(&["a", "b", "c"], t0), ring(&["a", "b", "c"], t0)], t0);
        assert_eq!(summary.new_cards, 1);
        assert_eq!(registry.active_cards().len(), 1);
    }

    #[test]
    fn test_history_bounded() {
        let t0 = Utc::now();
        let mut registry = PatternRegistry::new(2);
        for i in 0..5 {
            let id = format!("m{i}");
            registry.merge(vec![ring(&[id.as_str(), "p", "q"], t0)], t0);
        }
        assert_eq!(registry.history().len(), 2);
    }
}
