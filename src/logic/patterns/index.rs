//! Entity → pattern card index consumed by the scoring path.
//!
//! Keys are exact entity ids, never substrings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{PatternCard, PatternType};
use crate::logic::transaction::Transaction;

/// Pattern-derived feature inputs for one entity (or one transaction)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternFlags {
    pub in_ring: bool,
    pub ring_confidence: f64,
    pub is_hub: bool,
    pub in_velocity_cluster: bool,
    pub velocity_confidence: f64,
    pub in_dense_subgraph: bool,
    pub dense_confidence: f64,
}

impl PatternFlags {
    pub fn merge(self, other: PatternFlags) -> PatternFlags {
        PatternFlags {
            in_ring: self.in_ring || other.in_ring,
            ring_confidence: self.ring_confidence.max(other.ring_confidence),
            is_hub: self.is_hub || other.is_hub,
            in_velocity_cluster: self.in_velocity_cluster || other.in_velocity_cluster,
            velocity_confidence: self.velocity_confidence.max(other.velocity_confidence),
            in_dense_subgraph: self.in_dense_subgraph || other.in_dense_subgraph,
            dense_confidence: self.dense_confidence.max(other.dense_confidence),
        }
    }

    fn absorb(&mut self, card: &PatternCard) {
        match card.pattern_type {
            PatternType::Ring => {
                self.in_ring = true;
                self.ring_confidence = self.ring_confidence.max(card.confidence);
            }
            PatternType::Hub => self.is_hub = true,
            PatternType::VelocityCluster => {
                self.in_velocity_cluster = true;
                self.velocity_confidence = self.velocity_confidence.max(card.confidence);
            }
            PatternType::DenseSubgraph => {
                self.in_dense_subgraph = true;
                self.dense_confidence = self.dense_confidence.max(card.confidence);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatternIndex {
    cards: HashMap<String, PatternCard>,
    by_entity: HashMap<String, Vec<String>>,
    flags: HashMap<String, PatternFlags>,
    built_at: Option<DateTime<Utc>>,
}

impl PatternIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index active cards only
    pub fn build(cards: impl IntoIterator<Item = PatternCard>, built_at: DateTime<Utc>) -> Self {
        let mut index = Self {
            built_at: Some(built_at),
            ..Self::default()
        };

        for card in cards.into_iter().filter(PatternCard::is_active) {
            for member in &card.members {
                index
                    .by_entity
                    .entry(member.clone())
                    .or_default()
                    .push(card.id.clone());
                index.flags.entry(member.clone()).or_default().absorb(&card);
            }
            index.cards.insert(card.id.clone(), card);
        }

        index
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    pub fn card(&self, card_id: &str) -> Option<&PatternCard> {
        self.cards.get(card_id)
    }

    pub fn cards(&self) -> impl Iterator<Item = &PatternCard> {
        self.cards.values()
    }

    /// Exact membership of `entity` in card `card_id`
    pub fn contains(&self, entity: &str, card_id: &str) -> bool {
        self.by_entity
            .get(entity)
            .map_or(false, |ids| ids.iter().any(|id| id == card_id))
    }

    pub fn cards_for(&self, entity: &str) -> Vec<&PatternCard> {
        self.by_entity
            .get(entity)
            .map(|ids| ids.iter().filter_map(|id| self.cards.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn is_member_of(&self, entity: &str, pattern_type: PatternType) -> bool {
        self.cards_for(entity).iter().any(|c| c.pattern_type == pattern_type)
    }

    pub fn flags_for(&self, entity: &str) -> PatternFlags {
        self.flags.get(entity).copied().unwrap_or_default()
    }

    /// Sender flags merged with receiver flags
    pub fn flags_for_transaction(&self, tx: &Transaction) -> PatternFlags {
        self.flags_for(&tx.sender_id).merge(self.flags_for(&tx.receiver_id))
    }
}
