//! Pattern card types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Ring,
    Hub,
    VelocityCluster,
    DenseSubgraph,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Ring => "ring",
            PatternType::Hub => "hub",
            PatternType::VelocityCluster => "velocity_cluster",
            PatternType::DenseSubgraph => "dense_subgraph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Superseded,
}

/// Supporting numbers behind a card; fields not meaningful for a type stay None
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub flow_weight: f64,
    pub tx_count: usize,
    pub edge_count: usize,
    pub cycle_length: Option<usize>,
    pub density: Option<f64>,
    pub degree_zscore: Option<f64>,
    pub window_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCard {
    pub id: String,
    pub pattern_type: PatternType,
    /// Exact entity ids
    pub members: BTreeSet<String>,
    /// Ordered supporting ids (representative cycle, hub counterparties...)
    pub context: Vec<String>,
    pub confidence: f64,
    pub stats: PatternStats,
    /// Hash of type + sorted members
    pub signature: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: CardStatus,
    #[serde(default)]
    pub superseded_by: Vec<String>,
    #[serde(default)]
    pub superseded_at: Option<DateTime<Utc>>,
}

impl PatternCard {
    pub fn new(
        pattern_type: PatternType,
        members: BTreeSet<String>,
        context: Vec<String>,
        confidence: f64,
        stats: PatternStats,
        now: DateTime<Utc>,
    ) -> Self {
        let signature = structural_signature(pattern_type, &members);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pattern_type,
            members,
            context,
            confidence: confidence.clamp(0.0, 1.0),
            stats,
            signature,
            first_seen: now,
            last_seen: now,
            status: CardStatus::Active,
            superseded_by: Vec::new(),
            superseded_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }

    pub fn has_member(&self, entity: &str) -> bool {
        self.members.contains(entity)
    }
}

/// Stable identity of a structure across mining runs
pub fn structural_signature(pattern_type: PatternType, members: &BTreeSet<String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pattern_type.as_str().as_bytes());
    for member in members {
        hasher.update([0u8]);
        hasher.update(member.as_bytes());
    }
    hex::encode(&hasher.finalize()[..16])
}
