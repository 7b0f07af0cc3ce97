//! Decision Thresholds
//!
//! Maps a fraud probability to approve / review / block.

use serde::{Deserialize, Serialize};

use crate::logic::config::ScoringConfig;
use crate::logic::error::{FraudError, FraudResult};
use crate::logic::transaction::Decision;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    /// score >= review → Review
    pub review: f64,
    /// score >= block → Block
    pub block: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self { review: 0.5, block: 0.8 }
    }
}

impl DecisionThresholds {
    pub fn new(review: f64, block: f64) -> FraudResult<Self> {
        if !(0.0..=1.0).contains(&review) || !(0.0..=1.0).contains(&block) || review > block {
            return Err(FraudError::InvalidInput(format!(
                "thresholds must satisfy 0 <= review ({review}) <= block ({block}) <= 1"
            )));
        }
        Ok(Self { review, block })
    }

    pub fn from_config(config: &ScoringConfig) -> FraudResult<Self> {
        Self::new(config.review_threshold, config.block_threshold)
    }

    /// Review more, block at the usual level
    pub fn high_sensitivity() -> Self {
        Self { review: 0.3, block: 0.8 }
    }

    /// Fewer manual reviews
    pub fn low_sensitivity() -> Self {
        Self { review: 0.7, block: 0.9 }
    }

    pub fn decide(&self, score: f64) -> Decision {
        if score >= self.block {
            Decision::Block
        } else if score >= self.review {
            Decision::Review
        } else {
            Decision::Approve
        }
    }
}
