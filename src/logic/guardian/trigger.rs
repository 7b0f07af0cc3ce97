//! Retrain trigger policy.
//!
//! Retrain when enough new labels arrived, or when scores drifted AND there
//! is at least one new label to learn from. Drift alone never retrains.

use serde::{Deserialize, Serialize};

use crate::logic::config::GuardianConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggerDecision {
    Retrain { reason: String },
    Hold { reason: String },
}

impl TriggerDecision {
    pub fn should_retrain(&self) -> bool {
        matches!(self, TriggerDecision::Retrain { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            TriggerDecision::Retrain { reason } | TriggerDecision::Hold { reason } => reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerPolicy {
    pub label_threshold: u64,
    pub drift_bound: f64,
}

impl TriggerPolicy {
    pub fn from_config(config: &GuardianConfig) -> Self {
        Self {
            label_threshold: config.label_threshold,
            drift_bound: config.drift_bound,
        }
    }

    pub fn evaluate(&self, new_labels: u64, drift: Option<f64>) -> TriggerDecision {
        if new_labels >= self.label_threshold {
            return TriggerDecision::Retrain {
                reason: format!("{} new labels (threshold {})", new_labels, self.label_threshold),
            };
        }

        match drift {
            Some(psi) if psi > self.drift_bound && new_labels > 0 => TriggerDecision::Retrain {
                reason: format!(
                    "score drift psi {:.3} > {:.3} with {} new labels",
                    psi, self.drift_bound, new_labels
                ),
            },
            Some(psi) if psi > self.drift_bound => TriggerDecision::Hold {
                reason: format!("score drift psi {:.3} but no new labels", psi),
            },
            _ => TriggerDecision::Hold {
                reason: format!("{} new labels (threshold {}), no significant drift", new_labels, self.label_threshold),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TriggerPolicy {
        TriggerPolicy {
            label_threshold: 100,
            drift_bound: 0.2,
        }
    }

    #[test]
    fn test_label_threshold_inclusive() {
        assert!(policy().evaluate(100, None).should_retrain());
        assert!(!policy().evaluate(99, None).should_retrain());
    }

    #[test]
    fn test_drift_needs_labels() {
        assert!(!policy().evaluate(0, Some(0.9)).should_retrain());
        assert!(policy().evaluate(1, Some(0.9)).should_retrain());
        assert!(!policy().evaluate(50, Some(0.2)).should_retrain());
    }

    #[test]
    fn test_hold_reason_mentions_drift() {
        let decision = policy().evaluate(0, Some(0.5));
        assert!(decision.reason().contains("no new labels"));
    }
}
