//! Evaluation metrics (precision / recall / F1 / ROC AUC).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
    pub positives: usize,
    pub negatives: usize,
    /// Number of CV folds behind these numbers (0 = single evaluation)
    #[serde(default)]
    pub folds: usize,
    /// AUC on the held-out split used for champion/challenger comparison
    #[serde(default)]
    pub holdout_auc: Option<f64>,
}

impl EvaluationMetrics {
    pub fn compute(scores: &[f64], labels: &[bool], threshold: f64) -> Self {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;

        for (&score, &label) in scores.iter().zip(labels) {
            match (score >= threshold, label) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }

        let precision = safe_div(tp as f64, (tp + fp) as f64);
        let recall = safe_div(tp as f64, (tp + fn_) as f64);
        let f1 = safe_div(2.0 * precision * recall, precision + recall);
        let positives = labels.iter().filter(|&&l| l).count();

        Self {
            precision,
            recall,
            f1,
            auc: roc_auc(scores, labels),
            positives,
            negatives: labels.len() - positives,
            folds: 0,
            holdout_auc: None,
        }
    }
}

/// Rank-based (Mann-Whitney) AUC with average ranks for ties.
/// Returns 0.5 when a class is missing.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> f64 {
    let n = scores.len().min(labels.len());
    let positives = labels[..n].iter().filter(|&&l| l).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    (rank_sum_pos - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_separation() {
        let scores = [0.1, 0.2, 0.8, 0.9];
        let labels = [false, false, true, true];
        let m = EvaluationMetrics::compute(&scores, &labels, 0.5);
        assert_eq!(m.auc, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!((m.positives, m.negatives), (2, 2));
    }

    #[test]
    fn test_inverted_and_tied() {
        assert_eq!(roc_auc(&[0.9, 0.1], &[false, true]), 0.0);
        assert_eq!(roc_auc(&[0.5, 0.5, 0.5, 0.5], &[true, false, true, false]), 0.5);
        assert_eq!(roc_auc(&[0.3, 0.7], &[true, true]), 0.5);
    }

    #[test]
    fn test_partial_ranking() {
        // positives at 0.4, 0.8; negatives at 0.1, 0.6 → 3 of 4 pairs ordered
        let auc = roc_auc(&[0.1, 0.4, 0.6, 0.8], &[false, true, false, true]);
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_no_predicted_positives() {
        let m = EvaluationMetrics::compute(&[0.1, 0.2], &[true, false], 0.5);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }
}
