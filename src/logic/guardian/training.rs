//! Challenger Training
//!
//! Stratified holdout → stratified k-fold CV → final fit on the non-holdout
//! part. Class imbalance handled with inverse-frequency sample weights.
//! The holdout set travels with the trained model so champion and challenger
//! are compared on identical, unseen data.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::logic::config::TrainingConfig;
use crate::logic::error::{FraudError, FraudResult};
use crate::logic::features::{FeatureVector, FEATURE_COUNT};
use crate::logic::model::{sigmoid, EvaluationMetrics, LogisticModel, ModelVersion};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub transaction_id: String,
    pub features: FeatureVector,
    pub is_fraud: bool,
}

impl LabeledExample {
    pub fn new(transaction_id: impl Into<String>, features: FeatureVector, is_fraud: bool) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            features,
            is_fraud,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub classifier: LogisticModel,
    /// Pooled out-of-fold metrics
    pub cv_metrics: EvaluationMetrics,
    /// Samples used for the final fit
    pub samples: usize,
    /// Held-out examples never seen by the classifier
    pub holdout: Vec<LabeledExample>,
}

#[derive(Debug, Clone)]
pub enum TrainOutcome {
    Trained(TrainedModel),
    /// Not enough data; nothing should be written
    Skipped { reason: String },
    Failed { reason: String },
}

impl TrainOutcome {
    pub fn trained(&self) -> bool {
        matches!(self, TrainOutcome::Trained(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            TrainOutcome::Trained(_) => None,
            TrainOutcome::Skipped { reason } | TrainOutcome::Failed { reason } => Some(reason),
        }
    }
}

/// Training / evaluation seam used by the guardian
pub trait ModelTrainer: Send + Sync {
    fn train(&self, examples: &[LabeledExample]) -> TrainOutcome;

    fn evaluate(&self, model: &ModelVersion, examples: &[LabeledExample]) -> FraudResult<EvaluationMetrics>;
}

// ============================================================================
// LOGISTIC TRAINER
// ============================================================================

pub struct LogisticTrainer {
    config: TrainingConfig,
}

impl LogisticTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn try_train(&self, examples: &[LabeledExample]) -> FraudResult<TrainedModel> {
        let positives = examples.iter().filter(|e| e.is_fraud).count();
        let negatives = examples.len() - positives;
        let min = self.config.min_class_samples;
        if positives < min || negatives < min {
            return Err(FraudError::InsufficientData(format!(
                "need at least {min} samples per class, have {positives} fraud / {negatives} legitimate"
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let (holdout_idx, train_idx) = stratified_holdout(examples, self.config.holdout_fraction, &mut rng);

        let train: Vec<&LabeledExample> = train_idx.iter().map(|&i| &examples[i]).collect();
        let holdout: Vec<LabeledExample> = holdout_idx.iter().map(|&i| examples[i].clone()).collect();

        let cv_metrics = self.cross_validate(&train, &mut rng)?;
        let (x, y) = design_matrix(&train);
        let classifier = fit(&x, &y, &self.config)?;

        Ok(TrainedModel {
            classifier,
            cv_metrics,
            samples: train.len(),
            holdout,
        })
    }

    /// Stratified k-fold; scores pooled across folds
    fn cross_validate(&self, train: &[&LabeledExample], rng: &mut StdRng) -> FraudResult<EvaluationMetrics> {
        let pos: Vec<usize> = (0..train.len()).filter(|&i| train[i].is_fraud).collect();
        let neg: Vec<usize> = (0..train.len()).filter(|&i| !train[i].is_fraud).collect();
        let k = self.config.folds.min(pos.len()).min(neg.len()).max(2);

        let mut fold_of = vec![0usize; train.len()];
        for mut class in [pos, neg] {
            class.shuffle(rng);
            for (n, idx) in class.into_iter().enumerate() {
                fold_of[idx] = n % k;
            }
        }

        let mut scores = Vec::with_capacity(train.len());
        let mut labels = Vec::with_capacity(train.len());

        for fold in 0..k {
            let fit_set: Vec<&LabeledExample> =
                (0..train.len()).filter(|&i| fold_of[i] != fold).map(|i| train[i]).collect();
            let (x, y) = design_matrix(&fit_set);
            let model = fit(&x, &y, &self.config)?;

            for i in (0..train.len()).filter(|&i| fold_of[i] == fold) {
                scores.push(model.predict_proba(&train[i].features));
                labels.push(train[i].is_fraud);
            }
        }

        let mut metrics = EvaluationMetrics::compute(&scores, &labels, self.config.decision_threshold);
        metrics.folds = k;
        Ok(metrics)
    }
}

impl ModelTrainer for LogisticTrainer {
    fn train(&self, examples: &[LabeledExample]) -> TrainOutcome {
        match self.try_train(examples) {
            Ok(model) => TrainOutcome::Trained(model),
            Err(e @ FraudError::InsufficientData(_)) => TrainOutcome::Skipped { reason: e.to_string() },
            Err(e) => TrainOutcome::Failed { reason: e.to_string() },
        }
    }

    fn evaluate(&self, model: &ModelVersion, examples: &[LabeledExample]) -> FraudResult<EvaluationMetrics> {
        model.validate()?;
        if examples.is_empty() {
            return Err(FraudError::InsufficientData("evaluation set is empty".into()));
        }
        let scores: Vec<f64> = examples
            .iter()
            .map(|e| model.classifier.predict_proba(&e.features))
            .collect();
        let labels: Vec<bool> = examples.iter().map(|e| e.is_fraud).collect();
        Ok(EvaluationMetrics::compute(&scores, &labels, self.config.decision_threshold))
    }
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

/// Per class: shuffle, move `fraction` (at least one) into the holdout
fn stratified_holdout(examples: &[LabeledExample], fraction: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut holdout = Vec::new();
    let mut train = Vec::new();

    for label in [true, false] {
        let mut class: Vec<usize> = (0..examples.len()).filter(|&i| examples[i].is_fraud == label).collect();
        class.shuffle(rng);
        let take = if class.len() < 2 {
            0
        } else {
            ((class.len() as f64 * fraction).round() as usize).clamp(1, class.len() - 1)
        };
        holdout.extend_from_slice(&class[..take]);
        train.extend_from_slice(&class[take..]);
    }

    holdout.sort_unstable();
    train.sort_unstable();
    (holdout, train)
}

fn design_matrix(examples: &[&LabeledExample]) -> (Array2<f64>, Array1<f64>) {
    let mut x = Array2::zeros((examples.len(), FEATURE_COUNT));
    for (i, example) in examples.iter().enumerate() {
        x.row_mut(i).assign(&ArrayView1::from(example.features.as_slice()));
    }
    let y = examples.iter().map(|e| if e.is_fraud { 1.0 } else { 0.0 }).collect();
    (x, y)
}

/// Full-batch gradient descent on the class-weighted log loss with L2
fn fit(x: &Array2<f64>, y: &Array1<f64>, config: &TrainingConfig) -> FraudResult<LogisticModel> {
    let n = x.nrows();
    if n == 0 {
        return Err(FraudError::InsufficientData("empty training set".into()));
    }

    let mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| FraudError::TrainingFailure("cannot compute feature means".into()))?;
    let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s < 1e-9 { 1.0 } else { s });
    let xs = (x - &mean) / &scale;

    let n_pos = y.sum();
    let n_neg = n as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return Err(FraudError::InsufficientData("training fold has a single class".into()));
    }
    let w_pos = n as f64 / (2.0 * n_pos);
    let w_neg = n as f64 / (2.0 * n_neg);
    let sample_weight = y.mapv(|label| if label > 0.5 { w_pos } else { w_neg });
    let weight_sum = sample_weight.sum();

    let mut w = Array1::<f64>::zeros(FEATURE_COUNT);
    let mut b = 0.0;

    for _ in 0..config.epochs {
        let z = xs.dot(&w) + b;
        let p = z.mapv(sigmoid);
        let err = (&p - y) * &sample_weight;

        let grad_w = xs.t().dot(&err) / weight_sum + &w * config.l2;
        let grad_b = err.sum() / weight_sum;

        w.scaled_add(-config.learning_rate, &grad_w);
        b -= config.learning_rate * grad_b;
    }

    if !b.is_finite() || w.iter().any(|v| !v.is_finite()) {
        return Err(FraudError::TrainingFailure("optimizer diverged (non-finite parameters)".into()));
    }

    let model = LogisticModel {
        weights: w.to_vec(),
        bias: b,
        feature_mean: mean.to_vec(),
        feature_scale: scale.to_vec(),
    };
    model.validate()?;
    Ok(model)
}
