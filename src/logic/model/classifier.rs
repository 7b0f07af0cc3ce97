//! Logistic regression over standardized features.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::logic::error::{FraudError, FraudResult};
use crate::logic::features::{Feature, FeatureVector, FEATURE_COUNT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    /// Per-feature mean subtracted before weighting
    pub feature_mean: Vec<f64>,
    /// Per-feature scale (std) divided before weighting
    pub feature_scale: Vec<f64>,
}

impl LogisticModel {
    /// Hand-set prior used before any labels exist. Raw features, no scaling.
    pub fn bootstrap() -> Self {
        let mut weights = vec![0.0; FEATURE_COUNT];
        let priors = [
            (Feature::AmountScaled, 1.0),
            (Feature::AmountToSenderAvg, 1.0),
            (Feature::IsNight, 0.5),
            (Feature::SenderCount1h, 1.0),
            (Feature::SenderFanout24h, 0.8),
            (Feature::ReceiverFanin24h, 0.8),
            (Feature::DeviceReuse24h, 1.2),
            (Feature::IpReuse24h, 0.8),
            (Feature::NewCounterparty, 0.6),
            (Feature::CountryRisk, 1.5),
            (Feature::BinRisk, 1.0),
            (Feature::TypeRisk, 0.5),
            (Feature::ChannelRisk, 0.5),
            (Feature::InRing, 2.0),
            (Feature::RingConfidence, 1.5),
            (Feature::IsHub, 1.0),
            (Feature::InVelocityCluster, 1.5),
            (Feature::VelocityConfidence, 1.0),
            (Feature::InDenseSubgraph, 1.0),
            (Feature::DenseConfidence, 1.0),
        ];
        for (feature, weight) in priors {
            weights[feature.index()] = weight;
        }

        Self {
            weights,
            bias: -4.0,
            feature_mean: vec![0.0; FEATURE_COUNT],
            feature_scale: vec![1.0; FEATURE_COUNT],
        }
    }

    pub fn predict_proba(&self, features: &FeatureVector) -> f64 {
        self.predict_row(features.as_slice())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let z = self.bias
            + row
                .iter()
                .zip(&self.weights)
                .zip(self.feature_mean.iter().zip(&self.feature_scale))
                .map(|((x, w), (m, s))| w * (x - m) / s)
                .sum::<f64>();
        sigmoid(z)
    }

    pub fn validate(&self) -> FraudResult<()> {
        if self.weights.len() != FEATURE_COUNT
            || self.feature_mean.len() != FEATURE_COUNT
            || self.feature_scale.len() != FEATURE_COUNT
        {
            return Err(FraudError::SchemaMismatch(format!(
                "classifier has {} weights, layout has {} features",
                self.weights.len(),
                FEATURE_COUNT
            )));
        }
        let finite = self.bias.is_finite()
            && self.weights.iter().chain(&self.feature_mean).all(|v| v.is_finite());
        if !finite {
            return Err(FraudError::TrainingFailure("classifier contains non-finite parameters".into()));
        }
        if self.feature_scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(FraudError::TrainingFailure("feature scale must be positive".into()));
        }
        Ok(())
    }

    /// SHA-256 over the parameters (little-endian f64 bytes)
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for section in [&self.weights, &self.feature_mean, &self.feature_scale] {
            hasher.update((section.len() as u64).to_le_bytes());
            for v in section.iter() {
                hasher.update(v.to_le_bytes());
            }
        }
        hasher.update(self.bias.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
