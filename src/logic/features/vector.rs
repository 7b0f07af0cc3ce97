//! Feature Vector - versioned model input
//!
//! Values are stored in `FEATURE_LAYOUT` order and stamped with the layout
//! version + hash so a vector from another layout is refused by the scorer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::layout::{layout_hash, validate_layout, Feature, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
use crate::logic::error::FraudResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout
    pub layout_hash: u32,
    /// Feature values in FEATURE_LAYOUT order
    #[serde(with = "values_serde")]
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Zeroed vector stamped with the current layout
    pub fn new() -> Self {
        Self::from_values([0.0; FEATURE_COUNT])
    }

    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.values[feature.index()] = value;
    }

    pub fn get_by_name(&self, name: &str) -> Option<f64> {
        super::layout::feature_index(name).map(|i| self.values[i])
    }

    pub fn validate(&self) -> FraudResult<()> {
        validate_layout(self.version, self.layout_hash)
    }

    pub fn is_compatible(&self) -> bool {
        self.validate().is_ok()
    }

    /// Name → value view for explanations and logs
    pub fn named_values(&self) -> BTreeMap<&'static str, f64> {
        FEATURE_LAYOUT.iter().copied().zip(self.values.iter().copied()).collect()
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

/// Serde for the fixed-size value array (serialized as a plain JSON array)
mod values_serde {
    use super::FEATURE_COUNT;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64; FEATURE_COUNT], serializer: S) -> Result<S::Ok, S::Error> {
        values.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[f64; FEATURE_COUNT], D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        let len = values.len();
        values
            .try_into()
            .map_err(|_| D::Error::invalid_length(len, &"one value per layout feature"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vector_is_compatible() {
        let v = FeatureVector::new();
        assert!(v.is_compatible());
        assert_eq!(v.as_slice().len(), FEATURE_COUNT);
    }

    #[test]
    fn test_get_set_by_feature() {
        let mut v = FeatureVector::new();
        v.set(Feature::InRing, 1.0);
        assert_eq!(v.get(Feature::InRing), 1.0);
        assert_eq!(v.get_by_name("in_ring"), Some(1.0));
        assert_eq!(v.get_by_name("nope"), None);
        assert_eq!(v.named_values()["in_ring"], 1.0);
    }

    #[test]
    fn test_json_shape() {
        let mut v = FeatureVector::new();
        v.set(Feature::AmountLog, 2.5);
        let json = serde_json::to_string(&v).unwrap();
        let back: FeatureVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let json = format!(
            r#"{{"version":{},"layout_hash":{},"values":[1.0,2.0]}}"#,
            FEATURE_VERSION,
            layout_hash()
        );
        assert!(serde_json::from_str::<FeatureVector>(&json).is_err());
    }

    #[test]
    fn test_stale_layout_detected() {
        let mut v = FeatureVector::new();
        v.layout_hash ^= 0xdead_beef;
        assert!(!v.is_compatible());
    }
}
