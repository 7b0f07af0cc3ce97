//! Features Module - Feature Engine
//!
//! Fixed-schema transaction features. One computation shared by the scoring
//! path and the training path.

pub mod compute;
pub mod layout;
pub mod risk_tables;
pub mod vector;

#[cfg(test)]
mod tests;

pub use compute::{assemble_features, compute_features};
pub use layout::{Feature, LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
pub use vector::FeatureVector;
