//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the feature schema shared by serving and training.**
//!
//! ## Rules:
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! Every model artifact stores the layout version + hash it was trained on and
//! is refused at load when they differ from the running layout.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::logic::error::FraudError;

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Amount (0-3) ===
    "amount_log",            // 0: ln(amount + 1)
    "amount_scaled",         // 1: amount / AMOUNT_SCALE, capped
    "amount_to_sender_avg",  // 2: amount vs sender 24h average, capped
    "is_round_amount",       // 3: multiple of 100

    // === Time (4-8) ===
    "hour_sin",              // 4
    "hour_cos",              // 5
    "dow_sin",               // 6
    "dow_cos",               // 7
    "is_night",              // 8: 00:00-05:59 UTC

    // === Sender velocity (9-13) ===
    "sender_count_1h",       // 9
    "sender_count_24h",      // 10
    "sender_sum_1h",         // 11
    "sender_sum_24h",        // 12
    "sender_fanout_24h",     // 13: distinct receivers

    // === Receiver velocity (14-17) ===
    "receiver_count_1h",     // 14
    "receiver_count_24h",    // 15
    "receiver_sum_24h",      // 16
    "receiver_fanin_24h",    // 17: distinct senders

    // === Reuse (18-21) ===
    "device_reuse_24h",      // 18: other senders on this device
    "ip_reuse_24h",          // 19: other senders on this ip
    "missing_device",        // 20
    "missing_ip",            // 21

    // === Novelty (22) ===
    "new_counterparty",      // 22: first sender → receiver transfer

    // === Risk lookups (23-26) ===
    "country_risk",          // 23
    "bin_risk",              // 24
    "type_risk",             // 25
    "channel_risk",          // 26

    // === Pattern-derived (27-33) ===
    "in_ring",               // 27
    "ring_confidence",       // 28
    "is_hub",                // 29
    "in_velocity_cluster",   // 30
    "velocity_confidence",   // 31
    "in_dense_subgraph",     // 32
    "dense_confidence",      // 33
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 34;

/// Typed index into the layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    AmountLog = 0,
    AmountScaled,
    AmountToSenderAvg,
    IsRoundAmount,
    HourSin,
    HourCos,
    DowSin,
    DowCos,
    IsNight,
    SenderCount1h,
    SenderCount24h,
    SenderSum1h,
    SenderSum24h,
    SenderFanout24h,
    ReceiverCount1h,
    ReceiverCount24h,
    ReceiverSum24h,
    ReceiverFanin24h,
    DeviceReuse24h,
    IpReuse24h,
    MissingDevice,
    MissingIp,
    NewCounterparty,
    CountryRisk,
    BinRisk,
    TypeRisk,
    ChannelRisk,
    InRing,
    RingConfidence,
    IsHub,
    InVelocityCluster,
    VelocityConfidence,
    InDenseSubgraph,
    DenseConfidence,
}

impl Feature {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        FEATURE_LAYOUT[self.index()]
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 of version + ordered feature names
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[FEATURE_VERSION]);

    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }

    hasher.finalize()
}

pub fn layout_hash() -> u32 {
    compute_layout_hash()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Layout metadata stored alongside every model artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), FraudError> {
        validate_layout(self.version, self.hash)?;
        if self.feature_count != FEATURE_COUNT {
            return Err(FraudError::SchemaMismatch(format!(
                "expected {} features, artifact declares {}",
                FEATURE_COUNT, self.feature_count
            )));
        }
        Ok(())
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Validate that incoming data matches the current layout
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> Result<(), FraudError> {
    let current_hash = layout_hash();

    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(FraudError::SchemaMismatch(format!(
            "feature layout mismatch: expected v{} (hash: {:08x}), got v{} (hash: {:08x})",
            FEATURE_VERSION, current_hash, incoming_version, incoming_hash
        )));
    }

    Ok(())
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Get feature index by name
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

/// Get feature name by index
pub fn feature_name(index: usize) -> Option<&'static str> {
    FEATURE_LAYOUT.get(index).copied()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_count() {
        assert_eq!(FEATURE_COUNT, 34);
        assert_eq!(FEATURE_LAYOUT.len(), FEATURE_COUNT);
        assert_eq!(Feature::DenseConfidence.index(), FEATURE_COUNT - 1);
    }

    #[test]
    fn test_enum_matches_layout() {
        assert_eq!(Feature::AmountLog.name(), "amount_log");
        assert_eq!(Feature::NewCounterparty.name(), "new_counterparty");
        assert_eq!(Feature::InRing.name(), "in_ring");
        assert_eq!(Feature::ChannelRisk.name(), "channel_risk");
        assert_eq!(feature_index("is_hub"), Some(Feature::IsHub.index()));
    }

    #[test]
    fn test_layout_hash_stable() {
        assert_eq!(compute_layout_hash(), compute_layout_hash());
        assert_ne!(layout_hash(), 0);
    }

    #[test]
    fn test_validate_layout_mismatch() {
        assert!(validate_layout(FEATURE_VERSION, layout_hash()).is_ok());
        assert!(matches!(
            validate_layout(FEATURE_VERSION + 1, layout_hash()),
            Err(FraudError::SchemaMismatch(_))
        ));
        assert!(validate_layout(FEATURE_VERSION, layout_hash().wrapping_add(1)).is_err());
    }

    #[test]
    fn test_layout_info() {
        let info = LayoutInfo::current();
        assert!(info.validate().is_ok());
        assert_eq!(info.feature_names.len(), FEATURE_COUNT);
        assert_eq!(feature_name(100), None);
    }
}
