//! Static risk lookups (country, card BIN, transaction type, channel).

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::logic::transaction::{Channel, TransactionType};

/// Country without metadata
const MISSING_COUNTRY_RISK: f64 = 0.2;
/// Country not in the table
const UNKNOWN_COUNTRY_RISK: f64 = 0.3;
const MISSING_BIN_RISK: f64 = 0.1;
const UNKNOWN_BIN_RISK: f64 = 0.25;

static COUNTRY_RISK: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("US", 0.1),
        ("CA", 0.1),
        ("GB", 0.1),
        ("DE", 0.1),
        ("FR", 0.1),
        ("JP", 0.1),
        ("AU", 0.1),
        ("SG", 0.15),
        ("BR", 0.4),
        ("MX", 0.4),
        ("IN", 0.35),
        ("NG", 0.7),
        ("RU", 0.7),
        ("VN", 0.45),
        ("KP", 1.0),
        ("IR", 1.0),
    ])
});

/// Risk by BIN prefix (longest prefix wins)
static BIN_RISK: Lazy<Vec<(&'static str, f64)>> = Lazy::new(|| {
    let mut table = vec![
        ("4", 0.15),      // visa
        ("51", 0.15),     // mastercard
        ("55", 0.15),
        ("34", 0.1),      // amex
        ("37", 0.1),
        ("6011", 0.2),    // discover
        ("4485", 0.6),    // prepaid ranges
        ("5358", 0.6),
        ("4147", 0.5),    // virtual cards
    ];
    table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    table
});

pub fn country_risk(country: Option<&str>) -> f64 {
    match country {
        None => MISSING_COUNTRY_RISK,
        Some(code) => COUNTRY_RISK
            .get(code.to_ascii_uppercase().as_str())
            .copied()
            .unwrap_or(UNKNOWN_COUNTRY_RISK),
    }
}

pub fn bin_risk(card_bin: Option<&str>) -> f64 {
    match card_bin {
        None => MISSING_BIN_RISK,
        Some(bin) => BIN_RISK
            .iter()
            .find(|(prefix, _)| bin.starts_with(prefix))
            .map(|(_, risk)| *risk)
            .unwrap_or(UNKNOWN_BIN_RISK),
    }
}

pub fn type_risk(tx_type: TransactionType) -> f64 {
    match tx_type {
        TransactionType::Deposit => 0.05,
        TransactionType::Purchase => 0.2,
        TransactionType::Payment => 0.25,
        TransactionType::Transfer => 0.5,
        TransactionType::Withdrawal => 0.6,
    }
}

pub fn channel_risk(channel: Channel) -> f64 {
    match channel {
        Channel::Pos => 0.1,
        Channel::Atm => 0.3,
        Channel::Mobile => 0.3,
        Channel::Web => 0.4,
        Channel::Api => 0.6,
    }
}
