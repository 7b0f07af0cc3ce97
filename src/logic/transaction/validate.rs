//! Input validation, applied before any I/O or scoring.

use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::Transaction;
use crate::logic::error::{FraudError, FraudResult};

static ID_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:@\-]{1,128}$").ok());
static CURRENCY_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").ok());
static BIN_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[0-9]{6,8}$").ok());

/// An uncompiled pattern matches nothing
fn is_match(pattern: &Lazy<Option<Regex>>, value: &str) -> bool {
    Lazy::force(pattern).as_ref().map_or(false, |re| re.is_match(value))
}

/// Reject anything the feature engine cannot represent faithfully
pub fn validate_transaction(tx: &Transaction) -> FraudResult<()> {
    validate_amount(tx.amount)?;
    validate_identifier("id", &tx.id)?;
    validate_identifier("sender_id", &tx.sender_id)?;
    validate_identifier("receiver_id", &tx.receiver_id)?;

    if !is_match(&CURRENCY_PATTERN, &tx.currency) {
        return Err(FraudError::InvalidInput(format!(
            "currency '{}' is not an ISO-4217 code",
            tx.currency
        )));
    }

    if let Some(device) = &tx.device_id {
        validate_identifier("device_id", device)?;
    }

    if let Some(ip) = &tx.ip {
        if ip.parse::<IpAddr>().is_err() {
            return Err(FraudError::InvalidInput(format!("ip '{}' is not an address", ip)));
        }
    }

    if let Some(bin) = &tx.card_bin {
        if !is_match(&BIN_PATTERN, bin) {
            return Err(FraudError::InvalidInput(format!("card_bin '{}' must be 6-8 digits", bin)));
        }
    }

    Ok(())
}

pub fn validate_amount(amount: f64) -> FraudResult<()> {
    if amount.is_nan() {
        return Err(FraudError::InvalidInput("amount is NaN".into()));
    }
    if amount.is_infinite() {
        return Err(FraudError::InvalidInput("amount is infinite".into()));
    }
    if amount < 0.0 {
        return Err(FraudError::InvalidInput(format!("amount {} is negative", amount)));
    }
    Ok(())
}

fn validate_identifier(field: &str, value: &str) -> FraudResult<()> {
    if is_match(&ID_PATTERN, value) {
        Ok(())
    } else {
        Err(FraudError::InvalidInput(format!("{} '{}' is malformed", field, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tx(amount: f64) -> Transaction {
        Transaction::new("tx_1", "acct_a", "acct_b", amount, Utc::now())
    }

    #[test]
    fn test_valid_transaction() {
        let t = tx(120.5).with_ip("10.0.0.1").with_card_bin("411111").with_device("dev-9");
        assert!(validate_transaction(&t).is_ok());
        assert!(validate_transaction(&tx(0.0)).is_ok());
    }

    #[test]
    fn test_rejects_bad_amounts() {
        for amount in [-1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = validate_transaction(&tx(amount));
            assert!(matches!(result, Err(FraudError::InvalidInput(_))), "amount {amount}");
        }
    }

    #[test]
    fn test_rejects_malformed_ids() {
        let mut t = tx(10.0);
        t.sender_id = "".into();
        assert!(validate_transaction(&t).is_err());

        let mut t = tx(10.0);
        t.receiver_id = "has space".into();
        assert!(validate_transaction(&t).is_err());

        let t = tx(10.0).with_card_bin("41x1");
        assert!(validate_transaction(&t).is_err());

        let t = tx(10.0).with_ip("999.1.1.1");
        assert!(validate_transaction(&t).is_err());

        let t = tx(10.0).with_currency("usd");
        assert!(validate_transaction(&t).is_err());
    }

    #[test]
    fn test_boolean_amount_is_not_coerced() {
        let json = r#"{
            "id": "tx_1", "timestamp": "2026-01-01T00:00:00Z", "amount": true,
            "currency": "USD", "sender_id": "a", "receiver_id": "b",
            "tx_type": "transfer", "channel": "web"
        }"#;
        assert!(serde_json::from_str::<Transaction>(json).is_err());
    }
}
