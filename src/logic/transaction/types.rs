//! Transaction / label / risk result records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::features::FeatureVector;
use crate::logic::model::ModelVersionId;

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Transfer,
    Payment,
    Purchase,
    Withdrawal,
    Deposit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "transfer",
            TransactionType::Payment => "payment",
            TransactionType::Purchase => "purchase",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Deposit => "deposit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transfer" => Some(TransactionType::Transfer),
            "payment" => Some(TransactionType::Payment),
            "purchase" => Some(TransactionType::Purchase),
            "withdrawal" => Some(TransactionType::Withdrawal),
            "deposit" => Some(TransactionType::Deposit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Web,
    Mobile,
    Pos,
    Atm,
    Api,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Web => "web",
            Channel::Mobile => "mobile",
            Channel::Pos => "pos",
            Channel::Atm => "atm",
            Channel::Api => "api",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "web" => Some(Channel::Web),
            "mobile" => Some(Channel::Mobile),
            "pos" => Some(Channel::Pos),
            "atm" => Some(Channel::Atm),
            "api" => Some(Channel::Api),
            _ => None,
        }
    }
}

/// Scoring outcome bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Review,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Review => "review",
            Decision::Block => "block",
        }
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// A payment between two accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub currency: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub tx_type: TransactionType,
    pub channel: Channel,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub card_bin: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            amount,
            currency: "USD".to_string(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            tx_type: TransactionType::Transfer,
            channel: Channel::Web,
            device_id: None,
            ip: None,
            card_bin: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, tx_type: TransactionType) -> Self {
        self.tx_type = tx_type;
        self
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_device(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = Some(ip.to_string());
        self
    }

    pub fn with_card_bin(mut self, bin: &str) -> Self {
        self.card_bin = Some(bin.to_string());
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// ISO-3166 alpha-2 country code carried in metadata, if any
    pub fn country(&self) -> Option<&str> {
        self.metadata.get("country").map(String::as_str)
    }
}

// ============================================================================
// LABELS / RESULTS
// ============================================================================

/// Ground-truth label supplied by an analyst after the fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystLabel {
    pub transaction_id: String,
    pub is_fraud: bool,
    pub labeled_at: DateTime<Utc>,
}

impl AnalystLabel {
    pub fn new(transaction_id: impl Into<String>, is_fraud: bool, labeled_at: DateTime<Utc>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            is_fraud,
            labeled_at,
        }
    }
}

/// Output of scoring one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    pub transaction_id: String,
    /// Fraud probability in [0, 1]
    pub score: f64,
    pub decision: Decision,
    pub features: FeatureVector,
    pub model_version: ModelVersionId,
    pub scored_at: DateTime<Utc>,
    pub latency_us: u64,
}
