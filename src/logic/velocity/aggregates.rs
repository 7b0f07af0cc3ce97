//! Rolling-window aggregates for one transaction.
//!
//! Two statements per lookup: one consolidated windowed aggregate and one
//! counterparty-history query. Windows are `[as_of - w, as_of)` and the
//! transaction's own id is excluded, so a transaction never counts itself and
//! re-reading history after it was stored yields the same numbers.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::store::TransactionStore;
use crate::logic::error::FraudResult;
use crate::logic::transaction::Transaction;

const AGGREGATE_SQL: &str = "
SELECT
    COALESCE(SUM(CASE WHEN sender_id = ?1 AND ts >= ?6 THEN 1 ELSE 0 END), 0),
    COALESCE(SUM(CASE WHEN sender_id = ?1 THEN 1 ELSE 0 END), 0),
    COALESCE(SUM(CASE WHEN sender_id = ?1 AND ts >= ?6 THEN amount ELSE 0.0 END), 0.0),
    COALESCE(SUM(CASE WHEN sender_id = ?1 THEN amount ELSE 0.0 END), 0.0),
    COUNT(DISTINCT CASE WHEN sender_id = ?1 THEN receiver_id END),
    COALESCE(SUM(CASE WHEN receiver_id = ?2 AND ts >= ?6 THEN 1 ELSE 0 END), 0),
    COALESCE(SUM(CASE WHEN receiver_id = ?2 THEN 1 ELSE 0 END), 0),
    COALESCE(SUM(CASE WHEN receiver_id = ?2 THEN amount ELSE 0.0 END), 0.0),
    COUNT(DISTINCT CASE WHEN receiver_id = ?2 THEN sender_id END),
    COUNT(DISTINCT CASE WHEN device_id = ?3 AND sender_id != ?1 THEN sender_id END),
    COUNT(DISTINCT CASE WHEN ip = ?4 AND sender_id != ?1 THEN sender_id END)
FROM transactions
WHERE ts >= ?7 AND ts < ?5 AND id != ?8
  AND (sender_id = ?1 OR receiver_id = ?2 OR device_id = ?3 OR ip = ?4)
";

const COUNTERPARTY_SQL: &str = "
SELECT EXISTS(
    SELECT 1 FROM transactions
    WHERE sender_id = ?1 AND receiver_id = ?2 AND ts < ?3 AND id != ?4
)
";

/// Counts and sums over the 1h / 24h windows preceding `as_of`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalAggregates {
    pub sender_count_1h: u32,
    pub sender_count_24h: u32,
    pub sender_sum_1h: f64,
    pub sender_sum_24h: f64,
    pub sender_distinct_receivers_24h: u32,
    pub receiver_count_1h: u32,
    pub receiver_count_24h: u32,
    pub receiver_sum_24h: f64,
    pub receiver_distinct_senders_24h: u32,
    /// Other senders seen on the same device
    pub device_other_senders_24h: u32,
    /// Other senders seen on the same ip
    pub ip_other_senders_24h: u32,
    /// Sender has paid this receiver before (any time before `as_of`)
    pub has_prior_counterparty: bool,
}

#[derive(Debug, Clone)]
pub struct AggregateQuery<'a> {
    pub sender_id: &'a str,
    pub receiver_id: &'a str,
    pub device_id: Option<&'a str>,
    pub ip: Option<&'a str>,
    pub as_of: DateTime<Utc>,
    pub exclude_id: Option<&'a str>,
}

impl<'a> AggregateQuery<'a> {
    pub fn for_transaction(tx: &'a Transaction) -> Self {
        Self {
            sender_id: &tx.sender_id,
            receiver_id: &tx.receiver_id,
            device_id: tx.device_id.as_deref(),
            ip: tx.ip.as_deref(),
            as_of: tx.timestamp,
            exclude_id: Some(&tx.id),
        }
    }
}

/// Read side of the velocity store
pub trait AggregateReader: Send + Sync {
    fn aggregates(&self, query: &AggregateQuery<'_>) -> FraudResult<HistoricalAggregates>;
}

impl AggregateReader for TransactionStore {
    fn aggregates(&self, q: &AggregateQuery<'_>) -> FraudResult<HistoricalAggregates> {
        let as_of = q.as_of.timestamp_millis();
        let hour_ago = (q.as_of - Duration::hours(1)).timestamp_millis();
        let day_ago = (q.as_of - Duration::hours(24)).timestamp_millis();
        let exclude = q.exclude_id.unwrap_or("");

        let conn = self.conn.lock();

        let mut agg = conn.query_row(
            AGGREGATE_SQL,
            params![q.sender_id, q.receiver_id, q.device_id, q.ip, as_of, hour_ago, day_ago, exclude],
            |row| {
                Ok(HistoricalAggregates {
                    sender_count_1h: row.get::<_, i64>(0)? as u32,
                    sender_count_24h: row.get::<_, i64>(1)? as u32,
                    sender_sum_1h: row.get(2)?,
                    sender_sum_24h: row.get(3)?,
                    sender_distinct_receivers_24h: row.get::<_, i64>(4)? as u32,
                    receiver_count_1h: row.get::<_, i64>(5)? as u32,
                    receiver_count_24h: row.get::<_, i64>(6)? as u32,
                    receiver_sum_24h: row.get(7)?,
                    receiver_distinct_senders_24h: row.get::<_, i64>(8)? as u32,
                    device_other_senders_24h: row.get::<_, i64>(9)? as u32,
                    ip_other_senders_24h: row.get::<_, i64>(10)? as u32,
                    has_prior_counterparty: false,
                })
            },
        )?;

        agg.has_prior_counterparty = conn.query_row(
            COUNTERPARTY_SQL,
            params![q.sender_id, q.receiver_id, as_of, exclude],
            |row| row.get(0),
        )?;

        Ok(agg)
    }
}
