//! SQLite transaction store.
//!
//! Only this module and `aggregates.rs` execute SQL. Timestamps are stored as
//! UTC epoch milliseconds.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::logic::error::{FraudError, FraudResult};
use crate::logic::features::FeatureVector;
use crate::logic::transaction::{AnalystLabel, Channel, Transaction, TransactionType};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id          TEXT PRIMARY KEY,
    ts          INTEGER NOT NULL,
    amount      REAL NOT NULL,
    currency    TEXT NOT NULL,
    sender_id   TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    tx_type     TEXT NOT NULL,
    channel     TEXT NOT NULL,
    device_id   TEXT,
    ip          TEXT,
    card_bin    TEXT,
    metadata    TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_tx_sender_ts   ON transactions(sender_id, ts);
CREATE INDEX IF NOT EXISTS idx_tx_receiver_ts ON transactions(receiver_id, ts);
CREATE INDEX IF NOT EXISTS idx_tx_device_ts   ON transactions(device_id, ts);
CREATE INDEX IF NOT EXISTS idx_tx_ip_ts       ON transactions(ip, ts);
CREATE INDEX IF NOT EXISTS idx_tx_ts          ON transactions(ts);

CREATE TABLE IF NOT EXISTS labels (
    transaction_id TEXT PRIMARY KEY,
    is_fraud       INTEGER NOT NULL,
    labeled_at     INTEGER NOT NULL
);

-- one row per new label or corrected label; never updated
CREATE TABLE IF NOT EXISTS label_events (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id TEXT NOT NULL,
    is_fraud       INTEGER NOT NULL,
    labeled_at     INTEGER NOT NULL
);

-- feature vector each transaction was scored with
CREATE TABLE IF NOT EXISTS feature_snapshots (
    transaction_id TEXT PRIMARY KEY,
    vector         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS engine_state (
    key   TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
";

const TX_COLUMNS: &str =
    "t.id, t.ts, t.amount, t.currency, t.sender_id, t.receiver_id, t.tx_type, t.channel, t.device_id, t.ip, t.card_bin, t.metadata";

pub struct TransactionStore {
    pub(super) conn: Mutex<Connection>,
}

impl TransactionStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> FraudResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        log::info!("Transaction store opened at {:?}", path);
        Ok(store)
    }

    /// In-memory database (tests, demos)
    pub fn in_memory() -> FraudResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> FraudResult<()> {
        self.conn.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    // ── Transactions ───────────────────────────────────────────

    /// Insert once; a replayed id is ignored. Returns whether a row was written.
    pub fn insert_transaction(&self, tx: &Transaction) -> FraudResult<bool> {
        let metadata = serde_json::to_string(&tx.metadata)?;
        let written = self.conn.lock().execute(
            "INSERT OR IGNORE INTO transactions
             (id, ts, amount, currency, sender_id, receiver_id, tx_type, channel, device_id, ip, card_bin, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                tx.id,
                tx.timestamp.timestamp_millis(),
                tx.amount,
                tx.currency,
                tx.sender_id,
                tx.receiver_id,
                tx.tx_type.as_str(),
                tx.channel.as_str(),
                tx.device_id,
                tx.ip,
                tx.card_bin,
                metadata,
            ],
        )?;
        Ok(written > 0)
    }

    pub fn contains_transaction(&self, id: &str) -> FraudResult<bool> {
        let exists: bool = self.conn.lock().query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn get_transaction(&self, id: &str) -> FraudResult<Option<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {TX_COLUMNS} FROM transactions t WHERE t.id = ?1"))?;
        let tx = stmt.query_row(params![id], row_to_transaction).optional()?;
        Ok(tx)
    }

    pub fn transaction_count(&self) -> FraudResult<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Transactions with `since <= ts <= until`, oldest first, keeping the
    /// newest `limit` when the window is larger
    pub fn recent_window(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> FraudResult<Vec<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TX_COLUMNS} FROM transactions t
             WHERE t.ts >= ?1 AND t.ts <= ?2
             ORDER BY t.ts DESC, t.id DESC LIMIT ?3"
        ))?;
        let mut txs = stmt
            .query_map(
                params![since.timestamp_millis(), until.timestamp_millis(), limit as i64],
                row_to_transaction,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        txs.reverse();
        Ok(txs)
    }

    // ── Feature snapshots ──────────────────────────────────────

    /// Keep the first snapshot recorded for a transaction
    pub fn insert_features(&self, transaction_id: &str, features: &FeatureVector) -> FraudResult<()> {
        let vector = serde_json::to_string(features)?;
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO feature_snapshots (transaction_id, vector) VALUES (?1, ?2)",
            params![transaction_id, vector],
        )?;
        Ok(())
    }

    pub fn feature_snapshot(&self, transaction_id: &str) -> FraudResult<Option<FeatureVector>> {
        let vector: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT vector FROM feature_snapshots WHERE transaction_id = ?1",
                params![transaction_id],
                |row| row.get(0),
            )
            .optional()?;
        vector.map(|v| serde_json::from_str(&v).map_err(FraudError::from)).transpose()
    }

    // ── Labels ─────────────────────────────────────────────────

    /// Record (or overwrite) the analyst label for a stored transaction.
    /// Returns `true` when the label is new or changes the previous verdict;
    /// only those are counted as label events.
    pub fn insert_label(&self, label: &AnalystLabel) -> FraudResult<bool> {
        let mut conn = self.conn.lock();
        let db = conn.transaction()?;

        let exists: bool = db.query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE id = ?1)",
            params![label.transaction_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(FraudError::NotFound(format!(
                "transaction '{}' for label",
                label.transaction_id
            )));
        }

        let previous: Option<bool> = db
            .query_row(
                "SELECT is_fraud FROM labels WHERE transaction_id = ?1",
                params![label.transaction_id],
                |row| row.get(0),
            )
            .optional()?;
        let changed = previous != Some(label.is_fraud);

        db.execute(
            "INSERT OR REPLACE INTO labels (transaction_id, is_fraud, labeled_at) VALUES (?1, ?2, ?3)",
            params![label.transaction_id, label.is_fraud, label.labeled_at.timestamp_millis()],
        )?;
        if changed {
            db.execute(
                "INSERT INTO label_events (transaction_id, is_fraud, labeled_at) VALUES (?1, ?2, ?3)",
                params![label.transaction_id, label.is_fraud, label.labeled_at.timestamp_millis()],
            )?;
        }
        db.commit()?;
        Ok(changed)
    }

    /// Labeled transactions (one per transaction, latest verdict)
    pub fn label_count(&self) -> FraudResult<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM labels", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Monotonic count of new and corrected labels
    pub fn label_event_count(&self) -> FraudResult<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM label_events", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Every labeled transaction with its label, oldest first
    pub fn labeled_transactions(&self) -> FraudResult<Vec<(Transaction, bool)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TX_COLUMNS}, l.is_fraud FROM transactions t
             JOIN labels l ON l.transaction_id = t.id
             ORDER BY t.ts ASC, t.id ASC"
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row_to_transaction(row)?, row.get::<_, bool>(12)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Engine state ───────────────────────────────────────────

    pub fn state_value(&self, key: &str) -> FraudResult<Option<u64>> {
        let value: Option<i64> = self
            .conn
            .lock()
            .query_row("SELECT value FROM engine_state WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value.map(|v| v.max(0) as u64))
    }

    pub fn set_state_value(&self, key: &str, value: u64) -> FraudResult<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO engine_state (key, value) VALUES (?1, ?2)",
            params![key, value.min(i64::MAX as u64) as i64],
        )?;
        Ok(())
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

pub(super) fn millis_to_utc(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let tx_type: String = row.get(6)?;
    let channel: String = row.get(7)?;
    let metadata: String = row.get(11)?;

    Ok(Transaction {
        id: row.get(0)?,
        timestamp: millis_to_utc(1, row.get(1)?)?,
        amount: row.get(2)?,
        currency: row.get(3)?,
        sender_id: row.get(4)?,
        receiver_id: row.get(5)?,
        tx_type: TransactionType::parse(&tx_type)
            .ok_or_else(|| conversion_error(6, format!("unknown tx_type '{tx_type}'")))?,
        channel: Channel::parse(&channel)
            .ok_or_else(|| conversion_error(7, format!("unknown channel '{channel}'")))?,
        device_id: row.get(8)?,
        ip: row.get(9)?,
        card_bin: row.get(10)?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?,
    })
}
