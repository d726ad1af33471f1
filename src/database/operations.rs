use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::backoff::{connect_with_backoff, BackoffPolicy};
use crate::blockchain::scanner::MatchRecorder;
use crate::blockchain::watch_set::normalize_address;
use crate::database::schema::{initialize_schema, run_migrations};
use crate::error::{ConnectError, DatabaseError, ValidationError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::MatchedTransaction;
use crate::watch_list::AddressRegistry;

/// Stored watch-list entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressRecord {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied address fields for create and update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressPayload {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub id: i64,
    pub hash: String,
    pub from_address: String,
    pub to_address: String,
    pub value_wei: String,
    pub gas_used: u64,
    pub gas_price_wei: String,
    pub block_num: u64,
    pub block_timestamp: u64,
    pub input_hex: String,
    pub created_at: String,
}

/// Strip an optional `sqlite://` or `sqlite:` scheme from a registry URL
pub fn registry_path(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidRecord(format!("{} '{}': {}", column, raw, e)))
}

fn encode_labels(labels: &Option<Vec<String>>) -> Result<Option<String>, DatabaseError> {
    labels
        .as_ref()
        .map(|l| serde_json::to_string(l).map_err(|e| DatabaseError::InvalidRecord(e.to_string())))
        .transpose()
}

/// SQLite-backed address registry
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a registry file and initialize its schema
    pub fn new(db_path: &str) -> Result<Self, DatabaseError> {
        let conn = Connection::open(Path::new(db_path))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory registry for testing
    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        initialize_schema(&conn)?;
        run_migrations(&conn)?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the registry at `url`, retrying with backoff until it answers a health check
    pub async fn connect_with_backoff(
        url: &str,
        policy: &BackoffPolicy,
        cancel: &CancellationToken,
    ) -> Result<Self, ConnectError> {
        let path = registry_path(url).to_string();

        connect_with_backoff(url, policy, cancel, || {
            let path = path.clone();
            async move {
                let db = Database::new(&path)?;
                db.health_check()?;
                Ok::<_, DatabaseError>(db)
            }
        })
        .await
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn
            .lock()
            .map_err(|_| DatabaseError::Lock("Failed to acquire registry lock".to_string()))
    }

    pub fn health_check(&self) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Insert an address, or merge the supplied fields into an existing one.
    /// Returns the canonical address.
    pub fn upsert_address(&self, payload: &AddressPayload) -> Result<String, DatabaseError> {
        if payload.address.trim().is_empty() {
            return Err(ValidationError::InvalidAddress("address required".to_string()).into());
        }
        let address = normalize_address(&payload.address)?;
        let labels = encode_labels(&payload.labels)?;
        let now = format_timestamp(&Utc::now());

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO addresses (address, first_seen, last_seen, labels, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(address) DO UPDATE SET
                first_seen = COALESCE(excluded.first_seen, addresses.first_seen),
                last_seen = COALESCE(excluded.last_seen, addresses.last_seen),
                labels = COALESCE(excluded.labels, addresses.labels),
                updated_at = excluded.updated_at",
            params![
                address,
                payload.first_seen.as_ref().map(format_timestamp),
                payload.last_seen.as_ref().map(format_timestamp),
                labels,
                now,
            ],
        )?;

        LogContext::new("registry", "upsert_address")
            .with_address(&address)
            .debug("Address upserted");

        Ok(address)
    }

    pub fn get_address(&self, address: &str) -> Result<AddressRecord, DatabaseError> {
        let address = normalize_address(address)?;
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT address, first_seen, last_seen, labels, created_at, updated_at
                 FROM addresses WHERE address = ?1",
                params![address],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| DatabaseError::NotFound(address.clone()))?;

        let (address, first_seen, last_seen, labels, created_at, updated_at) = row;
        let labels = labels
            .map(|raw| {
                serde_json::from_str::<Vec<String>>(&raw)
                    .map_err(|e| DatabaseError::InvalidRecord(format!("labels '{}': {}", raw, e)))
            })
            .transpose()?;

        Ok(AddressRecord {
            address,
            first_seen: first_seen.map(|raw| parse_timestamp("first_seen", &raw)).transpose()?,
            last_seen: last_seen.map(|raw| parse_timestamp("last_seen", &raw)).transpose()?,
            labels,
            created_at: parse_timestamp("created_at", &created_at)?,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        })
    }

    /// Replace the mutable fields of an existing address
    pub fn update_address(&self, address: &str, payload: &AddressPayload) -> Result<(), DatabaseError> {
        let address = normalize_address(address)?;
        let labels = encode_labels(&payload.labels)?;
        let now = format_timestamp(&Utc::now());

        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE addresses SET first_seen = ?2, last_seen = ?3, labels = ?4, updated_at = ?5
             WHERE address = ?1",
            params![
                address,
                payload.first_seen.as_ref().map(format_timestamp),
                payload.last_seen.as_ref().map(format_timestamp),
                labels,
                now,
            ],
        )?;

        if updated == 0 {
            return Err(DatabaseError::NotFound(address));
        }
        Ok(())
    }

    pub fn delete_address(&self, address: &str) -> Result<(), DatabaseError> {
        let address = normalize_address(address)?;
        let conn = self.lock()?;

        let deleted = conn.execute("DELETE FROM addresses WHERE address = ?1", params![address])?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound(address));
        }

        LogContext::new("registry", "delete_address")
            .with_address(&address)
            .debug("Address removed");
        Ok(())
    }

    /// All stored addresses
    pub fn list_addresses(&self) -> Result<Vec<String>, DatabaseError> {
        let monitor = PerformanceMonitor::new("registry_list_addresses");
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT address FROM addresses ORDER BY address")?;
        let addresses = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let duration = monitor.finish();
        MetricsLogger::log_registry_query(addresses.len(), duration);
        Ok(addresses)
    }

    /// Store a matched transaction; returns false when the hash was already recorded
    pub fn record_transaction(&self, tx: &MatchedTransaction) -> Result<bool, DatabaseError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO transactions
                (hash, from_address, to_address, value_wei, gas_used, gas_price_wei, block_num, block_timestamp, input_hex)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                tx.hash,
                tx.from,
                tx.to,
                tx.value,
                tx.gas as i64,
                tx.gas_price,
                tx.block_num as i64,
                tx.timestamp as i64,
                tx.input,
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn get_transaction(&self, hash: &str) -> Result<TransactionRow, DatabaseError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, hash, from_address, to_address, value_wei, gas_used, gas_price_wei,
                    block_num, block_timestamp, input_hex, created_at
             FROM transactions WHERE hash = ?1",
            params![hash],
            |row| {
                Ok(TransactionRow {
                    id: row.get(0)?,
                    hash: row.get(1)?,
                    from_address: row.get(2)?,
                    to_address: row.get(3)?,
                    value_wei: row.get(4)?,
                    gas_used: row.get::<_, i64>(5)? as u64,
                    gas_price_wei: row.get(6)?,
                    block_num: row.get::<_, i64>(7)? as u64,
                    block_timestamp: row.get::<_, i64>(8)? as u64,
                    input_hex: row.get(9)?,
                    created_at: row.get(10)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound(hash.to_string()))
    }

    pub fn transaction_count(&self) -> Result<u64, DatabaseError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl AddressRegistry for Database {
    fn list_addresses(&self) -> Result<Vec<String>, DatabaseError> {
        Database::list_addresses(self)
    }
}

impl MatchRecorder for Database {
    fn record(&self, tx: &MatchedTransaction) -> Result<(), DatabaseError> {
        self.record_transaction(tx).map(|_| ())
    }
}
