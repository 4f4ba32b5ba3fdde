use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{Result, SchemaError};
use crate::mvcc::{Checkpoint, SnapshotTracker};
use crate::types::{DEFAULT_CHECKPOINT_NAME, TS_NONE, Timestamp};

use super::builders::TableBuilder;
use super::table::{Table, TableId};
use super::transaction::Transaction;

struct DatabaseInner {
    tables: RwLock<BTreeMap<String, Table>>,
    next_table_id: AtomicU64,
    /// Transactions begun through this database and not yet ended.
    tracker: Arc<SnapshotTracker>,
    checkpoints: Mutex<BTreeMap<String, Checkpoint>>,
    stable_timestamp: AtomicU64,
}

/// The registry tying tables, transactions and checkpoints together.
///
/// `Database` is cheaply clonable (`Arc`-based) and `Send + Sync`.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Create an empty database with no stable timestamp.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                tables: RwLock::new(BTreeMap::new()),
                next_table_id: AtomicU64::new(1),
                tracker: Arc::new(SnapshotTracker::new()),
                checkpoints: Mutex::new(BTreeMap::new()),
                stable_timestamp: AtomicU64::new(TS_NONE),
            }),
        }
    }

    /// Create a database with the tables and stable timestamp in `config`.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let db = Self::new();
        for table in &config.tables {
            db.create_table(&table.name)
                .timestamped(table.timestamped)
                .execute()?;
        }
        db.set_stable_timestamp(config.stable_timestamp);
        Ok(db)
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Start building a new table.
    pub fn create_table(&self, name: &str) -> TableBuilder<'_> {
        TableBuilder::new(self, name.to_string())
    }

    pub(crate) fn register_table(&self, name: String, timestamped: bool) -> Result<Table> {
        let mut tables = self.inner.tables.write();
        if tables.contains_key(&name) {
            return Err(SchemaError::TableAlreadyExists(name).into());
        }
        let id = self.inner.next_table_id.fetch_add(1, Ordering::Relaxed);
        let table = Table::new(id, name.clone(), timestamped);
        tables.insert(name, table.clone());
        debug!(table = %table.name(), id, timestamped, "create table");
        Ok(table)
    }

    pub fn table(&self, name: &str) -> Result<Table> {
        self.inner
            .tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::TableNotFound(name.to_string()).into())
    }

    pub fn table_by_id(&self, id: TableId) -> Option<Table> {
        self.inner
            .tables
            .read()
            .values()
            .find(|t| t.id() == id)
            .cloned()
    }

    /// Table names in sorted order.
    pub fn list_tables(&self) -> Vec<String> {
        self.inner.tables.read().keys().cloned().collect()
    }

    /// Remove a table from the registry. Handles already held stay usable.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        if self.inner.tables.write().remove(name).is_none() {
            return Err(SchemaError::TableNotFound(name.to_string()).into());
        }
        debug!(table = name, "drop table");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    pub fn begin_transaction(&self) -> Transaction {
        Transaction::begin(&self.inner.tracker)
    }

    /// Begin a transaction whose reads are bounded by `read_ts`.
    pub fn begin_transaction_at(&self, read_ts: Timestamp) -> Transaction {
        Transaction::begin_at(&self.inner.tracker, read_ts)
    }

    /// Number of transactions that have begun but not ended.
    pub fn active_transactions(&self) -> usize {
        self.inner.tracker.active_count()
    }

    // ------------------------------------------------------------------
    // Stability and checkpoints
    // ------------------------------------------------------------------

    pub fn set_stable_timestamp(&self, timestamp: Timestamp) {
        self.inner
            .stable_timestamp
            .store(timestamp, Ordering::Release);
    }

    pub fn stable_timestamp(&self) -> Timestamp {
        self.inner.stable_timestamp.load(Ordering::Acquire)
    }

    /// Capture a checkpoint of the current stable timestamp and the set of
    /// committed transactions. An existing checkpoint with the same name is
    /// replaced.
    pub fn create_checkpoint(&self, name: Option<&str>) -> Checkpoint {
        let name = name.unwrap_or(DEFAULT_CHECKPOINT_NAME);
        let snapshot = self.inner.tracker.capture();
        let stable = self.stable_timestamp();
        let ckpt = Checkpoint::new(name, Some(snapshot), stable);
        self.inner
            .checkpoints
            .lock()
            .insert(name.to_string(), ckpt.clone());
        debug!(checkpoint = name, stable_timestamp = stable, "create checkpoint");
        ckpt
    }

    /// Look up a checkpoint; `None` means the default one.
    pub fn checkpoint(&self, name: Option<&str>) -> Result<Checkpoint> {
        let name = name.unwrap_or(DEFAULT_CHECKPOINT_NAME);
        self.inner
            .checkpoints
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::CheckpointNotFound(name.to_string()).into())
    }

    /// Roll every table back to the stable timestamp, also discarding the
    /// updates of transactions that are still running.
    pub fn rollback_to_stable(&self) {
        let stable = self.stable_timestamp();
        let snapshot = self.inner.tracker.capture();
        let tables: Vec<Table> = self.inner.tables.read().values().cloned().collect();
        debug!(stable_timestamp = stable, tables = tables.len(), "rollback to stable");
        for table in &tables {
            table.rollback_to_stable(stable, Some(&snapshot));
        }
    }

    /// Drop the contents of every table and forget all checkpoints.
    pub fn clear(&self) {
        for table in self.inner.tables.read().values() {
            table.clear();
        }
        self.inner.checkpoints.lock().clear();
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("tables", &self.list_tables())
            .field("stable_timestamp", &self.stable_timestamp())
            .finish()
    }
}
