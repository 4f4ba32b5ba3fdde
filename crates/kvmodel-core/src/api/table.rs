use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{DataError, Error, Result, TxnError};
use crate::mvcc::{Checkpoint, TableItem, TxnSnapshot, Update};
use crate::types::{StatusCode, TS_NONE, Timestamp, TxnId, status};
use crate::value::Value;

use super::transaction::Transaction;
use super::verify::VerifyCursor;

/// Table identifier assigned by the database.
pub type TableId = u64;

struct TableInner {
    id: TableId,
    name: String,
    timestamped: bool,
    /// Guards the key -> chain mapping and every chain in it.
    items: RwLock<BTreeMap<Value, TableItem>>,
}

/// A table of version chains, one per key.
///
/// `Table` is cheaply clonable (`Arc`-based) and `Send + Sync`. Every operation
/// takes the table lock for its own duration only, so transactions interleave
/// operation by operation.
///
/// Two flavours of read API exist: the `get*` methods return a `Result`, the
/// `get*_ext` methods never fail and report a status code alongside the value.
#[derive(Clone)]
pub struct Table {
    inner: Arc<TableInner>,
}

/// What a single write does to a key.
struct Write<'a> {
    txn: Option<&'a Transaction>,
    value: Value,
    timestamp: Timestamp,
    fail_if_exists: bool,
    fail_if_not_exists: bool,
}

impl Table {
    /// Create an empty table. Tables without timestamps ignore every timestamp
    /// passed to them and resolve reads by append order.
    pub fn new(id: TableId, name: impl Into<String>, timestamped: bool) -> Self {
        Self {
            inner: Arc::new(TableInner {
                id,
                name: name.into(),
                timestamped,
                items: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    pub fn id(&self) -> TableId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn timestamped(&self) -> bool {
        self.inner.timestamped
    }

    /// Number of keys that have a version chain (including deleted ones).
    pub fn key_count(&self) -> usize {
        self.inner.items.read().len()
    }

    fn fix_timestamp(&self, timestamp: Timestamp) -> Timestamp {
        if self.timestamped() {
            timestamp
        } else {
            TS_NONE
        }
    }

    fn check_key(key: &Value) -> Result<()> {
        if key.is_none() {
            return Err(DataError::InvalidKey.into());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Value of `key` at `timestamp`, or `NONE` if absent.
    pub fn get(&self, key: &Value, timestamp: Timestamp) -> Result<Value> {
        Self::check_key(key)?;
        let timestamp = self.fix_timestamp(timestamp);
        let items = self.inner.items.read();
        Ok(items
            .get(key)
            .map(|item| item.get(timestamp))
            .unwrap_or_default())
    }

    /// Value of `key` in `ckpt` at `timestamp`, or `NONE` if absent.
    pub fn get_checkpoint(
        &self,
        ckpt: &Checkpoint,
        key: &Value,
        timestamp: Timestamp,
    ) -> Result<Value> {
        Self::check_key(key)?;
        let timestamp = self.fix_timestamp(timestamp);
        let items = self.inner.items.read();
        Ok(items
            .get(key)
            .map(|item| item.get_checkpoint(ckpt, timestamp))
            .unwrap_or_default())
    }

    /// Value of `key` as seen by `txn`, or `NONE` if absent.
    pub fn get_txn(&self, txn: &Transaction, key: &Value) -> Result<Value> {
        Self::check_key(key)?;
        let view = txn.view();
        let items = self.inner.items.read();
        Ok(items
            .get(key)
            .map(|item| {
                if self.timestamped() {
                    item.get_txn(&view)
                } else {
                    item.get_latest(&view)
                }
            })
            .unwrap_or_default())
    }

    pub fn get_ext(&self, key: &Value, timestamp: Timestamp) -> (StatusCode, Value) {
        Self::to_ext(self.get(key, timestamp))
    }

    pub fn get_checkpoint_ext(
        &self,
        ckpt: &Checkpoint,
        key: &Value,
        timestamp: Timestamp,
    ) -> (StatusCode, Value) {
        Self::to_ext(self.get_checkpoint(ckpt, key, timestamp))
    }

    pub fn get_txn_ext(&self, txn: &Transaction, key: &Value) -> (StatusCode, Value) {
        Self::to_ext(self.get_txn(txn, key))
    }

    fn to_ext(result: Result<Value>) -> (StatusCode, Value) {
        match result {
            Ok(Value::None) => (status::NOT_FOUND, Value::None),
            Ok(value) => (status::OK, value),
            Err(e) => (e.code(), Value::None),
        }
    }

    /// Whether `value` is among the values of `key` sharing the newest visible
    /// commit timestamp at `timestamp`. False if the key was never written.
    pub fn contains_any(&self, key: &Value, value: &Value, timestamp: Timestamp) -> bool {
        let timestamp = self.fix_timestamp(timestamp);
        self.inner
            .items
            .read()
            .get(key)
            .is_some_and(|item| item.contains_any(value, timestamp))
    }

    /// [`contains_any`](Self::contains_any) against a checkpoint.
    pub fn contains_any_checkpoint(&self, ckpt: &Checkpoint, key: &Value, value: &Value) -> bool {
        self.inner
            .items
            .read()
            .get(key)
            .is_some_and(|item| item.contains_any_checkpoint(ckpt, value))
    }

    // ------------------------------------------------------------------
    // Point writes
    // ------------------------------------------------------------------

    /// Build the update for `write` and append it to `item`, registering it
    /// with the transaction if there is one.
    fn apply(&self, key: &Value, item: &mut TableItem, write: &Write<'_>) -> Result<()> {
        let update = match write.txn {
            Some(txn) => Update::pending(write.value.clone(), txn.id()),
            None => Update::direct(write.value.clone(), self.fix_timestamp(write.timestamp)),
        };
        let snapshot = write.txn.map(Transaction::snapshot);
        if item.conflicts(update.txn_id(), snapshot) {
            return Err(TxnError::Conflict {
                txn_id: update.txn_id(),
                key: key.clone(),
            }
            .into());
        }
        item.add_update(update, write.fail_if_exists, write.fail_if_not_exists)?;
        if let Some(txn) = write.txn {
            txn.add_update(self, key);
        }
        Ok(())
    }

    /// Write to a single key, creating its chain if needed. A failed write
    /// leaves the table exactly as it was.
    fn write_key(&self, key: &Value, write: Write<'_>, create: bool) -> Result<()> {
        Self::check_key(key)?;
        match write.txn {
            Some(txn) => txn.with_open(|| self.write_key_locked(key, &write, create)),
            None => self.write_key_locked(key, &write, create),
        }
    }

    fn write_key_locked(&self, key: &Value, write: &Write<'_>, create: bool) -> Result<()> {
        let mut items = self.inner.items.write();
        if !create && !items.contains_key(key) {
            return Err(DataError::NotFound.into());
        }
        let item = items.entry(key.clone()).or_default();
        let result = self.apply(key, item, write);
        if result.is_err() && item.is_empty() {
            items.remove(key);
        }
        result
    }

    /// Insert `key`. Without `overwrite`, fails with `DuplicateKey` if a live
    /// value is currently visible.
    pub fn insert(
        &self,
        key: &Value,
        value: Value,
        timestamp: Timestamp,
        overwrite: bool,
    ) -> Result<()> {
        let write = Write {
            txn: None,
            value,
            timestamp,
            fail_if_exists: !overwrite,
            fail_if_not_exists: false,
        };
        self.write_key(key, write, true)
    }

    /// Update `key`. Without `overwrite`, fails with `NotFound` if no live value
    /// is currently visible.
    pub fn update(
        &self,
        key: &Value,
        value: Value,
        timestamp: Timestamp,
        overwrite: bool,
    ) -> Result<()> {
        let write = Write {
            txn: None,
            value,
            timestamp,
            fail_if_exists: false,
            fail_if_not_exists: !overwrite,
        };
        self.write_key(key, write, true)
    }

    /// Delete `key` by appending a tombstone. Fails with `NotFound` if absent.
    pub fn remove(&self, key: &Value, timestamp: Timestamp) -> Result<()> {
        let write = Write {
            txn: None,
            value: Value::None,
            timestamp,
            fail_if_exists: false,
            fail_if_not_exists: true,
        };
        self.write_key(key, write, false)
    }

    pub fn insert_txn(
        &self,
        txn: &Transaction,
        key: &Value,
        value: Value,
        overwrite: bool,
    ) -> Result<()> {
        let write = Write {
            txn: Some(txn),
            value,
            timestamp: TS_NONE,
            fail_if_exists: !overwrite,
            fail_if_not_exists: false,
        };
        self.write_key(key, write, true)
    }

    pub fn update_txn(
        &self,
        txn: &Transaction,
        key: &Value,
        value: Value,
        overwrite: bool,
    ) -> Result<()> {
        let write = Write {
            txn: Some(txn),
            value,
            timestamp: TS_NONE,
            fail_if_exists: false,
            fail_if_not_exists: !overwrite,
        };
        self.write_key(key, write, true)
    }

    pub fn remove_txn(&self, txn: &Transaction, key: &Value) -> Result<()> {
        let write = Write {
            txn: Some(txn),
            value: Value::None,
            timestamp: TS_NONE,
            fail_if_exists: false,
            fail_if_not_exists: true,
        };
        self.write_key(key, write, false)
    }

    // ------------------------------------------------------------------
    // Range writes
    // ------------------------------------------------------------------

    /// Delete every key in `[start, stop]`. A `NONE` bound is open.
    ///
    /// The whole range is written under one table lock. If a key in the range
    /// fails (for instance on a write conflict), keys before it stay deleted.
    pub fn truncate(&self, start: &Value, stop: &Value, timestamp: Timestamp) -> Result<()> {
        self.truncate_range(None, start, stop, timestamp)
    }

    pub fn truncate_txn(&self, txn: &Transaction, start: &Value, stop: &Value) -> Result<()> {
        txn.with_open(|| self.truncate_range(Some(txn), start, stop, TS_NONE))
    }

    fn truncate_range(
        &self,
        txn: Option<&Transaction>,
        start: &Value,
        stop: &Value,
        timestamp: Timestamp,
    ) -> Result<()> {
        if !start.is_none() && !stop.is_none() && start > stop {
            return Err(DataError::InvalidRange {
                start: start.clone(),
                stop: stop.clone(),
            }
            .into());
        }
        let lower = match start {
            Value::None => Bound::Unbounded,
            start => Bound::Included(start),
        };
        let upper = match stop {
            Value::None => Bound::Unbounded,
            stop => Bound::Included(stop),
        };

        debug!(table = %self.name(), %start, %stop, timestamp, "truncate");
        let write = Write {
            txn,
            value: Value::None,
            timestamp,
            fail_if_exists: false,
            fail_if_not_exists: false,
        };
        let mut items = self.inner.items.write();
        for (key, item) in items.range_mut::<Value, _>((lower, upper)) {
            self.apply(key, item, &write)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transaction support
    // ------------------------------------------------------------------

    /// Finalize the uncommitted updates of `txn_id` on `key`. A durable
    /// timestamp before the commit timestamp is rejected.
    pub fn fix_timestamps(
        &self,
        key: &Value,
        txn_id: TxnId,
        commit_ts: Timestamp,
        durable_ts: Timestamp,
    ) -> Result<()> {
        let commit_ts = self.fix_timestamp(commit_ts);
        let durable_ts = self.fix_timestamp(durable_ts);
        if durable_ts < commit_ts {
            return Err(TxnError::InvalidTimestamp {
                commit: commit_ts,
                durable: durable_ts,
            }
            .into());
        }
        let mut items = self.inner.items.write();
        let fixed = items
            .get_mut(key)
            .map(|item| item.fix_timestamps(txn_id, commit_ts, durable_ts))
            .unwrap_or(0);
        if fixed == 0 {
            return Err(Error::from(TxnError::UpdateNotFound {
                txn_id,
                key: key.clone(),
            }));
        }
        trace!(table = %self.name(), %key, txn_id, fixed, "fixed timestamps");
        Ok(())
    }

    /// Remove every update of `txn_id` on `key`. Returns how many were removed.
    pub fn rollback_updates(&self, key: &Value, txn_id: TxnId) -> usize {
        let mut items = self.inner.items.write();
        let Some(item) = items.get_mut(key) else {
            return 0;
        };
        let removed = item.rollback_updates(txn_id);
        if item.is_empty() {
            items.remove(key);
        }
        removed
    }

    pub(crate) fn has_pending(&self, key: &Value, txn_id: TxnId) -> bool {
        self.inner
            .items
            .read()
            .get(key)
            .is_some_and(|item| item.has_pending(txn_id))
    }

    // ------------------------------------------------------------------
    // Table-wide operations
    // ------------------------------------------------------------------

    /// Discard all history durable after `timestamp` and every update of a
    /// transaction not visible in `snapshot`. Keys left without any update
    /// disappear. No-op on tables without timestamps.
    pub fn rollback_to_stable(&self, timestamp: Timestamp, snapshot: Option<&TxnSnapshot>) {
        if !self.timestamped() {
            return;
        }
        let mut items = self.inner.items.write();
        let mut removed = 0;
        for item in items.values_mut() {
            removed += item.rollback_to_stable(timestamp, snapshot);
        }
        let before = items.len();
        items.retain(|_, item| !item.is_empty());
        debug!(
            table = %self.name(),
            timestamp,
            removed,
            keys_dropped = before - items.len(),
            "rollback to stable"
        );
    }

    /// Drop every version chain.
    pub fn clear(&self) {
        self.inner.items.write().clear();
        debug!(table = %self.name(), "cleared");
    }

    /// Open a cursor over the raw table state for verification.
    ///
    /// The cursor holds the table's read lock until dropped: writers block, and
    /// writing to this table from the thread holding the cursor deadlocks.
    pub fn verify_cursor(&self) -> VerifyCursor<'_> {
        VerifyCursor::new(self.inner.items.read())
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("timestamped", &self.timestamped())
            .finish()
    }
}
