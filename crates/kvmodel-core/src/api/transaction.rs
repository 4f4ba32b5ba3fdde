use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result, TxnError};
use crate::mvcc::{SnapshotTracker, TxnSnapshot, TxnView};
use crate::types::{TS_NONE, Timestamp, TxnId};
use crate::value::Value;

use super::table::Table;

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Open,
    Committed,
    RolledBack,
    /// Commit failed part way; only `rollback` is allowed from here.
    FailedCommit,
}

/// Where a produced update lives: resolved against the table at commit or
/// rollback time rather than held as a pointer.
struct UpdateRef {
    table: Table,
    key: Value,
}

struct TxnInner {
    id: TxnId,
    snapshot: TxnSnapshot,
    read_ts: Timestamp,
    state: Mutex<TxnState>,
    produced: Mutex<Vec<UpdateRef>>,
    tracker: Arc<SnapshotTracker>,
}

/// A unit of atomicity.
///
/// Writes made through a transaction are recorded in the affected version
/// chains immediately, without timestamps. `commit` assigns the timestamps;
/// `rollback` removes the writes again. A transaction ends exactly once;
/// ending it again is a programming error and panics. Dropping the last handle
/// to a transaction that has not ended rolls it back.
///
/// `Transaction` is cheaply clonable (`Arc`-based) and `Send + Sync`.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxnInner>,
}

impl Transaction {
    /// Begin a transaction that reads the latest committed state.
    pub fn begin(tracker: &Arc<SnapshotTracker>) -> Self {
        Self::begin_at(tracker, TS_NONE)
    }

    /// Begin a transaction reading at `read_ts` (`TS_NONE` = no bound).
    pub fn begin_at(tracker: &Arc<SnapshotTracker>, read_ts: Timestamp) -> Self {
        let (id, snapshot) = tracker.begin();
        debug!(txn_id = id, read_ts, "begin transaction");
        Self {
            inner: Arc::new(TxnInner {
                id,
                snapshot,
                read_ts,
                state: Mutex::new(TxnState::Open),
                produced: Mutex::new(Vec::new()),
                tracker: Arc::clone(tracker),
            }),
        }
    }

    pub fn id(&self) -> TxnId {
        self.inner.id
    }

    pub fn snapshot(&self) -> &TxnSnapshot {
        &self.inner.snapshot
    }

    pub fn read_timestamp(&self) -> Timestamp {
        self.inner.read_ts
    }

    pub fn state(&self) -> TxnState {
        *self.inner.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == TxnState::Open
    }

    /// Number of updates produced so far.
    pub fn produced_count(&self) -> usize {
        self.inner.produced.lock().len()
    }

    pub(crate) fn view(&self) -> TxnView<'_> {
        TxnView {
            id: self.inner.id,
            snapshot: &self.inner.snapshot,
            read_ts: self.inner.read_ts,
        }
    }

    /// Run `f` with the transaction's state locked, so it cannot end while a
    /// write is appended and registered. Lock order: state, then table.
    ///
    /// # Panics
    ///
    /// If the transaction has already ended.
    pub(crate) fn with_open<R>(&self, f: impl FnOnce() -> R) -> R {
        let state = self.inner.state.lock();
        assert!(
            *state == TxnState::Open,
            "transaction {} used after it ended ({:?})",
            self.id(),
            *state
        );
        f()
    }

    /// Record that this transaction produced an update of `key` in `table`.
    pub fn add_update(&self, table: &Table, key: &Value) {
        self.inner.produced.lock().push(UpdateRef {
            table: table.clone(),
            key: key.clone(),
        });
    }

    /// Assign `commit_ts` and `durable_ts` to every update this transaction produced.
    ///
    /// `durable_ts == TS_NONE` means "same as `commit_ts`". A durable timestamp
    /// before the commit timestamp is rejected and leaves the transaction open.
    /// If any produced update can no longer be found, the transaction ends in
    /// [`TxnState::FailedCommit`] and must be rolled back by the caller.
    ///
    /// # Panics
    ///
    /// If the transaction has already ended.
    pub fn commit(&self, commit_ts: Timestamp, durable_ts: Timestamp) -> Result<()> {
        let mut state = self.inner.state.lock();
        assert!(
            *state == TxnState::Open,
            "transaction {} committed after it ended ({:?})",
            self.id(),
            *state
        );
        let durable_ts = if durable_ts == TS_NONE {
            commit_ts
        } else {
            durable_ts
        };
        if durable_ts < commit_ts {
            return Err(TxnError::InvalidTimestamp {
                commit: commit_ts,
                durable: durable_ts,
            }
            .into());
        }

        let refs = self.inner.distinct_refs();
        if let Some(missing) = refs.iter().find(|r| !r.table.has_pending(&r.key, self.id())) {
            *state = TxnState::FailedCommit;
            warn!(
                txn_id = self.id(),
                table = %missing.table.name(),
                key = %missing.key,
                "update lost before commit"
            );
            return Err(TxnError::UpdateNotFound {
                txn_id: self.id(),
                key: missing.key.clone(),
            }
            .into());
        }

        let mut first_err: Option<Error> = None;
        for r in &refs {
            if let Err(e) = r
                .table
                .fix_timestamps(&r.key, self.id(), commit_ts, durable_ts)
            {
                warn!(
                    txn_id = self.id(),
                    table = %r.table.name(),
                    key = %r.key,
                    error = %e,
                    "timestamp fix-up failed"
                );
                first_err.get_or_insert(e);
            }
        }
        if let Some(e) = first_err {
            *state = TxnState::FailedCommit;
            return Err(e);
        }

        *state = TxnState::Committed;
        self.inner.tracker.end(self.id());
        debug!(
            txn_id = self.id(),
            commit_ts,
            durable_ts,
            updates = refs.len(),
            "commit transaction"
        );
        Ok(())
    }

    /// Remove every update this transaction produced.
    ///
    /// # Panics
    ///
    /// If the transaction has already committed or rolled back.
    pub fn rollback(&self) {
        let mut state = self.inner.state.lock();
        assert!(
            matches!(*state, TxnState::Open | TxnState::FailedCommit),
            "transaction {} rolled back after it ended ({:?})",
            self.id(),
            *state
        );
        self.inner.rollback_updates();
        *state = TxnState::RolledBack;
    }

    // ------------------------------------------------------------------
    // Convenience forwarding to the table's transactional API
    // ------------------------------------------------------------------

    pub fn get(&self, table: &Table, key: &Value) -> Result<Value> {
        table.get_txn(self, key)
    }

    pub fn insert(&self, table: &Table, key: &Value, value: Value, overwrite: bool) -> Result<()> {
        table.insert_txn(self, key, value, overwrite)
    }

    pub fn update(&self, table: &Table, key: &Value, value: Value, overwrite: bool) -> Result<()> {
        table.update_txn(self, key, value, overwrite)
    }

    pub fn remove(&self, table: &Table, key: &Value) -> Result<()> {
        table.remove_txn(self, key)
    }

    pub fn truncate(&self, table: &Table, start: &Value, stop: &Value) -> Result<()> {
        table.truncate_txn(self, start, stop)
    }
}

impl TxnInner {
    /// Produced locations with duplicates removed, in first-write order.
    fn distinct_refs(&self) -> Vec<UpdateRef> {
        let produced = self.produced.lock();
        let mut refs: Vec<UpdateRef> = Vec::with_capacity(produced.len());
        for r in produced.iter() {
            if !refs
                .iter()
                .any(|seen| seen.table.id() == r.table.id() && seen.key == r.key)
            {
                refs.push(UpdateRef {
                    table: r.table.clone(),
                    key: r.key.clone(),
                });
            }
        }
        refs
    }

    fn rollback_updates(&self) {
        let refs = self.distinct_refs();
        let removed: usize = refs
            .iter()
            .map(|r| r.table.rollback_updates(&r.key, self.id))
            .sum();
        self.tracker.end(self.id);
        debug!(txn_id = self.id, removed, "rollback transaction");
    }
}

impl Drop for TxnInner {
    fn drop(&mut self) {
        if matches!(*self.state.get_mut(), TxnState::Open | TxnState::FailedCommit) {
            self.rollback_updates();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id())
            .field("read_ts", &self.read_timestamp())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::status;
    use crate::value::NONE;

    fn setup() -> (Arc<SnapshotTracker>, Table) {
        (Arc::new(SnapshotTracker::new()), Table::new(1, "t", true))
    }

    fn k(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn test_commit_assigns_timestamps() {
        let (tracker, t) = setup();
        let txn = Transaction::begin(&tracker);
        txn.insert(&t, &k("a"), Value::from(1), false).unwrap();
        assert_eq!(txn.get(&t, &k("a")).unwrap(), Value::from(1));
        assert_eq!(t.get(&k("a"), TS_NONE).unwrap(), NONE);

        txn.commit(10, TS_NONE).unwrap();
        assert_eq!(txn.state(), TxnState::Committed);
        assert_eq!(t.get(&k("a"), 9).unwrap(), NONE);
        assert_eq!(t.get(&k("a"), 10).unwrap(), Value::from(1));
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_rollback_removes_updates() {
        let (tracker, t) = setup();
        t.insert(&k("a"), Value::from(1), 5, false).unwrap();

        let txn = Transaction::begin(&tracker);
        txn.update(&t, &k("a"), Value::from(2), false).unwrap();
        txn.insert(&t, &k("b"), Value::from(3), false).unwrap();
        txn.remove(&t, &k("a")).unwrap();
        assert_eq!(txn.produced_count(), 3);
        txn.rollback();

        assert_eq!(txn.state(), TxnState::RolledBack);
        assert_eq!(t.get(&k("a"), TS_NONE).unwrap(), Value::from(1));
        assert_eq!(t.get(&k("b"), TS_NONE).unwrap(), NONE);
        assert_eq!(t.key_count(), 1);
    }

    #[test]
    fn test_invalid_durable_timestamp_keeps_txn_open() {
        let (tracker, t) = setup();
        let txn = Transaction::begin(&tracker);
        txn.insert(&t, &k("a"), Value::from(1), false).unwrap();
        let err = txn.commit(10, 5).unwrap_err();
        assert_eq!(err.code(), status::EINVAL);
        assert!(txn.is_open());
        txn.commit(10, 12).unwrap();
        assert_eq!(t.get(&k("a"), 10).unwrap(), Value::from(1));
    }

    #[test]
    fn test_failed_commit_then_rollback() {
        let (tracker, t) = setup();
        let txn = Transaction::begin(&tracker);
        txn.insert(&t, &k("a"), Value::from(1), false).unwrap();
        txn.insert(&t, &k("b"), Value::from(2), false).unwrap();
        t.rollback_updates(&k("b"), txn.id());

        let err = txn.commit(10, 10).unwrap_err();
        assert_eq!(err.code(), status::ROLLBACK);
        assert_eq!(txn.state(), TxnState::FailedCommit);
        // Nothing was finalized.
        assert_eq!(t.get(&k("a"), 10).unwrap(), NONE);

        txn.rollback();
        assert_eq!(t.key_count(), 0);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_write_conflict() {
        let (tracker, t) = setup();
        let t1 = Transaction::begin(&tracker);
        let t2 = Transaction::begin(&tracker);
        t1.insert(&t, &k("a"), Value::from(1), false).unwrap();

        let err = t2.insert(&t, &k("a"), Value::from(2), true).unwrap_err();
        assert_eq!(err.code(), status::ROLLBACK);
        let err = t.insert(&k("a"), Value::from(3), 5, true).unwrap_err();
        assert_eq!(err.code(), status::ROLLBACK);

        t1.commit(10, 10).unwrap();
        // t2 began before t1 committed: first committer wins.
        assert!(t2.update(&t, &k("a"), Value::from(2), true).is_err());
        t2.rollback();
    }

    #[test]
    fn test_repeated_writes_to_one_key() {
        let (tracker, t) = setup();
        let txn = Transaction::begin(&tracker);
        txn.insert(&t, &k("a"), Value::from(1), false).unwrap();
        txn.update(&t, &k("a"), Value::from(2), false).unwrap();
        txn.commit(10, 10).unwrap();
        assert_eq!(t.get(&k("a"), 10).unwrap(), Value::from(2));
        assert!(t.contains_any(&k("a"), &Value::from(1), 10));
    }

    #[test]
    fn test_drop_rolls_back() {
        let (tracker, t) = setup();
        {
            let txn = Transaction::begin(&tracker);
            txn.insert(&t, &k("a"), Value::from(1), false).unwrap();
        }
        assert_eq!(t.key_count(), 0);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    #[should_panic(expected = "committed after it ended")]
    fn test_double_commit_panics() {
        let (tracker, _t) = setup();
        let txn = Transaction::begin(&tracker);
        txn.commit(1, 1).unwrap();
        let _ = txn.commit(2, 2);
    }

    #[test]
    #[should_panic(expected = "rolled back after it ended")]
    fn test_rollback_after_commit_panics() {
        let (tracker, _t) = setup();
        let txn = Transaction::begin(&tracker);
        txn.commit(1, 1).unwrap();
        txn.rollback();
    }

    #[test]
    #[should_panic(expected = "used after it ended")]
    fn test_write_after_end_panics() {
        let (tracker, t) = setup();
        let txn = Transaction::begin(&tracker);
        txn.rollback();
        let _ = txn.insert(&t, &k("a"), Value::from(1), false);
    }
}
