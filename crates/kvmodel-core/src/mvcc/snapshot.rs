//! Transaction snapshots and the registry of open transactions they are taken from.

use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::types::{TxnId, next_txn_id, peek_txn_id};

/// The set of transactions a reader must not see.
///
/// A transaction id is visible iff it was allocated before the snapshot was
/// captured (`id < max_id`) and was not open at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnSnapshot {
    max_id: TxnId,
    active: BTreeSet<TxnId>,
}

impl TxnSnapshot {
    pub fn new(max_id: TxnId, active: impl IntoIterator<Item = TxnId>) -> Self {
        Self {
            max_id,
            active: active.into_iter().collect(),
        }
    }

    /// Whether changes made by `txn_id` are visible through this snapshot.
    pub fn visible(&self, txn_id: TxnId) -> bool {
        txn_id < self.max_id && !self.active.contains(&txn_id)
    }

    /// Whether `txn_id` is part of the invisible set.
    pub fn contains(&self, txn_id: TxnId) -> bool {
        !self.visible(txn_id)
    }

    pub fn max_id(&self) -> TxnId {
        self.max_id
    }

    pub fn active(&self) -> &BTreeSet<TxnId> {
        &self.active
    }
}

/// Tracks open transactions so new snapshots know what to exclude.
///
/// Id allocation and snapshot capture happen under the same lock, so a
/// snapshot never misses a transaction that began before it.
pub struct SnapshotTracker {
    active: Mutex<BTreeSet<TxnId>>,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(BTreeSet::new()),
        }
    }

    /// Allocate an id for a new transaction, capture its snapshot and mark it open.
    pub fn begin(&self) -> (TxnId, TxnSnapshot) {
        let mut active = self.active.lock();
        let txn_id = next_txn_id();
        let snapshot = TxnSnapshot {
            max_id: txn_id,
            active: active.clone(),
        };
        active.insert(txn_id);
        (txn_id, snapshot)
    }

    /// Capture a snapshot of the current state without opening a transaction.
    pub fn capture(&self) -> TxnSnapshot {
        let active = self.active.lock();
        TxnSnapshot {
            max_id: peek_txn_id(),
            active: active.clone(),
        }
    }

    /// Mark `txn_id` as no longer open.
    pub fn end(&self, txn_id: TxnId) {
        self.active.lock().remove(&txn_id);
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

impl Default for SnapshotTracker {
    fn default() -> Self {
        Self::new()
    }
}
