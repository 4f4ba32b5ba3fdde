//! A single versioned write wrapping a value with MVCC metadata.
//!
//! Updates are built in one of two modes:
//!
//! - **direct**: the timestamps are known up front (non-transactional writes);
//!   the update is committed from the moment it exists.
//! - **pending**: the owning transaction is still open, so the timestamps are
//!   unknown. The transaction finalizes the update exactly once at commit via
//!   [`Update::fix_timestamps`].
//!
//! A tombstone is an update whose value is [`Value::None`].

use crate::types::{TS_NONE, Timestamp, TxnId, next_txn_id};
use crate::value::Value;

/// Lifecycle of an update's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Created with fixed timestamps by a non-transactional write.
    Direct,
    /// Owned by an open transaction; timestamps not assigned yet.
    Pending,
    /// Timestamps assigned by the owning transaction's commit.
    Committed,
}

/// One versioned write.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    value: Value,
    txn_id: TxnId,
    commit_ts: Timestamp,
    durable_ts: Timestamp,
    state: UpdateState,
}

impl Update {
    /// Create a committed update at `timestamp`. Consumes a fresh transaction id.
    pub fn direct(value: Value, timestamp: Timestamp) -> Self {
        Self {
            value,
            txn_id: next_txn_id(),
            commit_ts: timestamp,
            durable_ts: timestamp,
            state: UpdateState::Direct,
        }
    }

    /// Create an update owned by the open transaction `txn_id`.
    pub fn pending(value: Value, txn_id: TxnId) -> Self {
        Self {
            value,
            txn_id,
            commit_ts: TS_NONE,
            durable_ts: TS_NONE,
            state: UpdateState::Pending,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts
    }

    pub fn durable_ts(&self) -> Timestamp {
        self.durable_ts
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn is_deleted(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_pending(&self) -> bool {
        self.state == UpdateState::Pending
    }

    pub fn is_committed(&self) -> bool {
        !self.is_pending()
    }

    /// Assign the final timestamps of a pending update.
    ///
    /// # Panics
    ///
    /// If the update is not pending (already finalized or created direct), or if
    /// `durable_ts < commit_ts`.
    pub fn fix_timestamps(&mut self, commit_ts: Timestamp, durable_ts: Timestamp) {
        assert!(
            self.state == UpdateState::Pending,
            "update of transaction {} finalized twice (state {:?})",
            self.txn_id,
            self.state
        );
        assert!(
            commit_ts <= durable_ts,
            "durable timestamp {durable_ts} is before commit timestamp {commit_ts}"
        );
        self.commit_ts = commit_ts;
        self.durable_ts = durable_ts;
        self.state = UpdateState::Committed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_update() {
        let u = Update::direct(Value::from(1), 10);
        assert_eq!(u.commit_ts(), 10);
        assert_eq!(u.durable_ts(), 10);
        assert!(u.is_committed());
        assert!(!u.is_deleted());
        assert_eq!(u.state(), UpdateState::Direct);
    }

    #[test]
    fn test_direct_updates_get_distinct_ids() {
        let a = Update::direct(Value::from(1), 1);
        let b = Update::direct(Value::from(1), 1);
        assert_ne!(a.txn_id(), b.txn_id());
    }

    #[test]
    fn test_pending_then_fixed() {
        let mut u = Update::pending(Value::None, 42);
        assert!(u.is_pending());
        assert!(u.is_deleted());
        u.fix_timestamps(5, 7);
        assert_eq!(u.state(), UpdateState::Committed);
        assert_eq!(u.commit_ts(), 5);
        assert_eq!(u.durable_ts(), 7);
        assert_eq!(u.txn_id(), 42);
    }

    #[test]
    #[should_panic(expected = "finalized twice")]
    fn test_fix_twice_panics() {
        let mut u = Update::pending(Value::from("v"), 1);
        u.fix_timestamps(5, 5);
        u.fix_timestamps(6, 6);
    }

    #[test]
    #[should_panic(expected = "finalized twice")]
    fn test_fix_direct_panics() {
        let mut u = Update::direct(Value::from("v"), 3);
        u.fix_timestamps(5, 5);
    }

    #[test]
    #[should_panic(expected = "before commit timestamp")]
    fn test_fix_durable_before_commit_panics() {
        let mut u = Update::pending(Value::from("v"), 1);
        u.fix_timestamps(5, 4);
    }
}
