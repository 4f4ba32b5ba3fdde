//! Per-key version chains.
//!
//! A [`TableItem`] keeps every update of one key in append order. Records are
//! never reordered: they are appended, removed when their transaction rolls
//! back, or trimmed by rollback-to-stable. Reads order the visible records by
//! `(commit_ts, append position)` and take the newest one.

use crate::error::DataError;
use crate::types::{Timestamp, TxnId};
use crate::value::Value;

use super::checkpoint::Checkpoint;
use super::snapshot::TxnSnapshot;
use super::update::Update;
use super::visibility::{self, TxnView};

#[derive(Debug, Clone, Default)]
pub struct TableItem {
    updates: Vec<Update>,
}

impl TableItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw chain in append order.
    pub fn updates(&self) -> &[Update] {
        &self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Newest record by `(commit_ts, position)` among those accepted by `pred`.
    fn resolve(&self, pred: impl Fn(&Update) -> bool) -> Option<&Update> {
        self.updates
            .iter()
            .enumerate()
            .filter(|&(_, u)| pred(u))
            .max_by_key(|(pos, u)| (u.commit_ts(), *pos))
            .map(|(_, u)| u)
    }

    /// Newest record by append position among those accepted by `pred`.
    fn resolve_latest(&self, pred: impl Fn(&Update) -> bool) -> Option<&Update> {
        self.updates.iter().rev().find(|&u| pred(u))
    }

    /// The last uncommitted write of `txn_id`.
    fn own_pending(&self, txn_id: TxnId) -> Option<&Update> {
        self.resolve_latest(|u| u.is_pending() && u.txn_id() == txn_id)
    }

    fn value_of(update: Option<&Update>) -> Value {
        update.map(|u| u.value().clone()).unwrap_or_default()
    }

    /// Whether a write by `txn_id` would conflict with another transaction.
    ///
    /// A write conflicts if another transaction has an uncommitted record here,
    /// or (when the writer reads through `snapshot`) if a record was committed
    /// by a transaction the writer cannot see.
    pub fn conflicts(&self, txn_id: TxnId, snapshot: Option<&TxnSnapshot>) -> bool {
        self.updates.iter().any(|u| {
            if u.is_pending() {
                u.txn_id() != txn_id
            } else {
                snapshot.is_some_and(|s| !s.visible(u.txn_id()))
            }
        })
    }

    /// Append `update` after checking existence against the current state.
    ///
    /// The current state is the writer's own uncommitted write if it has one,
    /// otherwise the newest committed record. With both flags false the append
    /// is unconditional.
    pub fn add_update(
        &mut self,
        update: Update,
        fail_if_exists: bool,
        fail_if_not_exists: bool,
    ) -> Result<(), DataError> {
        let own = if update.is_pending() {
            self.own_pending(update.txn_id())
        } else {
            None
        };
        let exists = own
            .or_else(|| self.resolve(Update::is_committed))
            .is_some_and(|u| !u.is_deleted());

        if fail_if_exists && exists {
            return Err(DataError::DuplicateKey);
        }
        if fail_if_not_exists && !exists {
            return Err(DataError::NotFound);
        }
        self.updates.push(update);
        Ok(())
    }

    /// The value visible at `timestamp`, or `NONE`.
    pub fn get(&self, timestamp: Timestamp) -> Value {
        Self::value_of(self.resolve(|u| visibility::visible_at(u, timestamp)))
    }

    /// The value visible in `ckpt` at `timestamp`, or `NONE`.
    pub fn get_checkpoint(&self, ckpt: &Checkpoint, timestamp: Timestamp) -> Value {
        Self::value_of(self.resolve(|u| visibility::visible_in_checkpoint(u, ckpt, timestamp)))
    }

    /// The value visible to `txn` under its snapshot and read timestamp.
    pub fn get_txn(&self, txn: &TxnView<'_>) -> Value {
        let update = self
            .own_pending(txn.id)
            .or_else(|| self.resolve(|u| visibility::visible_to_txn(u, txn, true)));
        Self::value_of(update)
    }

    /// Like [`get_txn`](Self::get_txn) but ignoring timestamps: the newest
    /// snapshot-visible record by append order.
    pub fn get_latest(&self, txn: &TxnView<'_>) -> Value {
        let update = self
            .own_pending(txn.id)
            .or_else(|| self.resolve_latest(|u| visibility::visible_to_txn(u, txn, false)));
        Self::value_of(update)
    }

    /// Whether any record in the newest visible timestamp bucket holds `value`.
    ///
    /// Several records may share a commit timestamp; any of them matching is
    /// enough. With nothing visible, only `NONE` matches.
    pub fn contains_any(&self, value: &Value, timestamp: Timestamp) -> bool {
        self.contains_any_by(value, |u| visibility::visible_at(u, timestamp))
    }

    /// [`contains_any`](Self::contains_any) against a checkpoint.
    pub fn contains_any_checkpoint(&self, ckpt: &Checkpoint, value: &Value) -> bool {
        self.contains_any_by(value, |u| visibility::in_checkpoint(u, ckpt))
    }

    fn contains_any_by(&self, value: &Value, pred: impl Fn(&Update) -> bool) -> bool {
        let Some(newest) = self.resolve(&pred) else {
            return value.is_none();
        };
        let bucket = newest.commit_ts();
        self.updates
            .iter()
            .filter(|&u| pred(u) && u.commit_ts() == bucket)
            .any(|u| u.value() == value)
    }

    pub fn has_pending(&self, txn_id: TxnId) -> bool {
        self.own_pending(txn_id).is_some()
    }

    /// Finalize every pending record of `txn_id`. Returns how many were fixed.
    pub fn fix_timestamps(
        &mut self,
        txn_id: TxnId,
        commit_ts: Timestamp,
        durable_ts: Timestamp,
    ) -> usize {
        let mut fixed = 0;
        for u in self
            .updates
            .iter_mut()
            .filter(|u| u.is_pending() && u.txn_id() == txn_id)
        {
            u.fix_timestamps(commit_ts, durable_ts);
            fixed += 1;
        }
        fixed
    }

    /// Remove every record owned by `txn_id`. Returns how many were removed.
    pub fn rollback_updates(&mut self, txn_id: TxnId) -> usize {
        let before = self.updates.len();
        self.updates.retain(|u| u.txn_id() != txn_id);
        before - self.updates.len()
    }

    /// Drop every committed record durable after `timestamp` and every record
    /// whose transaction is not visible in `snapshot`. Returns how many were removed.
    ///
    /// Without a snapshot, uncommitted records are kept.
    pub fn rollback_to_stable(
        &mut self,
        timestamp: Timestamp,
        snapshot: Option<&TxnSnapshot>,
    ) -> usize {
        let before = self.updates.len();
        self.updates.retain(|u| {
            let stable = !(u.is_committed() && u.durable_ts() > timestamp);
            let determinate = snapshot.is_none_or(|s| s.visible(u.txn_id()));
            stable && determinate
        });
        before - self.updates.len()
    }
}
