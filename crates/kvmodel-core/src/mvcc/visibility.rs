//! MVCC visibility rules for the three read modes.
//!
//! - **timestamp**: committed and `commit_ts <= read timestamp`.
//! - **checkpoint**: committed by a transaction visible in the checkpoint
//!   snapshot, durable at or below the stable timestamp, and `commit_ts <=` the
//!   read timestamp.
//! - **transaction**: the reader's own writes, plus committed writes of
//!   transactions visible in the reader's snapshot with `commit_ts <=` its read
//!   timestamp.
//!
//! A read timestamp of `TS_NONE` places no bound.

use super::checkpoint::Checkpoint;
use super::snapshot::TxnSnapshot;
use super::update::Update;
use crate::types::{TS_LATEST, TS_NONE, Timestamp, TxnId};

/// The parts of an open transaction that decide what it can see.
#[derive(Debug, Clone, Copy)]
pub struct TxnView<'a> {
    pub id: TxnId,
    pub snapshot: &'a TxnSnapshot,
    pub read_ts: Timestamp,
}

/// Turn a read timestamp into an inclusive upper bound.
pub fn read_bound(timestamp: Timestamp) -> Timestamp {
    if timestamp == TS_NONE {
        TS_LATEST
    } else {
        timestamp
    }
}

pub fn visible_at(update: &Update, timestamp: Timestamp) -> bool {
    update.is_committed() && update.commit_ts() <= read_bound(timestamp)
}

/// Whether `update` belongs to the checkpoint, ignoring any read timestamp.
pub fn in_checkpoint(update: &Update, ckpt: &Checkpoint) -> bool {
    update.is_committed()
        && ckpt.snapshot().is_none_or(|s| s.visible(update.txn_id()))
        && (ckpt.stable_timestamp() == TS_NONE || update.durable_ts() <= ckpt.stable_timestamp())
}

pub fn visible_in_checkpoint(update: &Update, ckpt: &Checkpoint, timestamp: Timestamp) -> bool {
    in_checkpoint(update, ckpt) && update.commit_ts() <= read_bound(timestamp)
}

/// Whether a committed write of another transaction is visible to `txn`.
///
/// The reader's own writes are handled separately since they take precedence
/// over everything committed.
pub fn visible_to_txn(update: &Update, txn: &TxnView<'_>, use_timestamps: bool) -> bool {
    update.is_committed()
        && txn.snapshot.visible(update.txn_id())
        && (!use_timestamps || update.commit_ts() <= read_bound(txn.read_ts))
}
