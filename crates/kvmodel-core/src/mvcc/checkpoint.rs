//! Immutable checkpoint handles.

use std::sync::Arc;

use super::snapshot::TxnSnapshot;
use crate::types::Timestamp;

#[derive(Debug)]
struct CheckpointInner {
    name: String,
    snapshot: Option<TxnSnapshot>,
    stable_timestamp: Timestamp,
}

/// A named point-in-time view.
///
/// The view is defined by bounds rather than a copy of the data: a record is
/// part of the checkpoint iff it was committed by a transaction visible in the
/// checkpoint's snapshot and, on timestamped tables, its durable timestamp is at
/// or below the stable timestamp (`TS_NONE` means unbounded).
///
/// Cheaply clonable; never changes after creation.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    inner: Arc<CheckpointInner>,
}

impl Checkpoint {
    pub fn new(
        name: impl Into<String>,
        snapshot: Option<TxnSnapshot>,
        stable_timestamp: Timestamp,
    ) -> Self {
        Self {
            inner: Arc::new(CheckpointInner {
                name: name.into(),
                snapshot,
                stable_timestamp,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn snapshot(&self) -> Option<&TxnSnapshot> {
        self.inner.snapshot.as_ref()
    }

    pub fn stable_timestamp(&self) -> Timestamp {
        self.inner.stable_timestamp
    }
}
