//! Core types: transaction IDs, timestamps, status codes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction identifier (monotonically increasing, process-wide).
pub type TxnId = u64;

/// Logical timestamp.
pub type Timestamp = u64;

/// Numeric status returned by the non-raising API.
pub type StatusCode = i32;

/// "No timestamp": reads see the latest committed state, writes carry commit timestamp 0.
pub const TS_NONE: Timestamp = 0;

/// The largest representable timestamp.
pub const TS_LATEST: Timestamp = u64::MAX;

/// Reserved id that is never handed out.
pub const TXN_NONE: TxnId = 0;

/// Name used by `Database::create_checkpoint(None)`.
pub const DEFAULT_CHECKPOINT_NAME: &str = "default";

/// Status codes shared with the engine being modeled.
pub mod status {
    use super::StatusCode;

    pub const OK: StatusCode = 0;
    pub const ENOENT: StatusCode = 2;
    pub const EEXIST: StatusCode = 17;
    pub const EINVAL: StatusCode = 22;
    pub const ROLLBACK: StatusCode = -31800;
    pub const DUPLICATE_KEY: StatusCode = -31801;
    pub const NOT_FOUND: StatusCode = -31803;
}

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh transaction id.
///
/// Direct (non-transactional) writes consume an id too, so a snapshot captured
/// before the write can never observe it.
pub fn next_txn_id() -> TxnId {
    NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst)
}

/// The id the next call to [`next_txn_id`] would return.
pub(crate) fn peek_txn_id() -> TxnId {
    NEXT_TXN_ID.load(Ordering::SeqCst)
}
