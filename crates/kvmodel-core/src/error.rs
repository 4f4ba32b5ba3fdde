//! Error types for all model operations.
//!
//! Every error maps to the numeric status the modeled engine would return, see
//! [`Error::code`]. The non-raising API uses [`status`] to turn an outcome into
//! such a code.

use thiserror::Error;

use crate::types::{StatusCode, Timestamp, TxnId, status as codes};
use crate::value::Value;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Transaction(#[from] TxnError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Opaque failure surfaced from below, carried verbatim. The model never
    /// raises it itself; harnesses use it to inject engine codes.
    #[error("engine error {0}")]
    Engine(StatusCode),
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("duplicate key")]
    DuplicateKey,

    #[error("key not found")]
    NotFound,

    #[error("the NONE sentinel cannot be used as a key")]
    InvalidKey,

    #[error("invalid range: start {start} is after stop {stop}")]
    InvalidRange { start: Value, stop: Value },
}

#[derive(Debug, Error)]
pub enum TxnError {
    #[error("write conflict for transaction {txn_id} on key {key}")]
    Conflict { txn_id: TxnId, key: Value },

    #[error("no update from transaction {txn_id} for key {key}")]
    UpdateNotFound { txn_id: TxnId, key: Value },

    #[error("durable timestamp {durable} is before commit timestamp {commit}")]
    InvalidTimestamp {
        commit: Timestamp,
        durable: Timestamp,
    },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),
}

impl Error {
    /// The status code the engine would report for this error.
    pub fn code(&self) -> StatusCode {
        match self {
            Error::Data(DataError::DuplicateKey) => codes::DUPLICATE_KEY,
            Error::Data(DataError::NotFound) => codes::NOT_FOUND,
            Error::Data(DataError::InvalidKey | DataError::InvalidRange { .. }) => codes::EINVAL,
            Error::Transaction(TxnError::InvalidTimestamp { .. }) => codes::EINVAL,
            Error::Transaction(_) => codes::ROLLBACK,
            Error::Schema(SchemaError::TableNotFound(_) | SchemaError::CheckpointNotFound(_)) => {
                codes::ENOENT
            }
            Error::Schema(_) => codes::EEXIST,
            Error::Config(_) => codes::EINVAL,
            Error::Engine(code) => *code,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Data(DataError::NotFound))
    }
}

/// Convert an operation outcome into a status code (`OK` on success).
pub fn status<T>(result: &Result<T>) -> StatusCode {
    match result {
        Ok(_) => codes::OK,
        Err(e) => e.code(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
