//! # kvmodel
//!
//! An in-memory, transactional, multi-version key-value model of a
//! timestamp-versioned storage engine.
//!
//! The model keeps every version of every key, resolves reads by timestamp,
//! checkpoint or transaction snapshot, assigns commit timestamps to a
//! transaction's updates only when it commits, and can discard all history above
//! a stable timestamp. Test harnesses use it as ground truth to check a real
//! engine against.
//!
//! ## Quick Start
//!
//! ```
//! use kvmodel_core::api::Database;
//! use kvmodel_core::types::TS_NONE;
//! use kvmodel_core::value::{NONE, Value};
//!
//! let db = Database::new();
//! let table = db.create_table("orders").execute().unwrap();
//! let key = Value::from("order-1");
//!
//! // Non-transactional write at timestamp 10.
//! table.insert(&key, Value::from(100), 10, false).unwrap();
//!
//! // A transaction's writes get their timestamp at commit.
//! let txn = db.begin_transaction();
//! txn.update(&table, &key, Value::from(200), false).unwrap();
//! txn.commit(20, TS_NONE).unwrap();
//!
//! assert_eq!(table.get(&key, 15).unwrap(), Value::from(100));
//! assert_eq!(table.get(&key, TS_NONE).unwrap(), Value::from(200));
//!
//! // Forget everything after timestamp 15.
//! db.set_stable_timestamp(15);
//! db.rollback_to_stable();
//! assert_eq!(table.get(&key, TS_NONE).unwrap(), Value::from(100));
//! assert_ne!(table.get(&key, TS_NONE).unwrap(), NONE);
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod mvcc;
pub mod types;
pub mod value;

pub use api::{Database, Table, Transaction};
pub use error::{Error, Result};
pub use value::Value;
