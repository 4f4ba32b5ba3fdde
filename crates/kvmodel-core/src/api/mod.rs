//! Public API: database registry, tables, transactions and the verify cursor.

pub mod builders;
pub mod database;
pub mod table;
pub mod transaction;
pub mod verify;

pub use builders::TableBuilder;
pub use database::Database;
pub use table::{Table, TableId};
pub use transaction::{Transaction, TxnState};
pub use verify::VerifyCursor;
