//! Multi-version concurrency control: update records, version chains,
//! snapshots, checkpoints and the visibility rules that tie them together.

pub mod checkpoint;
pub mod snapshot;
pub mod update;
pub mod version_chain;
pub mod visibility;

pub use checkpoint::Checkpoint;
pub use snapshot::{SnapshotTracker, TxnSnapshot};
pub use update::{Update, UpdateState};
pub use version_chain::TableItem;
pub use visibility::TxnView;
