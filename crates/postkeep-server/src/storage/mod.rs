//! Storage layer
//!
//! The in-memory [`RecordStore`] is the single authority while the process
//! runs; [`PersistenceEngine`] keeps the day-stamped snapshot file in step
//! with it.

pub mod memory;
pub mod persistence;
pub mod snapshot;

pub use memory::RecordStore;
pub use persistence::{PersistenceEngine, PersistenceOptions};
pub use snapshot::{LoadPolicy, SnapshotFile};
