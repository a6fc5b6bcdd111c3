//! Storage ports for live settings and backup snapshots, with in-memory
//! implementations.

pub mod memory;
pub mod traits;

pub use memory::{InMemorySettingsStore, InMemorySnapshotStore};
pub use traits::{SettingsStore, SnapshotStore, StorageError};
