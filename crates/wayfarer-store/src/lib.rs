pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use wayfarer_core::config::{StoreBackend, StoreConfig};
use wayfarer_core::error::Result;
use wayfarer_core::traits::CheckpointStore;

pub use memory::InMemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

/// Open the checkpoint store selected by config.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn CheckpointStore>> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteCheckpointStore::open(
            &config.resolved_path(),
        )?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryCheckpointStore::new())),
    }
}
