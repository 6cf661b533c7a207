pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::app_config::{StoreBackend, StoreConfig};
use crate::domain::error::Result;
use crate::domain::store_model::{RegistryPatch, RegistrySnapshot, StoredEntry, WriteBatch};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Namespace-per-dataset document store plus the single metadata registry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Applies every write in `batch` or none of them.
    async fn commit_batch(&self, batch: WriteBatch) -> Result<()>;

    /// `None` when the registry has never been written.
    async fn read_registry(&self) -> Result<Option<RegistrySnapshot>>;

    async fn merge_registry(&self, patch: RegistryPatch) -> Result<()>;

    /// Every entry of `namespace`, in no guaranteed order.
    async fn scan_namespace(&self, namespace: &str) -> Result<Vec<StoredEntry>>;
}

pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::connect(&config.sqlite_path).await?)),
    }
}
