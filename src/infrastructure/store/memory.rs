use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::DocumentStore;
use crate::domain::error::{AppError, Result};
use crate::domain::store_model::{
    EntryFields, RegistryPatch, RegistrySnapshot, StoredEntry, WriteBatch,
};

/// Process-local store. Also lets callers inject the failures a remote
/// store exhibits: rejected batches, lost header writes, failing scans.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    namespaces: HashMap<String, BTreeMap<String, EntryFields>>,
    registry: Option<RegistrySnapshot>,
    registry_writes: usize,
    faults: Faults,
}

#[derive(Default)]
struct Faults {
    failing_batches: usize,
    dropped_header_writes: usize,
    failing_scans: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` batches are rejected without applying anything.
    pub async fn fail_next_batches(&self, count: usize) {
        self.state.write().await.faults.failing_batches = count;
    }

    /// The next `count` registry merges keep their names but lose their
    /// header lists.
    pub async fn drop_header_writes(&self, count: usize) {
        self.state.write().await.faults.dropped_header_writes = count;
    }

    pub async fn fail_scans_of(&self, namespace: &str) {
        self.state
            .write()
            .await
            .faults
            .failing_scans
            .insert(namespace.to_string());
    }

    /// Number of registry merges applied so far.
    pub async fn registry_writes(&self) -> usize {
        self.state.read().await.registry_writes
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn commit_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.write().await;

        if state.faults.failing_batches > 0 {
            state.faults.failing_batches -= 1;
            return Err(AppError::StoreError(format!(
                "batch for {} rejected by store",
                batch.namespace
            )));
        }

        let namespace = state.namespaces.entry(batch.namespace).or_default();
        if batch.replace {
            namespace.clear();
        }
        for entry in batch.puts {
            namespace.insert(entry.key, entry.fields);
        }

        Ok(())
    }

    async fn read_registry(&self) -> Result<Option<RegistrySnapshot>> {
        Ok(self.state.read().await.registry.clone())
    }

    async fn merge_registry(&self, mut patch: RegistryPatch) -> Result<()> {
        let mut state = self.state.write().await;

        if state.faults.dropped_header_writes > 0 {
            state.faults.dropped_header_writes -= 1;
            patch.headers.clear();
        }

        state
            .registry
            .get_or_insert_with(RegistrySnapshot::default)
            .apply(&patch);
        state.registry_writes += 1;

        Ok(())
    }

    async fn scan_namespace(&self, namespace: &str) -> Result<Vec<StoredEntry>> {
        let state = self.state.read().await;

        if state.faults.failing_scans.contains(namespace) {
            return Err(AppError::StoreError(format!(
                "scan of {} failed",
                namespace
            )));
        }

        Ok(state
            .namespaces
            .get(namespace)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, fields)| StoredEntry {
                        key: key.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::FieldValue;

    fn fields(value: &str) -> EntryFields {
        EntryFields::from([("Country".to_string(), FieldValue::Text(value.to_string()))])
    }

    #[tokio::test]
    async fn test_batch_puts_overwrite_by_key() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new("stock");
        batch.put("PH", fields("first"));
        batch.put("PH", fields("second"));
        store.commit_batch(batch).await.unwrap();

        let entries = store.scan_namespace("stock").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fields, fields("second"));
    }

    #[tokio::test]
    async fn test_replacing_batch_clears_namespace() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new("stock");
        batch.put("PH", fields("PH"));
        batch.put("JP", fields("JP"));
        store.commit_batch(batch).await.unwrap();

        let mut batch = WriteBatch::replacing("stock");
        batch.put("US", fields("US"));
        store.commit_batch(batch).await.unwrap();

        let entries = store.scan_namespace("stock").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "US");
    }

    #[tokio::test]
    async fn test_failed_batch_applies_nothing() {
        let store = MemoryStore::new();
        store.fail_next_batches(1).await;

        let mut batch = WriteBatch::new("stock");
        batch.put("PH", fields("PH"));
        assert!(store.commit_batch(batch.clone()).await.is_err());
        assert!(store.scan_namespace("stock").await.unwrap().is_empty());

        store.commit_batch(batch).await.unwrap();
        assert_eq!(store.scan_namespace("stock").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_header_write_keeps_name() {
        let store = MemoryStore::new();
        store.drop_header_writes(1).await;

        let headers = vec!["Country".to_string()];
        store
            .merge_registry(RegistryPatch::register("stock", &headers))
            .await
            .unwrap();

        let registry = store.read_registry().await.unwrap().unwrap();
        assert!(registry.names.contains("stock"));
        assert_eq!(registry.headers_for("stock"), None);
        assert_eq!(store.registry_writes().await, 1);
    }

    #[tokio::test]
    async fn test_registry_absent_until_written() {
        let store = MemoryStore::new();
        assert!(store.read_registry().await.unwrap().is_none());
    }
}
