use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::dataset::{Dataset, FieldValue, Record};
use crate::domain::error::Result;
use crate::domain::naming::recovered_file_name;
use crate::domain::store_model::{RegistryPatch, StoredEntry, ROW_INDEX_FIELD};
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::store::DocumentStore;

use super::header_recovery::recover_headers;

const LOG_SOURCE: &str = "Recovery";

#[derive(Debug, Default)]
pub struct RecoveredState {
    pub datasets: BTreeMap<String, Dataset>,
    /// First recovered name in lexicographic order.
    pub active: Option<String>,
    /// Datasets whose header list had to be rebuilt from entry keys.
    pub recovered_headers: Vec<String>,
}

/// Reads every registered dataset back from the store.
pub struct RecoveryLoader {
    store: Arc<dyn DocumentStore>,
    activity: Arc<ActivityLog>,
}

impl RecoveryLoader {
    pub fn new(store: Arc<dyn DocumentStore>, activity: Arc<ActivityLog>) -> Self {
        Self { store, activity }
    }

    pub async fn load(&self) -> Result<RecoveredState> {
        let Some(registry) = self.store.read_registry().await? else {
            tracing::info!("No dataset registry found, starting fresh");
            return Ok(RecoveredState::default());
        };
        if registry.names.is_empty() {
            tracing::info!("No datasets have been uploaded yet");
            return Ok(RecoveredState::default());
        }

        tracing::info!(count = registry.names.len(), "Loading stored datasets");
        let mut state = RecoveredState::default();
        let mut patch = RegistryPatch::default();

        for name in &registry.names {
            let mut entries = match self.store.scan_namespace(name).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dataset = %name, error = %e, "Failed to read dataset");
                    self.activity
                        .warn(LOG_SOURCE, &format!("Could not load {}: {}", name, e));
                    continue;
                }
            };

            if entries.is_empty() {
                tracing::warn!(dataset = %name, "Dataset is empty");
                self.activity
                    .warn(LOG_SOURCE, &format!("Dataset {} is empty", name));
                continue;
            }

            entries.sort_by(|a, b| a.row_index().total_cmp(&b.row_index()));

            let headers = match registry.headers_for(name) {
                Some(headers) => headers.to_vec(),
                None => {
                    let headers = recover_headers(entries[0].fields.keys());
                    tracing::warn!(
                        dataset = %name,
                        headers = ?headers,
                        "Recovered missing headers"
                    );
                    patch.headers.insert(name.clone(), headers.clone());
                    state.recovered_headers.push(name.clone());
                    headers
                }
            };

            let records = entries
                .into_iter()
                .map(|entry| into_record(entry, &headers))
                .collect();

            state.datasets.insert(
                name.clone(),
                Dataset {
                    name: name.clone(),
                    file_name: recovered_file_name(name),
                    headers,
                    records,
                },
            );
        }

        if !patch.is_empty() {
            if let Err(e) = self.store.merge_registry(patch).await {
                tracing::warn!(error = %e, "Failed to save recovered headers");
            } else {
                tracing::info!("Saved recovered headers");
            }
        }

        state.active = state.datasets.keys().next().cloned();
        Ok(state)
    }
}

/// Fields in header order first, then any keys the headers do not name.
fn into_record(entry: StoredEntry, headers: &[String]) -> Record {
    let position = entry.row_index().max(0.0) as usize;
    let mut fields = entry.fields;
    fields.remove(ROW_INDEX_FIELD);

    let mut ordered: Vec<(String, FieldValue)> = Vec::with_capacity(fields.len());
    for header in headers {
        if let Some(value) = fields.remove(header) {
            ordered.push((header.clone(), value));
        }
    }
    ordered.extend(fields);

    Record::with_fields(position, ordered)
}
