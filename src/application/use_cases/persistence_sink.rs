use std::sync::Arc;

use crate::domain::dataset::{FieldValue, Record};
use crate::domain::error::{AppError, Result};
use crate::domain::naming::{derive_dataset_name, storage_key};
use crate::domain::store_model::{EntryFields, RegistryPatch, WriteBatch, ROW_INDEX_FIELD};
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::store::DocumentStore;

const LOG_SOURCE: &str = "Upload";

#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceOutcome {
    Persisted {
        dataset: String,
        written: usize,
        skipped: usize,
        /// Whether the registry read-back showed the header list.
        headers_verified: bool,
    },
    /// Nothing to write.
    Skipped { dataset: String },
    Failed(AppError),
}

/// Writes a dataset to the document store and registers it in the
/// metadata registry.
pub struct PersistenceSink {
    store: Arc<dyn DocumentStore>,
    activity: Arc<ActivityLog>,
}

impl PersistenceSink {
    pub fn new(store: Arc<dyn DocumentStore>, activity: Arc<ActivityLog>) -> Self {
        Self { store, activity }
    }

    pub async fn persist(
        &self,
        records: &[Record],
        file_name: &str,
        identifier_column: &str,
        headers: &[String],
    ) -> PersistenceOutcome {
        let dataset = match derive_dataset_name(file_name) {
            Ok(name) => name,
            Err(e) => {
                tracing::error!(file = %file_name, error = %e, "Could not name dataset");
                self.activity.error(LOG_SOURCE, &e.to_string());
                return PersistenceOutcome::Failed(e);
            }
        };

        if records.is_empty() {
            return PersistenceOutcome::Skipped { dataset };
        }

        let (batch, skipped) = self.build_batch(&dataset, records, identifier_column);
        let written = batch.distinct_keys();

        if let Err(e) = self.store.commit_batch(batch).await {
            return self.fail(&dataset, e);
        }
        tracing::info!(dataset = %dataset, rows = written, "Uploaded rows");

        let headers_verified = match self.register(&dataset, headers).await {
            Ok(verified) => verified,
            Err(e) => return self.fail(&dataset, e),
        };

        self.activity.info(
            LOG_SOURCE,
            &format!("Uploaded {} rows to {}", written, dataset),
        );

        PersistenceOutcome::Persisted {
            dataset,
            written,
            skipped,
            headers_verified,
        }
    }

    fn build_batch(
        &self,
        dataset: &str,
        records: &[Record],
        identifier_column: &str,
    ) -> (WriteBatch, usize) {
        let mut batch = WriteBatch::replacing(dataset);
        let mut skipped = 0;

        for (index, record) in records.iter().enumerate() {
            let identifier = record
                .text(identifier_column)
                .filter(|id| !id.trim().is_empty());

            let Some(identifier) = identifier else {
                skipped += 1;
                tracing::warn!(dataset = %dataset, row = index, "Skipping row with invalid ID");
                self.activity.warn(
                    LOG_SOURCE,
                    &format!(
                        "Skipping row {} of {} with invalid ID in column '{}'",
                        index, dataset, identifier_column
                    ),
                );
                continue;
            };

            let mut fields: EntryFields = record
                .fields()
                .iter()
                .map(|(label, value)| (label.clone(), value.clone()))
                .collect();
            fields.insert(
                ROW_INDEX_FIELD.to_string(),
                FieldValue::Number(index as f64),
            );

            batch.put(storage_key(identifier), fields);
        }

        (batch, skipped)
    }

    /// Merge-writes the name and headers, reads them back, and rewrites the
    /// headers once if they did not land.
    async fn register(&self, dataset: &str, headers: &[String]) -> Result<bool> {
        self.store
            .merge_registry(RegistryPatch::register(dataset, headers))
            .await?;

        if self.headers_present(dataset).await? {
            return Ok(true);
        }

        tracing::error!(dataset = %dataset, "Header verification failed, retrying");
        self.store
            .merge_registry(RegistryPatch::headers_only(dataset, headers))
            .await?;

        let verified = self.headers_present(dataset).await?;
        if !verified {
            tracing::error!(dataset = %dataset, "Headers still missing after retry");
        }
        Ok(verified)
    }

    async fn headers_present(&self, dataset: &str) -> Result<bool> {
        let registry = self.store.read_registry().await?;
        Ok(registry
            .as_ref()
            .and_then(|r| r.headers_for(dataset))
            .is_some())
    }

    fn fail(&self, dataset: &str, cause: AppError) -> PersistenceOutcome {
        let error = AppError::BatchCommit {
            dataset: dataset.to_string(),
            cause: cause.to_string(),
        };
        tracing::error!(dataset = %dataset, error = %cause, "Upload failed");
        self.activity.error(LOG_SOURCE, &error.to_string());
        PersistenceOutcome::Failed(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::MemoryStore;

    fn record(position: usize, id: &str, value: f64) -> Record {
        Record::with_fields(
            position,
            vec![
                ("Country".to_string(), FieldValue::Text(id.to_string())),
                ("2020".to_string(), FieldValue::Number(value)),
            ],
        )
    }

    fn headers() -> Vec<String> {
        vec!["Country".to_string(), "2020".to_string()]
    }

    fn sink(store: &Arc<MemoryStore>) -> (PersistenceSink, Arc<ActivityLog>) {
        let activity = Arc::new(ActivityLog::new());
        (
            PersistenceSink::new(store.clone(), activity.clone()),
            activity,
        )
    }

    #[tokio::test]
    async fn test_persist_writes_entries_and_registry() {
        let store = Arc::new(MemoryStore::new());
        let (sink, _) = sink(&store);
        let records = vec![record(0, "PH", 5.0), record(1, "A/B", 7.0)];

        let outcome = sink
            .persist(&records, "Stock 2020.xlsx", "Country", &headers())
            .await;
        assert_eq!(
            outcome,
            PersistenceOutcome::Persisted {
                dataset: "stock_2020".to_string(),
                written: 2,
                skipped: 0,
                headers_verified: true,
            }
        );

        let entries = store.scan_namespace("stock_2020").await.unwrap();
        let slash = entries.iter().find(|e| e.key == "A-B").unwrap();
        assert_eq!(slash.row_index(), 1.0);
        assert_eq!(slash.fields.get("Country"), Some(&FieldValue::Text("A/B".into())));

        let registry = store.read_registry().await.unwrap().unwrap();
        assert!(registry.names.contains("stock_2020"));
        assert_eq!(registry.headers_for("stock_2020"), Some(headers().as_slice()));
    }

    #[tokio::test]
    async fn test_invalid_identifiers_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let (sink, activity) = sink(&store);
        let records = vec![record(0, "PH", 5.0), record(1, "  ", 7.0)];

        let outcome = sink.persist(&records, "flow.csv", "Country", &headers()).await;
        assert!(matches!(
            outcome,
            PersistenceOutcome::Persisted { written: 1, skipped: 1, .. }
        ));
        assert!(activity.entries().iter().any(|e| e.level == "WARN"));
    }

    #[tokio::test]
    async fn test_repeated_identifiers_count_once() {
        let store = Arc::new(MemoryStore::new());
        let (sink, activity) = sink(&store);
        let records = vec![
            record(0, "PH", 5.0),
            record(1, "JP", 3.0),
            record(2, "PH", 9.0),
        ];

        let outcome = sink.persist(&records, "flow.csv", "Country", &headers()).await;
        assert!(matches!(
            outcome,
            PersistenceOutcome::Persisted { written: 2, skipped: 0, .. }
        ));
        assert_eq!(store.scan_namespace("flow").await.unwrap().len(), 2);
        assert!(activity
            .entries()
            .iter()
            .any(|e| e.message == "Uploaded 2 rows to flow"));
    }

    #[tokio::test]
    async fn test_batch_failure_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_batches(1).await;
        let (sink, activity) = sink(&store);

        let outcome = sink
            .persist(&[record(0, "PH", 5.0)], "flow.csv", "Country", &headers())
            .await;

        let PersistenceOutcome::Failed(AppError::BatchCommit { dataset, .. }) = outcome else {
            panic!("expected batch failure, got {:?}", outcome);
        };
        assert_eq!(dataset, "flow");
        assert!(store.read_registry().await.unwrap().is_none());

        let errors: Vec<_> = activity
            .entries()
            .into_iter()
            .filter(|e| e.level == "ERROR")
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("Upload failed for flow: "));
    }

    #[tokio::test]
    async fn test_lost_headers_are_retried_once() {
        let store = Arc::new(MemoryStore::new());
        store.drop_header_writes(1).await;
        let (sink, _) = sink(&store);

        let outcome = sink
            .persist(&[record(0, "PH", 5.0)], "flow.csv", "Country", &headers())
            .await;

        assert!(matches!(
            outcome,
            PersistenceOutcome::Persisted { headers_verified: true, .. }
        ));
        assert_eq!(store.registry_writes().await, 2);
    }

    #[tokio::test]
    async fn test_headers_lost_twice_is_logged_only() {
        let store = Arc::new(MemoryStore::new());
        store.drop_header_writes(2).await;
        let (sink, activity) = sink(&store);

        let outcome = sink
            .persist(&[record(0, "PH", 5.0)], "flow.csv", "Country", &headers())
            .await;

        assert!(matches!(
            outcome,
            PersistenceOutcome::Persisted { headers_verified: false, .. }
        ));
        assert_eq!(store.registry_writes().await, 2);
        assert!(activity.entries().iter().all(|e| e.level != "ERROR"));
    }

    #[tokio::test]
    async fn test_empty_dataset_is_not_written() {
        let store = Arc::new(MemoryStore::new());
        let (sink, _) = sink(&store);

        let outcome = sink.persist(&[], "flow.csv", "Country", &headers()).await;
        assert_eq!(
            outcome,
            PersistenceOutcome::Skipped {
                dataset: "flow".to_string()
            }
        );
        assert!(store.read_registry().await.unwrap().is_none());
    }
}
