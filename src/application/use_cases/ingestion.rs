use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use crate::domain::dataset::{Dataset, DatasetSummary};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::spreadsheet::read_first_sheet;
use crate::infrastructure::store::DocumentStore;

use super::persistence_sink::{PersistenceOutcome, PersistenceSink};
use super::sheet_normalizer::normalize_sheet;
use super::workspace::Workspace;

const LOG_SOURCE: &str = "Ingestion";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReceipt {
    pub dataset: DatasetSummary,
    pub identifier_column: String,
    pub headers: Vec<String>,
}

/// Result of a finished ingestion. The dataset is already in the workspace;
/// `persistence` resolves once the store write settles.
#[derive(Debug)]
pub struct IngestionHandle {
    pub receipt: IngestionReceipt,
    pub persistence: oneshot::Receiver<PersistenceOutcome>,
}

/// Parses uploads, installs them in the workspace and hands them to the
/// persistence sink without waiting for it.
#[derive(Clone)]
pub struct IngestionService {
    workspace: Arc<Workspace>,
    activity: Arc<ActivityLog>,
    sink: Arc<PersistenceSink>,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        workspace: Arc<Workspace>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        let sink = Arc::new(PersistenceSink::new(store, activity.clone()));
        Self {
            workspace,
            activity,
            sink,
        }
    }

    pub async fn ingest(&self, file: UploadedFile) -> Result<IngestionHandle> {
        let file_name = file.file_name.clone();

        let dataset = match parse_upload(file).await {
            Ok(dataset) => dataset,
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Upload rejected");
                self.activity.error(LOG_SOURCE, &e.to_string());
                return Err(e);
            }
        };

        let dataset = self.workspace.install_upload(dataset);
        tracing::info!(
            dataset = %dataset.name,
            rows = dataset.records.len(),
            "Loaded dataset"
        );

        let receipt = IngestionReceipt {
            dataset: dataset.summary(),
            identifier_column: dataset.identifier_column().to_string(),
            headers: dataset.headers.clone(),
        };

        let (tx, rx) = oneshot::channel();
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let outcome = sink
                .persist(
                    &dataset.records,
                    &dataset.file_name,
                    dataset.identifier_column(),
                    &dataset.headers,
                )
                .await;
            // Callers that dropped the receiver still get the activity log.
            let _ = tx.send(outcome);
        });

        Ok(IngestionHandle {
            receipt,
            persistence: rx,
        })
    }

    /// Ingests files concurrently. Results arrive in completion order, and
    /// one file failing does not stop the others.
    pub async fn ingest_many(&self, files: Vec<UploadedFile>) -> Vec<Result<IngestionHandle>> {
        let mut tasks = JoinSet::new();
        for file in files {
            let service = self.clone();
            tasks.spawn(async move { service.ingest(file).await });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            results.push(joined.unwrap_or_else(|e| {
                Err(AppError::Internal(format!("Ingestion task failed: {}", e)))
            }));
        }
        results
    }
}

async fn parse_upload(file: UploadedFile) -> Result<Dataset> {
    tokio::task::spawn_blocking(move || {
        let rows = read_first_sheet(&file.bytes, &file.file_name)?;
        normalize_sheet(rows, &file.file_name)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Spreadsheet parsing task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::MemoryStore;

    const EMIGRANTS_CSV: &str = "Title\nCountry,2019,2020\nPH,5,7\n,,\n";

    fn service(store: &Arc<MemoryStore>) -> (IngestionService, Arc<Workspace>, Arc<ActivityLog>) {
        let workspace = Arc::new(Workspace::new());
        let activity = Arc::new(ActivityLog::new());
        (
            IngestionService::new(store.clone(), workspace.clone(), activity.clone()),
            workspace,
            activity,
        )
    }

    #[tokio::test]
    async fn test_ingest_installs_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let (service, workspace, _) = service(&store);

        let handle = service
            .ingest(UploadedFile::new("Emigrants 2020.csv", EMIGRANTS_CSV))
            .await
            .unwrap();

        assert_eq!(handle.receipt.dataset.name, "emigrants_2020");
        assert_eq!(handle.receipt.identifier_column, "Country");
        assert_eq!(workspace.active().as_deref(), Some("emigrants_2020"));

        let outcome = handle.persistence.await.unwrap();
        assert!(matches!(outcome, PersistenceOutcome::Persisted { written: 1, .. }));
        assert_eq!(store.scan_namespace("emigrants_2020").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_dataset_in_memory() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_batches(1).await;
        let (service, workspace, activity) = service(&store);

        let handle = service
            .ingest(UploadedFile::new("flow.csv", EMIGRANTS_CSV))
            .await
            .unwrap();
        let outcome = handle.persistence.await.unwrap();

        assert!(matches!(outcome, PersistenceOutcome::Failed(AppError::BatchCommit { .. })));
        assert!(workspace.get("flow").is_some());
        assert!(activity
            .entries()
            .iter()
            .any(|e| e.message.starts_with("Upload failed for flow")));
    }

    #[tokio::test]
    async fn test_malformed_file_is_reported_per_file() {
        let store = Arc::new(MemoryStore::new());
        let (service, workspace, activity) = service(&store);

        let results = service
            .ingest_many(vec![
                UploadedFile::new("only_title.csv", "Just a title\n"),
                UploadedFile::new("good.csv", EMIGRANTS_CSV),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(workspace.get("good").is_some());
        assert!(workspace.get("only_title").is_none());
        assert!(activity
            .entries()
            .iter()
            .any(|e| e.message.starts_with("Error in file only_title.csv")));
    }

    #[tokio::test]
    async fn test_same_name_uploads_overwrite() {
        let store = Arc::new(MemoryStore::new());
        let (service, workspace, _) = service(&store);

        let first = service
            .ingest(UploadedFile::new("Data (2023).csv", "T\nCountry,2020\nPH,1\nJP,2\n"))
            .await
            .unwrap();
        first.persistence.await.unwrap();
        let second = service
            .ingest(UploadedFile::new("Data 2023.csv", "T\nCountry,2020\nUS,3\n"))
            .await
            .unwrap();
        second.persistence.await.unwrap();

        let dataset = workspace.get("data_2023").unwrap();
        assert_eq!(dataset.file_name, "Data 2023.csv");
        assert_eq!(dataset.records.len(), 1);

        let keys: Vec<String> = store
            .scan_namespace("data_2023")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["US".to_string()]);
    }
}
