use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use super::DocumentStore;
use crate::domain::error::{AppError, Result};
use crate::domain::store_model::{
    EntryFields, RegistryPatch, RegistrySnapshot, StoredEntry, WriteBatch,
};

const REGISTRY_ID: &str = "datasets";

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS entries (
        namespace TEXT NOT NULL,
        key TEXT NOT NULL,
        fields_json TEXT NOT NULL,
        PRIMARY KEY (namespace, key)
    )",
    "CREATE TABLE IF NOT EXISTS registry (
        id TEXT PRIMARY KEY,
        names_json TEXT NOT NULL,
        headers_json TEXT NOT NULL
    )",
];

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_url = db_path_to_url(db_path)?;
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| AppError::StoreError(format!("Failed to parse store DB URL: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        // Registry merges read then write inside one transaction; a single
        // writer connection keeps those from racing.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to connect store DB: {}", e)))?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database; lives as long as the store.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::StoreError(format!("Failed to parse store DB URL: {}", e)))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to open in-memory store: {}", e)))?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| AppError::StoreError(format!("Failed to create table: {}", e)))?;
        }
        Ok(Self { pool })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn commit_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to begin transaction: {}", e)))?;

        if batch.replace {
            sqlx::query("DELETE FROM entries WHERE namespace = ?")
                .bind(&batch.namespace)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::StoreError(format!(
                        "Failed to clear namespace {}: {}",
                        batch.namespace, e
                    ))
                })?;
        }

        for entry in &batch.puts {
            let fields_json = serde_json::to_string(&entry.fields)?;
            sqlx::query(
                "INSERT INTO entries (namespace, key, fields_json) VALUES (?, ?, ?)
                 ON CONFLICT(namespace, key) DO UPDATE SET fields_json = excluded.fields_json",
            )
            .bind(&batch.namespace)
            .bind(&entry.key)
            .bind(&fields_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::StoreError(format!("Failed to write entry {}: {}", entry.key, e))
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to commit batch: {}", e)))?;

        Ok(())
    }

    async fn read_registry(&self) -> Result<Option<RegistrySnapshot>> {
        let row = sqlx::query_as::<_, RegistryEntity>(
            "SELECT names_json, headers_json FROM registry WHERE id = ?",
        )
        .bind(REGISTRY_ID)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StoreError(format!("Failed to read registry: {}", e)))?;

        row.map(RegistryEntity::into_snapshot).transpose()
    }

    async fn merge_registry(&self, patch: RegistryPatch) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to begin transaction: {}", e)))?;

        let current = sqlx::query_as::<_, RegistryEntity>(
            "SELECT names_json, headers_json FROM registry WHERE id = ?",
        )
        .bind(REGISTRY_ID)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::StoreError(format!("Failed to read registry: {}", e)))?;

        let mut snapshot = match current {
            Some(entity) => entity.into_snapshot()?,
            None => RegistrySnapshot::default(),
        };
        snapshot.apply(&patch);

        sqlx::query(
            "INSERT INTO registry (id, names_json, headers_json) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                names_json = excluded.names_json,
                headers_json = excluded.headers_json",
        )
        .bind(REGISTRY_ID)
        .bind(serde_json::to_string(&snapshot.names)?)
        .bind(serde_json::to_string(&snapshot.headers)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::StoreError(format!("Failed to write registry: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to commit registry: {}", e)))?;

        Ok(())
    }

    async fn scan_namespace(&self, namespace: &str) -> Result<Vec<StoredEntry>> {
        let rows = sqlx::query_as::<_, EntryEntity>(
            "SELECT key, fields_json FROM entries WHERE namespace = ? ORDER BY key",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StoreError(format!("Failed to scan {}: {}", namespace, e)))?;

        rows.into_iter().map(EntryEntity::into_entry).collect()
    }
}

fn db_path_to_url(db_path: &Path) -> Result<String> {
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| AppError::StoreError("Store database path is not valid UTF-8".to_string()))?;
    Ok(format!("sqlite://{}", db_path_str.replace('\\', "/")))
}

// Internal entities for database mapping
#[derive(sqlx::FromRow)]
struct EntryEntity {
    key: String,
    fields_json: String,
}

impl EntryEntity {
    fn into_entry(self) -> Result<StoredEntry> {
        let fields: EntryFields = serde_json::from_str(&self.fields_json)?;
        Ok(StoredEntry {
            key: self.key,
            fields,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RegistryEntity {
    names_json: String,
    headers_json: String,
}

impl RegistryEntity {
    fn into_snapshot(self) -> Result<RegistrySnapshot> {
        let names: BTreeSet<String> = serde_json::from_str(&self.names_json)?;
        let headers: BTreeMap<String, Vec<String>> = serde_json::from_str(&self.headers_json)?;
        Ok(RegistrySnapshot { names, headers })
    }
}
