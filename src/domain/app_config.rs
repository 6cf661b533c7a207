use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub store: StoreConfig,
    #[validate(nested)]
    pub preview: PreviewConfig,
    /// `tracing_subscriber` env-filter directive; `RUST_LOG` wins when set.
    #[validate(length(min = 1))]
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            preview: PreviewConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_store_config"))]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub sqlite_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            sqlite_path: PathBuf::from("data/datasets.db"),
        }
    }
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ValidationError> {
    if config.backend == StoreBackend::Sqlite && config.sqlite_path.as_os_str().is_empty() {
        return Err(ValidationError::new("sqlite_path_required"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PreviewConfig {
    /// Rows shown when the caller does not ask for a count.
    #[validate(range(min = 1, max = 10000))]
    pub default_rows: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { default_rows: 8 }
    }
}
