use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use validator::Validate;

use crate::domain::app_config::AppConfig;
use crate::domain::error::{AppError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "datasets.toml";
const CONFIG_PATH_VAR: &str = "DATASETS_CONFIG";
const ENV_PREFIX: &str = "DATASETS_";

/// Loads configuration from, in increasing precedence: built-in defaults,
/// the TOML file, and `DATASETS_*` environment variables (`__` separates
/// nested keys, e.g. `DATASETS_SERVER__PORT`). A `.env` file is read first.
pub fn load_config() -> Result<AppConfig> {
    let _ = dotenvy::dotenv();

    let path = std::env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

    let figment = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    extract_config(figment)
}

pub fn extract_config(figment: Figment) -> Result<AppConfig> {
    let config: AppConfig = figment
        .extract()
        .map_err(|e| AppError::ConfigError(format!("Failed to load configuration: {}", e)))?;

    config
        .validate()
        .map_err(|e| AppError::ConfigError(format!("Invalid configuration: {}", e)))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::app_config::StoreBackend;

    fn with_toml(content: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(content))
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = extract_config(with_toml(
            r#"
            log_filter = "debug"

            [server]
            port = 8080

            [store]
            backend = "memory"
            "#,
        ))
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.preview.default_rows, 8);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = extract_config(with_toml("[preview]\ndefault_rows = 0\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));

        let err = extract_config(with_toml("[store]\nbackend = \"postgres\"\n")).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
