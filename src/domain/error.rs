use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ParseError(String),
    ConfigError(String),
    StoreError(String),
    IoError(String),
    /// The file parsed, but its shape cannot yield a dataset.
    MalformedFile { file_name: String, reason: String },
    /// The file name sanitizes to nothing usable as a dataset name.
    NamingFailure { file_name: String },
    UnsupportedFormat { file_name: String },
    /// The atomic per-dataset write was rejected as a whole.
    BatchCommit { dataset: String, cause: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            AppError::StoreError(msg) => write!(f, "Store error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
            AppError::MalformedFile { file_name, reason } => {
                write!(f, "Error in file {}: {}", file_name, reason)
            }
            AppError::NamingFailure { file_name } => write!(
                f,
                "Could not create a valid dataset name from file {}",
                file_name
            ),
            AppError::UnsupportedFormat { file_name } => {
                write!(f, "Unsupported spreadsheet format: {}", file_name)
            }
            AppError::BatchCommit { dataset, cause } => {
                write!(f, "Upload failed for {}: {}", dataset, cause)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages_name_the_subject() {
        let err = AppError::MalformedFile {
            file_name: "stock.xlsx".to_string(),
            reason: "File must have at least 2 rows (header and data).".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Error in file stock.xlsx: File must have at least 2 rows (header and data)."
        );

        let err = AppError::BatchCommit {
            dataset: "stock".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "Upload failed for stock: disk full");
    }
}
