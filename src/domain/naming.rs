use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::error::{AppError, Result};

/// Name used when an upload arrives without a file name.
pub const DEFAULT_DATASET_NAME: &str = "default_collection";

static EXTENSION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[^/.]+$").unwrap());

static WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static DISALLOWED_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]").unwrap());

/// Derives the dataset slug (and store namespace) from an uploaded file name.
///
/// `Data (2023).xlsx` and `Data 2023.xlsx` both become `data_2023`.
pub fn derive_dataset_name(file_name: &str) -> Result<String> {
    if file_name.is_empty() {
        return Ok(DEFAULT_DATASET_NAME.to_string());
    }

    let stem = EXTENSION_PATTERN.replace(file_name, "");
    let underscored = WHITESPACE_PATTERN.replace_all(&stem, "_");
    let name = DISALLOWED_PATTERN
        .replace_all(&underscored, "")
        .to_lowercase();

    if name.is_empty() {
        return Err(AppError::NamingFailure {
            file_name: file_name.to_string(),
        });
    }

    Ok(name)
}

/// Store keys cannot contain path separators.
pub fn storage_key(identifier: &str) -> String {
    identifier.replace('/', "-")
}

/// File name shown for datasets loaded back from the store.
pub fn recovered_file_name(dataset_name: &str) -> String {
    format!("{}.xlsx", dataset_name.replace('_', " "))
}
