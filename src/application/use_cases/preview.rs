use serde::Serialize;

use crate::domain::dataset::Dataset;
use crate::domain::error::{AppError, Result};

use super::workspace::Workspace;

/// First rows of a dataset rendered as display strings, one per header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub name: String,
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub shown_rows: usize,
}

/// `requested` below 1 shows one row; above the total shows them all.
pub fn build_preview(dataset: &Dataset, requested: Option<i64>, default_rows: usize) -> Preview {
    let total_rows = dataset.records.len();
    let wanted = requested
        .map(|n| usize::try_from(n.max(1)).unwrap_or(usize::MAX))
        .unwrap_or(default_rows)
        .max(1);
    let shown_rows = wanted.min(total_rows);

    let rows = dataset
        .records
        .iter()
        .take(shown_rows)
        .map(|record| {
            dataset
                .headers
                .iter()
                .map(|header| {
                    record
                        .get(header)
                        .map(|value| value.to_string())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    Preview {
        name: dataset.name.clone(),
        file_name: dataset.file_name.clone(),
        headers: dataset.headers.clone(),
        rows,
        total_rows,
        shown_rows,
    }
}

/// Reads a user-typed row count. Anything that is not a non-zero number
/// asks for a single row.
pub fn parse_row_count(raw: &str) -> i64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n != 0.0)
        .map(|n| n as i64)
        .unwrap_or(1)
}

pub fn preview_dataset(
    workspace: &Workspace,
    name: &str,
    requested: Option<i64>,
    default_rows: usize,
) -> Result<Preview> {
    let dataset = workspace
        .get(name)
        .ok_or_else(|| AppError::NotFound(format!("Dataset {} is not loaded", name)))?;
    Ok(build_preview(&dataset, requested, default_rows))
}
