use crate::domain::dataset::{Dataset, FieldValue, RawCell, Record, DEFAULT_IDENTIFIER_COLUMN};
use crate::domain::error::{AppError, Result};
use crate::domain::naming::derive_dataset_name;
use crate::infrastructure::spreadsheet::SheetRows;

/// Index of the header row among the non-blank rows; the row above it is
/// the sheet title.
pub const HEADER_ROW_INDEX: usize = 1;

/// Identifier values containing this (any case) mark footnote rows.
const EXCLUDED_IDENTIFIER_MARKER: &str = "source";

/// Turns the raw rows of a sheet into a named dataset: header detection,
/// cell coercion and identifier-based row filtering.
pub fn normalize_sheet(rows: SheetRows, file_name: &str) -> Result<Dataset> {
    let mut rows: Vec<Vec<RawCell>> = rows
        .into_iter()
        .filter(|row| !row.iter().all(RawCell::is_blank))
        .collect();

    if rows.len() <= HEADER_ROW_INDEX {
        return Err(AppError::MalformedFile {
            file_name: file_name.to_string(),
            reason: "File must have at least 2 rows (header and data).".to_string(),
        });
    }

    let data_rows = rows.split_off(HEADER_ROW_INDEX + 1);
    let header_row = rows.swap_remove(HEADER_ROW_INDEX);

    let headers = derive_headers(&header_row);
    let identifier = headers
        .first()
        .cloned()
        .unwrap_or_else(|| DEFAULT_IDENTIFIER_COLUMN.to_string());

    let data_row_count = data_rows.len();
    let records: Vec<Record> = data_rows
        .into_iter()
        .map(|row| coerce_row(row, &headers, &identifier))
        .filter(|fields| is_valid_identifier(fields, &identifier))
        .enumerate()
        .map(|(position, fields)| Record::with_fields(position, fields))
        .collect();

    if data_row_count > 0 && records.is_empty() {
        return Err(AppError::MalformedFile {
            file_name: file_name.to_string(),
            reason: format!("No rows with a valid identifier in column '{}'.", identifier),
        });
    }

    Ok(Dataset {
        name: derive_dataset_name(file_name)?,
        file_name: file_name.to_string(),
        headers,
        records,
    })
}

/// Trimmed header text, or `Column{n}` for a blank header cell.
pub fn derive_headers(header_row: &[RawCell]) -> Vec<String> {
    header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            cell.display_text()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| format!("Column{}", i + 1))
        })
        .collect()
}

fn coerce_row(
    row: Vec<RawCell>,
    headers: &[String],
    identifier: &str,
) -> Vec<(String, FieldValue)> {
    let mut cells = row.into_iter().map(RawCell::into_value);

    headers
        .iter()
        .map(|label| {
            let cell = cells.next().unwrap_or(RawCell::Empty);
            let value = if label == identifier {
                identifier_value(cell)
            } else {
                field_value(cell)
            };
            (label.clone(), value)
        })
        .collect()
}

fn identifier_value(cell: RawCell) -> FieldValue {
    let text = cell.display_text().unwrap_or_default();
    FieldValue::Text(text.trim().to_string())
}

fn field_value(cell: RawCell) -> FieldValue {
    match cell {
        RawCell::Number(n) => FieldValue::Number(n),
        RawCell::Bool(b) => FieldValue::Bool(b),
        RawCell::Text(s) if !s.is_empty() => FieldValue::Text(s),
        _ => FieldValue::ZERO,
    }
}

fn is_valid_identifier(fields: &[(String, FieldValue)], identifier: &str) -> bool {
    // Repeated labels resolve to the last value, as in the stored record.
    let Some(FieldValue::Text(value)) = fields
        .iter()
        .rev()
        .find(|(label, _)| label == identifier)
        .map(|(_, value)| value)
    else {
        return false;
    };

    !value.trim().is_empty() && !value.to_lowercase().contains(EXCLUDED_IDENTIFIER_MARKER)
}
