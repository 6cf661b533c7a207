// ============================================================
// CSV SHEET READER
// ============================================================
// Reads delimited text into typed raw rows, the way a spreadsheet
// engine would open the same file

use csv::{ReaderBuilder, Trim};
use encoding_rs::WINDOWS_1252;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{trim_trailing_blanks, SheetRows};
use crate::domain::dataset::RawCell;
use crate::domain::error::{AppError, Result};

static GROUPED_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{1,3}(,\d{3})+(\.\d+)?$").unwrap());

/// CSV reader producing header-less raw rows
pub struct CsvSheetReader {
    /// Delimiter character; detected from content when not set
    delimiter: Option<u8>,
}

impl Default for CsvSheetReader {
    fn default() -> Self {
        Self { delimiter: None }
    }
}

impl CsvSheetReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed delimiter instead of detecting one
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Decode bytes and read every record as a raw row
    pub fn read_bytes(&self, bytes: &[u8], file_name: &str) -> Result<SheetRows> {
        let content = decode_text(bytes);
        let delimiter = self
            .delimiter
            .unwrap_or_else(|| Self::detect_delimiter(&content));

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .trim(Trim::None)
            .flexible(true) // Allow rows with different lengths
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                AppError::ParseError(format!(
                    "Failed to parse CSV row {} of {}: {}",
                    index + 1,
                    file_name,
                    e
                ))
            })?;

            let row: Vec<RawCell> = record.iter().map(typed_cell).collect();
            rows.push(trim_trailing_blanks(row));
        }

        Ok(rows)
    }

    /// Detect delimiter from content (comma, semicolon, tab, pipe)
    pub fn detect_delimiter(content: &str) -> u8 {
        let candidates = [b',', b';', b'\t', b'|'];
        let sample_lines: Vec<_> = content.lines().take(10).collect();

        let mut best_delimiter = b',';
        let mut best_score = 0.0f32;

        if sample_lines.is_empty() {
            return best_delimiter;
        }

        for &delimiter in &candidates {
            let field_counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| line.bytes().filter(|&b| b == delimiter).count())
                .collect();

            // Score by consistency (low standard deviation) and frequency
            let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
            let variance = field_counts
                .iter()
                .map(|&x| (x as f32 - avg).powi(2))
                .sum::<f32>()
                / field_counts.len() as f32;

            let score = avg / (1.0 + variance.sqrt());

            if score > best_score {
                best_score = score;
                best_delimiter = delimiter;
            }
        }

        best_delimiter
    }
}

/// UTF-8 first (BOM stripped), Windows-1252 for legacy exports
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(content) => content.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Numbers and booleans become typed cells; everything else stays text,
/// surrounding whitespace included
fn typed_cell(field: &str) -> RawCell {
    if field.is_empty() {
        return RawCell::Empty;
    }

    let value = field.trim();
    if value.eq_ignore_ascii_case("true") {
        return RawCell::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return RawCell::Bool(false);
    }

    if let Some(number) = parse_number(value) {
        return RawCell::Number(number);
    }

    RawCell::Text(field.to_string())
}

fn parse_number(field: &str) -> Option<f64> {
    // Rust accepts "inf" and "NaN"; spreadsheets treat those as text
    if !field.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let candidate = if GROUPED_NUMBER_PATTERN.is_match(field) {
        field.replace(',', "")
    } else {
        field.to_string()
    };

    candidate
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}
