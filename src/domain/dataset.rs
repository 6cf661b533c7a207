use serde::{Deserialize, Serialize};
use std::fmt;

/// Label used for the identifier column when the header cell is blank.
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "Column1";

/// A cell as read from the first sheet, before any normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// A value that also carries the text the spreadsheet displays for it
    /// (dates are stored as serial numbers but shown formatted).
    Formatted { value: Box<RawCell>, text: String },
}

impl RawCell {
    pub fn formatted(value: RawCell, text: impl Into<String>) -> Self {
        RawCell::Formatted {
            value: Box::new(value),
            text: text.into(),
        }
    }

    /// Null, missing and empty-string cells are blank; whitespace is not.
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.is_empty(),
            RawCell::Formatted { value, .. } => value.is_blank(),
            RawCell::Number(_) | RawCell::Bool(_) => false,
        }
    }

    /// Strips any display wrapper and returns the underlying value.
    pub fn into_value(self) -> RawCell {
        match self {
            RawCell::Formatted { value, .. } => value.into_value(),
            other => other,
        }
    }

    /// The text a reader of the sheet would see, `None` for empty cells.
    pub fn display_text(&self) -> Option<String> {
        match self {
            RawCell::Empty => None,
            RawCell::Text(s) => Some(s.clone()),
            RawCell::Number(n) => Some(format_number(*n)),
            RawCell::Bool(b) => Some(b.to_string()),
            RawCell::Formatted { text, .. } => Some(text.clone()),
        }
    }
}

/// A normalized record value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Placeholder stored for non-identifier cells that had no data.
    pub const ZERO: FieldValue = FieldValue::Number(0.0);

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => f.write_str(&format_number(*n)),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Formats a number the way a spreadsheet shows it: integral values carry
/// no fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One row of a dataset: ordered `(label, value)` pairs plus the row's
/// position among the dataset's kept rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    position: usize,
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new(position: usize) -> Self {
        Self {
            position,
            fields: Vec::new(),
        }
    }

    pub fn with_fields<I>(position: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        let mut record = Self::new(position);
        for (label, value) in fields {
            record.set(label, value);
        }
        record
    }

    /// Sets `label`. A repeated label keeps its first slot and takes the
    /// latest value.
    pub fn set(&mut self, label: impl Into<String>, value: FieldValue) {
        let label = label.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, value)| value)
    }

    pub fn text(&self, label: &str) -> Option<&str> {
        self.get(label).and_then(FieldValue::as_text)
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Derived slug, also the store namespace.
    pub name: String,
    pub file_name: String,
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn identifier_column(&self) -> &str {
        self.headers
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_IDENTIFIER_COLUMN)
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            name: self.name.clone(),
            file_name: self.file_name.clone(),
            columns: self.headers.len(),
            rows: self.records.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub name: String,
    pub file_name: String,
    pub columns: usize,
    pub rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_cells() {
        assert!(RawCell::Empty.is_blank());
        assert!(RawCell::Text(String::new()).is_blank());
        assert!(!RawCell::Text(" ".to_string()).is_blank());
        assert!(!RawCell::Number(0.0).is_blank());
        assert!(RawCell::formatted(RawCell::Empty, "").is_blank());
    }

    #[test]
    fn test_formatted_cell_unwraps_to_value() {
        let cell = RawCell::formatted(RawCell::Number(45292.0), "2024-01-01");
        assert_eq!(cell.display_text().as_deref(), Some("2024-01-01"));
        assert_eq!(cell.into_value(), RawCell::Number(45292.0));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(2019.0), "2019");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(1.25), "1.25");
        assert_eq!(FieldValue::ZERO.to_string(), "0");
    }

    #[test]
    fn test_repeated_label_keeps_first_slot_and_last_value() {
        let mut record = Record::new(0);
        record.set("Country", FieldValue::Text("PH".into()));
        record.set("2019", FieldValue::Number(5.0));
        record.set("Country", FieldValue::Text("JP".into()));

        assert_eq!(record.fields().len(), 2);
        assert_eq!(record.fields()[0].0, "Country");
        assert_eq!(record.text("Country"), Some("JP"));
    }

    #[test]
    fn test_field_value_json_shape() {
        let values = vec![
            FieldValue::Text("PH".into()),
            FieldValue::Number(5.0),
            FieldValue::Bool(true),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["PH",5.0,true]"#);
        let back: Vec<FieldValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }
}
