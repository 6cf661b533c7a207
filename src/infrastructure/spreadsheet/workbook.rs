use std::fmt::Display;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Ods, Range, Reader, Xls, Xlsb, Xlsx};
use chrono::{Duration, NaiveDate};

use super::{trim_trailing_blanks, SheetRows};
use crate::domain::dataset::{format_number, RawCell};
use crate::domain::error::{AppError, Result};

type ByteCursor = Cursor<Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WorkbookKind {
    Xlsx,
    Xls,
    Xlsb,
    Ods,
    /// Unknown extension with a container signature; let calamine probe it.
    Detect,
}

/// Reads the first worksheet of a workbook held in memory.
pub(super) fn read_first_sheet(
    bytes: &[u8],
    kind: WorkbookKind,
    file_name: &str,
) -> Result<SheetRows> {
    let cursor = Cursor::new(bytes.to_vec());

    let range = match kind {
        WorkbookKind::Xlsx => first_range(Xlsx::new(cursor), file_name)?,
        WorkbookKind::Xls => first_range(Xls::new(cursor), file_name)?,
        WorkbookKind::Xlsb => first_range(Xlsb::new(cursor), file_name)?,
        WorkbookKind::Ods => first_range(Ods::new(cursor), file_name)?,
        WorkbookKind::Detect => first_range(open_workbook_auto_from_rs(cursor), file_name)?,
    };

    Ok(rows_from_range(&range))
}

fn first_range<R, E>(opened: std::result::Result<R, E>, file_name: &str) -> Result<Range<Data>>
where
    R: Reader<ByteCursor>,
    R::Error: Display,
    E: Display,
{
    let mut workbook = opened.map_err(|e| {
        AppError::ParseError(format!("Failed to open workbook {}: {}", file_name, e))
    })?;

    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::MalformedFile {
            file_name: file_name.to_string(),
            reason: "No worksheet found".to_string(),
        })?
        .map_err(|e| {
            AppError::ParseError(format!("Failed to read first sheet of {}: {}", file_name, e))
        })
}

/// calamine trims the range to the first used cell; re-insert the leading
/// empty columns so column positions match the sheet.
fn rows_from_range(range: &Range<Data>) -> SheetRows {
    let leading_columns = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    range
        .rows()
        .map(|row| {
            let cells = std::iter::repeat(RawCell::Empty)
                .take(leading_columns)
                .chain(row.iter().map(raw_cell))
                .collect();
            trim_trailing_blanks(cells)
        })
        .collect()
}

fn raw_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            RawCell::formatted(RawCell::Number(serial), excel_serial_text(serial))
        }
        other => RawCell::Text(other.to_string()),
    }
}

/// Renders an Excel serial date (1900 date system) as ISO text.
pub(super) fn excel_serial_text(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return format_number(serial);
    };
    // 2958465 is 9999-12-31, the last date Excel can represent
    if !serial.is_finite() || !(0.0..=2_958_465.0).contains(&serial) {
        return format_number(serial);
    }

    let days = serial.trunc() as i64;
    let seconds = ((serial.fract()) * 86_400.0).round() as i64;
    let Some(datetime) = epoch
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.checked_add_signed(Duration::days(days)))
        .and_then(|day| day.checked_add_signed(Duration::seconds(seconds)))
    else {
        return format_number(serial);
    };

    if seconds == 0 {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excel_serial_text() {
        assert_eq!(excel_serial_text(45292.0), "2024-01-01");
        assert_eq!(excel_serial_text(45292.5), "2024-01-01 12:00:00");
        assert_eq!(excel_serial_text(-1.0), "-1");
    }

    #[test]
    fn test_cell_mapping() {
        assert_eq!(raw_cell(&Data::Int(5)), RawCell::Number(5.0));
        assert_eq!(raw_cell(&Data::String("PH".into())), RawCell::Text("PH".into()));
        assert_eq!(raw_cell(&Data::Empty), RawCell::Empty);
        assert_eq!(raw_cell(&Data::Bool(false)), RawCell::Bool(false));
    }

    #[test]
    fn test_garbage_bytes_are_a_parse_error() {
        let err =
            read_first_sheet(b"not a workbook", WorkbookKind::Xlsx, "broken.xlsx").unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
        assert!(err.to_string().contains("broken.xlsx"));
    }
}
