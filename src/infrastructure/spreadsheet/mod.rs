// ============================================================
// SPREADSHEET INFRASTRUCTURE LAYER
// ============================================================
// First-sheet row extraction for workbook and delimited formats

mod csv_reader;
mod workbook;

use std::path::Path;

pub use csv_reader::CsvSheetReader;

use crate::domain::dataset::RawCell;
use crate::domain::error::{AppError, Result};
use workbook::WorkbookKind;

/// Header-less rows of the first sheet, in sheet order.
pub type SheetRows = Vec<Vec<RawCell>>;

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
const OLE_SIGNATURE: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Reads the first sheet of an uploaded file, choosing the reader from the
/// extension and falling back to content sniffing.
pub fn read_first_sheet(bytes: &[u8], file_name: &str) -> Result<SheetRows> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "tsv" | "txt" => CsvSheetReader::new().read_bytes(bytes, file_name),
        "xlsx" | "xlsm" | "xlam" => {
            workbook::read_first_sheet(bytes, WorkbookKind::Xlsx, file_name)
        }
        "xls" | "xla" => workbook::read_first_sheet(bytes, WorkbookKind::Xls, file_name),
        "xlsb" => workbook::read_first_sheet(bytes, WorkbookKind::Xlsb, file_name),
        "ods" => workbook::read_first_sheet(bytes, WorkbookKind::Ods, file_name),
        _ if bytes.starts_with(ZIP_SIGNATURE) || bytes.starts_with(OLE_SIGNATURE) => {
            workbook::read_first_sheet(bytes, WorkbookKind::Detect, file_name)
        }
        _ => Err(AppError::UnsupportedFormat {
            file_name: file_name.to_string(),
        }),
    }
}

/// Drops blank cells at the end of a row so a row is only as wide as its
/// last value.
pub(crate) fn trim_trailing_blanks(mut row: Vec<RawCell>) -> Vec<RawCell> {
    while row.last().map_or(false, RawCell::is_blank) {
        row.pop();
    }
    row
}
