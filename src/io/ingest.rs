//! Spreadsheet/CSV ingest.
//!
//! This module turns an input file into two raw columns: time (column A) and
//! measurement (column B). It does no cleaning beyond cell-to-number
//! conversion; non-numeric cells become NaN and are dropped by the fitter.
//!
//! Design goals:
//! - **Same rules for files and uploads** (path or in-memory bytes)
//! - **Clear errors** (exit code 2) naming what could not be read
//! - **Separation of concerns**: no fitting logic here

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};

use crate::domain::{RawColumns, ReadOptions};
use crate::error::AppError;

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];
const CSV_EXTENSIONS: [&str; 2] = ["csv", "txt"];

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const OLE_MAGIC: [u8; 4] = [0xd0, 0xcf, 0x11, 0xe0];

/// Input container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Spreadsheet,
    Csv,
}

impl InputFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        Self::from_extension(&ext).ok_or_else(|| {
            AppError::new(
                2,
                format!(
                    "Unsupported input file '{}': expected .xlsx, .xls, .ods or .csv.",
                    path.display()
                ),
            )
        })
    }

    /// Detect the format of an upload: by name first, then by content.
    pub fn sniff(name: &str, bytes: &[u8]) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if let Some(format) = Self::from_extension(&ext) {
            return format;
        }
        if bytes.starts_with(&ZIP_MAGIC) || bytes.starts_with(&OLE_MAGIC) {
            InputFormat::Spreadsheet
        } else {
            InputFormat::Csv
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        if SPREADSHEET_EXTENSIONS.contains(&ext) {
            Some(InputFormat::Spreadsheet)
        } else if CSV_EXTENSIONS.contains(&ext) {
            Some(InputFormat::Csv)
        } else {
            None
        }
    }
}

/// Load columns A/B from a file on disk.
pub fn load_columns(path: &Path, opts: &ReadOptions) -> Result<RawColumns, AppError> {
    let raw = match InputFormat::from_path(path)? {
        InputFormat::Spreadsheet => {
            let workbook = open_workbook_auto(path).map_err(excel_error)?;
            read_workbook(workbook, opts)?
        }
        InputFormat::Csv => {
            let file = File::open(path).map_err(|e| {
                AppError::new(2, format!("Failed to open '{}': {e}", path.display()))
            })?;
            read_csv(file, opts)?
        }
    };

    tracing::debug!(
        path = %path.display(),
        rows = raw.rows_read,
        valid = raw.valid_rows(),
        "loaded columns"
    );
    Ok(raw)
}

/// Load columns A/B from in-memory bytes (e.g. an upload named `name`).
pub fn load_columns_from_bytes(
    name: &str,
    bytes: &[u8],
    opts: &ReadOptions,
) -> Result<RawColumns, AppError> {
    let raw = match InputFormat::sniff(name, bytes) {
        InputFormat::Spreadsheet => {
            let workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(excel_error)?;
            read_workbook(workbook, opts)?
        }
        InputFormat::Csv => read_csv(bytes, opts)?,
    };

    tracing::debug!(
        name,
        size = bytes.len(),
        rows = raw.rows_read,
        valid = raw.valid_rows(),
        "loaded upload"
    );
    Ok(raw)
}

fn read_workbook<RS: Read + Seek>(
    mut workbook: Sheets<RS>,
    opts: &ReadOptions,
) -> Result<RawColumns, AppError> {
    let names = workbook.sheet_names();
    let name = match &opts.sheet {
        Some(wanted) => names.iter().find(|n| *n == wanted).cloned().ok_or_else(|| {
            AppError::new(
                2,
                format!(
                    "Could not read Excel: worksheet '{wanted}' not found (available: {}).",
                    names.join(", ")
                ),
            )
        })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| AppError::new(2, "Could not read Excel: workbook has no sheets."))?,
    };

    let range = workbook.worksheet_range(&name).map_err(excel_error)?;
    columns_from_range(&range, opts.header)
}

/// Extract absolute columns A and B from a worksheet range.
///
/// The header row, when present, is the first row of the used range.
fn columns_from_range(range: &Range<Data>, header: bool) -> Result<RawColumns, AppError> {
    let (Some(start), Some(end)) = (range.start(), range.end()) else {
        return Err(too_few_columns());
    };
    if end.1 < 1 {
        return Err(too_few_columns());
    }

    let first_row = if header { start.0 + 1 } else { start.0 };
    let mut raw = RawColumns::default();
    for row in first_row..=end.0 {
        raw.t.push(cell_to_f64(range.get_value((row, 0))));
        raw.y.push(cell_to_f64(range.get_value((row, 1))));
        raw.rows_read += 1;
    }
    Ok(raw)
}

fn cell_to_f64(cell: Option<&Data>) -> f64 {
    match cell {
        Some(Data::Float(v)) => *v,
        Some(Data::Int(v)) => *v as f64,
        Some(Data::Bool(v)) => f64::from(u8::from(*v)),
        Some(Data::DateTime(v)) => v.as_f64(),
        Some(Data::String(s)) => parse_number(s),
        _ => f64::NAN,
    }
}

fn read_csv<R: Read>(reader: R, opts: &ReadOptions) -> Result<RawColumns, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(opts.header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut raw = RawColumns::default();
    let mut max_columns = 0usize;
    for result in reader.records() {
        let record = result.map_err(|e| AppError::new(2, format!("Could not read CSV: {e}")))?;
        max_columns = max_columns.max(record.len());
        raw.t.push(record.get(0).map(parse_number).unwrap_or(f64::NAN));
        raw.y.push(record.get(1).map(parse_number).unwrap_or(f64::NAN));
        raw.rows_read += 1;
    }

    if max_columns < 2 {
        return Err(too_few_columns());
    }
    Ok(raw)
}

fn parse_number(s: &str) -> f64 {
    // Strip a UTF-8 BOM that Excel sometimes writes ahead of the first cell.
    let s = s.trim().trim_start_matches('\u{feff}');
    s.parse::<f64>().unwrap_or(f64::NAN)
}

fn too_few_columns() -> AppError {
    AppError::new(2, "Need at least 2 columns: time (A) and measurement (B).")
}

fn excel_error(e: impl std::fmt::Display) -> AppError {
    AppError::new(2, format!("Could not read Excel: {e}"))
}
