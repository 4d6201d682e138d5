//! Export fit results to XLSX/CSV.
//!
//! The workbook mirrors what a spreadsheet user expects to get back:
//! - `FittedData`: `t`, `y`, `y_fit`, `residual` per cleaned sample
//! - `FitSummary`: step time, fitted parameters, SSE and R²
//!
//! Non-finite values are left as blank cells.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::domain::FitResult;
use crate::error::AppError;

/// File name offered for the fitted workbook download.
pub const DEFAULT_DOWNLOAD_NAME: &str = "first_order_fitted.xlsx";

/// MIME type of `.xlsx` files.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Build the fitted workbook in memory.
pub fn fitted_workbook(result: &FitResult) -> Result<Vec<u8>, AppError> {
    build_workbook(result)
        .and_then(|mut wb| wb.save_to_buffer())
        .map_err(|e| AppError::new(2, format!("Failed to build XLSX export: {e}")))
}

/// Write the fitted workbook to disk.
pub fn write_fitted_xlsx(path: &Path, result: &FitResult) -> Result<(), AppError> {
    build_workbook(result)
        .and_then(|mut wb| wb.save(path))
        .map_err(|e| AppError::new(2, format!("Failed to write XLSX export '{}': {e}", path.display())))
}

/// Write `t,y,y_fit,residual` rows to a CSV file.
pub fn write_fitted_csv(path: &Path, result: &FitResult) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["t", "y", "y_fit", "residual"])
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for i in 0..result.t.len() {
        writer
            .write_record([
                csv_number(result.t[i]),
                csv_number(result.y[i]),
                csv_number(result.y_fit[i]),
                csv_number(result.residuals[i]),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write two raw columns (`t`, `y`) as XLSX or CSV, chosen by extension.
pub fn write_columns(path: &Path, t: &[f64], y: &[f64]) -> Result<(), AppError> {
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));

    if is_xlsx {
        let write = || -> Result<(), XlsxError> {
            let mut workbook = Workbook::new();
            let bold = Format::new().set_bold();
            let sheet = workbook.add_worksheet();
            sheet.set_name("Data")?;
            write_table(sheet, &bold, &["t", "y"], &[t, y])?;
            workbook.save(path)
        };
        return write()
            .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())));
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    writer
        .write_record(["t", "y"])
        .map_err(|e| AppError::new(2, format!("Failed to write CSV header: {e}")))?;
    for (ti, yi) in t.iter().zip(y.iter()) {
        writer
            .write_record([csv_number(*ti), csv_number(*yi)])
            .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

fn build_workbook(result: &FitResult) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let data = workbook.add_worksheet();
    data.set_name("FittedData")?;
    write_table(
        data,
        &bold,
        &["t", "y", "y_fit", "residual"],
        &[&result.t, &result.y, &result.y_fit, &result.residuals],
    )?;

    let summary = workbook.add_worksheet();
    summary.set_name("FitSummary")?;
    summary.write_string_with_format(0, 0, "parameter", &bold)?;
    summary.write_string_with_format(0, 1, "value", &bold)?;
    let rows = [
        ("t0", result.t0),
        ("Ka", result.params.ka),
        ("tau", result.params.tau),
        ("y0", result.params.y0),
        ("SSE", result.quality.sse),
        ("R2", result.quality.r2),
    ];
    for (i, (name, value)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        summary.write_string(row, 0, *name)?;
        write_number_or_blank(summary, row, 1, *value)?;
    }

    Ok(workbook)
}

fn write_table(
    sheet: &mut Worksheet,
    header_format: &Format,
    headers: &[&str],
    columns: &[&[f64]],
) -> Result<(), XlsxError> {
    for (col, name) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, header_format)?;
    }
    for (col, values) in columns.iter().enumerate() {
        for (i, &v) in values.iter().enumerate() {
            write_number_or_blank(sheet, i as u32 + 1, col as u16, v)?;
        }
    }
    Ok(())
}

fn write_number_or_blank(sheet: &mut Worksheet, row: u32, col: u16, v: f64) -> Result<(), XlsxError> {
    if v.is_finite() {
        sheet.write_number(row, col, v)?;
    }
    Ok(())
}

fn csv_number(v: f64) -> String {
    if v.is_finite() { v.to_string() } else { String::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, InitialGuess, ReadOptions, StepParams};
    use crate::io::ingest::{load_columns, load_columns_from_bytes};

    fn tiny_result() -> FitResult {
        FitResult {
            t: vec![0.0, 1.0, 2.0],
            y: vec![1.0, 2.0, 2.5],
            t0: 0.0,
            fit_y0: true,
            params: StepParams {
                ka: 1.5,
                tau: 1.0,
                y0: 1.0,
            },
            initial: InitialGuess {
                ka0: 1.5,
                tau0: 1.0,
                y0_guess: 1.0,
            },
            quality: FitQuality {
                sse: 0.01,
                r2: f64::NAN,
                rmse: 0.05,
                n: 3,
            },
            y_fit: vec![1.0, 1.95, 2.3],
            residuals: vec![0.0, 0.05, 0.2],
            std_errors: None,
        }
    }

    #[test]
    fn workbook_first_sheet_reads_back_as_columns() {
        let bytes = fitted_workbook(&tiny_result()).unwrap();
        assert!(bytes.starts_with(b"PK"));

        let raw = load_columns_from_bytes("fitted.xlsx", &bytes, &ReadOptions::default()).unwrap();
        assert_eq!(raw.t, vec![0.0, 1.0, 2.0]);
        assert_eq!(raw.y, vec![1.0, 2.0, 2.5]);
    }

    #[test]
    fn summary_sheet_lists_parameters() {
        let bytes = fitted_workbook(&tiny_result()).unwrap();
        let opts = ReadOptions {
            sheet: Some("FitSummary".to_string()),
            header: true,
        };
        // Column A holds names, so only column B is numeric.
        let raw = load_columns_from_bytes("fitted.xlsx", &bytes, &opts).unwrap();
        assert_eq!(raw.rows_read, 6);
        assert_eq!(raw.y[1], 1.5);
        assert_eq!(raw.y[2], 1.0);
        // NaN R² is written as a blank cell.
        assert!(raw.y[5].is_nan());
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.csv");
        write_fitted_csv(&path, &tiny_result()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("t,y,y_fit,residual"));
        assert_eq!(lines.next(), Some("0,1,1,0"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn write_columns_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let t = [0.0, 0.5, 1.0];
        let y = [2.0, 2.5, 3.0];

        for name in ["s.xlsx", "s.csv"] {
            let path = dir.path().join(name);
            write_columns(&path, &t, &y).unwrap();
            let raw = load_columns(&path, &ReadOptions::default()).unwrap();
            assert_eq!(raw.t, t.to_vec(), "{name}");
            assert_eq!(raw.y, y.to_vec(), "{name}");
        }
    }
}
