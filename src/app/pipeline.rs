//! Shared "fit pipeline" logic used by the CLI, TUI and web front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! read columns -> clean/sort -> initial guesses -> grid + refinement -> diagnostics
//!
//! The front-ends can then focus on presentation (printing, widgets, HTML).

use std::path::Path;

use crate::domain::{FitConfig, FitResult, RawColumns, ReadOptions};
use crate::error::AppError;
use crate::fit::fit_first_order;
use crate::io::ingest::{load_columns, load_columns_from_bytes};

/// All computed outputs of a single fit run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// File or upload name the data came from.
    pub source: String,
    pub columns: RawColumns,
    pub result: FitResult,
}

/// Read a data file from disk and fit it.
pub fn run_fit_file(path: &Path, read: &ReadOptions, config: &FitConfig) -> Result<RunOutput, AppError> {
    let columns = load_columns(path, read)?;
    run_fit_columns(source_name(path), columns, config)
}

/// Name recorded as the fit's source: the file name, or the whole path.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read an uploaded file from memory and fit it.
pub fn run_fit_bytes(
    name: &str,
    bytes: &[u8],
    read: &ReadOptions,
    config: &FitConfig,
) -> Result<RunOutput, AppError> {
    let columns = load_columns_from_bytes(name, bytes, read)?;
    run_fit_columns(name.to_string(), columns, config)
}

/// Fit columns that were already read.
pub fn run_fit_columns(source: String, columns: RawColumns, config: &FitConfig) -> Result<RunOutput, AppError> {
    tracing::info!(
        source = %source,
        rows = columns.rows_read,
        valid = columns.valid_rows(),
        t0 = config.t0,
        fit_y0 = config.fit_y0,
        "fitting"
    );
    let result = fit_first_order(&columns.t, &columns.y, config)?;
    Ok(RunOutput {
        source,
        columns,
        result,
    })
}
