//! Read/write fit JSON files.
//!
//! Fit JSON is the "portable" representation of a fit:
//! - step time, fitted parameters and initial guesses
//! - quality diagnostics and standard errors
//! - the cleaned data with fitted values and residuals
//! - a precomputed dense model grid for quick plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::{CurveGrid, FitData, FitFile, FitResult};
use crate::error::AppError;
use crate::models::predict;

/// Number of points in the dense model grid.
pub const GRID_POINTS: usize = 201;

/// Assemble the JSON document for a fit.
pub fn build_fit_file(result: &FitResult, source: &str) -> FitFile {
    FitFile {
        tool: "stepfit".to_string(),
        generated_at: chrono::Utc::now(),
        source: source.to_string(),
        t0: result.t0,
        fit_y0: result.fit_y0,
        params: result.params,
        initial: result.initial,
        quality: result.quality.clone(),
        std_errors: result.std_errors,
        data: FitData {
            t: result.t.clone(),
            y: result.y.clone(),
            y_fit: result.y_fit.clone(),
            residual: result.residuals.clone(),
        },
        grid: curve_grid(result, GRID_POINTS),
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, result: &FitResult, source: &str) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &build_fit_file(result, source))
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;

    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit: FitFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;
    Ok(fit)
}

/// Evaluate the fitted model on `n` evenly spaced times across the data range.
pub fn curve_grid(result: &FitResult, n: usize) -> CurveGrid {
    let n = n.max(2);
    let (mut t_lo, mut t_hi) = result
        .t
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !(t_lo.is_finite() && t_hi.is_finite()) {
        t_lo = result.t0;
        t_hi = result.t0 + 1.0;
    }
    if (t_hi - t_lo).abs() < 1e-12 {
        t_lo -= 0.5;
        t_hi += 0.5;
    }

    let mut t = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let ti = t_lo + u * (t_hi - t_lo);
        t.push(ti);
        y.push(predict(ti, &result.params, result.t0));
    }
    CurveGrid { t, y }
}
