//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/XLSX/CSV
//! - reloaded later for plotting

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Lower bound on the time constant during optimization.
pub const TAU_LOWER_BOUND: f64 = 1e-9;

/// Minimum number of valid `(t, y)` pairs required for a fit.
pub const MIN_POINTS: usize = 4;

/// Parameters of the first-order step response
/// `y(t) = y0 + Ka * (1 - exp(-(t - t0) / tau))` for `t >= t0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    /// Gain times step amplitude, treated as a single parameter.
    pub ka: f64,
    /// Time constant (> 0).
    pub tau: f64,
    /// Baseline output.
    pub y0: f64,
}

/// Starting point derived from the data (baseline, tail mean, 63.2% rule).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialGuess {
    pub ka0: f64,
    pub tau0: f64,
    pub y0_guess: f64,
}

impl InitialGuess {
    pub fn params(&self) -> StepParams {
        StepParams {
            ka: self.ka0,
            tau: self.tau0,
            y0: self.y0_guess,
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    /// Coefficient of determination; NaN when the data has no variance.
    ///
    /// JSON has no NaN, so it is written as `null` and read back as NaN.
    #[serde(deserialize_with = "nan_from_null")]
    pub r2: f64,
    pub rmse: f64,
    pub n: usize,
}

/// One-sigma parameter uncertainties from the linearized covariance.
///
/// `y0` is `None` when the baseline was held fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StdErrors {
    pub ka: f64,
    pub tau: f64,
    pub y0: Option<f64>,
}

/// Outlier-robust fitting mode.
///
/// When enabled, the fitter iteratively reweights observations based on residuals
/// (Huber IRLS) so a few spikes in the measurement cannot dominate the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RobustKind {
    /// Ordinary least squares (no robust reweighting).
    None,
    /// Huber M-estimator via iterative reweighted least squares.
    Huber,
}

/// Configuration of a single fit.
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Step time.
    pub t0: f64,
    /// Fit the baseline `y0`, or hold it at the initial guess.
    pub fit_y0: bool,
    /// Number of log-spaced tau values scanned before refinement.
    pub tau_steps: usize,
    /// Budget of model evaluations for the nonlinear refinement.
    pub max_evals: usize,
    pub robust: RobustKind,
    /// Number of IRLS reweight iterations (0 disables reweighting even if robust!=none).
    pub robust_iters: usize,
    /// Huber tuning constant (larger = less downweighting).
    pub robust_k: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            t0: 0.0,
            fit_y0: true,
            tau_steps: 60,
            max_evals: 20_000,
            robust: RobustKind::None,
            robust_iters: 3,
            robust_k: 1.5,
        }
    }
}

/// Fit output: cleaned data, parameters, fitted values and diagnostics.
///
/// `t`, `y`, `y_fit` and `residuals` are aligned index by index and sorted by time.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub t: Vec<f64>,
    pub y: Vec<f64>,
    pub t0: f64,
    pub fit_y0: bool,
    pub params: StepParams,
    pub initial: InitialGuess,
    pub quality: FitQuality,
    pub y_fit: Vec<f64>,
    pub residuals: Vec<f64>,
    pub std_errors: Option<StdErrors>,
}

/// How to read the two data columns from an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Sheet name; `None` selects the first sheet. Ignored for CSV.
    pub sheet: Option<String>,
    /// Whether the first row is a header.
    pub header: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            header: true,
        }
    }
}

impl ReadOptions {
    /// Build options from a free-text sheet field where blank means "first sheet".
    pub fn from_sheet_field(sheet: &str, header: bool) -> Self {
        let sheet = sheet.trim();
        Self {
            sheet: if sheet.is_empty() {
                None
            } else {
                Some(sheet.to_string())
            },
            header,
        }
    }
}

/// Raw columns A/B as read from the input, before cleaning.
#[derive(Debug, Clone, Default)]
pub struct RawColumns {
    pub t: Vec<f64>,
    pub y: Vec<f64>,
    /// Number of data rows read (header excluded).
    pub rows_read: usize,
}

impl RawColumns {
    /// Number of rows where both values are finite.
    pub fn valid_rows(&self) -> usize {
        self.t
            .iter()
            .zip(self.y.iter())
            .filter(|(t, y)| t.is_finite() && y.is_finite())
            .count()
    }
}

fn nan_from_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(|v| v.unwrap_or(f64::NAN))
}

/// A saved fit file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    /// Where the data came from (file name or upload name).
    pub source: String,
    pub t0: f64,
    pub fit_y0: bool,
    pub params: StepParams,
    pub initial: InitialGuess,
    pub quality: FitQuality,
    pub std_errors: Option<StdErrors>,
    pub data: FitData,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitData {
    pub t: Vec<f64>,
    pub y: Vec<f64>,
    pub y_fit: Vec<f64>,
    pub residual: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub t: Vec<f64>,
    pub y: Vec<f64>,
}
