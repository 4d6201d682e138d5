//! Command-line parsing for the step-response fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::SampleConfig;
use crate::domain::{FitConfig, ReadOptions, RobustKind, StepParams};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "stepfit", version, about = "First-order step response fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a data file, print diagnostics, and optionally plot/export.
    Fit(FitArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
    /// Write a synthetic step response to a data file.
    Sample(SampleArgs),
    /// Run the web UI (default when no subcommand is given).
    Serve(ServeArgs),
    /// Launch the interactive TUI for one data file.
    Tui(TuiArgs),
}

/// Which file to read and how.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Data file (.xlsx/.xls/.ods/.csv): time in column A, measurement in column B.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Sheet name (default: first sheet).
    #[arg(long)]
    pub sheet: Option<String>,

    /// The first row holds data, not column names.
    #[arg(long)]
    pub no_header: bool,
}

impl InputArgs {
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions::from_sheet_field(self.sheet.as_deref().unwrap_or(""), !self.no_header)
    }
}

/// Fit settings shared by `fit` and `tui`.
#[derive(Debug, Args, Clone)]
pub struct FitOptions {
    /// Step time t0.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub t0: f64,

    /// Hold y0 at its initial guess instead of fitting it.
    #[arg(long)]
    pub no_fit_y0: bool,

    /// Tau grid steps scanned before refinement.
    #[arg(long, default_value_t = 60)]
    pub tau_steps: usize,

    /// Maximum model evaluations during refinement.
    #[arg(long, default_value_t = 20_000)]
    pub max_evals: usize,

    /// Robust fitting mode.
    #[arg(long, value_enum, default_value_t = RobustKind::None)]
    pub robust: RobustKind,

    /// IRLS reweight iterations for robust fitting.
    #[arg(long, default_value_t = 3)]
    pub robust_iters: usize,

    /// Huber tuning constant.
    #[arg(long, default_value_t = 1.5)]
    pub robust_k: f64,
}

impl FitOptions {
    pub fn to_config(&self) -> FitConfig {
        FitConfig {
            t0: self.t0,
            fit_y0: !self.no_fit_y0,
            tau_steps: self.tau_steps,
            max_evals: self.max_evals,
            robust: self.robust,
            robust_iters: self.robust_iters,
            robust_k: self.robust_k,
        }
    }
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub fit: FitOptions,

    /// Show the N largest residuals.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Skip the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export the fitted workbook (FittedData + FitSummary sheets).
    #[arg(long, value_name = "XLSX")]
    pub export: Option<PathBuf>,

    /// Export t, y, y_fit, residual to CSV.
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Export the fit (parameters, data, model grid) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

/// Options for plotting a saved fit.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Fit JSON file produced by `stepfit fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for synthetic sample generation.
#[derive(Debug, Parser)]
pub struct SampleArgs {
    /// Output file (.xlsx or .csv).
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 2.0, allow_negative_numbers = true)]
    pub ka: f64,

    #[arg(long, default_value_t = 1.5)]
    pub tau: f64,

    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    pub y0: f64,

    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub t0: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub t_start: f64,

    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    pub t_end: f64,

    /// Number of samples.
    #[arg(short = 'n', long, default_value_t = 101)]
    pub count: usize,

    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl SampleArgs {
    pub fn to_config(&self) -> SampleConfig {
        SampleConfig {
            params: StepParams {
                ka: self.ka,
                tau: self.tau,
                y0: self.y0,
            },
            t0: self.t0,
            t_start: self.t_start,
            t_end: self.t_end,
            n: self.count,
            noise: self.noise,
            seed: self.seed,
        }
    }
}

/// Options for the web UI.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "STEPFIT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "STEPFIT_PORT", default_value_t = 8501)]
    pub port: u16,

    /// Upload size limit in megabytes.
    #[arg(long, env = "STEPFIT_MAX_UPLOAD_MB", default_value_t = 200)]
    pub max_upload_mb: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct TuiArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub fit: FitOptions,
}
