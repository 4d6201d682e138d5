//! `stepfit` library crate.
//!
//! Fits a first-order step response `y = y0 + Ka (1 - exp(-(t - t0) / tau))`
//! to measured `(t, y)` data. The binary (`stepfit`) is a thin wrapper so
//! the fitting core, file handling and front-ends (CLI, web UI, TUI) are
//! testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod server;
pub mod tui;
