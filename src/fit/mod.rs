//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - clean the data and derive initial guesses
//! - generate the tau grid and evaluate each candidate (parallel)
//! - refine the best candidate and compute diagnostics

pub mod fitter;
pub mod initial;
pub mod tau_grid;

pub use fitter::*;
pub use initial::*;
pub use tau_grid::*;
