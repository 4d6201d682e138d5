//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model parameters and initial guesses (`StepParams`, `InitialGuess`)
//! - fit configuration and outputs (`FitConfig`, `FitResult`, `FitQuality`)
//! - input options and the portable fit file (`ReadOptions`, `FitFile`)

pub mod types;

pub use types::*;
