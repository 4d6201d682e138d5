//! Mathematical utilities: step basis functions, weighted least squares and
//! Levenberg–Marquardt refinement.

pub mod basis;
pub mod lm;
pub mod ols;

pub use basis::*;
pub use lm::*;
pub use ols::*;
