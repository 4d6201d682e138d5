//! Reporting utilities: residual ranking and formatted output.

pub mod format;

pub use format::*;

use crate::domain::FitResult;

/// Indices of the `top` samples with the largest absolute residuals.
///
/// Ties keep time order.
pub fn largest_residuals(result: &FitResult, top: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..result.residuals.len()).collect();
    idx.sort_by(|&a, &b| {
        result.residuals[b]
            .abs()
            .partial_cmp(&result.residuals[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    idx.truncate(top);
    idx
}
