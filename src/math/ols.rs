//! Linear least squares for the inner `(y0, Ka)` problem.
//!
//! For a fixed time constant the step model is linear:
//!
//! ```text
//! minimize Σ w_i (y_i - y0 - Ka g_i)^2
//! ```
//!
//! Callers pre-scale rows by `sqrt(w_i)`, so this module only sees plain
//! OLS. The solve goes through an SVD with a relative singular value cutoff,
//! so a rank-deficient design (e.g. every sample before the step) yields the
//! minimum-norm solution instead of blowing up.

use nalgebra::{DMatrix, DVector};

/// Solve `min ‖x β - y‖²`.
///
/// Returns `None` for empty systems or when the solution is not finite.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let (rows, cols) = x.shape();
    if rows == 0 || cols == 0 || rows != y.len() {
        return None;
    }

    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    // Same cutoff rule as LAPACK's gelsd with rcond = eps * max(m, n).
    let cutoff = (sigma_max * f64::EPSILON * rows.max(cols) as f64).max(f64::MIN_POSITIVE);

    let beta = svd.solve(y, cutoff).ok()?;
    beta.iter().all(|v| v.is_finite()).then_some(beta)
}
