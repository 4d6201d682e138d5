//! Model evaluation for the first-order step response.
//!
//! The fitter relies on three primitive operations:
//! - build a design row for a given time constant (for the linear profile solve)
//! - predict y(t) given parameters (for residuals/plots)
//! - partial derivatives with respect to the fitted parameters (for refinement)

use crate::domain::StepParams;
use crate::math::{rise, rise_dtau};

/// Predict `y(t)`; equals `y0` for every `t < t0`.
pub fn predict(t: f64, params: &StepParams, t0: f64) -> f64 {
    params.y0 + params.ka * rise(t, t0, params.tau)
}

/// Predict over a slice of times.
pub fn predict_all(t: &[f64], params: &StepParams, t0: f64) -> Vec<f64> {
    t.iter().map(|&ti| predict(ti, params, t0)).collect()
}

/// Fill a design row `[1, g(t)]` for the linear unknowns `(y0, Ka)` at fixed `τ`.
///
/// When the baseline is held fixed only `[g(t)]` is written.
///
/// # Panics
/// Panics if `out` is shorter than the number of linear unknowns.
pub fn fill_design_row(t: f64, t0: f64, tau: f64, fit_y0: bool, out: &mut [f64]) {
    let g = rise(t, t0, tau);
    if fit_y0 {
        out[0] = 1.0;
        out[1] = g;
    } else {
        out[0] = g;
    }
}

/// Partial derivatives of `y(t)` in parameter order `[Ka, τ, y0]`
/// (`y0` omitted when it is held fixed).
pub fn gradient(t: f64, params: &StepParams, t0: f64, fit_y0: bool, out: &mut [f64]) {
    out[0] = rise(t, t0, params.tau);
    out[1] = params.ka * rise_dtau(t, t0, params.tau);
    if fit_y0 {
        out[2] = 1.0;
    }
}
