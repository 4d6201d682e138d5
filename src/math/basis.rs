//! Stable basis functions for the first-order step response.
//!
//! For elapsed time `s = max(t - t0, 0)` and `x = s / τ`:
//!
//! - `g(s, τ) = 1 - exp(-x)` (rise fraction)
//! - `∂g/∂τ = -(s / τ²) · exp(-x)`
//!
//! Numerical notes:
//! - For small `x`, `1 - exp(-x)` suffers from catastrophic cancellation.
//!   We compute it as `-expm1(-x)`.
//! - Before the step (`t < t0`) both functions are exactly 0.

/// Elapsed time since the step, clamped at 0.
pub fn elapsed(t: f64, t0: f64) -> f64 {
    (t - t0).max(0.0)
}

/// Rise fraction `1 - exp(-(t - t0)/τ)` (0 before the step).
pub fn rise(t: f64, t0: f64, tau: f64) -> f64 {
    let s = elapsed(t, t0);
    if s == 0.0 {
        return 0.0;
    }
    -(-s / tau).exp_m1()
}

/// Derivative of the rise fraction with respect to `τ`.
pub fn rise_dtau(t: f64, t0: f64, tau: f64) -> f64 {
    let s = elapsed(t, t0);
    if s == 0.0 {
        return 0.0;
    }
    let x = s / tau;
    -(x / tau) * (-x).exp()
}
