//! Time constant grid for the profile search.
//!
//! For a fixed τ the step model is linear in `(y0, Ka)`, so the fitter
//! solves the linear part exactly on a log-spaced τ grid and hands the best
//! grid point to the nonlinear refinement. The grid depends only on the data
//! span and the initial guess, which keeps fits reproducible.

use crate::error::AppError;

/// Smallest grid value relative to the sampled time span.
const GRID_MIN_FRACTION: f64 = 1e-3;
/// Largest grid value relative to the sampled time span.
const GRID_MAX_FRACTION: f64 = 10.0;
/// Absolute floor on grid values.
const GRID_FLOOR: f64 = 1e-6;

/// `steps` geometrically spaced values from `min` to `max`; both endpoints are exact.
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    let valid = min.is_finite() && max.is_finite() && min > 0.0 && max > min;
    if !valid {
        return Err(AppError::new(
            2,
            format!("Invalid tau range: min={min}, max={max} (need 0 < min < max, both finite)."),
        ));
    }
    if steps < 2 {
        return Err(AppError::new(2, "Tau steps must be >= 2."));
    }

    let ratio = max / min;
    let last = (steps - 1) as f64;
    Ok((0..steps)
        .map(|i| match i {
            0 => min,
            i if i == steps - 1 => max,
            i => min * ratio.powf(i as f64 / last),
        })
        .collect())
}

/// Candidate time constants for the profile search.
///
/// Spans three decades below to one decade above the sampled time span and
/// always contains the initial guess `tau0`. Sorted ascending, no duplicates.
pub fn tau_candidates(tau0: f64, t_span: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    let span = if t_span.is_finite() && t_span > 0.0 {
        t_span
    } else {
        1.0
    };
    let lo = (span * GRID_MIN_FRACTION).max(GRID_FLOOR);
    let mut hi = span * GRID_MAX_FRACTION;
    if tau0.is_finite() {
        hi = hi.max(tau0 * GRID_MAX_FRACTION);
    }
    hi = hi.max(lo * GRID_MAX_FRACTION);

    let mut out = log_space(lo, hi, steps)?;
    if tau0.is_finite() && tau0 > 0.0 {
        out.push(tau0);
    }
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    out.dedup_by(|a, b| (*a - *b).abs() <= 1e-12 * b.abs());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn log_space_rejects_bad_ranges() {
        assert_eq!(log_space(0.0, 1.0, 5).unwrap_err().exit_code(), 2);
        assert_eq!(log_space(2.0, 1.0, 5).unwrap_err().exit_code(), 2);
        assert_eq!(log_space(0.1, 1.0, 1).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn candidates_contain_guess_and_are_sorted() {
        let grid = tau_candidates(3.3, 20.0, 30).unwrap();
        assert!(grid.iter().any(|&t| (t - 3.3).abs() < 1e-15));
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
        assert!((grid[0] - 0.02).abs() < 1e-12);
        assert!((grid[grid.len() - 1] - 200.0).abs() < 1e-9);
    }

    #[test]
    fn candidates_extend_for_long_guess() {
        let grid = tau_candidates(500.0, 10.0, 10).unwrap();
        assert!((grid[grid.len() - 1] - 5000.0).abs() < 1e-6);
    }
}
