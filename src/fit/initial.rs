//! Data cleaning and fast initial guesses.
//!
//! Guesses follow three rules of thumb for a first-order response:
//! - baseline `y0`: mean of the samples at or before the step
//! - steady state: mean of the last 20% of samples
//! - time constant: first post-step time the response reaches 63.2% of the
//!   rise, searched upward; a falling response meets it at the step itself

use crate::domain::InitialGuess;

/// Fraction of the total rise reached after one time constant.
const RISE_FRACTION_AT_TAU: f64 = 0.632;

/// Floor for the time-constant guess.
const TAU_GUESS_FLOOR: f64 = 1e-6;

/// Remove pairs with a non-finite value and sort by time.
///
/// The sort is stable, so samples sharing a timestamp keep their input order.
pub fn clean_sort(t: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = t
        .iter()
        .zip(y.iter())
        .filter(|(t, y)| t.is_finite() && y.is_finite())
        .map(|(&t, &y)| (t, y))
        .collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    pairs.into_iter().unzip()
}

/// Initial guesses for `Ka`, `τ` and `y0`.
///
/// `t`/`y` are cleaned and sorted here, so raw columns may be passed directly.
/// Returns `None` when no valid samples remain.
pub fn initial_guesses(t: &[f64], y: &[f64], t0: f64) -> Option<InitialGuess> {
    let (t, y) = clean_sort(t, y);
    let n = y.len();
    if n == 0 {
        return None;
    }

    let pre: Vec<f64> = t
        .iter()
        .zip(y.iter())
        .filter(|(ti, _)| **ti <= t0)
        .map(|(_, &yi)| yi)
        .collect();
    let y0 = if pre.len() >= 2 {
        mean(&pre)
    } else {
        mean(&y[..n.min(3)])
    };

    let n_tail = ((0.2 * n as f64) as usize).max(3).min(n);
    let y_inf = mean(&y[n - n_tail..]);

    let ka0 = y_inf - y0;
    let target = y0 + RISE_FRACTION_AT_TAU * ka0;

    let mut tau0 = if n > 1 { (t[n - 1] - t[0]) / 3.0 } else { 1.0 };

    let after: Vec<(f64, f64)> = t
        .iter()
        .zip(y.iter())
        .filter(|(ti, _)| **ti >= t0)
        .map(|(&ti, &yi)| (ti, yi))
        .collect();

    if let Some(i) = after.iter().position(|&(_, yi)| yi >= target) {
        if i == 0 {
            tau0 = (after[0].0 - t0).max(TAU_GUESS_FLOOR);
        } else {
            let (t1, y1) = after[i - 1];
            let (t2, y2) = after[i];
            let t_cross = t1 + (target - y1) * (t2 - t1) / (y2 - y1 + 1e-12);
            tau0 = (t_cross - t0).max(TAU_GUESS_FLOOR);
        }
    }

    Some(InitialGuess {
        ka0,
        tau0: tau0.max(TAU_GUESS_FLOOR),
        y0_guess: y0,
    })
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(t: f64, ka: f64, tau: f64, y0: f64, t0: f64) -> f64 {
        y0 + ka * (1.0 - (-(t - t0).max(0.0) / tau).exp())
    }

    #[test]
    fn clean_sort_drops_non_finite_and_sorts() {
        let t = [3.0, f64::NAN, 1.0, 2.0, 0.5];
        let y = [30.0, 99.0, 10.0, f64::INFINITY, 5.0];
        let (t, y) = clean_sort(&t, &y);
        assert_eq!(t, vec![0.5, 1.0, 3.0]);
        assert_eq!(y, vec![5.0, 10.0, 30.0]);
    }

    #[test]
    fn clean_sort_is_stable_for_equal_times() {
        let (t, y) = clean_sort(&[1.0, 0.0, 1.0], &[7.0, 0.0, 8.0]);
        assert_eq!(t, vec![0.0, 1.0, 1.0]);
        assert_eq!(y, vec![0.0, 7.0, 8.0]);
    }

    #[test]
    fn guesses_on_clean_rising_step() {
        let t: Vec<f64> = (0..=100).map(|i| i as f64 * 0.2 - 2.0).collect();
        let y: Vec<f64> = t.iter().map(|&ti| step(ti, 4.0, 1.5, 2.0, 0.0)).collect();
        let g = initial_guesses(&t, &y, 0.0).unwrap();

        assert!((g.y0_guess - 2.0).abs() < 1e-12);
        assert!((g.ka0 - 4.0).abs() < 1e-2, "ka0={}", g.ka0);
        assert!((g.tau0 - 1.5).abs() < 0.05, "tau0={}", g.tau0);
    }

    #[test]
    fn guesses_on_falling_step() {
        let t: Vec<f64> = (0..=60).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = t.iter().map(|&ti| step(ti, -3.0, 4.0, 10.0, 1.0)).collect();
        let g = initial_guesses(&t, &y, 1.0).unwrap();

        assert!((g.y0_guess - 10.0).abs() < 1e-12);
        assert!(g.ka0 < -2.5);
        // The first post-step sample already sits above the target.
        assert_eq!(g.tau0, 1e-6);
    }

    #[test]
    fn baseline_falls_back_to_first_points_without_pre_step_data() {
        let t = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let g = initial_guesses(&t, &y, 0.0).unwrap();
        assert!((g.y0_guess - 2.0).abs() < 1e-12);
        // Tail of max(3, 1) samples.
        assert!((g.ka0 - (4.0 - 2.0)).abs() < 1e-12);
    }

    #[test]
    fn tau_defaults_to_third_of_span_without_crossing() {
        // Flat data never reaches a strictly higher target.
        let t = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let g = initial_guesses(&t, &y, 10.0).unwrap();
        assert!((g.tau0 - 2.0).abs() < 1e-12);
        assert_eq!(g.ka0, 0.0);
    }

    #[test]
    fn tau_floor_when_first_post_step_sample_crosses() {
        let t = [0.0, 1.0, 1.0, 2.0, 3.0];
        let y = [0.0, 0.0, 5.0, 5.0, 5.0];
        let g = initial_guesses(&t, &y, 1.0).unwrap();
        assert!((g.tau0 - 1e-6).abs() < 1e-18, "tau0={}", g.tau0);
    }

    #[test]
    fn empty_input_has_no_guess() {
        assert!(initial_guesses(&[f64::NAN], &[1.0], 0.0).is_none());
    }
}
