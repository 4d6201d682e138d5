//! Fitting routine for the first-order step response.
//!
//! Given:
//! - times `t_i` and measurements `y_i`
//! - a step time `t0`
//!
//! we:
//! - clean/sort the data and derive initial guesses
//! - scan a grid of τ values, solving `(y0, Ka)` by weighted OLS at each one
//! - refine `(Ka, τ, y0)` jointly with bounded Levenberg–Marquardt
//! - optionally repeat with Huber weights (robust mode)
//!
//! and return the fitted parameters with residuals and diagnostics.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{
    FitConfig, FitQuality, FitResult, InitialGuess, MIN_POINTS, RobustKind, StdErrors, StepParams,
    TAU_LOWER_BOUND,
};
use crate::error::AppError;
use crate::fit::initial::{clean_sort, initial_guesses};
use crate::fit::tau_grid::tau_candidates;
use crate::math::{levenberg_marquardt, solve_least_squares, LeastSquaresProblem, LmOptions};
use crate::models::{fill_design_row, gradient, predict, predict_all};

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    params: StepParams,
    sse: f64,
}

/// Fit `Ka` and `τ` (and optionally `y0`) by nonlinear least squares.
///
/// Non-finite pairs are dropped and the data is sorted by time before fitting.
pub fn fit_first_order(t: &[f64], y: &[f64], config: &FitConfig) -> Result<FitResult, AppError> {
    validate_config(config)?;

    let (t, y) = clean_sort(t, y);
    let n = t.len();
    if n < MIN_POINTS {
        return Err(AppError::new(
            3,
            format!("Need at least {MIN_POINTS} valid data points."),
        ));
    }

    let initial = initial_guesses(&t, &y, config.t0)
        .ok_or_else(|| AppError::new(3, "No valid data points."))?;
    tracing::debug!(
        ka0 = initial.ka0,
        tau0 = initial.tau0,
        y0_guess = initial.y0_guess,
        "initial guesses"
    );

    // Robust fitting is implemented as a small number of outer iterations:
    //
    // - start with uniform weights
    // - fit by tau grid search + refinement
    // - compute residuals
    // - update weights (Huber) and repeat
    let w_base = vec![1.0; n];
    let mut w_work = w_base.clone();
    let n_passes = match config.robust {
        RobustKind::None => 1,
        RobustKind::Huber => config.robust_iters.saturating_add(1),
    };

    let mut params = fit_weighted(&t, &y, &w_work, config, &initial)?;
    for pass in 1..n_passes {
        let residuals: Vec<f64> = t
            .iter()
            .zip(y.iter())
            .map(|(&ti, &yi)| yi - predict(ti, &params, config.t0))
            .collect();
        w_work = huber_reweight(&w_base, &residuals, config.robust_k);
        params = fit_weighted(&t, &y, &w_work, config, &initial)?;
        tracing::debug!(pass, ka = params.ka, tau = params.tau, y0 = params.y0, "robust refit");
    }

    let y_fit = predict_all(&t, &params, config.t0);
    let residuals: Vec<f64> = y.iter().zip(y_fit.iter()).map(|(a, b)| a - b).collect();
    let sse: f64 = residuals.iter().map(|r| r * r).sum();
    if !sse.is_finite() {
        return Err(AppError::new(4, "Non-finite residuals after fitting."));
    }

    let ybar = y.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - ybar) * (v - ybar)).sum();
    let r2 = if ss_tot > 0.0 { 1.0 - sse / ss_tot } else { f64::NAN };
    let rmse = (sse / n as f64).sqrt();

    let std_errors = standard_errors(&t, &params, config, sse);

    tracing::info!(
        n,
        ka = params.ka,
        tau = params.tau,
        y0 = params.y0,
        sse,
        r2,
        "fit complete"
    );

    Ok(FitResult {
        t,
        y,
        t0: config.t0,
        fit_y0: config.fit_y0,
        params,
        initial,
        quality: FitQuality { sse, r2, rmse, n },
        y_fit,
        residuals,
        std_errors,
    })
}

fn validate_config(config: &FitConfig) -> Result<(), AppError> {
    if !config.t0.is_finite() {
        return Err(AppError::new(2, "Step time t0 must be a finite number."));
    }
    if config.tau_steps < 2 {
        return Err(AppError::new(2, "Tau steps must be >= 2."));
    }
    if config.max_evals == 0 {
        return Err(AppError::new(2, "Evaluation budget must be > 0."));
    }
    if config.robust == RobustKind::Huber && !(config.robust_k.is_finite() && config.robust_k > 0.0) {
        return Err(AppError::new(2, "Huber constant must be finite and > 0."));
    }
    Ok(())
}

/// One weighted fit: grid search over τ, then joint refinement.
fn fit_weighted(
    t: &[f64],
    y: &[f64],
    w: &[f64],
    config: &FitConfig,
    initial: &InitialGuess,
) -> Result<StepParams, AppError> {
    let span = t[t.len() - 1] - t[0];
    let grid = tau_candidates(initial.tau0, span, config.tau_steps)?;

    // Evaluate each tau independently (parallel).
    let candidates: Vec<Candidate> = grid
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &tau)| {
            evaluate_candidate(tau, t, y, w, config, initial.y0_guess)
                .map(|(params, sse)| Candidate { idx, params, sse })
        })
        .collect();

    // Deterministic selection: pick the minimum SSE; break ties by original grid index.
    let grid_best = candidates
        .iter()
        .min_by(|a, b| {
            a.sse
                .partial_cmp(&b.sse)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.idx.cmp(&b.idx))
        })
        .cloned();

    let problem = StepProblem {
        t,
        y,
        sw: w.iter().map(|v| v.sqrt()).collect(),
        t0: config.t0,
        fit_y0: config.fit_y0,
        y0_fixed: initial.y0_guess,
    };
    let lower = if config.fit_y0 {
        vec![f64::NEG_INFINITY, TAU_LOWER_BOUND, f64::NEG_INFINITY]
    } else {
        vec![f64::NEG_INFINITY, TAU_LOWER_BOUND]
    };
    let opts = LmOptions::new(lower, config.max_evals);

    let mut starts = Vec::with_capacity(2);
    if let Some(c) = &grid_best {
        tracing::debug!(tau = c.params.tau, sse = c.sse, grid = grid.len(), "grid best");
        starts.push(c.params);
    }
    starts.push(initial.params());

    let mut best: Option<(StepParams, f64)> = grid_best.map(|c| (c.params, c.sse));
    for start in starts {
        let Some(report) = levenberg_marquardt(&problem, &problem.pack(&start), &opts) else {
            continue;
        };
        tracing::debug!(
            iterations = report.iterations,
            evals = report.evals,
            sse = report.sse,
            termination = ?report.termination,
            "refinement"
        );
        let params = problem.unpack(&report.params);
        let better = match &best {
            Some((_, sse)) => report.sse < *sse,
            None => true,
        };
        if better && params.tau > 0.0 {
            best = Some((params, report.sse));
        }
    }

    best.map(|(params, _)| params).ok_or_else(|| {
        AppError::new(4, "Fit failed: no finite solution found for the given data.")
    })
}

fn evaluate_candidate(
    tau: f64,
    t: &[f64],
    y: &[f64],
    w: &[f64],
    config: &FitConfig,
    y0_fixed: f64,
) -> Option<(StepParams, f64)> {
    let n = t.len();
    let p = if config.fit_y0 { 2 } else { 1 };

    // Build weighted design matrix X_w and weighted observation vector y_w.
    let mut xw = DMatrix::<f64>::zeros(n, p);
    let mut yw = DVector::<f64>::zeros(n);
    let mut row = [0.0; 2];

    for i in 0..n {
        fill_design_row(t[i], config.t0, tau, config.fit_y0, &mut row);
        let sw = w[i].sqrt();
        for j in 0..p {
            xw[(i, j)] = row[j] * sw;
        }
        // With y0 held fixed, move the known baseline to the left-hand side.
        let target = if config.fit_y0 { y[i] } else { y[i] - y0_fixed };
        yw[i] = target * sw;
    }

    let beta = solve_least_squares(&xw, &yw)?;
    let params = if config.fit_y0 {
        StepParams {
            ka: beta[1],
            tau,
            y0: beta[0],
        }
    } else {
        StepParams {
            ka: beta[0],
            tau,
            y0: y0_fixed,
        }
    };

    let mut sse = 0.0;
    for i in 0..n {
        let r = y[i] - predict(t[i], &params, config.t0);
        sse += w[i] * r * r;
    }

    if sse.is_finite() { Some((params, sse)) } else { None }
}

/// Weighted residuals `sqrt(w_i) (y_i - f(t_i))` over `[Ka, τ]` or `[Ka, τ, y0]`.
struct StepProblem<'a> {
    t: &'a [f64],
    y: &'a [f64],
    sw: Vec<f64>,
    t0: f64,
    fit_y0: bool,
    y0_fixed: f64,
}

impl StepProblem<'_> {
    fn pack(&self, params: &StepParams) -> Vec<f64> {
        if self.fit_y0 {
            vec![params.ka, params.tau, params.y0]
        } else {
            vec![params.ka, params.tau]
        }
    }

    fn unpack(&self, p: &[f64]) -> StepParams {
        StepParams {
            ka: p[0],
            tau: p[1],
            y0: if self.fit_y0 { p[2] } else { self.y0_fixed },
        }
    }
}

impl LeastSquaresProblem for StepProblem<'_> {
    fn n_params(&self) -> usize {
        if self.fit_y0 { 3 } else { 2 }
    }

    fn n_residuals(&self) -> usize {
        self.t.len()
    }

    fn residuals(&self, p: &[f64], out: &mut [f64]) {
        let params = self.unpack(p);
        for i in 0..self.t.len() {
            out[i] = self.sw[i] * (self.y[i] - predict(self.t[i], &params, self.t0));
        }
    }

    fn jacobian(&self, p: &[f64], out: &mut DMatrix<f64>) {
        let params = self.unpack(p);
        let mut g = [0.0; 3];
        for i in 0..self.t.len() {
            gradient(self.t[i], &params, self.t0, self.fit_y0, &mut g);
            for j in 0..self.n_params() {
                out[(i, j)] = -self.sw[i] * g[j];
            }
        }
    }
}

/// Linearized parameter uncertainties: `sqrt(diag(s² (JᵀJ)⁻¹))`, `s² = SSE/(n-p)`.
fn standard_errors(t: &[f64], params: &StepParams, config: &FitConfig, sse: f64) -> Option<StdErrors> {
    let p = if config.fit_y0 { 3 } else { 2 };
    let n = t.len();
    if n <= p {
        return None;
    }

    let mut jac = DMatrix::<f64>::zeros(n, p);
    let mut g = [0.0; 3];
    for (i, &ti) in t.iter().enumerate() {
        gradient(ti, params, config.t0, config.fit_y0, &mut g);
        for j in 0..p {
            jac[(i, j)] = g[j];
        }
    }

    let cov = (jac.transpose() * &jac).try_inverse()?;
    let s2 = sse / (n - p) as f64;
    let se = |j: usize| {
        let v = s2 * cov[(j, j)];
        if v.is_finite() && v >= 0.0 { Some(v.sqrt()) } else { None }
    };

    Some(StdErrors {
        ka: se(0)?,
        tau: se(1)?,
        y0: if config.fit_y0 { Some(se(2)?) } else { None },
    })
}

fn huber_reweight(w_base: &[f64], residuals: &[f64], k: f64) -> Vec<f64> {
    // Scale via MAD (median absolute deviation). This keeps weighting robust and
    // deterministic (no RNG).
    let mut abs: Vec<f64> = residuals.iter().map(|r| r.abs()).filter(|v| v.is_finite()).collect();
    let mad = median_mut(&mut abs).unwrap_or(0.0);
    let scale = (mad / 0.6745).max(1e-12);
    let cutoff = (k.max(1e-6)) * scale;

    let min_factor = 1e-3;
    w_base
        .iter()
        .zip(residuals.iter())
        .map(|(&w0, &r)| {
            let ar = r.abs();
            let factor = if ar <= cutoff || !ar.is_finite() { 1.0 } else { cutoff / ar };
            (w0 * factor).max(w0 * min_factor)
        })
        .collect()
}

fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    const TRUE: StepParams = StepParams {
        ka: 2.5,
        tau: 1.8,
        y0: 0.7,
    };

    fn synthetic(t0: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
        let t: Vec<f64> = (0..n).map(|i| i as f64 * 0.25).collect();
        let y = predict_all(&t, &TRUE, t0);
        (t, y)
    }

    #[test]
    fn recovers_noise_free_parameters() {
        let (t, y) = synthetic(1.0, 60);
        let config = FitConfig {
            t0: 1.0,
            ..FitConfig::default()
        };
        let fit = fit_first_order(&t, &y, &config).unwrap();

        assert!((fit.params.ka - TRUE.ka).abs() < 1e-6, "{:?}", fit.params);
        assert!((fit.params.tau - TRUE.tau).abs() < 1e-6, "{:?}", fit.params);
        assert!((fit.params.y0 - TRUE.y0).abs() < 1e-6, "{:?}", fit.params);
        assert!(fit.quality.sse < 1e-10);
        assert!((fit.quality.r2 - 1.0).abs() < 1e-10);
        assert_eq!(fit.quality.n, 60);
    }

    #[test]
    fn noisy_data_gives_high_r2() {
        let (t, mut y) = synthetic(0.5, 120);
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.02).unwrap();
        for v in &mut y {
            *v += noise.sample(&mut rng);
        }

        let config = FitConfig {
            t0: 0.5,
            ..FitConfig::default()
        };
        let fit = fit_first_order(&t, &y, &config).unwrap();

        assert!(fit.quality.r2 > 0.99, "r2={}", fit.quality.r2);
        assert!((fit.params.tau - TRUE.tau).abs() < 0.1, "{:?}", fit.params);
        let se = fit.std_errors.expect("standard errors");
        assert!(se.ka > 0.0 && se.tau > 0.0 && se.y0.unwrap() > 0.0);
    }

    #[test]
    fn fixed_baseline_uses_initial_guess() {
        let (t, y) = synthetic(2.0, 60);
        let config = FitConfig {
            t0: 2.0,
            fit_y0: false,
            ..FitConfig::default()
        };
        let fit = fit_first_order(&t, &y, &config).unwrap();

        assert_eq!(fit.params.y0, fit.initial.y0_guess);
        assert!((fit.params.y0 - TRUE.y0).abs() < 1e-12);
        assert!((fit.params.tau - TRUE.tau).abs() < 1e-6);
        assert!(fit.std_errors.map(|s| s.y0.is_none()).unwrap_or(true));
    }

    #[test]
    fn outputs_are_aligned_and_sorted() {
        let (mut t, mut y) = synthetic(0.0, 20);
        t.reverse();
        y.reverse();
        t.push(f64::NAN);
        y.push(1.0);

        let fit = fit_first_order(&t, &y, &FitConfig::default()).unwrap();
        assert_eq!(fit.t.len(), 20);
        assert_eq!(fit.y_fit.len(), 20);
        assert_eq!(fit.residuals.len(), 20);
        assert!(fit.t.windows(2).all(|w| w[0] <= w[1]));
        for i in 0..20 {
            assert!((fit.y[i] - fit.y_fit[i] - fit.residuals[i]).abs() < 1e-15);
        }
    }

    #[test]
    fn too_few_points_is_an_error() {
        let err = fit_first_order(&[0.0, 1.0, 2.0, f64::NAN], &[1.0, 2.0, 3.0, 4.0], &FitConfig::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "Need at least 4 valid data points.");
    }

    #[test]
    fn constant_data_has_nan_r2() {
        let t = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0; 6];
        let fit = fit_first_order(&t, &y, &FitConfig::default()).unwrap();
        assert!(fit.quality.r2.is_nan());
        assert!(fit.quality.sse < 1e-20);
        assert!(fit.params.tau > 0.0);
    }

    #[test]
    fn huber_resists_a_spike() {
        let (t, mut y) = synthetic(1.0, 80);
        y[40] += 25.0;

        let plain = fit_first_order(
            &t,
            &y,
            &FitConfig {
                t0: 1.0,
                ..FitConfig::default()
            },
        )
        .unwrap();
        let robust = fit_first_order(
            &t,
            &y,
            &FitConfig {
                t0: 1.0,
                robust: RobustKind::Huber,
                robust_iters: 5,
                ..FitConfig::default()
            },
        )
        .unwrap();

        let err_plain = (plain.params.ka - TRUE.ka).abs();
        let err_robust = (robust.params.ka - TRUE.ka).abs();
        assert!(err_robust < err_plain, "robust {err_robust} vs plain {err_plain}");
    }

    #[test]
    fn rejects_non_finite_step_time() {
        let (t, y) = synthetic(0.0, 10);
        let config = FitConfig {
            t0: f64::NAN,
            ..FitConfig::default()
        };
        assert_eq!(fit_first_order(&t, &y, &config).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn huber_weights_downweight_large_residuals() {
        let w = huber_reweight(&[1.0; 5], &[0.1, -0.1, 0.05, 0.0, 10.0], 1.5);
        assert_eq!(w[0], 1.0);
        assert!(w[4] < 0.1);
    }
}
