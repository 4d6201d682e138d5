//! Bounded Levenberg–Marquardt for small nonlinear least-squares problems.
//!
//! We minimize `Σ r_i(p)^2` by repeatedly solving the damped normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr
//! ```
//!
//! and accepting the step only when it lowers the objective. Lower bounds are
//! enforced by projecting each trial point onto the feasible box.
//!
//! Problems here have 2–3 parameters, so dense `nalgebra` matrices and a
//! Cholesky solve per trial are plenty.

use nalgebra::{DMatrix, DVector};

/// A residual model: `n_residuals` residuals in `n_params` parameters.
pub trait LeastSquaresProblem {
    fn n_params(&self) -> usize;
    fn n_residuals(&self) -> usize;
    /// Fill `out` (length `n_residuals`) with residuals at `p`.
    fn residuals(&self, p: &[f64], out: &mut [f64]);
    /// Fill `out` (`n_residuals × n_params`) with `∂r_i/∂p_j` at `p`.
    fn jacobian(&self, p: &[f64], out: &mut DMatrix<f64>);
}

#[derive(Debug, Clone)]
pub struct LmOptions {
    /// Per-parameter lower bounds (`f64::NEG_INFINITY` for free parameters).
    pub lower: Vec<f64>,
    /// Maximum number of residual evaluations.
    pub max_evals: usize,
    /// Relative reduction in the objective below which we stop.
    pub ftol: f64,
    /// Relative step size below which we stop.
    pub xtol: f64,
    /// Infinity norm of the gradient below which we stop.
    pub gtol: f64,
}

impl LmOptions {
    pub fn new(lower: Vec<f64>, max_evals: usize) -> Self {
        Self {
            lower,
            max_evals,
            ftol: 1e-14,
            xtol: 1e-14,
            gtol: 1e-14,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ObjectiveConverged,
    StepConverged,
    GradientConverged,
    /// Damping grew without finding a descent step.
    Stalled,
    EvalBudget,
}

#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: Vec<f64>,
    pub sse: f64,
    pub evals: usize,
    pub iterations: usize,
    pub termination: Termination,
}

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;
const DIAG_FLOOR: f64 = 1e-12;

/// Minimize the problem's sum of squared residuals starting at `start`.
///
/// Returns `None` if the objective is not finite at the (projected) start.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    start: &[f64],
    opts: &LmOptions,
) -> Option<LmReport> {
    let m = problem.n_residuals();
    let n = problem.n_params();
    debug_assert_eq!(start.len(), n);

    let mut p = project(start, &opts.lower);
    let mut r = vec![0.0; m];
    problem.residuals(&p, &mut r);
    let mut evals = 1usize;
    let mut sse = sum_sq(&r);
    if !sse.is_finite() {
        return None;
    }

    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut r_trial = vec![0.0; m];
    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0usize;

    let termination = 'outer: loop {
        if evals >= opts.max_evals {
            break Termination::EvalBudget;
        }
        if sse == 0.0 {
            break Termination::ObjectiveConverged;
        }

        problem.jacobian(&p, &mut jac);
        let rv = DVector::from_column_slice(&r);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &rv;

        if grad.amax() <= opts.gtol {
            break Termination::GradientConverged;
        }

        iterations += 1;

        loop {
            let mut damped = jtj.clone();
            for i in 0..n {
                damped[(i, i)] += lambda * jtj[(i, i)].max(DIAG_FLOOR);
            }

            let Some(chol) = damped.cholesky() else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    break 'outer Termination::Stalled;
                }
                continue;
            };
            let delta = chol.solve(&(-&grad));

            let moved: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
            let trial = project(&moved, &opts.lower);

            problem.residuals(&trial, &mut r_trial);
            evals += 1;
            let sse_trial = sum_sq(&r_trial);

            if sse_trial.is_finite() && sse_trial < sse {
                let step = norm(&trial.iter().zip(p.iter()).map(|(a, b)| a - b).collect::<Vec<_>>());
                let scale = norm(&p);
                let reduction = sse - sse_trial;

                p = trial;
                std::mem::swap(&mut r, &mut r_trial);
                let prev_sse = sse;
                sse = sse_trial;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if reduction <= opts.ftol * prev_sse {
                    break 'outer Termination::ObjectiveConverged;
                }
                if step <= opts.xtol * (scale + opts.xtol) {
                    break 'outer Termination::StepConverged;
                }
                break;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break 'outer Termination::Stalled;
            }
            if evals >= opts.max_evals {
                break 'outer Termination::EvalBudget;
            }
        }
    };

    Some(LmReport {
        params: p,
        sse,
        evals,
        iterations,
        termination,
    })
}

fn project(p: &[f64], lower: &[f64]) -> Vec<f64> {
    p.iter()
        .enumerate()
        .map(|(i, &v)| match lower.get(i) {
            Some(&lo) if v < lo => lo,
            _ => v,
        })
        .collect()
}

fn sum_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn norm(v: &[f64]) -> f64 {
    sum_sq(v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Residuals of `y = a * exp(-b x)` against fixed samples.
    struct ExpDecay {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for ExpDecay {
        fn n_params(&self) -> usize {
            2
        }

        fn n_residuals(&self) -> usize {
            self.x.len()
        }

        fn residuals(&self, p: &[f64], out: &mut [f64]) {
            for (i, (&x, &y)) in self.x.iter().zip(self.y.iter()).enumerate() {
                out[i] = y - p[0] * (-p[1] * x).exp();
            }
        }

        fn jacobian(&self, p: &[f64], out: &mut DMatrix<f64>) {
            for (i, &x) in self.x.iter().enumerate() {
                let e = (-p[1] * x).exp();
                out[(i, 0)] = -e;
                out[(i, 1)] = p[0] * x * e;
            }
        }
    }

    fn decay_problem() -> ExpDecay {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y = x.iter().map(|&x| 3.0 * (-0.7 * x).exp()).collect();
        ExpDecay { x, y }
    }

    #[test]
    fn recovers_exponential_decay() {
        let problem = decay_problem();
        let opts = LmOptions::new(vec![f64::NEG_INFINITY, f64::NEG_INFINITY], 10_000);
        let report = levenberg_marquardt(&problem, &[1.0, 0.1], &opts).unwrap();

        assert!((report.params[0] - 3.0).abs() < 1e-8, "{report:?}");
        assert!((report.params[1] - 0.7).abs() < 1e-8, "{report:?}");
        assert!(report.sse < 1e-16);
    }

    #[test]
    fn respects_lower_bounds() {
        let problem = decay_problem();
        // Forbid the true rate; the best feasible rate sits on the bound.
        let opts = LmOptions::new(vec![f64::NEG_INFINITY, 1.0], 10_000);
        let report = levenberg_marquardt(&problem, &[1.0, 2.0], &opts).unwrap();

        assert!(report.params[1] >= 1.0);
        assert!((report.params[1] - 1.0).abs() < 1e-6, "{report:?}");
    }

    #[test]
    fn stops_at_eval_budget() {
        let problem = decay_problem();
        let opts = LmOptions::new(vec![f64::NEG_INFINITY, f64::NEG_INFINITY], 3);
        let report = levenberg_marquardt(&problem, &[1.0, 0.1], &opts).unwrap();

        assert!(report.evals <= 3 + 1);
        assert_eq!(report.termination, Termination::EvalBudget);
    }
}
