//! Formatted terminal/web output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized (the web page and CLI share these strings)

use crate::domain::FitResult;
use crate::report::largest_residuals;

/// Format `v` like C's `%.{sig}g`: fixed or scientific notation, whichever is
/// shorter for the value's magnitude, with trailing zeros removed.
pub fn fmt_g(v: f64, sig: usize) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }

    let sig = sig.max(1);
    // Round to `sig` significant digits first; the exponent can change (9.99 -> 10.0).
    let sci = format!("{:.*e}", sig - 1, v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= sig as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", strip_zeros(mantissa), exp.abs())
    } else {
        let decimals = (sig as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{v:.decimals$}")).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// One-line parameter summary shown after a successful fit.
pub fn format_param_line(result: &FitResult) -> String {
    format!(
        "Ka = {}   |   τ = {}   |   y₀ = {}   |   SSE = {}   |   R² = {}",
        fmt_g(result.params.ka, 6),
        fmt_g(result.params.tau, 6),
        fmt_g(result.params.y0, 6),
        fmt_g(result.quality.sse, 6),
        fmt_g(result.quality.r2, 6),
    )
}

/// Caption with the data-derived starting point.
pub fn format_initial_caption(result: &FitResult) -> String {
    format!(
        "Initial guesses: Ka0={}, tau0={}, y0_guess={}",
        fmt_g(result.initial.ka0, 4),
        fmt_g(result.initial.tau0, 4),
        fmt_g(result.initial.y0_guess, 4),
    )
}

/// Format the full fit summary (data stats + parameters + diagnostics).
pub fn format_fit_summary(result: &FitResult, source: &str) -> String {
    let mut out = String::new();

    out.push_str("=== stepfit - First-Order Step Response Fit ===\n");
    out.push_str(&format!("Source: {source}\n"));

    let (t_min, t_max) = min_max(&result.t);
    let (y_min, y_max) = min_max(&result.y);
    out.push_str(&format!(
        "Points: n={} | t=[{}, {}] | y=[{}, {}]\n",
        result.quality.n,
        fmt_g(t_min, 6),
        fmt_g(t_max, 6),
        fmt_g(y_min, 6),
        fmt_g(y_max, 6),
    ));
    out.push_str(&format!(
        "Step: t0={} | y0 {}\n",
        fmt_g(result.t0, 6),
        if result.fit_y0 { "fitted" } else { "fixed at initial guess" }
    ));

    out.push('\n');
    out.push_str(&format_param_line(result));
    out.push('\n');
    out.push_str(&format_initial_caption(result));
    out.push('\n');
    out.push_str(&format!("RMSE = {}\n", fmt_g(result.quality.rmse, 6)));

    match &result.std_errors {
        Some(se) => {
            out.push_str(&format!(
                "Std errors: Ka ±{} | τ ±{}",
                fmt_g(se.ka, 4),
                fmt_g(se.tau, 4)
            ));
            if let Some(y0) = se.y0 {
                out.push_str(&format!(" | y₀ ±{}", fmt_g(y0, 4)));
            }
            out.push('\n');
        }
        None => out.push_str("Std errors: unavailable\n"),
    }
    out.push('\n');

    out
}

/// Table of the `top` samples with the largest absolute residuals.
pub fn format_residual_table(result: &FitResult, top: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Largest residuals (top {top}):\n"));
    out.push_str(
        format!("{:>6} {:>12} {:>12} {:>12} {:>12}", "row", "t", "y", "y_fit", "residual").trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<12} {:-<12} {:-<12} {:-<12}", "", "", "", "", "").trim_end());
    out.push('\n');

    for i in largest_residuals(result, top) {
        out.push_str(
            format!(
                "{:>6} {:>12} {:>12} {:>12} {:>12}",
                i,
                fmt_g(result.t[i], 6),
                fmt_g(result.y[i], 6),
                fmt_g(result.y_fit[i], 6),
                fmt_g(result.residuals[i], 4),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn min_max(v: &[f64]) -> (f64, f64) {
    v.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
}
