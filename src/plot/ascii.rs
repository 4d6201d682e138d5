//! ASCII plotting for terminal output.
//!
//! A fixed-size character canvas: deterministic output for a given input,
//! which keeps golden tests simple.
//!
//! Plot elements:
//! - measured samples: `o`
//! - fitted model: `-` line

use crate::domain::{FitFile, FitResult};
use crate::io::fit_json::curve_grid;

/// Render samples and the fitted curve for an in-memory fit result.
pub fn render_ascii_plot(result: &FitResult, width: usize, height: usize) -> String {
    let points = pairs(&result.t, &result.y);
    let grid = curve_grid(result, width.max(2));
    render(&points, Some(&pairs(&grid.t, &grid.y)), width, height)
}

/// Render a plot from a saved fit file (samples plus the stored model grid).
pub fn render_ascii_plot_from_fit_file(fit: &FitFile, width: usize, height: usize) -> String {
    let points = pairs(&fit.data.t, &fit.data.y);
    let curve = pairs(&fit.grid.t, &fit.grid.y);
    render(&points, Some(&curve), width, height)
}

/// Render samples only; `stepfit fit` prints this when the fit fails.
pub fn render_ascii_data_plot(t: &[f64], y: &[f64], width: usize, height: usize) -> String {
    render(&pairs(t, y), None, width, height)
}

fn pairs(t: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    t.iter()
        .zip(y.iter())
        .filter(|(t, y)| t.is_finite() && y.is_finite())
        .map(|(&t, &y)| (t, y))
        .collect()
}

fn render(points: &[(f64, f64)], curve: Option<&[(f64, f64)]>, width: usize, height: usize) -> String {
    let all = || points.iter().chain(curve.unwrap_or(&[]).iter());
    let t_span = span(all().map(|p| p.0)).unwrap_or((0.0, 1.0));
    let (y_lo, y_hi) = span(all().map(|p| p.1))
        .or_else(|| {
            // Flat data: center a unit-height window on it.
            all().next().map(|p| (p.1 - 0.5, p.1 + 0.5))
        })
        .unwrap_or((0.0, 1.0));
    let pad = ((y_hi - y_lo) * 0.05).max(1e-12);
    let y_span = (y_lo - pad, y_hi + pad);

    let mut canvas = Canvas::new(width.max(10), height.max(5), t_span, y_span);

    // Curve first so samples overlay it.
    if let Some(curve) = curve {
        for seg in curve.windows(2) {
            canvas.line(seg[0], seg[1], '-');
        }
    }
    for &p in points {
        canvas.set(p, 'o');
    }

    format!(
        "Plot: t=[{:.3}, {:.3}] | y=[{:.3}, {:.3}]\n{}",
        t_span.0, t_span.1, y_span.0, y_span.1, canvas
    )
}

/// Finite `(min, max)` with `max > min`.
fn span(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

/// Character grid with row 0 at the top (largest y).
struct Canvas {
    cells: Vec<Vec<char>>,
    t_span: (f64, f64),
    y_span: (f64, f64),
}

impl Canvas {
    fn new(width: usize, height: usize, t_span: (f64, f64), y_span: (f64, f64)) -> Self {
        Self {
            cells: vec![vec![' '; width]; height],
            t_span,
            y_span,
        }
    }

    fn width(&self) -> usize {
        self.cells[0].len()
    }

    fn height(&self) -> usize {
        self.cells.len()
    }

    /// Map a data point to `(col, row)`; out-of-range values clamp to the edge.
    fn cell(&self, (t, y): (f64, f64)) -> (usize, usize) {
        let u = ((t - self.t_span.0) / (self.t_span.1 - self.t_span.0)).clamp(0.0, 1.0);
        let v = ((y - self.y_span.0) / (self.y_span.1 - self.y_span.0)).clamp(0.0, 1.0);
        let last_col = (self.width() - 1) as f64;
        let last_row = (self.height() - 1) as f64;
        ((u * last_col).round() as usize, (last_row - v * last_row).round() as usize)
    }

    fn set(&mut self, p: (f64, f64), ch: char) {
        let (col, row) = self.cell(p);
        self.cells[row][col] = ch;
    }

    /// Bresenham line between two data points; only fills blank cells.
    fn line(&mut self, a: (f64, f64), b: (f64, f64), ch: char) {
        let (x0, y0) = self.cell(a);
        let (x1, y1) = self.cell(b);
        let (mut x, mut y) = (x0 as isize, y0 as isize);
        let (x1, y1) = (x1 as isize, y1 as isize);

        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            // Both endpoints come from `cell`, so every visited cell is in range.
            let slot = &mut self.cells[y as usize][x as usize];
            if *slot == ' ' {
                *slot = ch;
            }
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

impl std::fmt::Display for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.cells {
            let line: String = row.iter().collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, InitialGuess, StepParams};

    fn flat_fit() -> FitResult {
        let params = StepParams {
            ka: 0.0,
            tau: 1.0,
            y0: 0.0,
        };
        FitResult {
            t: vec![0.0, 10.0],
            y: vec![0.0, 1.0],
            t0: 0.0,
            fit_y0: true,
            params,
            initial: InitialGuess {
                ka0: 0.0,
                tau0: 1.0,
                y0_guess: 0.0,
            },
            quality: FitQuality {
                sse: 1.0,
                r2: 0.0,
                rmse: 0.7,
                n: 2,
            },
            y_fit: vec![0.0, 0.0],
            residuals: vec![0.0, 1.0],
            std_errors: None,
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let txt = render_ascii_plot(&flat_fit(), 10, 5);
        let expected = concat!(
            "Plot: t=[0.000, 10.000] | y=[-0.050, 1.050]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn data_only_plot_has_no_curve() {
        let txt = render_ascii_data_plot(&[0.0, 1.0, f64::NAN], &[0.0, 1.0, 5.0], 10, 5);
        let body: String = txt.lines().skip(1).collect();
        assert!(!body.contains('-'));
        assert_eq!(body.matches('o').count(), 2);
    }

    #[test]
    fn flat_data_still_renders() {
        let txt = render_ascii_data_plot(&[0.0, 1.0, 2.0], &[3.0, 3.0, 3.0], 12, 5);
        assert_eq!(txt.lines().count(), 6);
        let body: String = txt.lines().skip(1).collect();
        assert_eq!(body.matches('o').count(), 3);
    }
}
