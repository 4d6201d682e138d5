//! SVG chart for the web UI.
//!
//! Rendered in memory with Plotters' SVG backend so the page can inline it.

use plotters::prelude::*;

use crate::domain::FitResult;
use crate::error::AppError;
use crate::io::fit_json::curve_grid;

/// Samples of the dense model curve drawn over the data.
const CURVE_POINTS: usize = 400;

/// Render data markers plus the fitted model line.
pub fn render_fit_svg(result: &FitResult, width: u32, height: u32) -> Result<String, AppError> {
    let points: Vec<(f64, f64)> = result
        .t
        .iter()
        .zip(result.y.iter())
        .map(|(&t, &y)| (t, y))
        .collect();
    let grid = curve_grid(result, CURVE_POINTS);
    let curve: Vec<(f64, f64)> = grid.t.into_iter().zip(grid.y).collect();
    render_svg(&points, Some(&curve), width, height)
}

/// Render data markers only (fit failed or not yet run).
pub fn render_data_svg(t: &[f64], y: &[f64], width: u32, height: u32) -> Result<String, AppError> {
    let points: Vec<(f64, f64)> = t
        .iter()
        .zip(y.iter())
        .filter(|(t, y)| t.is_finite() && y.is_finite())
        .map(|(&t, &y)| (t, y))
        .collect();
    render_svg(&points, None, width, height)
}

fn render_svg(
    points: &[(f64, f64)],
    curve: Option<&[(f64, f64)]>,
    width: u32,
    height: u32,
) -> Result<String, AppError> {
    let all = points.iter().chain(curve.unwrap_or(&[]).iter());
    let (x_range, y_range) = bounds(all);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width.max(200), height.max(150))).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(16)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("t")
            .y_desc("y")
            .light_line_style(RGBColor(235, 235, 235))
            .draw()
            .map_err(plot_error)?;

        let data_color = RGBColor(31, 119, 180);
        let fit_color = RGBColor(214, 39, 40);

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, data_color.filled())),
            )
            .map_err(plot_error)?
            .label("Data")
            .legend(move |(x, y)| Circle::new((x + 10, y), 3, data_color.filled()));

        if let Some(curve) = curve {
            chart
                .draw_series(LineSeries::new(curve.iter().copied(), fit_color.stroke_width(2)))
                .map_err(plot_error)?
                .label("Fit")
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], fit_color.stroke_width(2)));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .draw()
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
    }

    Ok(svg)
}

fn bounds<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> ((f64, f64), (f64, f64)) {
    let mut x = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y = (f64::INFINITY, f64::NEG_INFINITY);
    for &(px, py) in points {
        if px.is_finite() && py.is_finite() {
            x = (x.0.min(px), x.1.max(px));
            y = (y.0.min(py), y.1.max(py));
        }
    }
    (padded(x), padded(y))
}

fn padded((lo, hi): (f64, f64)) -> (f64, f64) {
    if !(lo.is_finite() && hi.is_finite()) {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    if span <= 0.0 {
        let pad = lo.abs().max(1.0) * 0.5;
        return (lo - pad, hi + pad);
    }
    (lo - span * 0.05, hi + span * 0.05)
}

fn plot_error(e: impl std::fmt::Display) -> AppError {
    AppError::new(4, format!("Failed to render plot: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_svg_has_markers_and_legend() {
        let svg = render_data_svg(&[0.0, 1.0, 2.0], &[1.0, 2.0, 2.5], 640, 400).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<circle"));
        assert!(svg.contains("Data"));
        assert!(!svg.contains(">Fit<"));
    }

    #[test]
    fn empty_data_still_renders_axes() {
        let svg = render_data_svg(&[], &[], 640, 400).unwrap();
        assert!(svg.contains("</svg>"));
    }

    #[test]
    fn padding_handles_flat_ranges() {
        assert_eq!(padded((2.0, 2.0)), (1.0, 3.0));
        assert_eq!(padded((f64::INFINITY, f64::NEG_INFINITY)), (0.0, 1.0));
        let (lo, hi) = padded((0.0, 10.0));
        assert!((lo + 0.5).abs() < 1e-12 && (hi - 10.5).abs() < 1e-12);
    }
}
