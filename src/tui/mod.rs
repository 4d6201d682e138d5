//! Ratatui-based terminal UI.
//!
//! One data file, one screen: the measured points and the fitted step
//! response on top, the fit settings below. Changing a setting refits
//! immediately; a failed fit keeps the data on screen and reports the
//! reason in the footer.

use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Terminal,
};

use crate::cli::TuiArgs;
use crate::domain::{FitConfig, FitResult, RawColumns, ReadOptions, RobustKind};
use crate::error::AppError;

mod plotters_chart;

use plotters_chart::StepPlottersChart;

/// Number of points on the drawn fit curve.
const CURVE_POINTS: usize = 200;

/// Input poll interval.
const TICK: Duration = Duration::from_millis(100);

/// Settings rows, in display order.
const FIELD_T0: usize = 0;
const FIELD_FIT_Y0: usize = 1;
const FIELD_HEADER: usize = 2;
const FIELD_ROBUST: usize = 3;
const FIELD_COUNT: usize = 4;

/// Start the TUI.
pub fn run(args: TuiArgs) -> Result<(), AppError> {
    // Resolve the file before taking over the terminal; the picker is line-based.
    let path = match &args.input.file {
        Some(path) => crate::cli::picker::validate_data_path(path)?,
        None => crate::cli::picker::prompt_for_data_path()?,
    };
    let mut app = App::new(path, args.input.read_options(), args.fit.to_config());

    let mut screen = Screen::enter()?;
    app.event_loop(&mut screen.terminal)
}

/// Owns the terminal while the UI runs; raw mode and the alternate screen
/// are undone on drop, including on early error returns.
struct Screen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Screen {
    fn enter() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        match Terminal::new(CrosstermBackend::new(io::stdout())) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(e) => {
                restore_terminal();
                Err(AppError::new(4, format!("Failed to initialize terminal: {e}")))
            }
        }
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        restore_terminal();
        let _ = self.terminal.show_cursor();
    }
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Wait up to `timeout` for the next terminal event.
fn next_event(timeout: Duration) -> Result<Option<Event>, AppError> {
    let ready = event::poll(timeout).map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?;
    if !ready {
        return Ok(None);
    }
    event::read()
        .map(Some)
        .map_err(|e| AppError::new(4, format!("Event read error: {e}")))
}

struct App {
    path: PathBuf,
    source: String,
    read: ReadOptions,
    config: FitConfig,
    selected_field: usize,
    status: String,
    columns: Option<RawColumns>,
    fit: Option<FitResult>,
}

impl App {
    fn new(path: PathBuf, read: ReadOptions, config: FitConfig) -> Self {
        let source = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut app = Self {
            path,
            source,
            read,
            config,
            selected_field: FIELD_T0,
            status: String::new(),
            columns: None,
            fit: None,
        };
        app.reload();
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut dirty = true;
        loop {
            if dirty {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                dirty = false;
            }

            match next_event(TICK)? {
                Some(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if self.handle_key(key.code) {
                        return Ok(());
                    }
                    dirty = true;
                }
                Some(Event::Resize(_, _)) => dirty = true,
                _ => {}
            }
        }
    }

    /// Returns `true` when the app should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => {
                if self.selected_field > 0 {
                    self.selected_field -= 1;
                }
            }
            KeyCode::Down => {
                if self.selected_field + 1 < FIELD_COUNT {
                    self.selected_field += 1;
                }
            }
            KeyCode::Left => self.adjust_field(-1),
            KeyCode::Right => self.adjust_field(1),
            KeyCode::Enter | KeyCode::Char('f') => self.refit(),
            KeyCode::Char('y') => {
                self.selected_field = FIELD_FIT_Y0;
                self.adjust_field(1);
            }
            KeyCode::Char('h') => {
                self.selected_field = FIELD_HEADER;
                self.adjust_field(1);
            }
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('e') => self.export(),
            _ => {}
        }
        false
    }

    fn adjust_field(&mut self, delta: i32) {
        match self.selected_field {
            FIELD_T0 => {
                let step = t0_step(self.columns.as_ref());
                self.config.t0 += if delta >= 0 { step } else { -step };
                // Keep the value readable after repeated float steps.
                self.config.t0 = (self.config.t0 / step).round() * step;
                self.refit();
            }
            FIELD_FIT_Y0 => {
                self.config.fit_y0 = !self.config.fit_y0;
                self.refit();
            }
            FIELD_HEADER => {
                self.read.header = !self.read.header;
                self.reload();
            }
            FIELD_ROBUST => {
                self.config.robust = match self.config.robust {
                    RobustKind::None => RobustKind::Huber,
                    RobustKind::Huber => RobustKind::None,
                };
                self.refit();
            }
            _ => {}
        }
    }

    /// Re-read the file, then refit.
    fn reload(&mut self) {
        match crate::io::ingest::load_columns(&self.path, &self.read) {
            Ok(columns) => {
                self.columns = Some(columns);
                self.refit();
            }
            Err(err) => {
                self.columns = None;
                self.fit = None;
                self.status = err.message().to_string();
            }
        }
    }

    fn refit(&mut self) {
        let Some(columns) = &self.columns else {
            return;
        };
        match crate::app::pipeline::run_fit_columns(self.source.clone(), columns.clone(), &self.config) {
            Ok(run) => {
                self.status = format!(
                    "Fitted {} points (t0={}, fit y0: {})",
                    run.result.quality.n,
                    crate::report::fmt_g(self.config.t0, 6),
                    yes_no(self.config.fit_y0)
                );
                self.fit = Some(run.result);
            }
            Err(err) => {
                self.fit = None;
                self.status = format!("Fit failed: {err}");
            }
        }
    }

    fn export(&mut self) {
        let Some(fit) = &self.fit else {
            self.status = "Nothing to export: no successful fit.".to_string();
            return;
        };
        let out = export_path(&self.path);
        self.status = match crate::io::export::write_fitted_xlsx(&out, fit) {
            Ok(()) => format!("Wrote {}", out.display()),
            Err(err) => format!("Export failed: {err}"),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("stepfit", Style::default().fg(Color::Cyan)),
            Span::raw(format!(": first-order step fit of {}", self.source)),
        ]));

        let (rows, valid) = self
            .columns
            .as_ref()
            .map(|c| (c.rows_read, c.valid_rows()))
            .unwrap_or((0, 0));
        lines.push(Line::from(Span::styled(
            format!(
                "sheet: {} | header: {} | rows: {rows} | valid: {valid}",
                self.read.sheet.as_deref().unwrap_or("first"),
                yes_no(self.read.header),
            ),
            Style::default().fg(Color::Gray),
        )));

        if let Some(fit) = &self.fit {
            lines.push(Line::from(Span::styled(
                crate::report::format_param_line(fit),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )));
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(FIELD_COUNT as u16 + 2)])
            .split(area);

        self.draw_chart(frame, chunks[0]);
        self.draw_settings(frame, chunks[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let title = if self.fit.is_some() { "Step response" } else { "Data" };
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(columns) = &self.columns else {
            let msg = Paragraph::new("No data loaded.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let (curve, points, x_bounds, y_bounds) = chart_series(columns, self.fit.as_ref());
        let widget = StepPlottersChart {
            curve: &curve,
            points: &points,
            step_time: self.fit.as_ref().map(|f| f.t0),
            x_bounds,
            y_bounds,
            fmt_x: fmt_axis,
            fmt_y: fmt_axis,
        };
        frame.render_widget(widget, inner);
    }

    fn draw_settings(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items = vec![
            ListItem::new(format!("Step time t0: {}", crate::report::fmt_g(self.config.t0, 6))),
            ListItem::new(format!("Fit baseline y0: {}", yes_no(self.config.fit_y0))),
            ListItem::new(format!("First row is header: {}", yes_no(self.read.header))),
            ListItem::new(format!("Robust: {}", robust_name(self.config.robust))),
        ];

        let list = List::new(items)
            .block(Block::default().title("Settings").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected_field));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  ←/→ adjust  f refit  y fit y0  h header  r reload  e export  q quit";
        let status_color = if self.fit.is_some() { Color::Yellow } else { Color::Red };
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(status_color)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn yes_no(on: bool) -> &'static str {
    if on { "yes" } else { "no" }
}

fn robust_name(kind: RobustKind) -> &'static str {
    match kind {
        RobustKind::None => "off",
        RobustKind::Huber => "huber",
    }
}

/// `<stem>_fitted.xlsx` next to the input file.
fn export_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    input.with_file_name(format!("{stem}_fitted.xlsx"))
}

/// t0 increment: 1% of the data's time span.
fn t0_step(columns: Option<&RawColumns>) -> f64 {
    let span = columns
        .map(|c| {
            let (lo, hi) = c
                .t
                .iter()
                .filter(|t| t.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)));
            hi - lo
        })
        .unwrap_or(f64::NAN);
    if span.is_finite() && span > 0.0 { span / 100.0 } else { 0.1 }
}

type Series = Vec<(f64, f64)>;

/// Build chart series for Plotters.
fn chart_series(columns: &RawColumns, fit: Option<&FitResult>) -> (Series, Series, [f64; 2], [f64; 2]) {
    let points: Series = columns
        .t
        .iter()
        .zip(columns.y.iter())
        .filter(|(t, y)| t.is_finite() && y.is_finite())
        .map(|(&t, &y)| (t, y))
        .collect();

    let curve: Series = fit
        .map(|fit| {
            let grid = crate::io::fit_json::curve_grid(fit, CURVE_POINTS);
            grid.t.into_iter().zip(grid.y).collect()
        })
        .unwrap_or_default();

    let (mut t_min, mut t_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(t, y) in points.iter().chain(curve.iter()) {
        if !y.is_finite() {
            continue;
        }
        t_min = t_min.min(t);
        t_max = t_max.max(t);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if !t_min.is_finite() || !t_max.is_finite() || t_max <= t_min {
        let mid = if t_min.is_finite() { t_min } else { 0.0 };
        t_min = mid - 0.5;
        t_max = mid + 0.5;
    }
    if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
        let mid = if y_min.is_finite() { y_min } else { 0.0 };
        y_min = mid - 0.5;
        y_max = mid + 0.5;
    }

    let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);
    (curve, points, [t_min, t_max], [y_min - pad, y_max + pad])
}

fn fmt_axis(v: f64) -> String {
    crate::report::fmt_g(v, 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_step_csv(dir: &Path) -> PathBuf {
        let path = dir.join("step.csv");
        let mut text = String::from("t,y\n");
        for i in 0..41 {
            let t = i as f64 * 0.25;
            let y = if t < 1.0 { 0.5 } else { 0.5 + 2.0 * (1.0 - (-(t - 1.0) / 1.5).exp()) };
            text.push_str(&format!("{t},{y}\n"));
        }
        std::fs::write(&path, text).unwrap();
        path
    }

    fn app_for(path: PathBuf) -> App {
        let config = FitConfig {
            t0: 1.0,
            ..FitConfig::default()
        };
        App::new(path, ReadOptions::default(), config)
    }

    #[test]
    fn loads_and_fits_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_for(write_step_csv(dir.path()));
        let fit = app.fit.as_ref().expect("fit");
        assert!((fit.params.ka - 2.0).abs() < 1e-4);
        assert!((fit.params.tau - 1.5).abs() < 1e-4);
        assert!(app.status.starts_with("Fitted 41 points"));
    }

    #[test]
    fn keys_toggle_settings_and_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_for(write_step_csv(dir.path()));

        assert!(!app.handle_key(KeyCode::Char('y')));
        assert!(!app.config.fit_y0);
        assert_eq!(app.fit.as_ref().map(|f| f.fit_y0), Some(false));

        app.handle_key(KeyCode::Up);
        app.handle_key(KeyCode::Up);
        app.handle_key(KeyCode::Right);
        assert!((app.config.t0 - 1.1).abs() < 1e-9);

        assert!(app.handle_key(KeyCode::Char('q')));
    }

    #[test]
    fn fit_failure_keeps_data_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.csv");
        std::fs::write(&path, "t,y\n0,1\n1,2\n").unwrap();
        let app = app_for(path);
        assert!(app.columns.is_some());
        assert!(app.fit.is_none());
        assert!(app.status.starts_with("Fit failed:"));
    }

    #[test]
    fn export_lands_next_to_input() {
        assert_eq!(
            export_path(Path::new("/data/run 1.xlsx")),
            PathBuf::from("/data/run 1_fitted.xlsx")
        );

        let dir = tempfile::tempdir().unwrap();
        let mut app = app_for(write_step_csv(dir.path()));
        app.handle_key(KeyCode::Char('e'));
        assert!(dir.path().join("step_fitted.xlsx").exists());
    }

    #[test]
    fn series_bounds_cover_data_and_curve() {
        let columns = RawColumns {
            t: vec![0.0, 1.0, f64::NAN, 2.0],
            y: vec![1.0, 3.0, 5.0, 2.0],
            rows_read: 4,
        };
        let (curve, points, x, y) = chart_series(&columns, None);
        assert!(curve.is_empty());
        assert_eq!(points.len(), 3);
        assert_eq!(x, [0.0, 2.0]);
        assert!(y[0] < 1.0 && y[1] > 3.0);
    }

    #[test]
    fn t0_step_scales_with_span() {
        let columns = RawColumns {
            t: vec![0.0, 50.0],
            y: vec![0.0, 1.0],
            rows_read: 2,
        };
        assert_eq!(t0_step(Some(&columns)), 0.5);
        assert_eq!(t0_step(None), 0.1);
    }
}
