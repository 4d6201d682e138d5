//! Command dispatch for the `stepfit` binary.
//!
//! Loads `.env`, parses arguments, installs logging with a per-command
//! default filter, then hands off to the batch commands, the web server or
//! the TUI.

use clap::Parser;

use crate::cli::{Command, FitArgs, PlotArgs, SampleArgs, ServeArgs, TuiArgs};
use crate::domain::RawColumns;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `stepfit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine; explicit environment variables still apply.
    let _ = dotenvy::dotenv();

    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => {
            crate::logging::init("warn");
            handle_fit(args)
        }
        Command::Plot(args) => {
            crate::logging::init("warn");
            handle_plot(args)
        }
        Command::Sample(args) => {
            crate::logging::init("warn");
            handle_sample(args)
        }
        Command::Serve(args) => {
            crate::logging::init("info");
            handle_serve(args)
        }
        Command::Tui(args) => {
            // Log lines would corrupt the alternate screen.
            crate::logging::init("off");
            handle_tui(args)
        }
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let path = match &args.input.file {
        Some(path) => crate::cli::picker::validate_data_path(path)?,
        None => crate::cli::picker::prompt_for_data_path()?,
    };
    let config = args.fit.to_config();
    let columns = crate::io::ingest::load_columns(&path, &args.input.read_options())?;
    let run = match pipeline::run_fit_columns(pipeline::source_name(&path), columns.clone(), &config) {
        Ok(run) => run,
        Err(err) => {
            if !args.no_plot {
                if let Some(plot) = failed_fit_plot(&columns, args.width, args.height) {
                    println!("{plot}");
                }
            }
            return Err(err);
        }
    };

    println!("{}", crate::report::format_fit_summary(&run.result, &run.source));
    if args.top > 0 {
        println!("{}", crate::report::format_residual_table(&run.result, args.top));
    }

    if !args.no_plot {
        let plot = crate::plot::render_ascii_plot(&run.result, args.width, args.height);
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &args.export {
        crate::io::export::write_fitted_xlsx(path, &run.result)?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &args.export_csv {
        crate::io::export::write_fitted_csv(path, &run.result)?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &args.export_fit {
        crate::io::fit_json::write_fit_json(path, &run.result, &run.source)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

/// Samples-only plot for a failed fit; `None` when nothing is plottable.
fn failed_fit_plot(columns: &RawColumns, width: usize, height: usize) -> Option<String> {
    (columns.valid_rows() > 0)
        .then(|| crate::plot::render_ascii_data_plot(&columns.t, &columns.y, width, height))
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let fit = crate::io::fit_json::read_fit_json(&args.fit)?;
    println!("Source: {}", fit.source);
    let plot = crate::plot::render_ascii_plot_from_fit_file(&fit, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let sample = crate::data::generate_sample(&args.to_config())?;
    crate::io::export::write_columns(&args.output, &sample.t, &sample.y)?;
    println!("Wrote {} samples to {}", sample.t.len(), args.output.display());
    Ok(())
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    let settings = crate::server::ServerSettings::from_args(&args);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::new(4, format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(crate::server::serve(settings))
}

fn handle_tui(args: TuiArgs) -> Result<(), AppError> {
    crate::tui::run(args)
}

/// Make `serve` the default subcommand.
///
/// `stepfit` and `stepfit --port 9000` become `stepfit serve ...`; explicit
/// subcommands and top-level `--help`/`--version` pass through untouched.
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let default_to_serve = match argv.get(1).map(String::as_str) {
        None => true,
        Some("-h" | "--help" | "-V" | "--version") => false,
        Some(first) => first.starts_with('-'),
    };
    if default_to_serve {
        argv.insert(argv.len().min(1), "serve".to_string());
    }
    argv
}
