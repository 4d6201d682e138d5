use stepfit::app::pipeline::run_fit_file;
use stepfit::data::{generate_sample, SampleConfig};
use stepfit::domain::{FitConfig, ReadOptions, RobustKind, StepParams};
use stepfit::io::export::{write_columns, write_fitted_xlsx};
use stepfit::io::fit_json::{read_fit_json, write_fit_json};
use stepfit::io::ingest::load_columns;

fn noiseless() -> SampleConfig {
    SampleConfig {
        params: StepParams {
            ka: -1.25,
            tau: 0.8,
            y0: 3.0,
        },
        t0: 0.5,
        t_start: 0.0,
        t_end: 6.0,
        n: 121,
        noise: 0.0,
        seed: 1,
    }
}

#[test]
fn sample_written_as_xlsx_fits_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.xlsx");
    let cfg = noiseless();
    let sample = generate_sample(&cfg).unwrap();
    write_columns(&path, &sample.t, &sample.y).unwrap();

    let config = FitConfig {
        t0: cfg.t0,
        ..FitConfig::default()
    };
    let run = run_fit_file(&path, &ReadOptions::default(), &config).unwrap();
    assert_eq!(run.source, "sample.xlsx");
    assert_eq!(run.columns.rows_read, 121);

    let p = run.result.params;
    assert!((p.ka - cfg.params.ka).abs() < 1e-5, "ka={}", p.ka);
    assert!((p.tau - cfg.params.tau).abs() < 1e-5, "tau={}", p.tau);
    assert!((p.y0 - cfg.params.y0).abs() < 1e-5, "y0={}", p.y0);
    assert!(run.result.quality.sse < 1e-12);
}

#[test]
fn noisy_csv_sample_is_recovered_approximately() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noisy.csv");
    let cfg = SampleConfig::default();
    let sample = generate_sample(&cfg).unwrap();
    write_columns(&path, &sample.t, &sample.y).unwrap();

    let config = FitConfig {
        t0: cfg.t0,
        ..FitConfig::default()
    };
    let run = run_fit_file(&path, &ReadOptions::default(), &config).unwrap();
    let p = run.result.params;
    assert!((p.ka - cfg.params.ka).abs() < 0.05, "ka={}", p.ka);
    assert!((p.tau - cfg.params.tau).abs() < 0.1, "tau={}", p.tau);
    assert!(run.result.quality.r2 > 0.99);
    let se = run.result.std_errors.expect("std errors");
    assert!(se.ka > 0.0 && se.tau > 0.0);
}

#[test]
fn robust_fit_resists_a_spike() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spike.csv");
    let cfg = noiseless();
    let mut sample = generate_sample(&cfg).unwrap();
    sample.y[90] += 5.0;
    write_columns(&path, &sample.t, &sample.y).unwrap();

    let config = FitConfig {
        t0: cfg.t0,
        robust: RobustKind::Huber,
        robust_iters: 10,
        ..FitConfig::default()
    };
    let plain = run_fit_file(
        &path,
        &ReadOptions::default(),
        &FitConfig {
            t0: cfg.t0,
            ..FitConfig::default()
        },
    )
    .unwrap();
    let robust = run_fit_file(&path, &ReadOptions::default(), &config).unwrap();

    let err = |ka: f64| (ka - cfg.params.ka).abs();
    assert!(err(robust.result.params.ka) < err(plain.result.params.ka));
}

#[test]
fn exports_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.csv");
    let cfg = noiseless();
    let sample = generate_sample(&cfg).unwrap();
    write_columns(&data, &sample.t, &sample.y).unwrap();

    let config = FitConfig {
        t0: cfg.t0,
        ..FitConfig::default()
    };
    let run = run_fit_file(&data, &ReadOptions::default(), &config).unwrap();

    // The fitted workbook's first sheet holds t and y in columns A/B, so it is
    // itself a valid input file.
    let fitted = dir.path().join("fitted.xlsx");
    write_fitted_xlsx(&fitted, &run.result).unwrap();
    let columns = load_columns(&fitted, &ReadOptions::default()).unwrap();
    assert_eq!(columns.valid_rows(), sample.t.len());

    let json = dir.path().join("fit.json");
    write_fit_json(&json, &run.result, &run.source).unwrap();
    let fit = read_fit_json(&json).unwrap();
    assert_eq!(fit.source, "data.csv");
    assert!((fit.params.tau - run.result.params.tau).abs() < 1e-12);
    assert_eq!(fit.data.y_fit.len(), sample.t.len());
}

#[test]
fn missing_sheet_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one_sheet.xlsx");
    write_columns(&path, &[0.0, 1.0], &[1.0, 2.0]).unwrap();

    let read = ReadOptions {
        sheet: Some("Run 7".to_string()),
        header: true,
    };
    let err = load_columns(&path, &read).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.message().contains("Data"), "{}", err.message());
}
