//! Interactive data file picker.
//!
//! Used when `stepfit fit` or `stepfit tui` is run without a file: lists the
//! spreadsheets and CSV files below the working directory and lets the user
//! pick one by number or type a path.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::io::InputFormat;

/// How deep below the working directory to look.
const SEARCH_DEPTH: usize = 4;

const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Prompt on stdin/stdout for a data file from the current directory tree.
pub fn prompt_for_data_path() -> Result<PathBuf, AppError> {
    let files = discover_data_files();
    let stdin = io::stdin();
    prompt_from(&files, &mut stdin.lock(), &mut io::stdout())
}

/// One line of user input, interpreted.
#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Listed(usize),
    Typed(PathBuf),
    OutOfRange(usize),
    Quit,
}

fn parse_choice(input: &str, listed: usize) -> Choice {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Choice::Quit;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=listed).contains(&n) => Choice::Listed(n - 1),
        Ok(n) => Choice::OutOfRange(n),
        Err(_) => Choice::Typed(PathBuf::from(input)),
    }
}

fn prompt_from<R: BufRead, W: Write>(files: &[PathBuf], input: &mut R, out: &mut W) -> Result<PathBuf, AppError> {
    if files.is_empty() {
        return Err(AppError::new(
            2,
            "No spreadsheet or CSV files found. Pass one explicitly, e.g. `stepfit fit run.xlsx`.",
        ));
    }

    let io_err = |e: io::Error| AppError::new(2, format!("Terminal I/O failed: {e}"));

    writeln!(out, "Found {} data file(s):", files.len()).map_err(io_err)?;
    for (idx, path) in files.iter().enumerate() {
        writeln!(out, "{:>3}) {}", idx + 1, display_path(path)).map_err(io_err)?;
    }

    loop {
        write!(out, "Select a file by number (1-{}) or type a path (q to quit): ", files.len())
            .map_err(io_err)?;
        out.flush().map_err(io_err)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            return Err(AppError::new(2, "No input received; pass the data file as an argument."));
        }

        let candidate = match parse_choice(&line, files.len()) {
            Choice::Quit => return Err(AppError::new(2, "Canceled.")),
            Choice::Listed(idx) => files[idx].clone(),
            Choice::Typed(path) => path,
            Choice::OutOfRange(n) => {
                writeln!(out, "Invalid choice: {n}. Enter a number between 1 and {}.", files.len())
                    .map_err(io_err)?;
                continue;
            }
        };

        match validate_data_path(&candidate) {
            Ok(path) => return Ok(path),
            Err(err) => writeln!(out, "{err}").map_err(io_err)?,
        }
    }
}

/// Check that `path` is an existing file with a supported extension.
pub fn validate_data_path(path: &Path) -> Result<PathBuf, AppError> {
    let meta = fs::metadata(path)
        .map_err(|_| AppError::new(2, format!("Data file not found: {}", path.display())))?;
    if meta.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    InputFormat::from_path(path)?;
    Ok(path.to_path_buf())
}

/// Data files under the current directory, sorted by path.
pub fn discover_data_files() -> Vec<PathBuf> {
    find_data_files(Path::new("."), SEARCH_DEPTH)
}

fn find_data_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(kind) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if kind.is_dir() {
                if depth < max_depth && !SKIP_DIRS.contains(&&*name) {
                    pending.push((path, depth + 1));
                }
            } else if kind.is_file()
                // Excel keeps `~$name.xlsx` lock files next to open workbooks.
                && !name.starts_with("~$")
                && InputFormat::from_path(&path).is_ok()
            {
                found.push(path);
            }
        }
    }

    found.sort_by_cached_key(|p| display_path(p));
    found
}

fn display_path(path: &Path) -> String {
    path.strip_prefix(".").unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_spreadsheets_and_csv_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::create_dir(root.join("target")).unwrap();
        for name in ["b.csv", "a.xlsx", "sub/c.ods", "target/skip.csv", "notes.txt.bak", "~$a.xlsx"] {
            fs::write(root.join(name), b"x").unwrap();
        }

        let found: Vec<String> = find_data_files(root, 4)
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().display().to_string())
            .collect();
        assert_eq!(found, vec!["a.xlsx", "b.csv", "sub/c.ods"]);
    }

    #[test]
    fn depth_limit_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a/b");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("run.csv"), b"x").unwrap();
        assert!(find_data_files(dir.path(), 1).is_empty());
        assert_eq!(find_data_files(dir.path(), 2).len(), 1);
    }

    #[test]
    fn validate_rejects_missing_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_data_path(&dir.path().join("none.xlsx")).is_err());
        assert!(validate_data_path(dir.path()).is_err());

        let pdf = dir.path().join("x.pdf");
        fs::write(&pdf, b"%PDF").unwrap();
        assert_eq!(validate_data_path(&pdf).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn choices_are_parsed() {
        assert_eq!(parse_choice(" 2\n", 3), Choice::Listed(1));
        assert_eq!(parse_choice("4", 3), Choice::OutOfRange(4));
        assert_eq!(parse_choice("Q", 3), Choice::Quit);
        assert_eq!(parse_choice("data/run.csv\n", 3), Choice::Typed(PathBuf::from("data/run.csv")));
    }

    #[test]
    fn prompt_retries_until_a_valid_pick() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("run.csv");
        fs::write(&file, b"t,y\n").unwrap();
        let files = vec![file.clone()];

        let mut input = io::Cursor::new(b"7\nmissing.csv\n1\n".to_vec());
        let mut out = Vec::new();
        let picked = prompt_from(&files, &mut input, &mut out).unwrap();
        assert_eq!(picked, file);

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("Invalid choice: 7"));
        assert!(shown.contains("Data file not found: missing.csv"));
    }

    #[test]
    fn prompt_handles_quit_and_eof() {
        let files = vec![PathBuf::from("a.csv")];
        let quit = prompt_from(&files, &mut io::Cursor::new(b"q\n".to_vec()), &mut Vec::new());
        assert_eq!(quit.unwrap_err().message(), "Canceled.");
        let eof = prompt_from(&files, &mut io::Cursor::new(Vec::new()), &mut Vec::new());
        assert!(eof.is_err());
    }
}
