//! Raw observation ingest.
//!
//! Input files hold one observation per whitespace-separated token: cluster
//! sizes or squared jump distances, depending on the subcommand. Blank lines
//! and `#` comment lines are skipped.
//!
//! Design goals:
//! - clear errors with the offending line number (exit code 3)
//! - no interpretation here; histogram construction validates the values
//!   against the fit instance's own rules

use std::fs;
use std::path::Path;

use crate::error::AppError;

/// Read whitespace-separated floating-point observations from a file.
pub fn read_values(path: &Path) -> Result<Vec<f64>, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(4, format!("Failed to read '{}': {e}", path.display())))?;
    parse_values(&text, path)
}

fn parse_values(text: &str, path: &Path) -> Result<Vec<f64>, AppError> {
    let mut values = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in line.split_whitespace() {
            let v: f64 = token.parse().map_err(|_| {
                AppError::new(
                    3,
                    format!(
                        "Invalid number '{token}' at {}:{}",
                        path.display(),
                        line_no + 1
                    ),
                )
            })?;
            values.push(v);
        }
    }
    if values.is_empty() {
        return Err(AppError::new(
            3,
            format!("No observations found in '{}'", path.display()),
        ));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(text: &str) -> Result<Vec<f64>, AppError> {
        parse_values(text, &PathBuf::from("test.txt"))
    }

    #[test]
    fn parses_mixed_whitespace_and_skips_comments() {
        let values = parse("1 2.5 3\n# comment\n\n  4\t5\n").unwrap();
        assert_eq!(values, vec![1.0, 2.5, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn reports_line_number_of_bad_token() {
        let err = parse("1 2\nthree\n").unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains(":2"), "{err}");
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = parse("# only comments\n").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
