//! Result exports.
//!
//! Fit results are written as pretty-printed JSON so downstream plotting and
//! comparison scripts can reload them without re-running the fit. The schema
//! is defined by the serializable result types in `domain`.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::error::AppError;

/// Write any serializable fit result as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, result: &T) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            4,
            format!("Failed to create '{}': {e}", path.display()),
        )
    })?;
    serde_json::to_writer_pretty(file, result)
        .map_err(|e| AppError::new(4, format!("Failed to write JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BinomialFit, OrderDiagnostic};

    #[test]
    fn round_trips_a_cluster_fit() {
        let fit = BinomialFit {
            n_trials: 4,
            p: 0.3,
            sum_of_squares: 1e-4,
            ic: -12.5,
            orders: vec![OrderDiagnostic {
                order: 4,
                sum_of_squares: 1e-4,
                ic: -12.5,
            }],
        };

        let dir = std::env::temp_dir().join("popfit-export-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cluster.json");
        write_json(&path, &fit).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: BinomialFit = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.n_trials, 4);
        assert!((loaded.p - 0.3).abs() < 1e-12);
        std::fs::remove_file(&path).ok();
    }
}
