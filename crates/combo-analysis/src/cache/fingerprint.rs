//! Content fingerprints used as cache keys.
//!
//! The fingerprint hashes the table shape, column names and dtypes, a strided
//! sample of at most [`SAMPLE_ROWS`] rows and the result-affecting part of
//! the configuration. Cost is bounded by the sample, not the table height.

use crate::config::AnalysisConfig;
use crate::error::{Result, ResultExt};
use polars::prelude::*;
use sha2::{Digest, Sha256};

/// Maximum number of rows hashed per fingerprint.
pub const SAMPLE_ROWS: usize = 256;

/// Hex-encoded SHA-256 fingerprint of a table and configuration.
pub fn fingerprint(df: &DataFrame, config: &AnalysisConfig) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update((df.height() as u64).to_le_bytes());
    hasher.update((df.width() as u64).to_le_bytes());

    for column in df.get_columns() {
        hasher.update(column.name().as_bytes());
        hasher.update([0u8]);
        hasher.update(format!("{:?}", column.dtype()).as_bytes());
        hasher.update([0u8]);
    }

    for row in sample_rows(df.height()) {
        for column in df.get_columns() {
            let value = column
                .get(row)
                .context(format!("Reading row {row} of '{}'", column.name()))?;
            hasher.update(format!("{value}").as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
    }

    let config_json = serde_json::to_string(&config.result_affecting())?;
    hasher.update(config_json.as_bytes());

    Ok(hex::encode(hasher.finalize()))
}

/// Evenly strided row indices, first and last row included.
fn sample_rows(height: usize) -> Vec<usize> {
    if height <= SAMPLE_ROWS {
        return (0..height).collect();
    }
    let step = (height - 1) as f64 / (SAMPLE_ROWS - 1) as f64;
    (0..SAMPLE_ROWS)
        .map(|i| ((i as f64 * step).round() as usize).min(height - 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataFrame {
        df![
            "a" => [1i64, 2, 3],
            "b" => ["x", "y", "z"],
        ]
        .unwrap()
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let config = AnalysisConfig::default();
        let first = fingerprint(&table(), &config).unwrap();
        let second = fingerprint(&table(), &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_content_changes_fingerprint() {
        let config = AnalysisConfig::default();
        let changed = df![
            "a" => [1i64, 2, 4],
            "b" => ["x", "y", "z"],
        ]
        .unwrap();
        assert_ne!(
            fingerprint(&table(), &config).unwrap(),
            fingerprint(&changed, &config).unwrap()
        );
    }

    #[test]
    fn test_dtype_changes_fingerprint() {
        let config = AnalysisConfig::default();
        let floats = df![
            "a" => [1.0f64, 2.0, 3.0],
            "b" => ["x", "y", "z"],
        ]
        .unwrap();
        assert_ne!(
            fingerprint(&table(), &config).unwrap(),
            fingerprint(&floats, &config).unwrap()
        );
    }

    #[test]
    fn test_result_affecting_config_changes_fingerprint() {
        let base = AnalysisConfig::default();
        let stricter = AnalysisConfig {
            correlation_threshold: 0.5,
            ..AnalysisConfig::default()
        };
        assert_ne!(
            fingerprint(&table(), &base).unwrap(),
            fingerprint(&table(), &stricter).unwrap()
        );
    }

    #[test]
    fn test_execution_settings_do_not_change_fingerprint() {
        let base = AnalysisConfig::default();
        let sequential = AnalysisConfig {
            parallel_processing: false,
            max_workers: 1,
            ..AnalysisConfig::default()
        };
        assert_eq!(
            fingerprint(&table(), &base).unwrap(),
            fingerprint(&table(), &sequential).unwrap()
        );
    }

    #[test]
    fn test_sample_rows_bounded() {
        let rows = sample_rows(100_000);
        assert_eq!(rows.len(), SAMPLE_ROWS);
        assert_eq!(rows[0], 0);
        assert_eq!(rows[SAMPLE_ROWS - 1], 99_999);
        assert_eq!(sample_rows(3), vec![0, 1, 2]);
    }
}
