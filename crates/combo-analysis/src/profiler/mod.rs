//! Column classification.
//!
//! Every column of the working table receives a [`ColumnProfile`] with its
//! semantic type, cardinality and null ratio. Classification never fails the
//! run: a column that cannot be profiled is marked excluded with a reason.

mod type_inference;

use crate::config::AnalysisConfig;
use crate::types::{ColumnProfile, SemanticType, SkippedColumn};
use crate::utils::{
    average_string_length, collect_sample_values, distinct_non_null, is_string_like_dtype,
};
use polars::prelude::*;
use tracing::debug;

use type_inference::{ColumnFacts, infer_semantic_type};

/// Number of sample values inspected for date detection.
const DATE_SAMPLE_SIZE: usize = 10;

/// Classifier assigning a semantic type to each column.
pub struct ColumnClassifier;

impl ColumnClassifier {
    /// Profile every column of the table, in column order.
    pub fn classify(df: &DataFrame, config: &AnalysisConfig) -> Vec<ColumnProfile> {
        df.get_columns()
            .iter()
            .map(|column| {
                let series = column.as_materialized_series();
                let profile = Self::profile_column(series, config).unwrap_or_else(|e| {
                    Self::excluded(series, format!("profiling failed: {e}"))
                });
                debug!(
                    column = %profile.name,
                    semantic_type = profile.semantic_type.as_str(),
                    cardinality = profile.cardinality,
                    "Classified column"
                );
                profile
            })
            .collect()
    }

    /// Columns that take no part in the pairwise search.
    ///
    /// Text columns are reported here too: they are profiled separately.
    pub fn skipped_columns(profiles: &[ColumnProfile]) -> Vec<SkippedColumn> {
        let mut skipped: Vec<SkippedColumn> = profiles
            .iter()
            .filter(|p| !p.is_pairable())
            .map(|p| SkippedColumn {
                name: p.name.clone(),
                semantic_type: p.semantic_type,
                reason: p.skip_reason.clone().unwrap_or_else(|| match p.semantic_type {
                    SemanticType::Text => "profiled as free text".to_string(),
                    other => format!("{} columns are not paired", other.as_str()),
                }),
            })
            .collect();
        skipped.sort_by(|a, b| a.name.cmp(&b.name));
        skipped
    }

    fn profile_column(series: &Series, config: &AnalysisConfig) -> PolarsResult<ColumnProfile> {
        let len = series.len();
        let null_count = series.null_count();
        let cardinality = distinct_non_null(series)?;
        let dtype = series.dtype();

        let (avg_length, samples) = if is_string_like_dtype(dtype) {
            (
                average_string_length(series)?,
                collect_sample_values(series, DATE_SAMPLE_SIZE),
            )
        } else {
            (None, Vec::new())
        };

        let facts = ColumnFacts {
            dtype,
            len,
            null_count,
            cardinality,
            avg_length,
            samples: &samples,
        };
        let (semantic_type, skip_reason) = infer_semantic_type(&facts, config);

        Ok(ColumnProfile {
            name: series.name().to_string(),
            dtype: format!("{dtype:?}"),
            semantic_type,
            cardinality,
            null_count,
            null_ratio: null_ratio(null_count, len),
            avg_length,
            skip_reason,
        })
    }

    fn excluded(series: &Series, reason: String) -> ColumnProfile {
        ColumnProfile {
            name: series.name().to_string(),
            dtype: format!("{:?}", series.dtype()),
            semantic_type: SemanticType::Excluded,
            cardinality: 0,
            null_count: series.null_count(),
            null_ratio: null_ratio(series.null_count(), series.len()),
            avg_length: None,
            skip_reason: Some(reason),
        }
    }
}

fn null_ratio(null_count: usize, len: usize) -> f64 {
    if len == 0 {
        0.0
    } else {
        null_count as f64 / len as f64
    }
}
