//! Semantic type inference for column classification.

use crate::config::AnalysisConfig;
use crate::types::SemanticType;
use crate::utils::{is_datetime_dtype, is_numeric_dtype, is_string_like_dtype};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;

// Date pattern regexes - compiled once at startup
static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}$").expect("Invalid regex: YYYY-MM-DD"),
        Regex::new(r"^\d{1,2}[-/]\d{1,2}[-/]\d{4}$").expect("Invalid regex: MM-DD-YYYY"),
        Regex::new(r"^\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}(:\d{2})?").expect("Invalid regex: datetime"),
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2})?").expect("Invalid regex: ISO"),
    ]
});

/// Observed facts about a column that drive classification.
#[derive(Debug, Clone)]
pub(crate) struct ColumnFacts<'a> {
    pub dtype: &'a DataType,
    pub len: usize,
    pub null_count: usize,
    pub cardinality: usize,
    pub avg_length: Option<f64>,
    pub samples: &'a [String],
}

impl ColumnFacts<'_> {
    fn non_null(&self) -> usize {
        self.len - self.null_count
    }
}

/// Assign a semantic type, in rule priority order.
///
/// Returns the skip reason alongside `Excluded` and `Datetime`.
pub(crate) fn infer_semantic_type(
    facts: &ColumnFacts<'_>,
    config: &AnalysisConfig,
) -> (SemanticType, Option<String>) {
    if facts.non_null() == 0 {
        return (SemanticType::Excluded, Some("all values are null".to_string()));
    }

    if facts.dtype == &DataType::Boolean {
        return (SemanticType::Boolean, None);
    }

    if is_numeric_dtype(facts.dtype) {
        return if is_low_cardinality_code(facts, config) {
            (SemanticType::Categorical, None)
        } else {
            (SemanticType::Numeric, None)
        };
    }

    if is_datetime_dtype(facts.dtype) || looks_like_dates(facts.samples) {
        return (
            SemanticType::Datetime,
            Some("datetime columns are not scored pairwise".to_string()),
        );
    }

    if is_string_like_dtype(facts.dtype) {
        if facts.cardinality <= config.max_cardinality {
            return (SemanticType::Categorical, None);
        }
        let avg_length = facts.avg_length.unwrap_or(0.0);
        if avg_length > config.reliability.text_min_avg_length {
            return (SemanticType::Text, None);
        }
        return (
            SemanticType::Excluded,
            Some(format!(
                "cardinality {} exceeds max_cardinality {} and values are too short for text analysis",
                facts.cardinality, config.max_cardinality
            )),
        );
    }

    (
        SemanticType::Excluded,
        Some(format!("unsupported dtype {:?}", facts.dtype)),
    )
}

/// Numeric codes with few distinct values behave like categories.
///
/// A constant column stays numeric so correlation reports it as undefined.
fn is_low_cardinality_code(facts: &ColumnFacts<'_>, config: &AnalysisConfig) -> bool {
    let max_distinct = config.reliability.numeric_category_max_distinct;
    if facts.cardinality < 2 || facts.cardinality > max_distinct {
        return false;
    }
    // each level must repeat at least once on average
    facts.cardinality as f64 / facts.non_null() as f64 <= 0.5
}

/// Check if string samples look like formatted dates (not numeric timestamps).
pub(crate) fn looks_like_dates(samples: &[String]) -> bool {
    let mut date_like_count = 0;
    let mut total_checked = 0;

    for sample in samples.iter().take(10) {
        total_checked += 1;

        let trimmed = sample.trim();
        if trimmed.is_empty() || trimmed.parse::<f64>().is_ok() {
            continue;
        }

        if DATE_PATTERNS.iter().any(|pattern| pattern.is_match(trimmed)) {
            date_like_count += 1;
        }
    }

    total_checked > 0 && (date_like_count as f64 / total_checked as f64) > 0.7
}
