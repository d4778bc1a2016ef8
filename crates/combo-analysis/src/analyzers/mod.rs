//! Pairwise and per-column analyzers.
//!
//! Each [`PairTask`] carries a [`PairKind`] resolved when the task was
//! built, and [`analyze_pair`] routes it to the matching analyzer:
//!
//! | kind | analyzer | score |
//! |---|---|---|
//! | numeric × numeric | [`correlation`] | \|primary correlation\| |
//! | categorical × categorical | [`association`] | Cramér's V |
//! | categorical × numeric | [`anova`] | eta-squared |
//!
//! Text columns are profiled on their own by [`text`].
//!
//! Analyzers never panic on degenerate data: structural problems become a
//! [`ResultMarker`](crate::types::ResultMarker) on the result, numeric
//! failures a [`TaskError`].

pub mod anova;
pub mod association;
pub mod correlation;
pub(crate) mod stats;
pub mod text;

use crate::config::AnalysisConfig;
use crate::error::TaskError;
use crate::types::{PairKind, PairResult, PairTask};

/// Run the analyzer matching the task's kind.
pub fn analyze_pair(task: &PairTask, config: &AnalysisConfig) -> Result<PairResult, TaskError> {
    if task.data_a.len() != task.data_b.len() {
        return Err(TaskError::LengthMismatch {
            left: task.data_a.len(),
            right: task.data_b.len(),
        });
    }
    match task.kind {
        PairKind::NumericNumeric => correlation::analyze(task, config),
        PairKind::CategoricalCategorical => association::analyze(task, config),
        PairKind::CategoricalNumeric => anova::analyze(task, config),
    }
}

/// Record the p-value and the derived significance flag on a result.
///
/// A missing p-value flags the result as low-reliability.
pub(crate) fn apply_significance(
    result: &mut PairResult,
    metric: &str,
    p_value: Option<f64>,
    config: &AnalysisConfig,
) {
    match p_value {
        Some(p) => {
            result.set_metric(metric, p);
            result.significant = Some(p < config.reliability.significance_level);
        }
        None => result.flag_low_reliability(format!("{metric} unavailable")),
    }
}

// ============================================================================
// Strength labels
// ============================================================================

pub fn correlation_strength(r: f64) -> &'static str {
    if r.abs() >= 0.7 { "strong" } else { "moderate" }
}

pub fn correlation_direction(r: f64) -> &'static str {
    if r >= 0.0 { "positive" } else { "negative" }
}

pub fn cramers_v_strength(v: f64) -> &'static str {
    match v {
        v if v >= 0.5 => "very_strong",
        v if v >= 0.3 => "strong",
        v if v >= 0.1 => "moderate",
        _ => "weak",
    }
}

pub fn eta_squared_effect(eta2: f64) -> &'static str {
    match eta2 {
        e if e >= 0.14 => "large",
        e if e >= 0.06 => "medium",
        e if e >= 0.01 => "small",
        _ => "none",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CategoricalData, ColumnData};
    use std::sync::Arc;

    #[test]
    fn test_length_mismatch_is_task_error() {
        let task = PairTask {
            column_a: "a".to_string(),
            column_b: "b".to_string(),
            kind: PairKind::NumericNumeric,
            data_a: ColumnData::Numeric(Arc::from(vec![Some(1.0), Some(2.0)])),
            data_b: ColumnData::Categorical(Arc::new(CategoricalData {
                levels: vec!["x".to_string()],
                codes: vec![Some(0)],
            })),
        };
        let err = analyze_pair(&task, &AnalysisConfig::default()).unwrap_err();
        assert_eq!(err, TaskError::LengthMismatch { left: 2, right: 1 });
    }

    #[test]
    fn test_strength_labels() {
        assert_eq!(correlation_strength(-0.8), "strong");
        assert_eq!(correlation_strength(0.4), "moderate");
        assert_eq!(correlation_direction(-0.1), "negative");
        assert_eq!(cramers_v_strength(0.35), "strong");
        assert_eq!(cramers_v_strength(0.05), "weak");
        assert_eq!(eta_squared_effect(0.2), "large");
        assert_eq!(eta_squared_effect(0.07), "medium");
        assert_eq!(eta_squared_effect(0.001), "none");
    }
}
