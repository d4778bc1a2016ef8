//! Numeric × numeric correlation.
//!
//! Pearson, Spearman and Kendall tau-b over rows where both values are
//! present. Below `normality_min_observations` paired rows Pearson is not
//! trusted: Spearman becomes the primary metric and the result is flagged.
//! Results whose primary |r| is under `correlation_threshold` are marked
//! `BelowThreshold` and never ranked.

use super::stats::{self, Moments};
use super::{apply_significance, correlation_direction, correlation_strength};
use crate::config::AnalysisConfig;
use crate::error::TaskError;
use crate::types::{ColumnData, PairResult, PairTask, ResultMarker};

/// Fewer paired rows than this and no coefficient is computed.
const MIN_PAIRS: usize = 3;

pub fn analyze(task: &PairTask, config: &AnalysisConfig) -> Result<PairResult, TaskError> {
    let (ColumnData::Numeric(a), ColumnData::Numeric(b)) = (&task.data_a, &task.data_b) else {
        return Err(TaskError::UnexpectedData("correlation".to_string()));
    };

    let mut x = Vec::with_capacity(a.len());
    let mut y = Vec::with_capacity(b.len());
    for (va, vb) in a.iter().zip(b.iter()) {
        if let (Some(va), Some(vb)) = (va, vb) {
            if va.is_nan() || vb.is_nan() {
                continue;
            }
            if va.is_infinite() || vb.is_infinite() {
                return Err(TaskError::NonFinite("correlation inputs".to_string()));
            }
            x.push(*va);
            y.push(*vb);
        }
    }

    let mut result = PairResult::for_task(task);
    let n = x.len();
    result.set_metric("n", n);

    if n < MIN_PAIRS {
        return Ok(result.with_marker(ResultMarker::InsufficientData(format!(
            "{n} paired observations"
        ))));
    }

    let moments = Moments::compute(&x, &y);
    if !moments.is_finite() {
        return Err(TaskError::NonFinite("pearson moments".to_string()));
    }
    let Some(pearson) = moments.correlation() else {
        let constant = if moments.sxx <= 0.0 {
            &task.column_a
        } else {
            &task.column_b
        };
        return Ok(result.with_marker(ResultMarker::Undefined(format!(
            "zero variance in {constant}"
        ))));
    };

    let rank_x = stats::average_ranks(&x);
    let rank_y = stats::average_ranks(&y);
    let spearman = Moments::compute(&rank_x, &rank_y)
        .correlation()
        .ok_or_else(|| TaskError::NonFinite("spearman ranks".to_string()))?;
    let kendall = stats::kendall_tau_b(&x, &y)
        .ok_or_else(|| TaskError::NonFinite("kendall tau".to_string()))?;

    result.set_metric("pearson", pearson);
    result.set_metric("spearman", spearman);
    result.set_metric("kendall", kendall);
    if let Some(p) = stats::kendall_p_value(kendall, n) {
        result.set_metric("kendall_p_value", p);
    }

    let reliability = &config.reliability;
    if n < reliability.min_paired_observations {
        result.flag_low_reliability(format!("only {n} paired observations"));
    }
    let (primary_name, primary) = if n < reliability.normality_min_observations {
        result.flag_low_reliability(format!(
            "fewer than {} observations, pearson not trusted",
            reliability.normality_min_observations
        ));
        ("spearman", spearman)
    } else {
        ("pearson", pearson)
    };

    let pearson_p = stats::correlation_p_value(pearson, n);
    let spearman_p = stats::correlation_p_value(spearman, n);
    if let Some(p) = pearson_p {
        result.set_metric("pearson_p_value", p);
    }
    if let Some(p) = spearman_p {
        result.set_metric("spearman_p_value", p);
    }
    let primary_p = if primary_name == "pearson" {
        pearson_p
    } else {
        spearman_p
    };
    apply_significance(&mut result, "p_value", primary_p, config);

    result.primary_metric = Some(primary_name.to_string());
    result.set_metric("strength", correlation_strength(primary));
    result.set_metric("direction", correlation_direction(primary));

    if primary.abs() < config.correlation_threshold {
        return Ok(result.with_marker(ResultMarker::BelowThreshold(format!(
            "|{primary_name}| = {:.4} < {}",
            primary.abs(),
            config.correlation_threshold
        ))));
    }

    Ok(result)
}
