//! Categorical × numeric one-way ANOVA.
//!
//! The numeric column is grouped by the categorical column's levels. Levels
//! with fewer than `min_group_size` observations are dropped before the F
//! test; fewer than two remaining groups yields `InsufficientGroups`.
//! Per-group count, mean and standard deviation are attached in level order.

use super::stats;
use super::{apply_significance, eta_squared_effect};
use crate::config::AnalysisConfig;
use crate::error::TaskError;
use crate::types::{ColumnData, GroupStats, PairResult, PairTask, ResultDetails, ResultMarker};

pub fn analyze(task: &PairTask, config: &AnalysisConfig) -> Result<PairResult, TaskError> {
    let (ColumnData::Categorical(groups), ColumnData::Numeric(values)) =
        (&task.data_a, &task.data_b)
    else {
        return Err(TaskError::UnexpectedData("anova".to_string()));
    };

    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); groups.cardinality()];
    for (code, value) in groups.codes.iter().zip(values.iter()) {
        let (Some(code), Some(value)) = (code, value) else {
            continue;
        };
        if value.is_nan() {
            continue;
        }
        if value.is_infinite() {
            return Err(TaskError::NonFinite("anova inputs".to_string()));
        }
        buckets[*code as usize].push(*value);
    }

    let min_group_size = config.reliability.min_group_size;
    let mut result = PairResult::for_task(task);
    let mut sparse_levels = 0usize;
    let kept: Vec<(&str, Vec<f64>)> = groups
        .levels
        .iter()
        .zip(buckets)
        .filter(|(_, bucket)| !bucket.is_empty())
        .filter(|(_, bucket)| {
            let keep = bucket.len() >= min_group_size;
            if !keep {
                sparse_levels += 1;
            }
            keep
        })
        .map(|(level, bucket)| (level.as_str(), bucket))
        .collect();

    if sparse_levels > 0 {
        result.set_metric("excluded_levels", sparse_levels);
    }
    if kept.len() < 2 {
        return Ok(result.with_marker(ResultMarker::InsufficientGroups(format!(
            "{} group(s) with at least {min_group_size} observations",
            kept.len()
        ))));
    }

    let all: Vec<f64> = kept.iter().flat_map(|(_, b)| b.iter().copied()).collect();
    let n = all.len();
    let k = kept.len();
    let grand_mean = stats::mean(&all).unwrap_or_default();

    let mut group_stats = Vec::with_capacity(k);
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for (level, bucket) in &kept {
        let group_mean = stats::mean(bucket).unwrap_or_default();
        ss_between += bucket.len() as f64 * (group_mean - grand_mean).powi(2);
        ss_within += bucket.iter().map(|v| (v - group_mean).powi(2)).sum::<f64>();
        group_stats.push(GroupStats {
            level: level.to_string(),
            count: bucket.len(),
            mean: group_mean,
            std: stats::sample_std(bucket, group_mean),
        });
    }
    let ss_total = ss_between + ss_within;
    if !ss_total.is_finite() {
        return Err(TaskError::NonFinite("anova sums of squares".to_string()));
    }

    result.set_metric("n", n);
    result.set_metric("groups", k);
    result.details = Some(ResultDetails::Groups(group_stats));

    if stats::is_constant(&all) || ss_total <= 0.0 {
        return Ok(result.with_marker(ResultMarker::Undefined(format!(
            "zero variance in {}",
            task.column_b
        ))));
    }
    let df_between = (k - 1) as f64;
    let df_within = (n - k) as f64;
    if df_within <= 0.0 {
        return Ok(result.with_marker(ResultMarker::InsufficientData(
            "no within-group degrees of freedom".to_string(),
        )));
    }

    let eta_squared = (ss_between / ss_total).clamp(0.0, 1.0);
    result.set_metric("eta_squared", eta_squared);
    result.set_metric("effect_size", eta_squared_effect(eta_squared));
    result.set_metric("df_between", df_between);
    result.set_metric("df_within", df_within);

    let p_value = if ss_within > 0.0 {
        let f_statistic = (ss_between / df_between) / (ss_within / df_within);
        result.set_metric("f_statistic", f_statistic);
        stats::f_p_value(f_statistic, df_between, df_within)
    } else {
        // groups are internally constant but differ: F is unbounded
        Some(0.0)
    };
    apply_significance(&mut result, "p_value", p_value, config);

    if n < config.reliability.normality_min_observations {
        result.flag_low_reliability(format!("only {n} observations across groups"));
    }

    result.primary_metric = Some("eta_squared".to_string());
    Ok(result)
}
