//! Categorical × categorical association.
//!
//! Builds the contingency table of the two columns, then reports the
//! chi-square test, Cramér's V and lift-based association rules. When more
//! than `max_low_expected_ratio` of the expected cell counts fall below
//! `low_expected_count`, the chi-square figures are flagged, not dropped.

use super::stats;
use super::{apply_significance, cramers_v_strength};
use crate::config::AnalysisConfig;
use crate::error::TaskError;
use crate::types::{
    AssociationRule, CategoricalData, ColumnData, PairResult, PairTask, ResultDetails,
    ResultMarker,
};

/// Observed counts with empty rows and columns removed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ContingencyTable {
    pub row_levels: Vec<String>,
    pub col_levels: Vec<String>,
    pub counts: Vec<Vec<u64>>,
    pub row_totals: Vec<u64>,
    pub col_totals: Vec<u64>,
    pub total: u64,
}

impl ContingencyTable {
    pub fn build(a: &CategoricalData, b: &CategoricalData) -> Self {
        let mut counts = vec![vec![0u64; b.cardinality()]; a.cardinality()];
        for (ca, cb) in a.codes.iter().zip(&b.codes) {
            if let (Some(ca), Some(cb)) = (ca, cb) {
                counts[*ca as usize][*cb as usize] += 1;
            }
        }

        let row_keep: Vec<usize> = (0..counts.len())
            .filter(|&r| counts[r].iter().any(|&c| c > 0))
            .collect();
        let col_keep: Vec<usize> = (0..b.cardinality())
            .filter(|&c| counts.iter().any(|row| row[c] > 0))
            .collect();

        let counts: Vec<Vec<u64>> = row_keep
            .iter()
            .map(|&r| col_keep.iter().map(|&c| counts[r][c]).collect())
            .collect();
        let row_totals: Vec<u64> = counts.iter().map(|row| row.iter().sum()).collect();
        let col_totals: Vec<u64> = (0..col_keep.len())
            .map(|c| counts.iter().map(|row| row[c]).sum())
            .collect();

        Self {
            row_levels: row_keep.iter().map(|&r| a.levels[r].clone()).collect(),
            col_levels: col_keep.iter().map(|&c| b.levels[c].clone()).collect(),
            total: row_totals.iter().sum(),
            counts,
            row_totals,
            col_totals,
        }
    }

    fn expected(&self, r: usize, c: usize) -> f64 {
        self.row_totals[r] as f64 * self.col_totals[c] as f64 / self.total as f64
    }
}

pub fn analyze(task: &PairTask, config: &AnalysisConfig) -> Result<PairResult, TaskError> {
    let (ColumnData::Categorical(a), ColumnData::Categorical(b)) = (&task.data_a, &task.data_b)
    else {
        return Err(TaskError::UnexpectedData("association".to_string()));
    };

    let table = ContingencyTable::build(a, b);
    let mut result = PairResult::for_task(task);
    result.set_metric("n", table.total as usize);

    let (rows, cols) = (table.row_levels.len(), table.col_levels.len());
    if rows < 2 || cols < 2 {
        return Ok(result.with_marker(ResultMarker::Undefined(format!(
            "contingency table is {rows}x{cols}, association needs at least 2x2"
        ))));
    }

    let reliability = &config.reliability;
    let mut chi_square = 0.0;
    let mut low_expected = 0usize;
    for r in 0..rows {
        for c in 0..cols {
            let expected = table.expected(r, c);
            if expected < reliability.low_expected_count {
                low_expected += 1;
            }
            let diff = table.counts[r][c] as f64 - expected;
            chi_square += diff * diff / expected;
        }
    }
    if !chi_square.is_finite() {
        return Err(TaskError::NonFinite("chi-square statistic".to_string()));
    }

    let dof = ((rows - 1) * (cols - 1)) as f64;
    let min_dim = (rows.min(cols) - 1) as f64;
    let cramers_v = (chi_square / (table.total as f64 * min_dim)).sqrt().min(1.0);
    let low_expected_ratio = low_expected as f64 / (rows * cols) as f64;

    result.set_metric("chi_square", chi_square);
    result.set_metric("dof", dof);
    result.set_metric("cramers_v", cramers_v);
    result.set_metric("strength", cramers_v_strength(cramers_v));
    result.set_metric("low_expected_ratio", low_expected_ratio);
    apply_significance(
        &mut result,
        "p_value",
        stats::chi_square_p_value(chi_square, dof),
        config,
    );
    if low_expected_ratio > reliability.max_low_expected_ratio {
        result.flag_low_reliability(format!(
            "{:.0}% of expected counts below {}",
            low_expected_ratio * 100.0,
            reliability.low_expected_count
        ));
    }

    let (rules, max_lift) = mine_rules(task, &table, config);
    let normalized_lift = if max_lift > 1.0 { 1.0 - 1.0 / max_lift } else { 0.0 };
    result.set_metric("max_lift", max_lift);
    result.set_metric("normalized_lift", normalized_lift);
    result.set_metric("rule_count", rules.len());
    if !rules.is_empty() {
        let top: Vec<AssociationRule> =
            rules.into_iter().take(reliability.top_rules).collect();
        result.details = Some(ResultDetails::Rules(top));
    }

    result.primary_metric = Some("cramers_v".to_string());
    Ok(result)
}

/// Value pairs whose lift reaches `lift_threshold`, strongest first.
///
/// Also returns the maximum lift over all observed cells.
fn mine_rules(
    task: &PairTask,
    table: &ContingencyTable,
    config: &AnalysisConfig,
) -> (Vec<AssociationRule>, f64) {
    let total = table.total as f64;
    let mut max_lift: f64 = 0.0;
    let mut rules = Vec::new();

    for (r, row) in table.counts.iter().enumerate() {
        for (c, &count) in row.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let support = count as f64 / total;
            let confidence = count as f64 / table.row_totals[r] as f64;
            let lift = confidence / (table.col_totals[c] as f64 / total);
            max_lift = max_lift.max(lift);
            if lift >= config.lift_threshold {
                rules.push(AssociationRule {
                    antecedent: format!("{}={}", task.column_a, table.row_levels[r]),
                    consequent: format!("{}={}", task.column_b, table.col_levels[c]),
                    support,
                    confidence,
                    lift,
                });
            }
        }
    }

    rules.sort_by(|x, y| {
        y.lift
            .total_cmp(&x.lift)
            .then_with(|| x.antecedent.cmp(&y.antecedent))
            .then_with(|| x.consequent.cmp(&y.consequent))
    });
    (rules, max_lift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PairKind;

    fn task(a: &[Option<&str>], b: &[Option<&str>]) -> PairTask {
        PairTask {
            column_a: "color".to_string(),
            column_b: "size".to_string(),
            kind: PairKind::CategoricalCategorical,
            data_a: ColumnData::categorical(a),
            data_b: ColumnData::categorical(b),
        }
    }

    type Columns = (Vec<Option<&'static str>>, Vec<Option<&'static str>>);

    fn repeat(values: &[(&'static str, &'static str)], times: usize) -> Columns {
        let mut a = Vec::new();
        let mut b = Vec::new();
        for _ in 0..times {
            for (x, y) in values {
                a.push(Some(*x));
                b.push(Some(*y));
            }
        }
        (a, b)
    }

    #[test]
    fn test_contingency_table_drops_empty_levels() {
        let a = CategoricalData::encode(&[Some("r"), Some("g"), None, Some("r")]);
        let b = CategoricalData::encode(&[Some("s"), Some("l"), Some("m"), None]);
        let table = ContingencyTable::build(&a, &b);

        // "m" only co-occurs with a null color
        assert_eq!(table.col_levels, vec!["l", "s"]);
        assert_eq!(table.row_levels, vec!["g", "r"]);
        assert_eq!(table.counts, vec![vec![1, 0], vec![0, 1]]);
        assert_eq!(table.total, 2);
    }

    #[test]
    fn test_perfect_association() {
        let (a, b) = repeat(&[("red", "small"), ("blue", "large")], 20);
        let result = analyze(&task(&a, &b), &AnalysisConfig::default()).unwrap();

        assert!(result.is_rankable());
        assert!((result.metric("cramers_v").unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(result.significant, Some(true));
        assert_eq!(result.metrics["strength"].as_str(), Some("very_strong"));
        assert!((result.metric("max_lift").unwrap() - 2.0).abs() < 1e-12);
        assert!((result.metric("normalized_lift").unwrap() - 0.5).abs() < 1e-12);

        let Some(ResultDetails::Rules(rules)) = &result.details else {
            panic!("expected rules");
        };
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].antecedent, "color=blue");
        assert_eq!(rules[0].consequent, "size=large");
        assert!((rules[0].confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_independent_columns_score_low() {
        let (a, b) = repeat(
            &[
                ("red", "small"),
                ("red", "large"),
                ("blue", "small"),
                ("blue", "large"),
            ],
            25,
        );
        let result = analyze(&task(&a, &b), &AnalysisConfig::default()).unwrap();

        assert!(result.metric("cramers_v").unwrap() < 1e-9);
        assert_eq!(result.significant, Some(false));
        assert_eq!(result.metric("rule_count"), Some(0.0));
        assert!(result.details.is_none());
    }

    #[test]
    fn test_low_expected_counts_flagged_but_reported() {
        let (a, b) = repeat(&[("red", "small"), ("blue", "large"), ("red", "large")], 2);
        let result = analyze(&task(&a, &b), &AnalysisConfig::default()).unwrap();

        assert!(result.is_rankable());
        assert!(result.low_reliability);
        assert!(result.metric("chi_square").is_some());
    }

    #[test]
    fn test_single_level_is_undefined() {
        let (a, b) = repeat(&[("red", "small"), ("red", "large")], 5);
        let result = analyze(&task(&a, &b), &AnalysisConfig::default()).unwrap();
        assert!(matches!(result.marker, Some(ResultMarker::Undefined(_))));
    }
}
