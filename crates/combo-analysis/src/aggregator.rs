//! Result aggregation and ranking.
//!
//! Scores every rankable result on a [0, 1] importance scale:
//!
//! - correlation: |primary coefficient| (Pearson, or Spearman for small samples)
//! - association: Cramér's V
//! - anova: eta-squared
//!
//! No rescaling is applied: all three already live in [0, 1]. Results are
//! sorted by descending score, ties broken by the lexicographically ordered
//! column-name pair (whatever order the analyzer stored them in), and
//! truncated to `top_k`. Marked results become skipped or errored pairs.

use crate::error::TaskError;
use crate::types::{AnalysisKind, KindSummary, PairResult, ResultMarker, SkippedPair};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Ranked output of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub results: Vec<PairResult>,
    pub skipped_pairs: Vec<SkippedPair>,
    pub errored_pairs: Vec<SkippedPair>,
    pub kind_summaries: Vec<KindSummary>,
    /// Rankable results before truncation.
    pub rankable_count: usize,
}

/// Merges, scores and ranks pair results.
pub struct ResultAggregator;

impl ResultAggregator {
    /// Aggregate analyzer output with the pairs skipped at enumeration.
    ///
    /// `candidates` holds the number of candidate pairs per kind.
    pub fn aggregate(
        results: Vec<PairResult>,
        enumeration_skips: Vec<SkippedPair>,
        candidates: &BTreeMap<AnalysisKind, usize>,
        top_k: usize,
    ) -> Aggregation {
        let mut ranked = Vec::new();
        let mut skipped_pairs = enumeration_skips;
        let mut errored_pairs = Vec::new();

        for mut result in results {
            if result.marker.is_none() {
                match importance(&result) {
                    Some(score) => {
                        result.score = score;
                        ranked.push(result);
                        continue;
                    }
                    None => {
                        let error = TaskError::NonFinite("importance score".to_string());
                        result.marker = Some(ResultMarker::Failed(error));
                    }
                }
            }

            let Some(marker) = result.marker.take() else {
                continue;
            };
            let entry = SkippedPair {
                column_a: result.column_a,
                column_b: result.column_b.unwrap_or_default(),
                kind: result.kind,
                marker,
            };
            if entry.marker.is_error() {
                errored_pairs.push(entry);
            } else {
                skipped_pairs.push(entry);
            }
        }

        ranked.sort_by(compare_ranked);
        let kind_summaries = summarize(&ranked, candidates);
        let rankable_count = ranked.len();
        ranked.truncate(top_k);

        skipped_pairs.sort_by(compare_skipped);
        errored_pairs.sort_by(compare_skipped);

        debug!(
            ranked = rankable_count,
            kept = ranked.len(),
            skipped = skipped_pairs.len(),
            errored = errored_pairs.len(),
            "Aggregated results"
        );

        Aggregation {
            results: ranked,
            skipped_pairs,
            errored_pairs,
            kind_summaries,
            rankable_count,
        }
    }
}

/// Importance score of a rankable result, `None` if not finite.
pub fn importance(result: &PairResult) -> Option<f64> {
    let primary = result.primary_value()?;
    let score = match result.kind {
        AnalysisKind::Correlation => primary.abs(),
        AnalysisKind::Association | AnalysisKind::Anova | AnalysisKind::Text => primary,
    };
    score.is_finite().then(|| score.clamp(0.0, 1.0))
}

/// Column names in lexicographic order, then the stored order.
fn name_key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str, &'a str) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (lo, hi, a)
}

fn compare_ranked(a: &PairResult, b: &PairResult) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| {
        name_key(&a.column_a, a.column_b.as_deref().unwrap_or_default())
            .cmp(&name_key(&b.column_a, b.column_b.as_deref().unwrap_or_default()))
    })
}

fn compare_skipped(a: &SkippedPair, b: &SkippedPair) -> Ordering {
    name_key(&a.column_a, &a.column_b).cmp(&name_key(&b.column_a, &b.column_b))
}

fn summarize(ranked: &[PairResult], candidates: &BTreeMap<AnalysisKind, usize>) -> Vec<KindSummary> {
    candidates
        .iter()
        .map(|(&kind, &total_pairs)| {
            let scores: Vec<f64> = ranked
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| r.score)
                .collect();
            let significant_results = ranked
                .iter()
                .filter(|r| r.kind == kind && r.significant == Some(true))
                .count();
            let mean_score = if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            };
            KindSummary {
                kind,
                total_pairs,
                valid_results: scores.len(),
                significant_results,
                max_score: scores.iter().copied().fold(0.0, f64::max),
                mean_score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(a: &str, b: &str, kind: AnalysisKind, primary: f64) -> PairResult {
        let mut r = PairResult::new(a, Some(b), kind);
        let name = match kind {
            AnalysisKind::Correlation => "pearson",
            AnalysisKind::Association => "cramers_v",
            _ => "eta_squared",
        };
        r.set_metric(name, primary);
        r.primary_metric = Some(name.to_string());
        r.significant = Some(true);
        r
    }

    fn candidates() -> BTreeMap<AnalysisKind, usize> {
        BTreeMap::from([
            (AnalysisKind::Correlation, 3),
            (AnalysisKind::Association, 1),
            (AnalysisKind::Anova, 1),
        ])
    }

    #[test]
    fn test_sorted_by_score_descending() {
        let results = vec![
            result("a", "b", AnalysisKind::Correlation, -0.9),
            result("c", "d", AnalysisKind::Association, 0.4),
            result("e", "f", AnalysisKind::Anova, 0.6),
        ];
        let agg = ResultAggregator::aggregate(results, vec![], &candidates(), 10);

        let order: Vec<_> = agg.results.iter().map(|r| r.column_a.as_str()).collect();
        assert_eq!(order, vec!["a", "e", "c"]);
        assert!((agg.results[0].score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_ties_broken_by_column_names() {
        let results = vec![
            result("z", "y", AnalysisKind::Correlation, 0.5),
            result("m", "q", AnalysisKind::Correlation, 0.5),
            result("m", "n", AnalysisKind::Correlation, -0.5),
        ];
        let agg = ResultAggregator::aggregate(results, vec![], &candidates(), 10);

        let order: Vec<_> = agg.results.iter().map(|r| r.pair_label()).collect();
        assert_eq!(order, vec!["m × n", "m × q", "z × y"]);
    }

    #[test]
    fn test_ties_ignore_stored_column_order() {
        // anova stores (categorical, numeric)
        let results = vec![
            result("region", "age", AnalysisKind::Anova, 0.5),
            result("income", "tier", AnalysisKind::Correlation, 0.5),
            result("band", "zone", AnalysisKind::Association, 0.5),
        ];
        let agg = ResultAggregator::aggregate(results, vec![], &candidates(), 10);

        let order: Vec<_> = agg.results.iter().map(|r| r.pair_label()).collect();
        assert_eq!(order, vec!["region × age", "band × zone", "income × tier"]);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let results = (0..10)
            .map(|i| result(&format!("c{i}"), "x", AnalysisKind::Correlation, i as f64 / 10.0))
            .collect();
        let agg = ResultAggregator::aggregate(results, vec![], &candidates(), 3);

        assert_eq!(agg.results.len(), 3);
        assert_eq!(agg.rankable_count, 10);
        assert_eq!(agg.results[0].column_a, "c9");
    }

    #[test]
    fn test_marked_results_are_split() {
        let below = result("a", "b", AnalysisKind::Correlation, 0.1)
            .with_marker(ResultMarker::BelowThreshold("low".to_string()));
        let failed = result("c", "d", AnalysisKind::Anova, 0.5)
            .with_marker(ResultMarker::Failed(TaskError::Panicked("x".to_string())));
        let skipped_early = SkippedPair {
            column_a: "0".to_string(),
            column_b: "1".to_string(),
            kind: AnalysisKind::Association,
            marker: ResultMarker::ExceedsLimit("wide".to_string()),
        };
        let agg = ResultAggregator::aggregate(
            vec![below, failed, result("e", "f", AnalysisKind::Anova, 0.2)],
            vec![skipped_early],
            &candidates(),
            10,
        );

        assert_eq!(agg.results.len(), 1);
        let skipped: Vec<_> = agg.skipped_pairs.iter().map(|s| s.column_a.as_str()).collect();
        assert_eq!(skipped, vec!["0", "a"]);
        assert_eq!(agg.errored_pairs.len(), 1);
        assert_eq!(agg.errored_pairs[0].marker.code(), "failed");
    }

    #[test]
    fn test_kind_summaries() {
        let results = vec![
            result("a", "b", AnalysisKind::Correlation, 0.8),
            result("a", "c", AnalysisKind::Correlation, 0.4),
            result("e", "f", AnalysisKind::Anova, 0.3),
        ];
        let agg = ResultAggregator::aggregate(results, vec![], &candidates(), 1);

        let correlation = &agg.kind_summaries[0];
        assert_eq!(correlation.kind, AnalysisKind::Correlation);
        assert_eq!(correlation.total_pairs, 3);
        assert_eq!(correlation.valid_results, 2);
        assert!((correlation.max_score - 0.8).abs() < 1e-12);
        assert!((correlation.mean_score - 0.6).abs() < 1e-12);

        let association = &agg.kind_summaries[1];
        assert_eq!(association.valid_results, 0);
        assert_eq!(association.mean_score, 0.0);
    }

    #[test]
    fn test_missing_primary_metric_is_errored() {
        let mut broken = PairResult::new("a", Some("b"), AnalysisKind::Anova);
        broken.primary_metric = Some("eta_squared".to_string());
        let agg = ResultAggregator::aggregate(vec![broken], vec![], &candidates(), 5);

        assert!(agg.results.is_empty());
        assert_eq!(agg.errored_pairs.len(), 1);
    }
}
