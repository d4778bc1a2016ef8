//! Pair enumeration.
//!
//! Builds one [`PairTask`] per unordered pair of pairable columns, in column
//! order. Pairs that would exceed cardinality or contingency-size limits are
//! reported as skipped instead of becoming tasks.

use crate::config::AnalysisConfig;
use crate::types::{
    AnalysisKind, CategoricalData, ColumnData, ColumnProfile, PairKind, PairTask, ResultMarker,
    SemanticType, SkippedPair,
};
use crate::utils::{series_to_f64, series_to_strings};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Work list produced by [`PairEnumerator::enumerate`].
#[derive(Debug, Default)]
pub struct Enumeration {
    pub tasks: Vec<PairTask>,
    pub skipped: Vec<SkippedPair>,
    /// Candidate pairs per kind, skipped ones included.
    pub candidates: BTreeMap<AnalysisKind, usize>,
}

impl Enumeration {
    pub fn pairs_considered(&self) -> usize {
        self.candidates.values().sum()
    }
}

struct Candidate<'a> {
    profile: &'a ColumnProfile,
    data: ColumnData,
}

impl Candidate<'_> {
    fn is_numeric(&self) -> bool {
        self.profile.semantic_type == SemanticType::Numeric
    }
}

/// Builds pair tasks from classified columns.
pub struct PairEnumerator;

impl PairEnumerator {
    pub fn enumerate(
        df: &DataFrame,
        profiles: &[ColumnProfile],
        config: &AnalysisConfig,
    ) -> PolarsResult<Enumeration> {
        let candidates = profiles
            .iter()
            .filter(|p| p.is_pairable())
            .map(|profile| -> PolarsResult<Candidate<'_>> {
                let series = df.column(&profile.name)?.as_materialized_series();
                Ok(Candidate {
                    profile,
                    data: extract_column(series, profile.semantic_type)?,
                })
            })
            .collect::<PolarsResult<Vec<_>>>()?;

        let mut enumeration = Enumeration::default();
        for (i, first) in candidates.iter().enumerate() {
            for second in &candidates[i + 1..] {
                // categorical column goes first for anova
                let (a, b) = if first.is_numeric() && !second.is_numeric() {
                    (second, first)
                } else {
                    (first, second)
                };
                let kind = match (a.is_numeric(), b.is_numeric()) {
                    (true, true) => PairKind::NumericNumeric,
                    (false, false) => PairKind::CategoricalCategorical,
                    _ => PairKind::CategoricalNumeric,
                };
                *enumeration
                    .candidates
                    .entry(kind.analysis_kind())
                    .or_default() += 1;

                if let Some(reason) = exceeds_limit(a.profile, b.profile, kind, config) {
                    debug!(
                        column_a = %a.profile.name,
                        column_b = %b.profile.name,
                        %reason,
                        "Skipping pair"
                    );
                    enumeration.skipped.push(SkippedPair {
                        column_a: a.profile.name.clone(),
                        column_b: b.profile.name.clone(),
                        kind: kind.analysis_kind(),
                        marker: ResultMarker::ExceedsLimit(reason),
                    });
                    continue;
                }

                enumeration.tasks.push(PairTask {
                    column_a: a.profile.name.clone(),
                    column_b: b.profile.name.clone(),
                    kind,
                    data_a: a.data.clone(),
                    data_b: b.data.clone(),
                });
            }
        }
        Ok(enumeration)
    }
}

/// Extract a column into the owned, read-only form tasks consume.
fn extract_column(series: &Series, semantic: SemanticType) -> PolarsResult<ColumnData> {
    match semantic {
        SemanticType::Numeric => Ok(ColumnData::Numeric(Arc::from(series_to_f64(series)?))),
        _ => {
            let values = series_to_strings(series)?;
            Ok(ColumnData::Categorical(Arc::new(CategoricalData::encode(
                &values,
            ))))
        }
    }
}

fn exceeds_limit(
    a: &ColumnProfile,
    b: &ColumnProfile,
    kind: PairKind,
    config: &AnalysisConfig,
) -> Option<String> {
    let categorical: Vec<&ColumnProfile> = [a, b]
        .into_iter()
        .filter(|p| p.semantic_type.is_categorical_like())
        .collect();

    if let Some(wide) = categorical
        .iter()
        .find(|p| p.cardinality > config.max_cardinality)
    {
        return Some(format!(
            "{} has cardinality {} > max_cardinality {}",
            wide.name, wide.cardinality, config.max_cardinality
        ));
    }

    if kind == PairKind::CategoricalCategorical {
        let cells = a.cardinality.saturating_mul(b.cardinality);
        if cells > config.max_contingency_cells {
            return Some(format!(
                "contingency table of {cells} cells > max_contingency_cells {}",
                config.max_contingency_cells
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::ColumnClassifier;

    fn fixture() -> DataFrame {
        let n = 60;
        df![
            "age" => (0..n).map(|i| 20.0 + i as f64).collect::<Vec<_>>(),
            "region" => (0..n).map(|i| ["n", "s", "e", "w"][i % 4]).collect::<Vec<_>>(),
            "income" => (0..n).map(|i| 1000.0 + 37.0 * i as f64).collect::<Vec<_>>(),
            "tier" => (0..n).map(|i| ["a", "b", "c"][i % 3]).collect::<Vec<_>>(),
        ]
        .unwrap()
    }

    #[test]
    fn test_enumerates_all_pairs_with_kinds() {
        let df = fixture();
        let config = AnalysisConfig::default();
        let profiles = ColumnClassifier::classify(&df, &config);
        let enumeration = PairEnumerator::enumerate(&df, &profiles, &config).unwrap();

        assert_eq!(enumeration.tasks.len(), 6);
        assert!(enumeration.skipped.is_empty());
        assert_eq!(enumeration.pairs_considered(), 6);

        let kinds: Vec<_> = enumeration
            .tasks
            .iter()
            .map(|t| (t.column_a.as_str(), t.column_b.as_str(), t.kind))
            .collect();
        assert!(kinds.contains(&("age", "income", PairKind::NumericNumeric)));
        assert!(kinds.contains(&("region", "age", PairKind::CategoricalNumeric)));
        assert!(kinds.contains(&("region", "tier", PairKind::CategoricalCategorical)));
        assert!(kinds.contains(&("tier", "income", PairKind::CategoricalNumeric)));
    }

    #[test]
    fn test_tasks_share_column_slices() {
        let df = fixture();
        let config = AnalysisConfig::default();
        let profiles = ColumnClassifier::classify(&df, &config);
        let enumeration = PairEnumerator::enumerate(&df, &profiles, &config).unwrap();

        let age: Vec<_> = enumeration
            .tasks
            .iter()
            .filter_map(|t| match (&t.column_b[..], &t.data_b) {
                ("age", ColumnData::Numeric(values)) => Some(values.clone()),
                _ => None,
            })
            .collect();
        assert!(age.len() >= 2);
        assert!(Arc::ptr_eq(&age[0], &age[1]));
    }

    #[test]
    fn test_cardinality_limit_skips_pairs() {
        let df = fixture();
        let config = AnalysisConfig {
            max_cardinality: 3,
            ..AnalysisConfig::default()
        };
        // classified with the default limit so region stays categorical
        let profiles = ColumnClassifier::classify(&df, &AnalysisConfig::default());
        let enumeration = PairEnumerator::enumerate(&df, &profiles, &config).unwrap();

        assert!(
            enumeration
                .tasks
                .iter()
                .all(|t| t.column_a != "region" && t.column_b != "region")
        );
        assert_eq!(enumeration.skipped.len(), 3);
        assert!(
            enumeration
                .skipped
                .iter()
                .all(|s| matches!(s.marker, ResultMarker::ExceedsLimit(_)))
        );
    }

    #[test]
    fn test_contingency_cell_limit() {
        let df = fixture();
        let config = AnalysisConfig {
            max_contingency_cells: 10,
            ..AnalysisConfig::default()
        };
        let profiles = ColumnClassifier::classify(&df, &config);
        let enumeration = PairEnumerator::enumerate(&df, &profiles, &config).unwrap();

        assert_eq!(enumeration.skipped.len(), 1);
        assert_eq!(enumeration.skipped[0].kind, AnalysisKind::Association);
        assert_eq!(enumeration.candidates[&AnalysisKind::Association], 1);
    }

    #[test]
    fn test_extract_categorical_from_bool() {
        let series = Series::new("flag".into(), &[Some(true), None, Some(false)]);
        let ColumnData::Categorical(data) = extract_column(&series, SemanticType::Boolean).unwrap()
        else {
            panic!("expected categorical data");
        };
        assert_eq!(data.levels, vec!["false", "true"]);
        assert_eq!(data.codes, vec![Some(1), None, Some(0)]);
    }
}
