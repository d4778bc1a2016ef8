//! The combinations engine.
//!
//! [`CombinationsEngine`] runs one analysis per call:
//!
//! 1. fingerprint the table and look it up in the cache
//! 2. select focus columns and down-sample large tables
//! 3. narrow dtypes of the working copy
//! 4. classify columns and enumerate pair tasks
//! 5. run the analyzers on the scheduler
//! 6. profile text columns, rank, and assemble the report
//!
//! The caller's table is never mutated. Only an empty table or an invalid
//! configuration fails the call; per-pair problems end up in the report.

use crate::aggregator::ResultAggregator;
use crate::analyzers::{self, text};
use crate::cache::{self, CacheEntry, CacheStore, DiskCache, MemoryCache};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result, ResultExt};
use crate::monitor::{EngineStage, PerformanceMonitor};
use crate::optimizer::MemoryOptimizer;
use crate::profiler::ColumnClassifier;
use crate::scheduler::{PairEnumerator, Scheduler};
use crate::types::{AnalysisReport, MemoryUsageInfo, RunMetadata, SemanticType};
use crate::utils::series_to_strings;
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Seed of the row sampler; fixed so repeated runs see the same rows.
const SAMPLE_SEED: u64 = 42;

/// Pairwise relationship discovery over a table.
///
/// Use [`CombinationsEngine::builder()`] to create an engine.
///
/// # Example
///
/// ```rust,ignore
/// use combo_analysis::{AnalysisConfig, CombinationsEngine};
///
/// let engine = CombinationsEngine::builder()
///     .config(AnalysisConfig::builder().top_k(10).build()?)
///     .build()?;
/// let report = engine.analyze(&df)?;
/// for result in &report.results {
///     println!("{} {:.3}", result.pair_label(), result.score);
/// }
/// ```
pub struct CombinationsEngine {
    config: AnalysisConfig,
    cache: Option<Arc<dyn CacheStore>>,
    scheduler: Scheduler,
    computations: AtomicUsize,
}

// One engine may serve several threads
static_assertions::assert_impl_all!(CombinationsEngine: Send, Sync);

/// Working copy of the table after focus selection and sampling.
struct PreparedTable {
    df: DataFrame,
    memory: Option<MemoryUsageInfo>,
}

impl CombinationsEngine {
    /// Create a new engine builder.
    pub fn builder() -> CombinationsEngineBuilder {
        CombinationsEngineBuilder::default()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Number of pairwise analyses executed over the engine's lifetime.
    ///
    /// Cache hits do not increase it.
    pub fn computation_count(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    /// Analyse every eligible column pair of `df`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::EmptyTable`] when `df` has no columns. Other
    /// errors come from polars failing to prepare the working copy.
    pub fn analyze(&self, df: &DataFrame) -> Result<AnalysisReport> {
        if df.width() == 0 {
            return Err(AnalysisError::EmptyTable);
        }

        let monitor = PerformanceMonitor::new();
        info!(
            rows = df.height(),
            columns = df.width(),
            "Starting combinations analysis"
        );

        let fingerprint = match &self.cache {
            Some(_) => Some(monitor.track(EngineStage::Fingerprinting, || {
                cache::fingerprint(df, &self.config)
            })?),
            None => None,
        };

        if let (Some(store), Some(fp)) = (&self.cache, &fingerprint)
            && let Some(report) = self.lookup(store.as_ref(), fp)
        {
            return Ok(report);
        }

        let prepared = monitor.track(EngineStage::Preparation, || self.prepare(df))?;
        let prepared = if self.config.memory_optimization {
            monitor.track(EngineStage::Optimization, || -> Result<PreparedTable> {
                let (optimized, info) = MemoryOptimizer::optimize(&prepared.df)
                    .context("Optimizing working copy")?;
                Ok(PreparedTable {
                    df: optimized,
                    memory: Some(info),
                })
            })?
        } else {
            prepared
        };
        let working = &prepared.df;

        let profiles = monitor.track(EngineStage::Classification, || {
            ColumnClassifier::classify(working, &self.config)
        });
        let skipped_columns = ColumnClassifier::skipped_columns(&profiles);

        let enumeration = monitor.track(EngineStage::Enumeration, || {
            PairEnumerator::enumerate(working, &profiles, &self.config)
        })
        .context("Enumerating column pairs")?;
        let pairs_considered = enumeration.pairs_considered();
        let pairs_analyzed = enumeration.tasks.len();
        info!(
            considered = pairs_considered,
            tasks = pairs_analyzed,
            skipped = enumeration.skipped.len(),
            "Enumerated column pairs"
        );

        let results = monitor.track(EngineStage::Analysis, || {
            self.scheduler.run(
                &enumeration.tasks,
                |task| {
                    self.computations.fetch_add(1, Ordering::Relaxed);
                    analyzers::analyze_pair(task, &self.config)
                },
                &monitor,
            )
        });

        let text_profiles = monitor.track(EngineStage::TextProfiling, || -> Result<_> {
            profiles
                .iter()
                .filter(|p| p.semantic_type == SemanticType::Text)
                .map(|p| {
                    let series = working
                        .column(&p.name)
                        .context(format!("Reading text column '{}'", p.name))?;
                    let values = series_to_strings(series.as_materialized_series())
                        .context(format!("Reading text column '{}'", p.name))?;
                    Ok(text::analyze_column(&p.name, &values, &self.config))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let aggregation = monitor.track(EngineStage::Aggregation, || {
            ResultAggregator::aggregate(
                results,
                enumeration.skipped,
                &enumeration.candidates,
                self.config.top_k,
            )
        });

        let analyzed_columns = profiles
            .iter()
            .filter(|p| p.is_pairable() || p.semantic_type == SemanticType::Text)
            .count();
        let performance = monitor.snapshot();

        let report = AnalysisReport {
            metadata: RunMetadata {
                generated_at: chrono::Utc::now().to_rfc3339(),
                fingerprint: fingerprint.clone(),
                total_rows: df.height(),
                analyzed_rows: working.height(),
                total_columns: df.width(),
                analyzed_columns,
                pairs_considered,
                pairs_analyzed,
                skipped_pair_count: aggregation.skipped_pairs.len(),
                errored_pair_count: aggregation.errored_pairs.len(),
                cache_hit: false,
                parallel: self.scheduler.is_parallel(),
                workers: self.scheduler.workers(),
                performance,
                memory: prepared.memory,
            },
            results: aggregation.results,
            text_profiles,
            column_profiles: profiles,
            skipped_columns,
            skipped_pairs: aggregation.skipped_pairs,
            errored_pairs: aggregation.errored_pairs,
            kind_summaries: aggregation.kind_summaries,
        };

        info!(
            results = report.results.len(),
            errored = report.metadata.errored_pair_count,
            elapsed_ms = report.metadata.performance.elapsed_ms,
            "Combinations analysis complete"
        );

        if let (Some(store), Some(fp)) = (&self.cache, fingerprint)
            && let Err(e) = store.put(CacheEntry::new(fp, report.clone()))
        {
            warn!("Failed to store report in {} cache: {}", store.name(), e);
        }

        Ok(report)
    }

    /// Cached report for `fingerprint`, if any. Store failures count as misses.
    fn lookup(&self, store: &dyn CacheStore, fingerprint: &str) -> Option<AnalysisReport> {
        match store.get(fingerprint) {
            Ok(Some(entry)) => {
                info!(
                    cache = store.name(),
                    fingerprint = %fingerprint,
                    created_at = %entry.created_at,
                    "Cache hit, returning stored report"
                );
                let mut report = entry.report;
                report.metadata.cache_hit = true;
                Some(report)
            }
            Ok(None) => {
                debug!(cache = store.name(), "Cache miss");
                None
            }
            Err(e) => {
                warn!("Cache lookup in {} failed, recomputing: {}", store.name(), e);
                None
            }
        }
    }

    /// Apply the focus filter and the row sample cap.
    fn prepare(&self, df: &DataFrame) -> Result<PreparedTable> {
        let mut working = self.select_focus(df)?;

        if working.height() > self.config.sample_cap {
            working = sample_rows(&working, self.config.sample_cap)
                .map_err(|e| AnalysisError::PreparationFailed(format!("sampling rows: {e}")))?;
            info!(
                rows = working.height(),
                cap = self.config.sample_cap,
                "Sampled table down to the row cap"
            );
        }

        Ok(PreparedTable {
            df: working,
            memory: None,
        })
    }

    /// Columns whose name contains one of the focus tokens.
    ///
    /// Falls back to every column when no name matches.
    fn select_focus(&self, df: &DataFrame) -> Result<DataFrame> {
        let tokens = &self.config.focus_columns;
        if tokens.is_empty() {
            return Ok(df.clone());
        }

        let selected: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| tokens.iter().any(|t| name.as_str().contains(t.as_str())))
            .map(|name| name.to_string())
            .collect();

        if selected.is_empty() {
            warn!(
                "No column matches focus tokens {:?}, analysing all columns",
                tokens
            );
            return Ok(df.clone());
        }
        debug!(columns = ?selected, "Focus columns selected");
        df.select(selected).context("Selecting focus columns")
    }
}

/// Deterministic sample of `cap` rows, original row order kept.
fn sample_rows(df: &DataFrame, cap: usize) -> PolarsResult<DataFrame> {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let mut indices: Vec<IdxSize> = rand::seq::index::sample(&mut rng, df.height(), cap)
        .into_iter()
        .map(|i| i as IdxSize)
        .collect();
    indices.sort_unstable();
    let indices = IdxCa::from_vec("sample".into(), indices);
    df.take(&indices)
}

/// Builder for [`CombinationsEngine`].
#[derive(Default)]
pub struct CombinationsEngineBuilder {
    config: Option<AnalysisConfig>,
    cache: Option<Arc<dyn CacheStore>>,
}

static_assertions::assert_impl_all!(CombinationsEngineBuilder: Send);

impl CombinationsEngineBuilder {
    /// Set the analysis configuration. Defaults to [`AnalysisConfig::default`].
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a specific cache store.
    ///
    /// Share one `Arc` between engines to let them reuse each other's
    /// results. Ignored when `enable_caching` is off.
    pub fn cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    /// Validate the configuration and build the engine.
    ///
    /// Without an explicit store, caching uses a [`DiskCache`] under
    /// `cache_dir` when set, otherwise a private [`MemoryCache`].
    pub fn build(self) -> Result<CombinationsEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let cache = if !config.enable_caching {
            None
        } else if let Some(store) = self.cache {
            Some(store)
        } else {
            Some(default_store(&config))
        };

        Ok(CombinationsEngine {
            scheduler: Scheduler::from_config(&config),
            config,
            cache,
            computations: AtomicUsize::new(0),
        })
    }
}

fn default_store(config: &AnalysisConfig) -> Arc<dyn CacheStore> {
    if let Some(dir) = &config.cache_dir {
        match DiskCache::new(dir) {
            Ok(store) => return Arc::new(store),
            Err(e) => warn!("Disk cache unavailable, using memory cache: {}", e),
        }
    }
    Arc::new(MemoryCache::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalysisKind;

    fn table() -> DataFrame {
        let n = 60;
        let age: Vec<f64> = (0..n).map(|i| 20.0 + i as f64).collect();
        let income: Vec<f64> = age.iter().map(|a| a * 1000.0 + (a % 3.0) * 50.0).collect();
        let region: Vec<&str> = (0..n).map(|i| ["north", "south", "east"][i % 3]).collect();
        df![
            "age" => age,
            "income" => income,
            "region" => region,
        ]
        .unwrap()
    }

    fn engine(config: AnalysisConfig) -> CombinationsEngine {
        CombinationsEngine::builder().config(config).build().unwrap()
    }

    #[test]
    fn test_empty_table_is_fatal() {
        let err = engine(AnalysisConfig::default())
            .analyze(&DataFrame::empty())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyTable));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_invalid_config_fails_build() {
        let config = AnalysisConfig {
            correlation_threshold: 2.0,
            ..AnalysisConfig::default()
        };
        let err = CombinationsEngine::builder().config(config).build().err().unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_report_contains_correlation() {
        let report = engine(AnalysisConfig::default()).analyze(&table()).unwrap();

        let top = report.find("age", "income").unwrap();
        assert_eq!(top.kind, AnalysisKind::Correlation);
        assert!(top.score > 0.99);
        assert_eq!(report.metadata.total_rows, 60);
        assert_eq!(report.metadata.pairs_considered, 3);
        assert!(!report.metadata.cache_hit);
    }

    #[test]
    fn test_cache_hit_skips_computation() {
        let engine = engine(AnalysisConfig::default());
        let first = engine.analyze(&table()).unwrap();
        let computed = engine.computation_count();
        assert!(computed > 0);

        let second = engine.analyze(&table()).unwrap();
        assert!(second.metadata.cache_hit);
        assert_eq!(engine.computation_count(), computed);
        assert_eq!(first.results, second.results);
    }

    #[test]
    fn test_caching_disabled_recomputes() {
        let engine = engine(AnalysisConfig::builder().enable_caching(false).build().unwrap());
        engine.analyze(&table()).unwrap();
        let computed = engine.computation_count();
        engine.analyze(&table()).unwrap();
        assert_eq!(engine.computation_count(), computed * 2);
    }

    #[test]
    fn test_focus_columns_restrict_analysis() {
        let config = AnalysisConfig::builder()
            .focus_columns(["age", "income"])
            .enable_caching(false)
            .build()
            .unwrap();
        let report = engine(config).analyze(&table()).unwrap();
        assert_eq!(report.metadata.pairs_considered, 1);
    }

    #[test]
    fn test_unmatched_focus_falls_back_to_all_columns() {
        let config = AnalysisConfig::builder()
            .focus_columns(["nothing"])
            .enable_caching(false)
            .build()
            .unwrap();
        let report = engine(config).analyze(&table()).unwrap();
        assert_eq!(report.metadata.pairs_considered, 3);
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let df = table();
        let a = sample_rows(&df, 10).unwrap();
        let b = sample_rows(&df, 10).unwrap();
        assert_eq!(a.height(), 10);
        assert!(a.equals(&b));
    }

    #[test]
    fn test_sample_cap_bounds_analyzed_rows() {
        let config = AnalysisConfig::builder()
            .sample_cap(40)
            .enable_caching(false)
            .build()
            .unwrap();
        let report = engine(config).analyze(&table()).unwrap();
        assert_eq!(report.metadata.total_rows, 60);
        assert_eq!(report.metadata.analyzed_rows, 40);
    }
}
