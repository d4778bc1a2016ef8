//! Combinations Analysis Library
//!
//! Pairwise relationship discovery for tabular data, built with Rust and Polars.
//!
//! # Overview
//!
//! Given a table, the engine finds and ranks statistically meaningful
//! relationships between pairs of columns:
//!
//! - **Column Classification**: each column becomes numeric, categorical,
//!   boolean, text, datetime or excluded
//! - **Numeric × Numeric**: Pearson, Spearman and Kendall correlations
//! - **Categorical × Categorical**: chi-square, Cramér's V and lift-based
//!   association rules
//! - **Categorical × Numeric**: one-way ANOVA with eta-squared
//! - **Text Profiles**: length and token statistics for free-text columns
//! - **Ranking**: every kind is scored on [0, 1] and the top K pairs are kept
//! - **Caching**: repeated runs on the same table and configuration are served
//!   from a fingerprint-keyed cache
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use combo_analysis::{AnalysisConfig, CombinationsEngine, ReportGenerator};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//!
//! let config = AnalysisConfig::builder()
//!     .top_k(10)
//!     .correlation_threshold(0.4)
//!     .build()?;
//!
//! let engine = CombinationsEngine::builder().config(config).build()?;
//! let report = engine.analyze(&df)?;
//! print!("{}", ReportGenerator::summary_text(&report));
//! ```
//!
//! # Sharing a Cache
//!
//! Engines built with the same [`cache::CacheStore`] reuse each other's
//! reports:
//!
//! ```rust,ignore
//! use combo_analysis::cache::{CacheStore, DiskCache};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn CacheStore> = Arc::new(DiskCache::new(".combo-cache")?);
//! let engine = CombinationsEngine::builder().cache(store.clone()).build()?;
//! ```

pub mod aggregator;
pub mod analyzers;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod optimizer;
pub mod profiler;
pub mod reporting;
pub mod scheduler;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use aggregator::{Aggregation, ResultAggregator};
pub use cache::{CacheEntry, CacheError, CacheStore, DiskCache, MemoryCache};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, ConfigValidationError, ReliabilityThresholds,
};
pub use engine::{CombinationsEngine, CombinationsEngineBuilder};
pub use error::{AnalysisError, Result as AnalysisResult, ResultExt, TaskError};
pub use monitor::{EngineStage, PerformanceMonitor};
pub use optimizer::MemoryOptimizer;
pub use profiler::ColumnClassifier;
pub use reporting::ReportGenerator;
pub use scheduler::{Enumeration, PairEnumerator, Scheduler};
pub use types::{
    AnalysisKind, AnalysisReport, ColumnProfile, MetricValue, PairResult, ResultMarker,
    RunMetadata, SemanticType, SkippedColumn, SkippedPair,
};
