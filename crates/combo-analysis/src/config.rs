//! Configuration types for the combinations analysis engine.
//!
//! [`AnalysisConfig`] is immutable once built. Use the builder for a
//! validated configuration; configurations deserialized from JSON must be
//! checked with [`AnalysisConfig::validate`] before use (the engine does so).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Thresholds behind the reliability markers and classification heuristics.
///
/// These are conventions, not statistically optimal values. They are applied
/// identically in every mode so results stay deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliabilityThresholds {
    /// Paired observations below this flag a numeric pair as low-reliability.
    /// Default: 10
    pub min_paired_observations: usize,

    /// Below this many observations Pearson is not trusted and Spearman
    /// becomes the primary correlation.
    /// Default: 30
    pub normality_min_observations: usize,

    /// Categorical levels with fewer observations are dropped before ANOVA.
    /// Default: 2
    pub min_group_size: usize,

    /// Expected cell count under which a contingency cell counts as sparse.
    /// Default: 5.0
    pub low_expected_count: f64,

    /// Maximum tolerated share of sparse cells before chi-square figures are
    /// flagged low-reliability.
    /// Default: 0.2
    pub max_low_expected_ratio: f64,

    /// Integer columns with at most this many distinct (repeating) values are
    /// treated as categorical codes.
    /// Default: 10
    pub numeric_category_max_distinct: usize,

    /// Minimum average string length for a high-cardinality string column to
    /// be treated as free text.
    /// Default: 20.0
    pub text_min_avg_length: f64,

    /// p-value below which a result is marked significant.
    /// Default: 0.05
    pub significance_level: f64,

    /// Number of association rules attached to a categorical result.
    /// Default: 5
    pub top_rules: usize,

    /// Number of most frequent tokens attached to a text profile.
    /// Default: 10
    pub top_tokens: usize,
}

impl Default for ReliabilityThresholds {
    fn default() -> Self {
        Self {
            min_paired_observations: 10,
            normality_min_observations: 30,
            min_group_size: 2,
            low_expected_count: 5.0,
            max_low_expected_ratio: 0.2,
            numeric_category_max_distinct: 10,
            text_min_avg_length: 20.0,
            significance_level: 0.05,
            top_rules: 5,
            top_tokens: 10,
        }
    }
}

/// Configuration for an analysis run.
///
/// # Example
///
/// ```rust,ignore
/// use combo_analysis::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .max_cardinality(30)
///     .correlation_threshold(0.5)
///     .parallel_processing(false)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Categorical columns with more distinct values are excluded from the
    /// categorical analysis paths.
    /// Default: 50
    pub max_cardinality: usize,

    /// Maximum number of ranked results returned.
    /// Default: 20
    pub top_k: usize,

    /// Minimum absolute primary correlation for a numeric pair to be kept.
    /// Default: 0.3
    pub correlation_threshold: f64,

    /// Run pair tasks on a worker pool instead of sequentially.
    /// Default: true
    pub parallel_processing: bool,

    /// Worker pool size when `parallel_processing` is enabled.
    /// Default: 4
    pub max_workers: usize,

    /// Look up and store results in the cache.
    /// Default: true
    pub enable_caching: bool,

    /// Analyse a dtype-narrowed working copy of the table.
    /// Default: true
    pub memory_optimization: bool,

    /// Tables with more rows are sampled down to this many rows.
    /// Default: 200_000
    pub sample_cap: usize,

    /// Minimum lift for a value pair to be listed as an association rule.
    /// Default: 1.5
    pub lift_threshold: f64,

    /// Categorical pairs whose contingency table would exceed this many cells
    /// are skipped at enumeration.
    /// Default: 2_500
    pub max_contingency_cells: usize,

    /// When non-empty, only columns whose name contains one of these tokens
    /// are analysed.
    /// Default: empty
    pub focus_columns: Vec<String>,

    /// Directory for the on-disk cache. `None` keeps the cache in memory.
    /// Default: None
    pub cache_dir: Option<PathBuf>,

    /// Reliability and classification thresholds.
    pub reliability: ReliabilityThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_cardinality: 50,
            top_k: 20,
            correlation_threshold: 0.3,
            parallel_processing: true,
            max_workers: 4,
            enable_caching: true,
            memory_optimization: true,
            sample_cap: 200_000,
            lift_threshold: 1.5,
            max_contingency_cells: 2_500,
            focus_columns: Vec::new(),
            cache_dir: None,
            reliability: ReliabilityThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_cardinality == 0 {
            return Err(ConfigValidationError::MustBePositive("max_cardinality"));
        }
        if self.top_k == 0 {
            return Err(ConfigValidationError::MustBePositive("top_k"));
        }
        if self.max_workers == 0 {
            return Err(ConfigValidationError::MustBePositive("max_workers"));
        }
        if self.sample_cap == 0 {
            return Err(ConfigValidationError::MustBePositive("sample_cap"));
        }
        if self.max_contingency_cells == 0 {
            return Err(ConfigValidationError::MustBePositive(
                "max_contingency_cells",
            ));
        }
        check_unit_interval("correlation_threshold", self.correlation_threshold)?;
        check_unit_interval(
            "reliability.max_low_expected_ratio",
            self.reliability.max_low_expected_ratio,
        )?;
        check_unit_interval(
            "reliability.significance_level",
            self.reliability.significance_level,
        )?;
        if !self.lift_threshold.is_finite() || self.lift_threshold < 0.0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "lift_threshold".to_string(),
                value: self.lift_threshold,
            });
        }
        if self.reliability.min_group_size == 0 {
            return Err(ConfigValidationError::MustBePositive(
                "reliability.min_group_size",
            ));
        }
        Ok(())
    }

    /// The subset of the configuration that can change analysis output.
    ///
    /// Execution-only settings (parallelism, worker count, caching, cache
    /// location) are reset so that they do not split the cache key.
    pub fn result_affecting(&self) -> AnalysisConfig {
        let defaults = AnalysisConfig::default();
        AnalysisConfig {
            parallel_processing: defaults.parallel_processing,
            max_workers: defaults.max_workers,
            enable_caching: defaults.enable_caching,
            cache_dir: None,
            ..self.clone()
        }
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), ConfigValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigValidationError::InvalidThreshold {
            field: field.to_string(),
            value,
        })
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: f64 },

    #[error("'{0}' must be greater than zero")]
    MustBePositive(&'static str),
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    max_cardinality: Option<usize>,
    top_k: Option<usize>,
    correlation_threshold: Option<f64>,
    parallel_processing: Option<bool>,
    max_workers: Option<usize>,
    enable_caching: Option<bool>,
    memory_optimization: Option<bool>,
    sample_cap: Option<usize>,
    lift_threshold: Option<f64>,
    max_contingency_cells: Option<usize>,
    focus_columns: Vec<String>,
    cache_dir: Option<PathBuf>,
    reliability: Option<ReliabilityThresholds>,
}

impl AnalysisConfigBuilder {
    /// Set the maximum cardinality for categorical analysis.
    pub fn max_cardinality(mut self, max: usize) -> Self {
        self.max_cardinality = Some(max);
        self
    }

    /// Set the number of ranked results to return.
    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Set the minimum absolute correlation kept for numeric pairs.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0
    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = Some(threshold);
        self
    }

    /// Enable or disable the worker pool.
    pub fn parallel_processing(mut self, enable: bool) -> Self {
        self.parallel_processing = Some(enable);
        self
    }

    /// Set the worker pool size.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Enable or disable result caching.
    pub fn enable_caching(mut self, enable: bool) -> Self {
        self.enable_caching = Some(enable);
        self
    }

    /// Enable or disable the dtype-narrowed working copy.
    pub fn memory_optimization(mut self, enable: bool) -> Self {
        self.memory_optimization = Some(enable);
        self
    }

    /// Set the row cap above which the table is sampled.
    pub fn sample_cap(mut self, cap: usize) -> Self {
        self.sample_cap = Some(cap);
        self
    }

    /// Set the minimum lift for association rules.
    pub fn lift_threshold(mut self, threshold: f64) -> Self {
        self.lift_threshold = Some(threshold);
        self
    }

    /// Set the contingency-table size limit for categorical pairs.
    pub fn max_contingency_cells(mut self, cells: usize) -> Self {
        self.max_contingency_cells = Some(cells);
        self
    }

    /// Restrict analysis to columns whose name contains one of the tokens.
    pub fn focus_columns<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.focus_columns = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Persist cache entries under this directory.
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Override the reliability thresholds.
    pub fn reliability(mut self, thresholds: ReliabilityThresholds) -> Self {
        self.reliability = Some(thresholds);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalysisConfig, ConfigValidationError> {
        let defaults = AnalysisConfig::default();
        let config = AnalysisConfig {
            max_cardinality: self.max_cardinality.unwrap_or(defaults.max_cardinality),
            top_k: self.top_k.unwrap_or(defaults.top_k),
            correlation_threshold: self
                .correlation_threshold
                .unwrap_or(defaults.correlation_threshold),
            parallel_processing: self
                .parallel_processing
                .unwrap_or(defaults.parallel_processing),
            max_workers: self.max_workers.unwrap_or(defaults.max_workers),
            enable_caching: self.enable_caching.unwrap_or(defaults.enable_caching),
            memory_optimization: self
                .memory_optimization
                .unwrap_or(defaults.memory_optimization),
            sample_cap: self.sample_cap.unwrap_or(defaults.sample_cap),
            lift_threshold: self.lift_threshold.unwrap_or(defaults.lift_threshold),
            max_contingency_cells: self
                .max_contingency_cells
                .unwrap_or(defaults.max_contingency_cells),
            focus_columns: self.focus_columns,
            cache_dir: self.cache_dir,
            reliability: self.reliability.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_cardinality, 50);
        assert_eq!(config.top_k, 20);
        assert_eq!(config.correlation_threshold, 0.3);
        assert_eq!(config.reliability.min_paired_observations, 10);
        assert!(config.parallel_processing);
        assert!(config.enable_caching);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AnalysisConfig::builder()
            .max_cardinality(12)
            .top_k(3)
            .correlation_threshold(0.5)
            .parallel_processing(false)
            .focus_columns(["age", "income"])
            .build()
            .unwrap();

        assert_eq!(config.max_cardinality, 12);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.correlation_threshold, 0.5);
        assert!(!config.parallel_processing);
        assert_eq!(config.focus_columns, vec!["age", "income"]);
    }

    #[test]
    fn test_validation_zero_top_k() {
        let result = AnalysisConfig::builder().top_k(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::MustBePositive("top_k")
        ));
    }

    #[test]
    fn test_validation_zero_cardinality() {
        let result = AnalysisConfig::builder().max_cardinality(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::MustBePositive("max_cardinality")
        ));
    }

    #[test]
    fn test_validation_threshold_out_of_range() {
        let result = AnalysisConfig::builder().correlation_threshold(1.2).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));

        let result = AnalysisConfig::builder()
            .correlation_threshold(-0.1)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_result_affecting_ignores_execution_settings() {
        let sequential = AnalysisConfig::builder()
            .parallel_processing(false)
            .max_workers(1)
            .enable_caching(false)
            .build()
            .unwrap();
        let parallel = AnalysisConfig::builder()
            .parallel_processing(true)
            .max_workers(8)
            .cache_dir("/tmp/somewhere")
            .build()
            .unwrap();

        assert_eq!(sequential.result_affecting(), parallel.result_affecting());

        let stricter = AnalysisConfig::builder()
            .correlation_threshold(0.9)
            .build()
            .unwrap();
        assert_ne!(stricter.result_affecting(), parallel.result_affecting());
    }

    #[test]
    fn test_partial_config_from_json() {
        let json = r#"{
            "top_k": 5,
            "parallel_processing": false,
            "reliability": { "min_group_size": 3 }
        }"#;

        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.top_k, 5);
        assert!(!config.parallel_processing);
        assert_eq!(config.max_cardinality, 50);
        assert_eq!(config.reliability.min_group_size, 3);
        assert_eq!(config.reliability.min_paired_observations, 10);
        assert!(config.validate().is_ok());
    }
}
