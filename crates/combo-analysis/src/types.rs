use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

// ============================================================================
// Column classification
// ============================================================================

/// Semantic type assigned to a column by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Boolean,
    Text,
    Datetime,
    /// Could not be classified; see `ColumnProfile::skip_reason`.
    Excluded,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Boolean => "boolean",
            Self::Text => "text",
            Self::Datetime => "datetime",
            Self::Excluded => "excluded",
        }
    }

    /// Categorical and boolean columns share the categorical analysis paths.
    pub fn is_categorical_like(&self) -> bool {
        matches!(self, Self::Categorical | Self::Boolean)
    }
}

/// Per-column metadata computed once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub semantic_type: SemanticType,
    /// Distinct non-null values.
    pub cardinality: usize,
    pub null_count: usize,
    pub null_ratio: f64,
    /// Average string length, for string-like columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl ColumnProfile {
    /// Whether the column takes part in the pairwise search.
    pub fn is_pairable(&self) -> bool {
        matches!(
            self.semantic_type,
            SemanticType::Numeric | SemanticType::Categorical | SemanticType::Boolean
        )
    }
}

/// A column left out of the analysis, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedColumn {
    pub name: String,
    pub semantic_type: SemanticType,
    pub reason: String,
}

// ============================================================================
// Task inputs
// ============================================================================

/// Dictionary-encoded categorical column.
///
/// `levels` is sorted, so codes are stable for a given set of values.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalData {
    pub levels: Vec<String>,
    pub codes: Vec<Option<u32>>,
}

impl CategoricalData {
    /// Dictionary-encode raw values.
    pub fn encode<S: AsRef<str>>(values: &[Option<S>]) -> Self {
        let levels: Vec<String> = values
            .iter()
            .flatten()
            .map(|v| v.as_ref())
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let index: HashMap<&str, u32> = levels
            .iter()
            .enumerate()
            .map(|(i, level)| (level.as_str(), i as u32))
            .collect();
        let codes = values
            .iter()
            .map(|v| v.as_ref().and_then(|s| index.get(s.as_ref()).copied()))
            .collect();
        Self { levels, codes }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn cardinality(&self) -> usize {
        self.levels.len()
    }
}

/// Read-only view of one column's values, owned by the tasks that use it.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Numeric(Arc<[Option<f64>]>),
    Categorical(Arc<CategoricalData>),
}

impl ColumnData {
    pub fn numeric(values: Vec<Option<f64>>) -> Self {
        Self::Numeric(Arc::from(values))
    }

    pub fn categorical<S: AsRef<str>>(values: &[Option<S>]) -> Self {
        Self::Categorical(Arc::new(CategoricalData::encode(values)))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Categorical(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Analyzer routing, resolved once when the task is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    NumericNumeric,
    CategoricalCategorical,
    /// First column categorical (grouping), second numeric.
    CategoricalNumeric,
}

impl PairKind {
    pub fn analysis_kind(&self) -> AnalysisKind {
        match self {
            Self::NumericNumeric => AnalysisKind::Correlation,
            Self::CategoricalCategorical => AnalysisKind::Association,
            Self::CategoricalNumeric => AnalysisKind::Anova,
        }
    }
}

/// One unit of pairwise work. Consumed exactly once by an analyzer.
#[derive(Debug, Clone)]
pub struct PairTask {
    pub column_a: String,
    pub column_b: String,
    pub kind: PairKind,
    pub data_a: ColumnData,
    pub data_b: ColumnData,
}

// ============================================================================
// Results
// ============================================================================

/// Kind of analysis that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Correlation,
    Association,
    Anova,
    Text,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correlation => "correlation",
            Self::Association => "association",
            Self::Anova => "anova",
            Self::Text => "text",
        }
    }
}

/// A single named metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Why a pair produced no rankable result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "marker", content = "reason", rename_all = "snake_case")]
pub enum ResultMarker {
    /// The statistic is mathematically undefined (e.g., zero variance).
    Undefined(String),
    /// Too few valid observations.
    InsufficientData(String),
    /// Fewer than two usable groups for ANOVA.
    InsufficientGroups(String),
    /// Dropped by the correlation hard filter.
    BelowThreshold(String),
    /// Excluded at enumeration by cardinality or contingency-size limits.
    ExceedsLimit(String),
    /// The analyzer failed.
    Failed(TaskError),
}

impl ResultMarker {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Undefined(_) => "undefined",
            Self::InsufficientData(_) => "insufficient_data",
            Self::InsufficientGroups(_) => "insufficient_groups",
            Self::BelowThreshold(_) => "below_threshold",
            Self::ExceedsLimit(_) => "exceeds_limit",
            Self::Failed(_) => "failed",
        }
    }
}

/// One association rule mined from a contingency table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedent: String,
    pub consequent: String,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

/// Summary of the numeric column within one categorical level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub level: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
}

/// Frequency of a token in a text column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCount {
    pub token: String,
    pub count: usize,
}

/// Kind-specific structured attachments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "items", rename_all = "snake_case")]
pub enum ResultDetails {
    Rules(Vec<AssociationRule>),
    Groups(Vec<GroupStats>),
    Tokens(Vec<TokenCount>),
}

/// Output of one analyzer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairResult {
    pub column_a: String,
    /// `None` for per-column text profiles.
    pub column_b: Option<String>,
    pub kind: AnalysisKind,
    /// Name of the metric in `metrics` that drives the score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_metric: Option<String>,
    pub metrics: BTreeMap<String, MetricValue>,
    /// Importance on a [0, 1] scale.
    pub score: f64,
    pub low_reliability: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reliability_notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub significant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<ResultMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ResultDetails>,
}

impl PairResult {
    pub fn new(column_a: &str, column_b: Option<&str>, kind: AnalysisKind) -> Self {
        Self {
            column_a: column_a.to_string(),
            column_b: column_b.map(str::to_string),
            kind,
            primary_metric: None,
            metrics: BTreeMap::new(),
            score: 0.0,
            low_reliability: false,
            reliability_notes: Vec::new(),
            significant: None,
            marker: None,
            details: None,
        }
    }

    /// Start a result for a pair task.
    pub fn for_task(task: &PairTask) -> Self {
        Self::new(
            &task.column_a,
            Some(&task.column_b),
            task.kind.analysis_kind(),
        )
    }

    /// Error-marked result for a failed task.
    pub fn failed(task: &PairTask, error: TaskError) -> Self {
        Self::for_task(task).with_marker(ResultMarker::Failed(error))
    }

    pub fn with_marker(mut self, marker: ResultMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn set_metric(&mut self, name: &str, value: impl Into<MetricValue>) {
        self.metrics.insert(name.to_string(), value.into());
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(MetricValue::as_f64)
    }

    /// Value of the primary metric, if numeric.
    pub fn primary_value(&self) -> Option<f64> {
        self.primary_metric
            .as_deref()
            .and_then(|name| self.metric(name))
    }

    pub fn flag_low_reliability(&mut self, note: impl Into<String>) {
        self.low_reliability = true;
        self.reliability_notes.push(note.into());
    }

    /// Rankable: no marker of any kind.
    pub fn is_rankable(&self) -> bool {
        self.marker.is_none()
    }

    /// Display label for the pair, e.g. `age × income`.
    pub fn pair_label(&self) -> String {
        match &self.column_b {
            Some(b) => format!("{} × {}", self.column_a, b),
            None => self.column_a.clone(),
        }
    }
}

/// A pair that produced no ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub column_a: String,
    pub column_b: String,
    pub kind: AnalysisKind,
    pub marker: ResultMarker,
}

// ============================================================================
// Report
// ============================================================================

/// Aggregate statistics for one analysis kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindSummary {
    pub kind: AnalysisKind,
    /// Candidate pairs of this kind, including enumeration skips.
    pub total_pairs: usize,
    /// Pairs that produced a rankable result.
    pub valid_results: usize,
    pub significant_results: usize,
    pub max_score: f64,
    pub mean_score: f64,
}

/// Wall-clock time of one engine stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: String,
    pub duration_ms: f64,
}

/// Accumulated analyzer time for one analysis kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindTiming {
    pub kind: AnalysisKind,
    pub tasks: usize,
    pub total_ms: f64,
}

/// Telemetry attached to a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub elapsed_ms: f64,
    pub stages: Vec<StageTiming>,
    pub per_kind: Vec<KindTiming>,
    /// `None` when the platform does not expose peak memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_memory_bytes: Option<u64>,
}

/// Result of the memory optimization step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsageInfo {
    pub bytes_before: usize,
    pub bytes_after: usize,
    /// Columns that changed representation, e.g. `count: Int64 -> UInt8`.
    pub optimized_columns: Vec<String>,
    /// Columns left alone because narrowing would lose information.
    pub kept_columns: Vec<String>,
}

impl MemoryUsageInfo {
    pub fn savings_ratio(&self) -> f64 {
        if self.bytes_before == 0 {
            0.0
        } else {
            1.0 - self.bytes_after as f64 / self.bytes_before as f64
        }
    }
}

/// Run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub total_rows: usize,
    pub analyzed_rows: usize,
    pub total_columns: usize,
    pub analyzed_columns: usize,
    pub pairs_considered: usize,
    pub pairs_analyzed: usize,
    pub skipped_pair_count: usize,
    pub errored_pair_count: usize,
    pub cache_hit: bool,
    pub parallel: bool,
    pub workers: usize,
    pub performance: PerformanceSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryUsageInfo>,
}

/// Final artifact of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Top-K results, sorted by descending score.
    pub results: Vec<PairResult>,
    /// Per-column text enrichment, not ranked.
    pub text_profiles: Vec<PairResult>,
    pub column_profiles: Vec<ColumnProfile>,
    pub skipped_columns: Vec<SkippedColumn>,
    pub skipped_pairs: Vec<SkippedPair>,
    pub errored_pairs: Vec<SkippedPair>,
    pub kind_summaries: Vec<KindSummary>,
    pub metadata: RunMetadata,
}

impl AnalysisReport {
    /// Results of a given kind, in rank order.
    pub fn results_of(&self, kind: AnalysisKind) -> impl Iterator<Item = &PairResult> {
        self.results.iter().filter(move |r| r.kind == kind)
    }

    /// Find the ranked result for an unordered column pair.
    pub fn find(&self, a: &str, b: &str) -> Option<&PairResult> {
        self.results.iter().find(|r| {
            let other = r.column_b.as_deref();
            (r.column_a == a && other == Some(b)) || (r.column_a == b && other == Some(a))
        })
    }

    /// Find a skipped or errored pair, regardless of column order.
    pub fn find_skipped(&self, a: &str, b: &str) -> Option<&SkippedPair> {
        self.skipped_pairs
            .iter()
            .chain(self.errored_pairs.iter())
            .find(|s| {
                (s.column_a == a && s.column_b == b) || (s.column_a == b && s.column_b == a)
            })
    }
}
