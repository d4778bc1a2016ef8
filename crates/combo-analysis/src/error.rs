//! Error types for the combinations analysis engine.
//!
//! Two families exist. [`AnalysisError`] is fatal: it aborts the whole call
//! because no partial analysis is meaningful (empty table, invalid
//! configuration). [`TaskError`] is scoped to a single pair task: it is
//! recorded on the failed `PairResult`, counted in the report metadata and
//! never propagated to the caller.
//!
//! Errors are serializable so a GUI or CLI collaborator can display them.

use crate::config::ConfigValidationError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal error for a whole analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The input table has zero columns.
    #[error("Input table has no columns")]
    EmptyTable,

    /// The configuration violates one of its invariants.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// Preparing the working copy of the table failed.
    #[error("Failed to prepare table: {0}")]
    PreparationFailed(String),

    /// Internal error (e.g., worker pool construction).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AnalysisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyTable => "EMPTY_TABLE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::PreparationFailed(_) => "PREPARATION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if the error was caused by the caller's input rather than the engine.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::EmptyTable | Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_input_error(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for AnalysisError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AnalysisError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AnalysisError::Polars(e).with_context(context))
    }
}

/// Failure of a single pair task.
///
/// Stored on the error-marked result, so it must stay cloneable and
/// round-trip through the cache.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TaskError {
    /// An intermediate statistic overflowed or became NaN.
    #[error("non-finite intermediate value while computing {0}")]
    NonFinite(String),

    /// The two column slices handed to the task do not line up.
    #[error("column length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// The task was routed to an analyzer that cannot handle its column data.
    #[error("unexpected column data for {0}")]
    UnexpectedData(String),

    /// The worker panicked while running the task.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NonFinite(_) => "NON_FINITE",
            Self::LengthMismatch { .. } => "LENGTH_MISMATCH",
            Self::UnexpectedData(_) => "UNEXPECTED_DATA",
            Self::Panicked(_) => "PANICKED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(AnalysisError::EmptyTable.error_code(), "EMPTY_TABLE");
        assert_eq!(
            AnalysisError::Internal("boom".to_string()).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_is_input_error() {
        assert!(AnalysisError::EmptyTable.is_input_error());
        assert!(!AnalysisError::Internal("x".to_string()).is_input_error());
        assert!(
            AnalysisError::EmptyTable
                .with_context("During validation")
                .is_input_error()
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = AnalysisError::EmptyTable;
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("EMPTY_TABLE"));
        assert!(json.contains("no columns"));
    }

    #[test]
    fn test_with_context() {
        let error = AnalysisError::PreparationFailed("sampling".to_string())
            .with_context("During table preparation");
        assert!(error.to_string().contains("During table preparation"));
        assert_eq!(error.error_code(), "PREPARATION_FAILED");
    }

    #[test]
    fn test_task_error_roundtrips_through_json() {
        let error = TaskError::LengthMismatch { left: 3, right: 4 };
        let json = serde_json::to_string(&error).unwrap();
        let back: TaskError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, error);
        assert_eq!(back.error_code(), "LENGTH_MISMATCH");
    }
}
