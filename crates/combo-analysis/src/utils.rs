//! Shared utilities for the combinations engine.
//!
//! Dtype predicates and Series extraction helpers used by the profiler,
//! the optimizer and the task enumerator.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || is_float_dtype(dtype)
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Check if a DataType is a floating point type.
#[inline]
pub fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time | DataType::Duration(_)
    )
}

/// Check if a DataType holds strings or dictionary-encoded strings.
#[inline]
pub fn is_string_like_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

/// The categorical dtype used when encoding low-cardinality strings.
pub fn categorical_dtype() -> DataType {
    DataType::from_categories(Categories::global())
}

// =============================================================================
// Series Extraction Utilities
// =============================================================================

/// Number of distinct non-null values.
pub fn distinct_non_null(series: &Series) -> PolarsResult<usize> {
    series.drop_nulls().n_unique()
}

/// Extract a Series as `f64` values, nulls preserved.
pub fn series_to_f64(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Extract a Series as owned strings, nulls preserved.
///
/// Booleans become `"true"`/`"false"`.
pub fn series_to_strings(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Average character length of non-null values in a string-like Series.
pub fn average_string_length(series: &Series) -> PolarsResult<Option<f64>> {
    let cast = series.cast(&DataType::String)?;
    let (total, count) = cast
        .str()?
        .into_iter()
        .flatten()
        .fold((0usize, 0usize), |(total, count), s| {
            (total + s.chars().count(), count + 1)
        });
    Ok((count > 0).then(|| total as f64 / count as f64))
}

/// Collect sample values from a Series (non-null values only).
pub fn collect_sample_values(series: &Series, max_samples: usize) -> Vec<String> {
    let non_null = series.drop_nulls();
    let Ok(strings) = non_null.cast(&DataType::String) else {
        return Vec::new();
    };
    let Ok(chunked) = strings.str() else {
        return Vec::new();
    };
    chunked
        .into_iter()
        .flatten()
        .take(max_samples)
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
