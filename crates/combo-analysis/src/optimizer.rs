//! Memory optimization of the working table.
//!
//! Produces a narrowed copy of the table: integers are cast to the smallest
//! width that holds their range, floats drop to `Float32` only when every
//! value survives the round trip, and repetitive strings become categorical.
//! A cast that would change any value is skipped for that column.

use crate::types::MemoryUsageInfo;
use crate::utils::{categorical_dtype, is_integer_dtype};
use polars::prelude::*;
use tracing::debug;

/// Strings with a lower unique ratio are dictionary-encoded.
const CATEGORICAL_UNIQUE_RATIO: f64 = 0.5;

/// Outcome of trying to narrow one column.
enum Narrowing {
    Narrowed(Series),
    Unchanged,
    /// A narrower dtype exists but would alter values.
    Unsafe,
}

/// Dtype narrowing for analysis copies.
pub struct MemoryOptimizer;

impl MemoryOptimizer {
    /// Return a narrowed copy of `df` and a summary of what changed.
    ///
    /// The input frame is never modified.
    pub fn optimize(df: &DataFrame) -> PolarsResult<(DataFrame, MemoryUsageInfo)> {
        let bytes_before = df.estimated_size();
        let mut optimized = df.clone();
        let mut optimized_columns = Vec::new();
        let mut kept_columns = Vec::new();

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let name = series.name().to_string();

            match Self::narrow(series)? {
                Narrowing::Narrowed(narrowed) => {
                    let change = format!("{}: {:?} -> {:?}", name, series.dtype(), narrowed.dtype());
                    debug!(column = %name, %change, "Narrowed column");
                    optimized.replace(&name, narrowed)?;
                    optimized_columns.push(change);
                }
                Narrowing::Unsafe => kept_columns.push(name),
                Narrowing::Unchanged => {}
            }
        }

        let info = MemoryUsageInfo {
            bytes_before,
            bytes_after: optimized.estimated_size(),
            optimized_columns,
            kept_columns,
        };
        Ok((optimized, info))
    }

    fn narrow(series: &Series) -> PolarsResult<Narrowing> {
        let dtype = series.dtype();
        if is_integer_dtype(dtype) {
            Self::narrow_integer(series)
        } else if dtype == &DataType::Float64 {
            Self::narrow_float(series)
        } else if dtype == &DataType::String {
            Self::encode_strings(series)
        } else {
            Ok(Narrowing::Unchanged)
        }
    }

    fn narrow_integer(series: &Series) -> PolarsResult<Narrowing> {
        let (Some(min), Some(max)) = (series.min::<f64>()?, series.max::<f64>()?) else {
            return Ok(Narrowing::Unchanged);
        };
        let Some(target) = smallest_integer_dtype(min, max) else {
            return Ok(Narrowing::Unchanged);
        };
        if dtype_width(&target) >= dtype_width(series.dtype()) {
            return Ok(Narrowing::Unchanged);
        }

        match series.strict_cast(&target) {
            Ok(narrowed) if narrowed.null_count() == series.null_count() => {
                Ok(Narrowing::Narrowed(narrowed))
            }
            _ => Ok(Narrowing::Unsafe),
        }
    }

    fn narrow_float(series: &Series) -> PolarsResult<Narrowing> {
        let exact = series
            .f64()?
            .into_iter()
            .flatten()
            .all(|v| v.is_nan() || (v as f32) as f64 == v);
        if !exact {
            return Ok(Narrowing::Unsafe);
        }
        Ok(Narrowing::Narrowed(series.cast(&DataType::Float32)?))
    }

    fn encode_strings(series: &Series) -> PolarsResult<Narrowing> {
        let non_null = series.len() - series.null_count();
        if non_null == 0 {
            return Ok(Narrowing::Unchanged);
        }
        let unique_ratio = series.drop_nulls().n_unique()? as f64 / non_null as f64;
        if unique_ratio >= CATEGORICAL_UNIQUE_RATIO {
            return Ok(Narrowing::Unchanged);
        }
        Ok(Narrowing::Narrowed(series.cast(&categorical_dtype())?))
    }
}

/// Smallest integer dtype holding `[min, max]`, unsigned when possible.
fn smallest_integer_dtype(min: f64, max: f64) -> Option<DataType> {
    if min >= 0.0 {
        if max <= u8::MAX as f64 {
            Some(DataType::UInt8)
        } else if max <= u16::MAX as f64 {
            Some(DataType::UInt16)
        } else if max <= u32::MAX as f64 {
            Some(DataType::UInt32)
        } else {
            None
        }
    } else if min >= i8::MIN as f64 && max <= i8::MAX as f64 {
        Some(DataType::Int8)
    } else if min >= i16::MIN as f64 && max <= i16::MAX as f64 {
        Some(DataType::Int16)
    } else if min >= i32::MIN as f64 && max <= i32::MAX as f64 {
        Some(DataType::Int32)
    } else {
        None
    }
}

fn dtype_width(dtype: &DataType) -> usize {
    match dtype {
        DataType::Int8 | DataType::UInt8 => 1,
        DataType::Int16 | DataType::UInt16 => 2,
        DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
        _ => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_narrowed() {
        let df = df![
            "small" => [1i64, 2, 200],
            "signed" => [-5i64, 0, 100],
            "wide" => [0i64, 70_000, 5],
        ]
        .unwrap();

        let (optimized, info) = MemoryOptimizer::optimize(&df).unwrap();
        assert_eq!(optimized.column("small").unwrap().dtype(), &DataType::UInt8);
        assert_eq!(optimized.column("signed").unwrap().dtype(), &DataType::Int8);
        assert_eq!(optimized.column("wide").unwrap().dtype(), &DataType::UInt32);
        assert_eq!(info.optimized_columns.len(), 3);
        assert!(info.bytes_after < info.bytes_before);
    }

    #[test]
    fn test_input_frame_untouched() {
        let df = df!["small" => [1i64, 2, 3]].unwrap();
        let _ = MemoryOptimizer::optimize(&df).unwrap();
        assert_eq!(df.column("small").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_integer_nulls_preserved() {
        let df = df!["n" => [Some(1i64), None, Some(3)]].unwrap();
        let (optimized, _) = MemoryOptimizer::optimize(&df).unwrap();
        let column = optimized.column("n").unwrap();
        assert_eq!(column.dtype(), &DataType::UInt8);
        assert_eq!(column.null_count(), 1);
    }

    #[test]
    fn test_exact_floats_narrowed() {
        let df = df!["half" => [0.5f64, 1.25, -3.0]].unwrap();
        let (optimized, info) = MemoryOptimizer::optimize(&df).unwrap();
        assert_eq!(optimized.column("half").unwrap().dtype(), &DataType::Float32);
        assert!(info.kept_columns.is_empty());
    }

    #[test]
    fn test_lossy_floats_kept() {
        let df = df!["precise" => [0.1f64, 1.0 / 3.0, 2.0]].unwrap();
        let (optimized, info) = MemoryOptimizer::optimize(&df).unwrap();
        assert_eq!(
            optimized.column("precise").unwrap().dtype(),
            &DataType::Float64
        );
        assert_eq!(info.kept_columns, vec!["precise".to_string()]);
    }

    #[test]
    fn test_repetitive_strings_become_categorical() {
        let df = df![
            "region" => ["n", "s", "n", "s", "n", "s"],
            "name" => ["a", "b", "c", "d", "e", "f"],
        ]
        .unwrap();

        let (optimized, _) = MemoryOptimizer::optimize(&df).unwrap();
        assert!(matches!(
            optimized.column("region").unwrap().dtype(),
            DataType::Categorical(_, _)
        ));
        assert_eq!(optimized.column("name").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_smallest_integer_dtype() {
        assert_eq!(smallest_integer_dtype(0.0, 255.0), Some(DataType::UInt8));
        assert_eq!(smallest_integer_dtype(0.0, 256.0), Some(DataType::UInt16));
        assert_eq!(smallest_integer_dtype(-129.0, 0.0), Some(DataType::Int16));
        assert_eq!(smallest_integer_dtype(-1.0, 5e10), None);
    }
}
