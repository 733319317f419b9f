//! Column access over a polars [`DataFrame`].
//!
//! Report columns are optional, so every accessor returns `None` for an
//! absent column instead of an error.

use crate::error::Result;
use polars::prelude::*;

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

pub fn series<'a>(df: &'a DataFrame, name: &str) -> Option<&'a Series> {
    df.column(name).ok().map(Column::as_materialized_series)
}

/// Float view of a column. Integers widen, flags read as 1/0, and anything
/// unparsable or non-finite is null.
pub fn floats(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Some(s) = series(df, name) else {
        return Ok(None);
    };
    let cast = s.cast(&DataType::Float64)?;
    let values = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|n| n.is_finite()))
        .collect();
    Ok(Some(values))
}

/// Known finite values of a column, nulls skipped.
pub fn numbers(df: &DataFrame, name: &str) -> Result<Option<Vec<f64>>> {
    Ok(floats(df, name)?.map(|values| values.into_iter().flatten().collect()))
}

/// String view of a column, nulls kept.
pub fn texts(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    let Some(s) = series(df, name) else {
        return Ok(None);
    };
    let cast = s.cast(&DataType::String)?;
    let values = cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn absent_columns_read_as_none() {
        let df = df!["a" => [1i64, 2]].unwrap();
        assert!(has_column(&df, "a"));
        assert!(!has_column(&df, "b"));
        assert_eq!(floats(&df, "b").unwrap(), None);
        assert!(series(&df, "b").is_none());
    }

    #[test]
    fn floats_drop_non_finite_and_widen_flags() {
        let df = df![
            "x" => [Some(1.5), Some(f64::INFINITY), None, Some(f64::NAN)],
            "flag" => [Some(true), Some(false), None, Some(true)],
        ]
        .unwrap();
        assert_eq!(floats(&df, "x").unwrap(), Some(vec![Some(1.5), None, None, None]));
        assert_eq!(numbers(&df, "flag").unwrap(), Some(vec![1.0, 0.0, 1.0]));
    }

    #[test]
    fn texts_stringify_numbers() {
        let df = df!["k" => [Some(10i64), None, Some(2)]].unwrap();
        assert_eq!(
            texts(&df, "k").unwrap(),
            Some(vec![Some("10".to_string()), None, Some("2".to_string())])
        );
    }
}
