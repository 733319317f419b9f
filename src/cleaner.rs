//! Deduplication, coercion, imputation and derived columns.
//!
//! A [`CleaningPlan`] lists the rules for one report variant. Every rule is
//! keyed by column name and silently skipped when the column is absent.

use crate::error::Result;
use crate::frame::{has_column, series};
use crate::util::{parse_datetime_safe, parse_f64_safe, parse_flag_safe};
use polars::prelude::*;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Unparsable or non-finite values become null.
    Numeric,
    /// Boolean-ish markers (`true`, `1`, `yes`, ...); anything else becomes null.
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    Median,
    /// Median, then every value truncated to an integer.
    MedianInteger,
    Literal(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRule {
    pub column: &'static str,
    pub coercion: Option<Coercion>,
    pub fill: Option<Fill>,
}

impl ColumnRule {
    pub fn numeric(column: &'static str, fill: Option<Fill>) -> Self {
        Self {
            column,
            coercion: Some(Coercion::Numeric),
            fill,
        }
    }

    pub fn placeholder(column: &'static str, literal: &'static str) -> Self {
        Self {
            column,
            coercion: None,
            fill: Some(Fill::Literal(literal)),
        }
    }
}

/// Parse `source` into `target` (which may be the same column).
#[derive(Debug, Clone, PartialEq)]
pub struct DateRule {
    pub source: &'static str,
    pub target: &'static str,
    /// Add `target` as an all-null column when `source` is absent.
    pub always_present: bool,
}

/// `target = left * right`, only when both inputs exist.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedProduct {
    pub target: &'static str,
    pub left: &'static str,
    pub right: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleaningPlan {
    pub dates: Vec<DateRule>,
    pub columns: Vec<ColumnRule>,
    pub derived: Vec<DerivedProduct>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanReport {
    pub raw_rows: usize,
    pub clean_rows: usize,
    pub duplicates_removed: usize,
    /// (column, cells filled) for every fill rule that ran.
    pub filled: Vec<(String, usize)>,
}

pub fn datetime_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

/// Apply `plan` to `df`.
///
/// Order: deduplicate, parse dates, coerce and fill columns, derive products.
pub fn clean(df: DataFrame, plan: &CleaningPlan) -> Result<(DataFrame, CleanReport)> {
    let raw_rows = df.height();
    let mut df = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
    let clean_rows = df.height();
    let duplicates_removed = raw_rows - clean_rows;
    info!(raw_rows, clean_rows, duplicates_removed, "removed exact duplicates");

    for rule in &plan.dates {
        apply_date_rule(&mut df, rule)?;
    }

    let mut filled = Vec::new();
    for rule in &plan.columns {
        if !has_column(&df, rule.column) {
            debug!(column = rule.column, "column absent; rule skipped");
            continue;
        }
        if let Some(coercion) = rule.coercion {
            coerce_column(&mut df, rule.column, coercion)?;
        }
        if let Some(fill) = rule.fill {
            let count = fill_column(&mut df, rule.column, fill)?;
            filled.push((rule.column.to_string(), count));
        }
    }

    for product in &plan.derived {
        df = derive_product(df, product)?;
    }

    let report = CleanReport {
        raw_rows,
        clean_rows,
        duplicates_removed,
        filled,
    };
    Ok((df, report))
}

fn apply_date_rule(df: &mut DataFrame, rule: &DateRule) -> Result<()> {
    let parsed = match series(df, rule.source) {
        Some(source) => to_datetime(source)?,
        None if rule.always_present => {
            Series::full_null(rule.target.into(), df.height(), &datetime_dtype())
        }
        None => {
            debug!(column = rule.source, "date column absent");
            return Ok(());
        }
    };
    debug!(
        from = rule.source,
        into = rule.target,
        invalid = parsed.null_count(),
        "parsed dates"
    );
    df.with_column(parsed.with_name(rule.target.into()))?;
    Ok(())
}

fn to_datetime(source: &Series) -> Result<Series> {
    if matches!(source.dtype(), DataType::Datetime(..)) {
        return Ok(source.cast(&datetime_dtype())?);
    }
    // Bare integers like 20240105 still read as dates.
    let text = source.cast(&DataType::String)?;
    let millis: Vec<Option<i64>> = text
        .str()?
        .into_iter()
        .map(|v| parse_datetime_safe(v).map(|dt| dt.and_utc().timestamp_millis()))
        .collect();
    Ok(Series::new(source.name().clone(), millis).cast(&datetime_dtype())?)
}

fn coerce_column(df: &mut DataFrame, column: &str, coercion: Coercion) -> Result<()> {
    let Some(source) = series(df, column) else {
        return Ok(());
    };
    let coerced = match coercion {
        Coercion::Numeric => to_numeric(source)?,
        Coercion::Flag => to_flag(source)?,
    };
    df.replace(column, coerced.with_name(column.into()))?;
    Ok(())
}

fn to_numeric(source: &Series) -> Result<Series> {
    let dtype = source.dtype();
    let out = if dtype.is_integer() {
        source.clone()
    } else if dtype.is_float() {
        // inf parses as a float; treat it like any other unusable value
        let finite: Float64Chunked = source
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|n| n.is_finite()))
            .collect();
        finite.into_series()
    } else if dtype.is_bool() {
        source.cast(&DataType::Int64)?
    } else if dtype.is_string() {
        let parsed: Float64Chunked = source.str()?.into_iter().map(parse_f64_safe).collect();
        parsed.into_series()
    } else {
        Series::full_null(source.name().clone(), source.len(), &DataType::Float64)
    };
    Ok(out)
}

fn to_flag(source: &Series) -> Result<Series> {
    let dtype = source.dtype();
    let flags: BooleanChunked = if dtype.is_bool() {
        return Ok(source.clone());
    } else if dtype.is_primitive_numeric() {
        source
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| match v {
                Some(n) if n == 0.0 => Some(false),
                Some(n) if n == 1.0 => Some(true),
                _ => None,
            })
            .collect()
    } else if dtype.is_string() {
        source.str()?.into_iter().map(parse_flag_safe).collect()
    } else {
        return Ok(Series::full_null(
            source.name().clone(),
            source.len(),
            &DataType::Boolean,
        ));
    };
    Ok(flags.into_series())
}

fn fill_column(df: &mut DataFrame, column: &str, fill: Fill) -> Result<usize> {
    let Some(source) = series(df, column) else {
        return Ok(0);
    };
    let missing = source.null_count();

    let filled = match fill {
        Fill::Literal(text) => {
            let values: StringChunked = source
                .cast(&DataType::String)?
                .str()?
                .into_iter()
                .map(|v| Some(v.unwrap_or(text)))
                .collect();
            values.into_series()
        }
        Fill::Median | Fill::MedianInteger => {
            let center = source.median().unwrap_or_else(|| {
                warn!(column, "no numeric values; median undefined, filling with 0");
                0.0
            });
            let values = fill_with_value(source, center)?;
            if fill == Fill::MedianInteger {
                values.cast(&DataType::Int64)?
            } else {
                values
            }
        }
    };
    df.replace(column, filled.with_name(column.into()))?;

    if missing > 0 {
        info!(column, filled = missing, ?fill, "filled missing values");
    }
    Ok(missing)
}

fn fill_with_value(source: &Series, value: f64) -> Result<Series> {
    let values: Float64Chunked = source
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(value)))
        .collect();
    Ok(values.into_series())
}

fn derive_product(df: DataFrame, product: &DerivedProduct) -> Result<DataFrame> {
    if !(has_column(&df, product.left) && has_column(&df, product.right)) {
        debug!(column = product.target, "inputs absent; derived column skipped");
        return Ok(df);
    }
    let derived = df
        .lazy()
        .with_column(
            (col(product.left).cast(DataType::Float64) * col(product.right).cast(DataType::Float64))
                .alias(product.target),
        )
        .collect()?;
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{floats, texts};
    use pretty_assertions::assert_eq;

    fn sales_like_plan() -> CleaningPlan {
        CleaningPlan {
            dates: vec![DateRule {
                source: "date",
                target: "order_date",
                always_present: true,
            }],
            columns: vec![
                ColumnRule::numeric("quantity", Some(Fill::MedianInteger)),
                ColumnRule::numeric("price", Some(Fill::Median)),
                ColumnRule::placeholder("product", "Unknown"),
            ],
            derived: vec![DerivedProduct {
                target: "revenue",
                left: "quantity",
                right: "price",
            }],
        }
    }

    fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn fills_medians_and_derives_revenue() {
        let df = df![
            "product" => [Some("A"), None, Some("C")],
            "quantity" => [Some("2"), Some("oops"), Some("5")],
            "price" => [Some("10"), Some("4"), None],
        ]
        .unwrap();
        let (df, report) = clean(df, &sales_like_plan()).unwrap();

        assert_eq!(report.duplicates_removed, 0);
        assert_eq!(
            column_names(&df),
            vec!["product", "quantity", "price", "order_date", "revenue"]
        );
        assert_eq!(
            texts(&df, "product").unwrap().unwrap(),
            vec![Some("A".to_string()), Some("Unknown".to_string()), Some("C".to_string())]
        );
        // quantity median of [2, 5] is 3.5, truncated to 3
        assert_eq!(df.column("quantity").unwrap().dtype(), &DataType::Int64);
        assert_eq!(
            floats(&df, "quantity").unwrap().unwrap(),
            vec![Some(2.0), Some(3.0), Some(5.0)]
        );
        assert_eq!(
            floats(&df, "revenue").unwrap().unwrap(),
            vec![Some(20.0), Some(12.0), Some(35.0)]
        );
        assert_eq!(df.column("order_date").unwrap().null_count(), 3);
        assert_eq!(
            report.filled,
            vec![("quantity".to_string(), 1), ("price".to_string(), 1), ("product".to_string(), 1)]
        );
    }

    #[test]
    fn infinite_values_are_filled_like_missing() {
        let df = df![
            "product" => ["A", "B", "C"],
            "quantity" => [Some(2.0), Some(f64::INFINITY), None],
            "price" => [Some(10.0), Some(5.0), Some(f64::NEG_INFINITY)],
        ]
        .unwrap();
        let (df, report) = clean(df, &sales_like_plan()).unwrap();

        assert_eq!(
            floats(&df, "quantity").unwrap().unwrap(),
            vec![Some(2.0), Some(2.0), Some(2.0)]
        );
        // price median of [10, 5] is 7.5
        assert_eq!(
            floats(&df, "price").unwrap().unwrap(),
            vec![Some(10.0), Some(5.0), Some(7.5)]
        );
        assert_eq!(
            floats(&df, "revenue").unwrap().unwrap(),
            vec![Some(20.0), Some(10.0), Some(15.0)]
        );
        assert_eq!(
            report.filled,
            vec![("quantity".to_string(), 2), ("price".to_string(), 1), ("product".to_string(), 0)]
        );
    }

    #[test]
    fn exact_duplicates_keep_first_occurrence_order() {
        let df = df![
            "product" => ["B", "A", "B", "C"],
            "quantity" => [1i64, 2, 1, 3],
        ]
        .unwrap();
        let (df, report) = clean(df, &CleaningPlan::default()).unwrap();
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.clean_rows, 3);
        assert_eq!(
            texts(&df, "product").unwrap().unwrap(),
            vec![Some("B".to_string()), Some("A".to_string()), Some("C".to_string())]
        );
    }

    #[test]
    fn absent_columns_are_skipped() {
        let df = df!["product" => ["A"]].unwrap();
        let (df, report) = clean(df, &sales_like_plan()).unwrap();
        assert!(!has_column(&df, "revenue"));
        assert!(!has_column(&df, "quantity"));
        assert_eq!(report.filled, vec![("product".to_string(), 0)]);
    }

    #[test]
    fn all_missing_numeric_column_falls_back_to_zero() {
        let df = df!["quantity" => [None, Some("n/a-ish")]].unwrap();
        let (df, _) = clean(df, &sales_like_plan()).unwrap();
        assert_eq!(
            floats(&df, "quantity").unwrap().unwrap(),
            vec![Some(0.0), Some(0.0)]
        );
    }

    #[test]
    fn dates_parse_in_place_and_invalid_become_missing() {
        let plan = CleaningPlan {
            dates: vec![DateRule {
                source: "closed_at",
                target: "closed_at",
                always_present: false,
            }],
            ..CleaningPlan::default()
        };
        let df = df!["closed_at" => ["2024-01-02 10:00:00", "soon"]].unwrap();
        let (df, _) = clean(df, &plan).unwrap();
        assert_eq!(df.width(), 1);
        let closed = df.column("closed_at").unwrap();
        assert_eq!(closed.dtype(), &datetime_dtype());
        assert_eq!(closed.null_count(), 1);
        assert!(!closed.as_materialized_series().is_null().get(0).unwrap());

        let without = df!["x" => ["1"]].unwrap();
        let (without, _) = clean(without, &plan).unwrap();
        assert!(!has_column(&without, "closed_at"));
    }

    #[test]
    fn flag_coercion_accepts_markers() {
        let plan = CleaningPlan {
            columns: vec![ColumnRule {
                column: "sla_breach",
                coercion: Some(Coercion::Flag),
                fill: None,
            }],
            ..CleaningPlan::default()
        };
        let df = df!["sla_breach" => ["yes", "0", "?"]].unwrap();
        let (df, _) = clean(df, &plan).unwrap();
        let flags: Vec<Option<bool>> = df
            .column("sla_breach")
            .unwrap()
            .as_materialized_series()
            .bool()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(flags, vec![Some(true), Some(false), None]);
    }
}
