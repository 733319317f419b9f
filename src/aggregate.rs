use crate::error::Result;
use crate::frame::{floats, has_column, series, texts};
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

const VALUE: &str = "__value";
const YEAR: &str = "__year";
const MONTH: &str = "__month";

/// How a grouped column is reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation<'a> {
    Sum(&'a str),
    Mean(&'a str),
    /// Rows per key; needs no value column.
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownRow {
    pub key: String,
    pub value: f64,
}

/// Ordered `(key, value)` pairs from one grouping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Breakdown {
    rows: Vec<BreakdownRow>,
}

impl Breakdown {
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        Self {
            rows: pairs
                .into_iter()
                .map(|(key, value)| BreakdownRow {
                    key: key.into(),
                    value,
                })
                .collect(),
        }
    }

    pub fn rows(&self) -> &[BreakdownRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Largest value first. The sort is stable, so ties keep grouping order.
    pub fn sorted_desc(mut self) -> Self {
        self.rows
            .sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
        self
    }

    pub fn top(mut self, n: usize) -> Self {
        self.rows.truncate(n);
        self
    }

    /// Mean of the grouped values, `None` without any group.
    pub fn mean(&self) -> Option<f64> {
        let values: Vec<f64> = self.rows.iter().map(|r| r.value).collect();
        Series::new(VALUE.into(), values).mean()
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        for row in &mut self.rows {
            row.value *= factor;
        }
        self
    }
}

/// Group by `key` and reduce with `agg`. Rows with a null key are dropped,
/// keys come out in ascending order of their own type, and mean groups
/// without any numeric value are left out. Absent columns give an empty
/// breakdown.
pub fn group_by(df: &DataFrame, key: &str, agg: Aggregation<'_>) -> Result<Breakdown> {
    if !has_column(df, key) {
        return Ok(Breakdown::default());
    }
    let value = match agg {
        Aggregation::Sum(c) | Aggregation::Mean(c) if !has_column(df, c) => {
            return Ok(Breakdown::default());
        }
        Aggregation::Sum(c) => col(c).cast(DataType::Float64).sum(),
        Aggregation::Mean(c) => col(c).cast(DataType::Float64).mean(),
        Aggregation::Count => len().cast(DataType::Float64),
    };

    let grouped = df
        .clone()
        .lazy()
        .filter(col(key).is_not_null())
        .group_by([col(key)])
        .agg([value.alias(VALUE)])
        .filter(col(VALUE).is_not_null())
        .sort([key], SortMultipleOptions::default())
        .collect()?;

    let keys = texts(&grouped, key)?.unwrap_or_default();
    let values = floats(&grouped, VALUE)?.unwrap_or_default();
    Ok(Breakdown::from_pairs(
        keys.into_iter()
            .zip(values)
            .filter_map(|(key, value)| Some((key?, value?))),
    ))
}

fn float_series(df: &DataFrame, name: &str) -> Result<Option<Series>> {
    series(df, name)
        .map(|s| s.cast(&DataType::Float64))
        .transpose()
        .map_err(Into::into)
}

/// Sum of a column, `None` when the column is absent.
pub fn sum(df: &DataFrame, name: &str) -> Result<Option<f64>> {
    match float_series(df, name)? {
        Some(s) => Ok(Some(s.f64()?.sum().unwrap_or(0.0))),
        None => Ok(None),
    }
}

/// Mean of a column, `None` when it is absent or has no numeric values.
pub fn mean(df: &DataFrame, name: &str) -> Result<Option<f64>> {
    Ok(float_series(df, name)?.and_then(|s| s.mean()))
}

/// Percentage of true flags among non-null cells.
pub fn flag_rate(df: &DataFrame, name: &str) -> Result<Option<f64>> {
    Ok(mean(df, name)?.map(|m| m * 100.0))
}

/// Distinct non-null values in a column.
pub fn distinct_count(df: &DataFrame, name: &str) -> Result<Option<usize>> {
    match series(df, name) {
        Some(s) => Ok(Some(s.drop_nulls().n_unique()?)),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodTotal {
    pub period: YearMonth,
    pub value: f64,
}

fn is_dated(df: &DataFrame, name: &str) -> bool {
    series(df, name).is_some_and(|s| s.dtype().is_temporal())
}

fn year_of(date_col: &str) -> Expr {
    col(date_col).dt().year()
}

fn month_of(date_col: &str) -> Expr {
    col(date_col).dt().month().cast(DataType::Int32)
}

/// Sum `value_col` per calendar month of `date_col`, oldest month first.
/// Rows without a date are skipped.
pub fn monthly_totals(df: &DataFrame, date_col: &str, value_col: &str) -> Result<Vec<PeriodTotal>> {
    if !(is_dated(df, date_col) && has_column(df, value_col)) {
        return Ok(Vec::new());
    }
    let totals = df
        .clone()
        .lazy()
        .filter(col(date_col).is_not_null())
        .group_by([year_of(date_col).alias(YEAR), month_of(date_col).alias(MONTH)])
        .agg([col(value_col).cast(DataType::Float64).sum().alias(VALUE)])
        .sort([YEAR, MONTH], SortMultipleOptions::default())
        .collect()?;

    let years = totals.column(YEAR)?.as_materialized_series().i32()?;
    let months = totals.column(MONTH)?.as_materialized_series().i32()?;
    let values = floats(&totals, VALUE)?.unwrap_or_default();
    Ok(years
        .into_iter()
        .zip(months.into_iter())
        .zip(values)
        .filter_map(|((year, month), value)| {
            Some(PeriodTotal {
                period: YearMonth {
                    year: year?,
                    month: u32::try_from(month?).ok()?,
                },
                value: value.unwrap_or(0.0),
            })
        })
        .collect())
}

/// Percent change from the second-to-last to the last period. Undefined
/// with fewer than two periods or when the earlier value is zero.
pub fn period_change(series: &[PeriodTotal]) -> Option<f64> {
    let [.., previous, last] = series else {
        return None;
    };
    if previous.value == 0.0 {
        return None;
    }
    Some((last.value - previous.value) / previous.value * 100.0)
}

/// Share of `key_col` values seen in `previous` but not in `last`, as a
/// percentage. Undefined when nothing was seen in `previous`.
pub fn churn_rate(
    df: &DataFrame,
    date_col: &str,
    key_col: &str,
    previous: YearMonth,
    last: YearMonth,
) -> Result<Option<f64>> {
    if !(is_dated(df, date_col) && has_column(df, key_col)) {
        return Ok(None);
    }
    let keys_in = |period: YearMonth| -> Result<BTreeSet<String>> {
        let subset = df
            .clone()
            .lazy()
            .filter(
                year_of(date_col)
                    .eq(lit(period.year))
                    .and(month_of(date_col).eq(lit(period.month as i32))),
            )
            .select([col(key_col)])
            .collect()?;
        Ok(texts(&subset, key_col)?
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect())
    };
    let before = keys_in(previous)?;
    if before.is_empty() {
        return Ok(None);
    }
    let after = keys_in(last)?;
    let churned = before.difference(&after).count();
    Ok(Some(churned as f64 / before.len() as f64 * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::datetime_dtype;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> Option<i64> {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp_millis())
    }

    fn orders() -> DataFrame {
        let mut df = df![
            "customer" => ["ann", "bob", "cat", "ann", "dan"],
            "order_date" => [day(2024, 1, 3), day(2024, 1, 9), day(2024, 2, 1), day(2024, 2, 7), None],
            "revenue" => [10.0, 30.0, 30.0, 20.0, 5.0],
        ]
        .unwrap();
        let dates = df.column("order_date").unwrap().cast(&datetime_dtype()).unwrap();
        df.with_column(dates).unwrap();
        df
    }

    fn keys(breakdown: &Breakdown) -> Vec<&str> {
        breakdown.rows().iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn top_n_is_stable_and_bounded() {
        let breakdown = group_by(&orders(), "customer", Aggregation::Sum("revenue"))
            .unwrap()
            .sorted_desc();
        // ann, bob and cat tie at 30; grouping order (alphabetical) breaks the tie
        assert_eq!(keys(&breakdown), vec!["ann", "bob", "cat", "dan"]);
        let top = breakdown.top(2);
        assert_eq!(top.len(), 2);
        assert!(top.rows().windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn numeric_keys_sort_by_value() {
        let df = df![
            "priority" => [Some(10i64), Some(2), Some(1), Some(2), None],
            "ttc_hours" => [1.0, 2.0, 3.0, 4.0, 5.0],
        ]
        .unwrap();
        let counts = group_by(&df, "priority", Aggregation::Count).unwrap();
        assert_eq!(keys(&counts), vec!["1", "2", "10"]);
        let values: Vec<f64> = counts.rows().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 1.0]);

        let means = group_by(&df, "priority", Aggregation::Mean("ttc_hours")).unwrap();
        assert_eq!(means.rows()[1], BreakdownRow { key: "2".into(), value: 3.0 });
    }

    #[test]
    fn mean_groups_without_values_are_dropped() {
        let df = df![
            "priority" => ["P1", "P2", "P2"],
            "sla_breach" => [None, Some(true), Some(false)],
        ]
        .unwrap();
        let rates = group_by(&df, "priority", Aggregation::Mean("sla_breach"))
            .unwrap()
            .scaled(100.0);
        assert_eq!(rates.rows(), &[BreakdownRow { key: "P2".into(), value: 50.0 }]);
    }

    #[test]
    fn absent_columns_give_empty_results() {
        let df = orders();
        assert!(group_by(&df, "region", Aggregation::Sum("revenue")).unwrap().is_empty());
        assert!(group_by(&df, "customer", Aggregation::Mean("ttc")).unwrap().is_empty());
        assert_eq!(sum(&df, "price").unwrap(), None);
        assert_eq!(distinct_count(&df, "order_id").unwrap(), None);
        assert!(monthly_totals(&df, "date", "revenue").unwrap().is_empty());
    }

    #[test]
    fn counts_and_means() {
        let df = orders();
        let counts = group_by(&df, "customer", Aggregation::Count).unwrap();
        assert_eq!(counts.rows()[0], BreakdownRow { key: "ann".into(), value: 2.0 });
        assert_eq!(sum(&df, "revenue").unwrap(), Some(95.0));
        assert_eq!(mean(&df, "revenue").unwrap(), Some(19.0));
        assert_eq!(distinct_count(&df, "customer").unwrap(), Some(4));
        assert_eq!(counts.mean(), Some(1.25));
        assert_eq!(Breakdown::default().mean(), None);
    }

    #[test]
    fn monthly_growth_and_churn() {
        let df = orders();
        let series = monthly_totals(&df, "order_date", "revenue").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].period.to_string(), "2024-01");
        assert_eq!(series[0].value, 40.0);
        assert_eq!(series[1].value, 50.0);
        assert_eq!(period_change(&series), Some(25.0));

        // bob left, ann stayed
        let churn = churn_rate(&df, "order_date", "customer", series[0].period, series[1].period);
        assert_eq!(churn.unwrap(), Some(50.0));
    }

    #[test]
    fn growth_is_undefined_without_two_periods_or_with_zero_base() {
        let one = [PeriodTotal { period: YearMonth { year: 2024, month: 1 }, value: 5.0 }];
        assert_eq!(period_change(&one), None);
        assert_eq!(period_change(&[]), None);
        let zero = [
            PeriodTotal { period: YearMonth { year: 2024, month: 1 }, value: 0.0 },
            PeriodTotal { period: YearMonth { year: 2024, month: 2 }, value: 5.0 },
        ];
        assert_eq!(period_change(&zero), None);
    }

    #[test]
    fn churn_is_undefined_for_empty_prior_period() {
        let df = orders();
        let empty = YearMonth { year: 2023, month: 12 };
        let jan = YearMonth { year: 2024, month: 1 };
        assert_eq!(churn_rate(&df, "order_date", "customer", empty, jan).unwrap(), None);
    }

    #[test]
    fn flag_rate_ignores_missing() {
        let df = df!["sla_breach" => [Some(true), Some(false), None]].unwrap();
        assert_eq!(flag_rate(&df, "sla_breach").unwrap(), Some(50.0));
    }
}
