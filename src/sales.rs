//! Sales orders: revenue KPIs, month-over-month growth, customer churn and
//! top-N breakdowns.

use crate::aggregate::{
    churn_rate, distinct_count, group_by, mean, monthly_totals, period_change, sum, Aggregation,
    Breakdown, PeriodTotal,
};
use crate::chart::ChartSpec;
use crate::cleaner::{CleanReport, CleaningPlan, ColumnRule, DateRule, DerivedProduct, Fill};
use crate::config::RunConfig;
use crate::document::{currency_cell, push_metric, Document, Metric, MetricValue, Narrative};
use crate::error::Result;
use crate::pipeline::{load_and_clean, publish, RunOutcome};
use crate::util::{format_currency, format_int, format_number};
use polars::prelude::DataFrame;
use tracing::{debug, info};

pub const ORDER_ID: &str = "order_id";
pub const DATE: &str = "date";
pub const ORDER_DATE: &str = "order_date";
pub const QUANTITY: &str = "quantity";
pub const PRICE: &str = "price";
pub const PRODUCT: &str = "product";
pub const REGION: &str = "region";
pub const CUSTOMER: &str = "customer";
pub const REVENUE: &str = "revenue";

pub const TOP_N: usize = 10;

pub const CHART: ChartSpec = ChartSpec {
    title: "Top 10 Products by Revenue",
    x_label: "Product",
    y_label: "Revenue",
    size: (1000, 600),
};

pub fn cleaning_plan() -> CleaningPlan {
    CleaningPlan {
        dates: vec![DateRule {
            source: DATE,
            target: ORDER_DATE,
            always_present: true,
        }],
        columns: vec![
            ColumnRule::numeric(QUANTITY, Some(Fill::MedianInteger)),
            ColumnRule::numeric(PRICE, Some(Fill::Median)),
            ColumnRule::placeholder(PRODUCT, "Unknown"),
            ColumnRule::placeholder(REGION, "Unknown"),
            ColumnRule::placeholder(CUSTOMER, "Unknown"),
        ],
        derived: vec![DerivedProduct {
            target: REVENUE,
            left: QUANTITY,
            right: PRICE,
        }],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesMetrics {
    pub raw_rows: usize,
    pub clean_rows: usize,
    pub duplicates_removed: usize,
    /// Distinct order ids, or the clean row count without an `order_id` column.
    pub deals: usize,
    pub total_revenue: Option<f64>,
    pub avg_deal_size: Option<f64>,
    /// Mean revenue per customer over the whole data window.
    pub avg_cltv: Option<f64>,
    pub revenue_growth_pct: Option<f64>,
    pub churn_rate: Option<f64>,
    pub monthly_revenue: Vec<PeriodTotal>,
    pub revenue_by_region: Breakdown,
    pub top_products: Breakdown,
    pub top_customers: Breakdown,
}

impl SalesMetrics {
    pub fn compute(df: &DataFrame, cleaning: &CleanReport) -> Result<Self> {
        let revenue_per_customer = group_by(df, CUSTOMER, Aggregation::Sum(REVENUE))?;
        let avg_cltv = revenue_per_customer.mean();

        let monthly_revenue = monthly_totals(df, ORDER_DATE, REVENUE)?;
        let revenue_growth_pct = period_change(&monthly_revenue);
        let churn = match monthly_revenue.as_slice() {
            [.., previous, last] => {
                churn_rate(df, ORDER_DATE, CUSTOMER, previous.period, last.period)?
            }
            _ => {
                debug!(months = monthly_revenue.len(), "fewer than two months; churn undefined");
                None
            }
        };

        Ok(Self {
            raw_rows: cleaning.raw_rows,
            clean_rows: cleaning.clean_rows,
            duplicates_removed: cleaning.duplicates_removed,
            deals: distinct_count(df, ORDER_ID)?.unwrap_or(df.height()),
            total_revenue: sum(df, REVENUE)?,
            avg_deal_size: mean(df, REVENUE)?,
            avg_cltv,
            revenue_growth_pct,
            churn_rate: churn,
            monthly_revenue,
            revenue_by_region: group_by(df, REGION, Aggregation::Sum(REVENUE))?.sorted_desc(),
            top_products: group_by(df, PRODUCT, Aggregation::Sum(REVENUE))?
                .sorted_desc()
                .top(TOP_N),
            top_customers: revenue_per_customer.sorted_desc().top(TOP_N),
        })
    }

    /// KPI rows, in table order, for every metric that was computed.
    pub fn metrics(&self) -> Vec<Metric> {
        let mut metrics = vec![
            Metric::new("Deals (orders)", MetricValue::Count(self.deals)),
            Metric::new("Rows (raw)", MetricValue::Count(self.raw_rows)),
            Metric::new("Rows (clean)", MetricValue::Count(self.clean_rows)),
            Metric::new("Removed duplicates", MetricValue::Count(self.duplicates_removed)),
        ];
        push_metric(&mut metrics, "Total revenue", self.total_revenue, MetricValue::Currency);
        push_metric(&mut metrics, "Average deal size", self.avg_deal_size, MetricValue::Currency);
        push_metric(&mut metrics, "Avg CLTV (data window)", self.avg_cltv, MetricValue::Currency);
        push_metric(&mut metrics, "MoM revenue growth", self.revenue_growth_pct, MetricValue::Percent);
        push_metric(
            &mut metrics,
            "Customer churn (last 2 months)",
            self.churn_rate,
            MetricValue::Percent,
        );
        metrics
    }

    pub fn summary(&self) -> String {
        let mut text = Narrative::new(format!(
            "This report analyzes {} deals after cleaning {} rows and removing {} duplicate \
             records from the original dataset of {} rows. ",
            format_int(self.deals),
            format_int(self.clean_rows),
            format_int(self.duplicates_removed),
            format_int(self.raw_rows),
        ));
        text.sentence(self.total_revenue, |v| {
            format!("Total revenue over the period is approximately {}. ", format_currency(v))
        })
        .sentence(self.avg_deal_size, |v| {
            format!("The average deal size is {}. ", format_currency(v))
        })
        .sentence(self.avg_cltv, |v| {
            format!(
                "Average revenue per customer (CLTV over this data window) is about {}. ",
                format_currency(v)
            )
        })
        .sentence(self.revenue_growth_pct, |v| {
            format!("Recent month-over-month revenue growth is {}%. ", format_number(v, 1))
        })
        .sentence(self.churn_rate, |v| {
            format!(
                "Estimated customer churn between the last two months is {}%.",
                format_number(v, 1)
            )
        });
        text.finish()
    }

    pub fn document(&self) -> Document {
        let monthly = Breakdown::from_pairs(
            self.monthly_revenue
                .iter()
                .map(|p| (p.period.to_string(), p.value)),
        );

        let mut doc = Document::new("Enterprise Sales Summary", 12.0);
        doc.paragraph(self.summary(), 14.0);
        doc.kpi_table("Core Sales KPIs", &self.metrics(), 16.0);
        doc.breakdown_table(
            "Revenue by Region",
            ["Region", "Revenue"],
            &self.revenue_by_region,
            currency_cell,
            16.0,
        );
        doc.breakdown_table(
            "Top 10 Products by Revenue",
            ["Product", "Revenue"],
            &self.top_products,
            currency_cell,
            16.0,
        );
        doc.breakdown_table(
            "Top 10 Customers by Revenue",
            ["Customer", "Revenue"],
            &self.top_customers,
            currency_cell,
            16.0,
        );
        doc.breakdown_table("Monthly Revenue", ["Month", "Revenue"], &monthly, currency_cell, 16.0);
        doc
    }
}

/// Run the sales pipeline end to end.
pub fn run(config: &RunConfig) -> Result<RunOutcome> {
    info!(input = %config.input.display(), "building sales report");
    let (df, cleaning) = load_and_clean(config, &cleaning_plan())?;
    let metrics = SalesMetrics::compute(&df, &cleaning)?;
    let written = publish(config, &CHART, &metrics.top_products, &metrics.document())?;
    Ok(RunOutcome {
        metrics: metrics.metrics(),
        written,
    })
}
