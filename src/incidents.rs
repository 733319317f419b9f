//! IT incident tickets: resolution and SLA KPIs, volume and breach rate by
//! priority, and mean time to resolve by assignment group.

use crate::aggregate::{flag_rate, group_by, mean, Aggregation, Breakdown};
use crate::chart::ChartSpec;
use crate::cleaner::{CleanReport, CleaningPlan, Coercion, ColumnRule, DateRule};
use crate::config::RunConfig;
use crate::document::{
    count_cell, decimal_cell, percent_cell, push_metric, Document, Metric, MetricValue, Narrative,
};
use crate::error::Result;
use crate::pipeline::{load_and_clean, publish, RunOutcome};
use crate::frame::{has_column, series};
use crate::util::{format_int, format_number};
use polars::prelude::*;
use tracing::info;

pub const PRIORITY: &str = "priority";
pub const ASSIGNMENT_GROUP: &str = "assignment_group";
pub const ASSIGNEE: &str = "assignee";
pub const OPENED_AT: &str = "opened_at";
pub const CLOSED_AT: &str = "closed_at";
pub const TTC_HOURS: &str = "ttc_hours";
pub const SLA_BREACH: &str = "sla_breach";

pub const DEFAULT_PRIORITY: &str = "3 - Moderate";

pub const TOP_N: usize = 10;

pub const CHART: ChartSpec = ChartSpec {
    title: "SLA Breach Rate by Priority",
    x_label: "Priority",
    y_label: "Breach Rate (%)",
    size: (800, 500),
};

pub fn cleaning_plan() -> CleaningPlan {
    CleaningPlan {
        dates: [OPENED_AT, CLOSED_AT]
            .into_iter()
            .map(|col| DateRule {
                source: col,
                target: col,
                always_present: false,
            })
            .collect(),
        columns: vec![
            ColumnRule::placeholder(PRIORITY, DEFAULT_PRIORITY),
            ColumnRule::placeholder(ASSIGNMENT_GROUP, "Unassigned Group"),
            ColumnRule::placeholder(ASSIGNEE, "unassigned"),
            ColumnRule::numeric(TTC_HOURS, None),
            ColumnRule {
                column: SLA_BREACH,
                coercion: Some(Coercion::Flag),
                fill: None,
            },
        ],
        derived: Vec::new(),
    }
}

/// Closed/open split, present only when the data has a `closed_at` column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub closed: usize,
    pub open: usize,
    /// `None` for an empty data set.
    pub resolved_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentMetrics {
    pub raw_rows: usize,
    pub clean_rows: usize,
    pub duplicates_removed: usize,
    pub resolution: Option<Resolution>,
    pub breach_rate: Option<f64>,
    /// Mean `ttc_hours` over closed tickets.
    pub mttr_hours: Option<f64>,
    pub volume_by_priority: Breakdown,
    pub breach_by_priority: Breakdown,
    pub mttr_by_group: Breakdown,
}

impl IncidentMetrics {
    pub fn compute(df: &DataFrame, cleaning: &CleanReport) -> Result<Self> {
        let total = df.height();
        let resolution = series(df, CLOSED_AT).map(|closed_at| {
            let closed = total - closed_at.null_count();
            Resolution {
                closed,
                open: total - closed,
                resolved_rate: (total > 0).then(|| closed as f64 / total as f64 * 100.0),
            }
        });

        let mttr_hours = if has_column(df, CLOSED_AT) && has_column(df, TTC_HOURS) {
            let closed = df
                .clone()
                .lazy()
                .filter(col(CLOSED_AT).is_not_null())
                .select([col(TTC_HOURS)])
                .collect()?;
            mean(&closed, TTC_HOURS)?
        } else {
            None
        };

        Ok(Self {
            raw_rows: cleaning.raw_rows,
            clean_rows: cleaning.clean_rows,
            duplicates_removed: cleaning.duplicates_removed,
            resolution,
            breach_rate: flag_rate(df, SLA_BREACH)?,
            mttr_hours,
            volume_by_priority: group_by(df, PRIORITY, Aggregation::Count)?,
            breach_by_priority: group_by(df, PRIORITY, Aggregation::Mean(SLA_BREACH))?
                .scaled(100.0),
            mttr_by_group: group_by(df, ASSIGNMENT_GROUP, Aggregation::Mean(TTC_HOURS))?
                .sorted_desc()
                .top(TOP_N),
        })
    }

    pub fn metrics(&self) -> Vec<Metric> {
        let mut metrics = vec![
            Metric::new("Rows (raw)", MetricValue::Count(self.raw_rows)),
            Metric::new("Rows (clean)", MetricValue::Count(self.clean_rows)),
            Metric::new("Removed duplicates", MetricValue::Count(self.duplicates_removed)),
        ];
        if let Some(res) = self.resolution {
            metrics.push(Metric::new("Resolved/Closed incidents", MetricValue::Count(res.closed)));
            metrics.push(Metric::new("Open incidents", MetricValue::Count(res.open)));
            push_metric(&mut metrics, "Resolved/Closed rate", res.resolved_rate, MetricValue::Percent);
        }
        push_metric(&mut metrics, "Overall SLA breach rate", self.breach_rate, MetricValue::Percent);
        push_metric(
            &mut metrics,
            "Average time to close (MTTR)",
            self.mttr_hours,
            MetricValue::Hours,
        );
        metrics
    }

    pub fn summary(&self) -> String {
        let mut text = Narrative::new(format!(
            "This report summarizes {} ServiceNow-style incident records after removing {} \
             duplicate rows. ",
            format_int(self.clean_rows),
            format_int(self.duplicates_removed),
        ));
        text.sentence(self.mttr_hours, |v| {
            format!(
                "The average time to resolve a ticket is approximately {} hours, ",
                format_number(v, 1)
            )
        })
        .sentence(self.breach_rate, |v| {
            format!("with an overall SLA breach rate of {}%. ", format_number(v, 1))
        })
        .sentence(self.resolution, |res| {
            let rate = res
                .resolved_rate
                .map(|r| format!(" ({}% of all tickets)", format_number(r, 1)))
                .unwrap_or_default();
            format!(
                "Currently, {} incidents are resolved/closed{}, and {} remain open.",
                format_int(res.closed),
                rate,
                format_int(res.open)
            )
        });
        text.finish()
    }

    pub fn document(&self) -> Document {
        let mut doc = Document::new("ServiceNow Incident Health Report", 10.0);
        doc.paragraph(self.summary(), 12.0);
        doc.kpi_table("Key KPIs", &self.metrics(), 14.0);
        doc.breakdown_table(
            "Incident Volume by Priority",
            ["Priority", "Incident Count"],
            &self.volume_by_priority,
            count_cell,
            14.0,
        );
        doc.breakdown_table(
            "SLA Breach Rate by Priority",
            ["Priority", "SLA Breach Rate (%)"],
            &self.breach_by_priority,
            percent_cell,
            14.0,
        );
        doc.breakdown_table(
            "Top 10 Assignment Groups by MTTR",
            ["Assignment Group", "MTTR (hours)"],
            &self.mttr_by_group,
            decimal_cell,
            14.0,
        );
        doc
    }
}

/// Run the incident pipeline end to end.
pub fn run(config: &RunConfig) -> Result<RunOutcome> {
    info!(input = %config.input.display(), "building incident report");
    let (df, cleaning) = load_and_clean(config, &cleaning_plan())?;
    let metrics = IncidentMetrics::compute(&df, &cleaning)?;
    let written = publish(config, &CHART, &metrics.breach_by_priority, &metrics.document())?;
    Ok(RunOutcome {
        metrics: metrics.metrics(),
        written,
    })
}
