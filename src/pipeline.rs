//! Steps shared by every report variant: load, clean, persist, publish.

use crate::aggregate::Breakdown;
use crate::chart::{render_bar_chart, ChartSpec};
use crate::cleaner::{clean, CleanReport, CleaningPlan};
use crate::config::RunConfig;
use crate::document::{Document, KpiRow, Metric};
use crate::error::Result;
use crate::loader::load_records;
use crate::output::write_csv;
use crate::pdf;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use tracing::warn;

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub metrics: Vec<Metric>,
    /// Output files in the order they should be reported.
    pub written: Vec<PathBuf>,
}

impl RunOutcome {
    pub fn kpi_rows(&self) -> Vec<KpiRow> {
        self.metrics.iter().map(KpiRow::from).collect()
    }
}

/// Load the input, clean it per `plan`, and write the cleaned CSV.
pub fn load_and_clean(config: &RunConfig, plan: &CleaningPlan) -> Result<(DataFrame, CleanReport)> {
    let raw = load_records(&config.input)?;
    let (mut df, report) = clean(raw, plan)?;
    write_csv(&config.cleaned_csv, &mut df)?;
    Ok((df, report))
}

/// Render the chart (if there is data) and the PDF. Returns every file
/// written during the run, cleaned CSV included.
pub fn publish(
    config: &RunConfig,
    chart: &ChartSpec,
    chart_data: &Breakdown,
    document: &Document,
) -> Result<Vec<PathBuf>> {
    let chart_written = render_bar_chart(
        chart,
        chart_data,
        &config.chart_png,
        config.chart_font.as_deref(),
    )?;
    if !chart_written {
        warn!(chart = chart.title, "no data available to generate chart PNG");
    }
    pdf::render(document, &config.report_pdf)?;

    let mut written = vec![config.cleaned_csv.clone(), config.report_pdf.clone()];
    if chart_written {
        written.push(config.chart_png.clone());
    }
    Ok(written)
}
