//! Layout-independent report model.
//!
//! Variants assemble a [`Document`] from blocks; [`crate::pdf`] turns it
//! into pages. Keeping the two apart lets tests inspect what a report says
//! without parsing PDF bytes.

use crate::aggregate::Breakdown;
use crate::util::{format_currency, format_int, format_number, format_percent};
use tabled::Tabled;

/// The value of one KPI, tagged with how it should be printed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Count(usize),
    Currency(f64),
    Percent(f64),
    Hours(f64),
}

impl MetricValue {
    pub fn formatted(&self) -> String {
        match self {
            MetricValue::Count(n) => format_int(*n),
            MetricValue::Currency(v) => format_currency(*v),
            MetricValue::Percent(v) => format_percent(*v),
            MetricValue::Hours(v) => format!("{} hours", format_number(*v, 1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: &'static str,
    pub value: MetricValue,
}

impl Metric {
    pub fn new(name: &'static str, value: MetricValue) -> Self {
        Self { name, value }
    }
}

/// Push `name` only when the metric was computed.
pub fn push_metric<T>(
    metrics: &mut Vec<Metric>,
    name: &'static str,
    value: Option<T>,
    kind: fn(T) -> MetricValue,
) {
    if let Some(v) = value {
        metrics.push(Metric::new(name, kind(v)));
    }
}

/// A formatted KPI table row, as printed to the console and the PDF.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct KpiRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl From<&Metric> for KpiRow {
    fn from(m: &Metric) -> Self {
        Self {
            metric: m.name.to_string(),
            value: m.value.formatted(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Paragraph(String),
    Heading(String),
    Table(Table),
    /// Vertical gap in points.
    Spacer(f32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(title: &str, gap: f32) -> Self {
        Self {
            blocks: vec![Block::Title(title.to_string()), Block::Spacer(gap)],
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            Block::Title(t) => Some(t.as_str()),
            _ => None,
        })
    }

    pub fn paragraph(&mut self, text: impl Into<String>, gap: f32) {
        self.blocks.push(Block::Paragraph(text.into()));
        self.blocks.push(Block::Spacer(gap));
    }

    pub fn kpi_table(&mut self, heading: &str, metrics: &[Metric], gap: f32) {
        let rows = metrics
            .iter()
            .map(|m| vec![m.name.to_string(), m.value.formatted()])
            .collect();
        self.section(heading, ["Metric", "Value"], rows, gap);
    }

    /// Add a two-column table for `breakdown`. Nothing is added (not even
    /// the heading) when the breakdown is empty.
    pub fn breakdown_table(
        &mut self,
        heading: &str,
        columns: [&str; 2],
        breakdown: &Breakdown,
        format: fn(f64) -> String,
        gap: f32,
    ) {
        if breakdown.is_empty() {
            return;
        }
        let rows = breakdown
            .rows()
            .iter()
            .map(|r| vec![r.key.clone(), format(r.value)])
            .collect();
        self.section(heading, columns, rows, gap);
    }

    fn section(&mut self, heading: &str, columns: [&str; 2], rows: Vec<Vec<String>>, gap: f32) {
        self.blocks.push(Block::Heading(heading.to_string()));
        self.blocks.push(Block::Table(Table {
            header: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }));
        self.blocks.push(Block::Spacer(gap));
    }

    pub fn headings(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Heading(h) => Some(h.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The table directly under `heading`, if the section exists.
    pub fn table_under(&self, heading: &str) -> Option<&Table> {
        let pos = self
            .blocks
            .iter()
            .position(|b| matches!(b, Block::Heading(h) if h == heading))?;
        match self.blocks.get(pos + 1) {
            Some(Block::Table(t)) => Some(t),
            _ => None,
        }
    }
}

/// Joins sentences for the narrative summary, skipping the ones whose
/// metric was not computed.
#[derive(Debug, Default)]
pub struct Narrative {
    text: String,
}

impl Narrative {
    pub fn new(opening: impl Into<String>) -> Self {
        Self {
            text: opening.into(),
        }
    }

    pub fn sentence<T>(&mut self, value: Option<T>, render: impl FnOnce(T) -> String) -> &mut Self {
        if let Some(v) = value {
            self.text.push_str(&render(v));
        }
        self
    }

    pub fn finish(&self) -> String {
        self.text.trim_end().to_string()
    }
}

pub fn currency_cell(v: f64) -> String {
    format_currency(v)
}

pub fn percent_cell(v: f64) -> String {
    format_percent(v)
}

pub fn count_cell(v: f64) -> String {
    format_int(v.round() as i64)
}

pub fn decimal_cell(v: f64) -> String {
    format_number(v, 1)
}
