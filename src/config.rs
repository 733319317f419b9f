//! Input/output locations for one pipeline run.
//!
//! Each variant has fixed default paths relative to the working directory.
//! The binaries accept optional overrides; with no arguments a run reads
//! and writes exactly the defaults.

use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub input: PathBuf,
    pub cleaned_csv: PathBuf,
    pub chart_png: PathBuf,
    pub report_pdf: PathBuf,
    /// TrueType font for chart text; the bundled DejaVu Sans is used when unset.
    pub chart_font: Option<PathBuf>,
}

impl RunConfig {
    pub fn sales() -> Self {
        Self::with_defaults(
            "sales_raw.csv",
            "sales_cleaned.csv",
            "top_products.png",
            "sales_summary.pdf",
        )
    }

    pub fn incidents() -> Self {
        Self::with_defaults(
            "sn_incidents_raw.csv",
            "sn_incidents_cleaned.csv",
            "sn_summary_chart.png",
            "sn_summary.pdf",
        )
    }

    fn with_defaults(input: &str, cleaned_csv: &str, chart_png: &str, report_pdf: &str) -> Self {
        Self {
            input: input.into(),
            cleaned_csv: cleaned_csv.into(),
            chart_png: chart_png.into(),
            report_pdf: report_pdf.into(),
            chart_font: None,
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(p) = overrides.input {
            self.input = p;
        }
        if let Some(p) = overrides.cleaned_csv {
            self.cleaned_csv = p;
        }
        if let Some(p) = overrides.chart {
            self.chart_png = p;
        }
        if let Some(p) = overrides.report {
            self.report_pdf = p;
        }
        if overrides.chart_font.is_some() {
            self.chart_font = overrides.chart_font;
        }
        self
    }

    /// Point every file at `dir`, keeping the default file names.
    pub fn in_dir(mut self, dir: &std::path::Path) -> Self {
        for path in [
            &mut self.input,
            &mut self.cleaned_csv,
            &mut self.chart_png,
            &mut self.report_pdf,
        ] {
            *path = dir.join(&*path);
        }
        self
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Raw CSV to read
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Where to write the cleaned CSV
    #[arg(long)]
    pub cleaned_csv: Option<PathBuf>,
    /// Where to write the bar chart PNG
    #[arg(long)]
    pub chart: Option<PathBuf>,
    /// Where to write the PDF report
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// TrueType font used for chart text
    #[arg(long)]
    pub chart_font: Option<PathBuf>,
}
