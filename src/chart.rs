use crate::aggregate::Breakdown;
use crate::error::{ReportError, Result};
use once_cell::sync::OnceCell;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::error::Error;
use std::path::Path;
use tracing::{info, warn};

const FONT_FAMILY: &str = "sans-serif";

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

static FONT_READY: OnceCell<std::result::Result<(), String>> = OnceCell::new();

/// Titles and pixel size for one bar chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSpec {
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub size: (u32, u32),
}

/// Draw `data` as a bar chart, one bar per row in table order.
///
/// Returns `Ok(false)` without touching the filesystem when `data` is
/// empty. Text uses `font` when it loads, otherwise the bundled font.
pub fn render_bar_chart(
    spec: &ChartSpec,
    data: &Breakdown,
    path: &Path,
    font: Option<&Path>,
) -> Result<bool> {
    if data.is_empty() {
        info!(chart = spec.title, "no data; chart skipped");
        return Ok(false);
    }
    ensure_font(font)?;
    draw_bars(spec, data, path).map_err(|e| ReportError::Chart(e.to_string()))?;
    info!(path = %path.display(), bars = data.len(), "chart written");
    Ok(true)
}

fn draw_bars(
    spec: &ChartSpec,
    data: &Breakdown,
    path: &Path,
) -> std::result::Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, spec.size).into_drawing_area();
    root.fill(&WHITE)?;

    let (low, high) = value_range(data);
    let bars = data.len();

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(spec.title, (FONT_FAMILY, 26))
        .x_label_area_size(70)
        .y_label_area_size(80)
        .build_cartesian_2d((0..bars).into_segmented(), low..high)?;

    let keys: Vec<String> = data.rows().iter().map(|r| r.key.clone()).collect();
    let key_label = |seg: &SegmentValue<usize>| match seg {
        SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
            keys.get(*i).cloned().unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars)
        .x_label_formatter(&key_label)
        .x_desc(spec.x_label)
        .y_desc(spec.y_label)
        .axis_desc_style((FONT_FAMILY, 18))
        .label_style((FONT_FAMILY, 13))
        .draw()?;

    chart.draw_series(data.rows().iter().enumerate().map(|(i, row)| {
        let (bottom, top) = if row.value >= 0.0 {
            (0.0, row.value)
        } else {
            (row.value, 0.0)
        };
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), bottom), (SegmentValue::Exact(i + 1), top)],
            BLUE.mix(0.75).filled(),
        );
        bar.set_margin(0, 0, 6, 6);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// Y range covering zero and every value, with headroom above the tallest bar.
fn value_range(data: &Breakdown) -> (f64, f64) {
    let values = data.rows().iter().map(|r| r.value);
    let low = values.clone().fold(0.0_f64, f64::min);
    let high = values.fold(0.0_f64, f64::max);
    if (high - low).abs() < f64::EPSILON {
        (low, low + 1.0)
    } else {
        (low, high + (high - low) * 0.05)
    }
}

/// Bytes of the requested font, or the bundled DejaVu Sans when none is
/// given or the file cannot be read.
fn font_bytes(explicit: Option<&Path>) -> &'static [u8] {
    let Some(path) = explicit else {
        return BUNDLED_FONT;
    };
    match std::fs::read(path) {
        // plotters keeps registered fonts for the life of the process
        Ok(bytes) => Box::leak(bytes.into_boxed_slice()),
        Err(err) => {
            warn!(font = %path.display(), %err, "chart font unreadable; using bundled font");
            BUNDLED_FONT
        }
    }
}

/// Register the chart font once per process.
fn ensure_font(explicit: Option<&Path>) -> Result<()> {
    FONT_READY
        .get_or_init(|| {
            if register_font(FONT_FAMILY, FontStyle::Normal, font_bytes(explicit)).is_ok() {
                info!(font = ?explicit, "chart font registered");
                return Ok(());
            }
            warn!(font = ?explicit, "not a usable TrueType font; using bundled font");
            register_font(FONT_FAMILY, FontStyle::Normal, BUNDLED_FONT)
                .map_err(|_| "bundled chart font failed to load".to_string())
        })
        .clone()
        .map_err(ReportError::Chart)
}
