//! Render a [`Document`] to a paginated US Letter PDF.
//!
//! Layout works in points from the bottom-left corner, like PDF itself, and
//! converts to millimetres only at the printpdf boundary. Text widths are
//! estimated from an average Helvetica glyph width.

use crate::document::{Block, Document, Table};
use crate::error::{ReportError, Result};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rect, Rgb,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const FRAME_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const BODY_LEADING: f32 = 12.0;
const CELL_PADDING: f32 = 6.0;
const ROW_HEIGHT: f32 = 18.0;
const GRID_THICKNESS: f32 = 0.25;

// Average advance of a Helvetica glyph, as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.52;

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_WIDTH
}

/// Greedy word wrap to `width` points.
fn wrap(text: &str, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if text_width(&candidate, size) > width && !current.is_empty() {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Column widths sized to content, scaled down to fit the frame.
fn column_widths(table: &Table, size: f32) -> Vec<f32> {
    let columns = table.header.len();
    let mut widths: Vec<f32> = (0..columns)
        .map(|c| {
            std::iter::once(&table.header)
                .chain(table.rows.iter())
                .filter_map(|row| row.get(c))
                .map(|cell| text_width(cell, size) + 2.0 * CELL_PADDING)
                .fold(0.0, f32::max)
        })
        .collect();
    let total: f32 = widths.iter().sum();
    if total > FRAME_WIDTH {
        let scale = FRAME_WIDTH / total;
        widths.iter_mut().for_each(|w| *w *= scale);
    }
    widths
}

struct Canvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Baseline budget: the y coordinate of the top of free space.
    cursor: f32,
    pages: usize,
}

impl Canvas {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(format!("{e:?}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(format!("{e:?}")))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            cursor: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = PAGE_HEIGHT - MARGIN;
        self.pages += 1;
    }

    /// Start a new page unless `height` points still fit above the bottom margin.
    fn reserve(&mut self, height: f32) {
        let at_top = (self.cursor - (PAGE_HEIGHT - MARGIN)).abs() < f32::EPSILON;
        if self.cursor - height < MARGIN && !at_top {
            self.new_page();
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, baseline: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, mm(x), mm(baseline), font);
    }

    fn line(&self, from: (f32, f32), to: (f32, f32)) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(mm(from.0), mm(from.1)), false),
                (Point::new(mm(to.0), mm(to.1)), false),
            ],
            is_closed: false,
        });
    }

    fn title(&mut self, text: &str) {
        let height = TITLE_SIZE * 1.2;
        self.reserve(height);
        let x = MARGIN + ((FRAME_WIDTH - text_width(text, TITLE_SIZE)) / 2.0).max(0.0);
        self.text(text, TITLE_SIZE, x, self.cursor - TITLE_SIZE, true);
        self.cursor -= height;
    }

    fn heading(&mut self, text: &str) {
        // keep a heading on the same page as the first table row
        let height = HEADING_SIZE * 1.5;
        self.reserve(height + 2.0 * ROW_HEIGHT);
        self.text(text, HEADING_SIZE, MARGIN, self.cursor - HEADING_SIZE, true);
        self.cursor -= height;
    }

    fn paragraph(&mut self, text: &str) {
        for line in wrap(text, BODY_SIZE, FRAME_WIDTH) {
            self.reserve(BODY_LEADING);
            self.text(&line, BODY_SIZE, MARGIN, self.cursor - BODY_SIZE, false);
            self.cursor -= BODY_LEADING;
        }
    }

    fn spacer(&mut self, gap: f32) {
        self.cursor = (self.cursor - gap).max(MARGIN);
    }

    fn table(&mut self, table: &Table) {
        let widths = column_widths(table, BODY_SIZE);
        let total: f32 = widths.iter().sum();
        self.table_row(&table.header, &widths, total, true);
        for row in &table.rows {
            self.table_row(row, &widths, total, false);
        }
    }

    fn table_row(&mut self, cells: &[String], widths: &[f32], total: f32, header: bool) {
        self.reserve(ROW_HEIGHT);
        let top = self.cursor;
        let bottom = top - ROW_HEIGHT;

        if header {
            self.layer
                .set_fill_color(Color::Rgb(Rgb::new(0.83, 0.83, 0.83, None)));
            self.layer
                .add_rect(Rect::new(mm(MARGIN), mm(bottom), mm(MARGIN + total), mm(top)));
            self.layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        }

        let mut x = MARGIN;
        for (cell, width) in cells.iter().zip(widths) {
            self.text(cell, BODY_SIZE, x + CELL_PADDING, bottom + 5.5, header);
            x += width;
        }

        self.layer
            .set_outline_color(Color::Rgb(Rgb::new(0.5, 0.5, 0.5, None)));
        self.layer.set_outline_thickness(GRID_THICKNESS);
        self.line((MARGIN, top), (MARGIN + total, top));
        self.line((MARGIN, bottom), (MARGIN + total, bottom));
        let mut edge = MARGIN;
        self.line((edge, top), (edge, bottom));
        for width in widths {
            edge += width;
            self.line((edge, top), (edge, bottom));
        }
        self.cursor = bottom;
    }

    fn save(self, path: &Path) -> Result<usize> {
        let file = File::create(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.doc
            .save(&mut BufWriter::new(file))
            .map_err(|e| ReportError::Pdf(format!("{e:?}")))?;
        Ok(self.pages)
    }
}

/// Write `document` to `path`, overwriting any previous file.
pub fn render(document: &Document, path: &Path) -> Result<()> {
    let mut canvas = Canvas::new(document.title().unwrap_or("Report"))?;
    for block in &document.blocks {
        match block {
            Block::Title(text) => canvas.title(text),
            Block::Heading(text) => canvas.heading(text),
            Block::Paragraph(text) => canvas.paragraph(text),
            Block::Table(table) => canvas.table(table),
            Block::Spacer(gap) => canvas.spacer(*gap),
        }
    }
    let pages = canvas.save(path)?;
    info!(path = %path.display(), pages, "PDF written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_to_frame_width() {
        let text = "word ".repeat(200);
        let lines = wrap(&text, BODY_SIZE, FRAME_WIDTH);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, BODY_SIZE) <= FRAME_WIDTH));
        assert_eq!(lines.iter().map(|l| l.split(' ').count()).sum::<usize>(), 200);
    }

    #[test]
    fn wide_tables_are_scaled_to_fit() {
        let table = Table {
            header: vec!["Key".into(), "Value".into()],
            rows: vec![vec!["x".repeat(300), "1".into()]],
        };
        let widths = column_widths(&table, BODY_SIZE);
        let total: f32 = widths.iter().sum();
        assert!(total <= FRAME_WIDTH + 0.01);
    }

    #[test]
    fn long_documents_paginate() {
        let mut doc = Document::new("Long", 12.0);
        let rows = (0..120).map(|i| vec![format!("key {i}"), i.to_string()]).collect();
        doc.blocks.push(Block::Table(Table {
            header: vec!["Key".into(), "Value".into()],
            rows,
        }));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.pdf");
        render(&doc, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
