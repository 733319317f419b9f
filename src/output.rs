use crate::error::{ReportError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

/// Write the full frame, header first, overwriting `path`.
pub fn write_csv(path: &Path, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .with_datetime_format(Some("%Y-%m-%d %H:%M:%S".to_string()))
        .finish(df)
        .map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), rows = df.height(), "cleaned CSV written");
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Console completion message listing the files actually written.
pub fn print_written(paths: &[PathBuf]) {
    println!("Done →");
    for path in paths {
        println!("  - {}", path.display());
    }
}
