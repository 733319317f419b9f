use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("{0} is empty")]
    EmptyInput(PathBuf),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data frame operation failed: {0}")]
    Frame(#[from] PolarsError),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("PDF rendering failed: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;
