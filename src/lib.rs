//! CSV-to-report pipelines.
//!
//! Each report variant loads a raw CSV, cleans it with a declarative
//! [`cleaner::CleaningPlan`], computes KPIs and grouped breakdowns, and
//! publishes a cleaned CSV, a bar chart PNG and a PDF summary. The
//! binaries in `src/bin` wire a variant to its default file locations.

pub mod aggregate;
pub mod chart;
pub mod cleaner;
pub mod config;
pub mod document;
pub mod error;
pub mod frame;
pub mod incidents;
pub mod loader;
pub mod logging;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod sales;
pub mod util;

pub use config::{Overrides, RunConfig};
pub use error::{ReportError, Result};
pub use pipeline::RunOutcome;
