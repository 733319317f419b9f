use anyhow::{Context, Result};
use clap::Parser;
use report_pipeline::{logging, output, sales, Overrides, RunConfig};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Clean sales transactions and publish the sales KPI report",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let config = RunConfig::sales().with_overrides(cli.overrides);
    let outcome = sales::run(&config)
        .with_context(|| format!("sales report failed for {}", config.input.display()))?;

    println!("Enterprise Sales Summary\n");
    let rows = outcome.kpi_rows();
    output::preview_table_rows(&rows, rows.len());
    output::print_written(&outcome.written);
    Ok(())
}
