use anyhow::{Context, Result};
use clap::Parser;
use report_pipeline::{incidents, logging, output, Overrides, RunConfig};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Clean incident tickets and publish the incident health report",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let config = RunConfig::incidents().with_overrides(cli.overrides);
    let outcome = incidents::run(&config)
        .with_context(|| format!("incident report failed for {}", config.input.display()))?;

    println!("ServiceNow Incident Health Report\n");
    let rows = outcome.kpi_rows();
    output::preview_table_rows(&rows, rows.len());
    output::print_written(&outcome.written);
    Ok(())
}
