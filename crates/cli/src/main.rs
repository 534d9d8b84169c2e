//! `sig-attention` entry point.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use cli::{execute, telemetry, Cli, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    telemetry::init(args.log_format).context("installing the log subscriber")?;

    let settings = Settings::resolve(args)?;
    let summary = execute(&settings).await?;
    info!(
        run_id = %summary.run_id,
        recipients = summary.recipients,
        reports = %settings.output.display(),
        "Reports written"
    );
    Ok(())
}
