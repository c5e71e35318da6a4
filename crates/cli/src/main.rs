mod cli;
mod run;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use logdiff_core::config::{load_dotenv, Config};

use crate::cli::CliArgs;
use crate::run::{execute, Outcome, EXIT_NO_DATA};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = Config::from_env();
    config.log_summary();

    match execute(args, config).await {
        Ok(Outcome::Done) => {
            info!("logdiff finished");
            Ok(())
        }
        Ok(Outcome::NoData) => {
            info!(code = EXIT_NO_DATA, "no data to analyze");
            std::process::exit(EXIT_NO_DATA);
        }
        Err(e) => {
            error!(error = format!("{e:#}"), "logdiff failed");
            Err(e).context("run failed")
        }
    }
}
