mod download;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricecmp-cli")]
#[command(about = "Download retailer price transparency files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch and extract the latest price, promo and store files for a date
    Download {
        /// Publication date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only run these chain keys (repeatable)
        #[arg(long = "chain", value_name = "KEY")]
        chains: Vec<String>,
        /// Write the run report as JSON to this path
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
    /// List configured chains
    Chains,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = pricecmp_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Download {
            date,
            chains,
            report,
        } => download::run_download(&config, date, &chains, report.as_deref()).await,
        Commands::Chains => download::list_chains(&config),
    }
}
