use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use paper_harvester::{HarvestConfig, HarvestPipeline, HttpRetriever, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "paper-harvester", version, about = "Harvest paper metadata from a paginated catalog")]
struct Cli {
    /// JSON config file; missing keys take their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of listing pages to walk
    #[arg(long, global = true)]
    pages: Option<u32>,

    /// Path to the output SQLite database
    #[arg(short, long, global = true, default_value = "./jose.db")]
    output: PathBuf,

    /// Maximum concurrent item fetches
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch everything and write both tables (default)
    Run,
    /// Print the unique item references as JSON lines
    Discover,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HarvestConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => HarvestConfig::default(),
    };
    if let Some(pages) = cli.pages {
        config = config.with_total_pages(pages);
    }
    if let Some(concurrency) = cli.concurrency {
        config = config.with_max_concurrency(concurrency);
    }

    let retriever = Arc::new(HttpRetriever::new()?);

    let output = cli.output;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let conn = rusqlite::Connection::open(&output)
                .with_context(|| format!("Failed to open {}", output.display()))?;
            let store = SqliteStore::with_tables(conn, &config.listing_table, &config.metadata_table)?;

            let mut pipeline = HarvestPipeline::new(config, retriever, store)?;
            let report = pipeline.run().await?;

            info!(
                records = report.stats.records_extracted,
                skipped = report.stats.items_failed + report.stats.items_dropped,
                output = %output.display(),
                "Done"
            );
        }
        Command::Discover => {
            let store = SqliteStore::open_in_memory()?;
            let pipeline = HarvestPipeline::new(config, retriever, store)?;
            let discovery = pipeline.discover().await;

            for reference in &discovery.references {
                println!("{}", serde_json::to_string(reference)?);
            }
        }
    }

    Ok(())
}
