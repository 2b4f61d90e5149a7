use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use natal_core::ephemeris::ElementsProvider;
use natal_core::{ChartRequest, ChartService, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "natal")]
#[command(about = "Natal chart calculator with a content-addressed house cache", long_about = None)]
struct Cli {
    /// Config file (defaults to ./natal.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute, store and print a chart
    Chart {
        /// JSON chart request
        #[arg(short, long)]
        request: PathBuf,
    },
    /// Print a stored chart
    Show { subject_id: String },
    /// Print the house cache key for a request
    CacheKey {
        #[arg(short, long)]
        request: PathBuf,
    },
}

fn read_request(path: &Path) -> Result<ChartRequest, Box<dyn Error>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter)))
        .with_writer(std::io::stderr)
        .init();

    let service = ChartService::from_settings(&settings, Arc::new(ElementsProvider))?;

    match cli.command {
        Commands::Chart { request } => {
            let request = read_request(&request)?;
            let stored = service.generate(&request).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Commands::Show { subject_id } => match service.fetch_chart(&subject_id).await? {
            Some(stored) => println!("{}", serde_json::to_string_pretty(&stored)?),
            None => {
                eprintln!("Natal chart not found for {}", subject_id);
                std::process::exit(1);
            }
        },
        Commands::CacheKey { request } => {
            let (_, params) = read_request(&request)?.validate()?;
            println!("{}", service.cache_key(&params));
        }
    }
    Ok(())
}
