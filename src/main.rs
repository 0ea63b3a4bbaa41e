//! # Catalog Scrape
//!
//! Scrapes public catalogs of beverages, trading cards and books, normalizes
//! every record into its domain's canonical row and bulk-uploads the rows to
//! a shared datastore.
//!
//! ## Usage
//!
//! ```sh
//! catalog_scrape scrape --type spirits --source punkapi --skip-upload
//! catalog_scrape status
//! catalog_scrape request '/scrape?type=cards&source=all&limit=50'
//! ```
//!
//! ## Architecture
//!
//! 1. **Resolve**: the registry maps `type`/`source` to scrapers
//! 2. **Scrape**: each source pages through its API behind a retrying fetcher
//! 3. **Transform**: raw records become canonical rows
//! 4. **Upload**: rows go to the datastore in ignore-duplicate batches
//!
//! Sources run one after another; a failing source is reported and skipped.

use clap::Parser;
use serde::Serialize;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod errors;
mod fetch;
mod models;
mod orchestrator;
mod registry;
mod scrapers;
mod surface;
mod transform;
mod upload;
mod utils;

use cli::{Cli, Command};
use config::Config;
use fetch::{Fetcher, ReqwestTransport, Transport};
use orchestrator::{Orchestrator, ScrapeRequest};
use registry::Registry;
use upload::Uploader;

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("catalog_scrape starting up");

    let args = Cli::parse();
    debug!(command = ?args.command, "Parsed CLI arguments");

    let config = Config::from_cli(&args)?;
    info!(
        datastore = config.datastore.is_some(),
        tuned_sources = config.tuning.len(),
        "Configuration loaded"
    );

    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
    let registry = Registry::standard(&Fetcher::new(Arc::clone(&transport)), &config);
    let uploader = Uploader::new(transport, config.datastore.clone(), config.upload.clone());
    let orch = Orchestrator::new(registry, config.credentials.clone(), uploader);

    match args.command {
        Command::Scrape {
            domain,
            source,
            skip_upload,
            limit,
        } => {
            let request = ScrapeRequest {
                domain,
                source,
                skip_upload,
                limit,
            };
            let report = orch.run(&request).await?;
            print_json(&report)?;
        }
        Command::Status => {
            print_json(&surface::status(&orch).await)?;
        }
        Command::Request { target } => {
            let resp = surface::handle(&orch, &target).await;
            print_json(&resp)?;
        }
    }

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "catalog_scrape finished"
    );
    Ok(())
}
