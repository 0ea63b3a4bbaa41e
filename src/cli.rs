//! Command-line interface definitions.
//!
//! Every credential can be given as a flag or through the environment, so
//! a cron job only needs the environment set.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the datastore REST endpoint
    #[arg(long, env = "SUPABASE_URL", global = true)]
    pub datastore_url: Option<String>,

    /// Service credential for the datastore
    #[arg(long, env = "SUPABASE_SERVICE_KEY", global = true, hide_env_values = true)]
    pub datastore_key: Option<String>,

    /// Pokémon TCG API key (raises the anonymous rate limit)
    #[arg(long, env = "POKEMON_TCG_API_KEY", global = true, hide_env_values = true)]
    pub pokemon_api_key: Option<String>,

    /// Google Books API key; the google_books source is skipped without it
    #[arg(long, env = "GOOGLE_BOOKS_API_KEY", global = true, hide_env_values = true)]
    pub google_books_api_key: Option<String>,

    /// New York Times API key; the nyt_books source is skipped without it
    #[arg(long, env = "NYT_API_KEY", global = true, hide_env_values = true)]
    pub nyt_api_key: Option<String>,

    /// YAML file overriding per-source page sizes, caps and delays
    #[arg(long, env = "SCRAPE_TUNING_FILE", global = true)]
    pub tuning_file: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape one domain and print the JSON report
    Scrape {
        /// Domain to scrape (spirits, cards, books)
        #[arg(short = 't', long = "type")]
        domain: String,

        /// Source key, or "all"
        #[arg(short, long, default_value = "all")]
        source: String,

        /// Scrape and transform only; nothing is uploaded
        #[arg(long)]
        skip_upload: bool,

        /// Per-source record cap for this run
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print registered scrapers and connection state
    Status,
    /// Route a raw request target such as `/scrape?type=cards&source=all`
    Request {
        target: String,
    },
}
