//! Process configuration, built once in `main` and passed by reference.
//!
//! Per-source page sizes, page caps and throttle delays have in-code
//! defaults (see the scraper modules); a YAML tuning file may override any
//! of them per source key:
//!
//! ```yaml
//! scryfall:
//!   delay_ms: 150
//!   max_pages: 20
//! ttb_cola:
//!   years: [2023, 2024]
//!   ids_per_year: 500
//! ```

use crate::cli::Cli;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument};

/// Datastore endpoint and service credential.
#[derive(Debug, Clone)]
pub struct DatastoreConfig {
    pub url: String,
    pub service_key: String,
}

/// Third-party API credentials that some sources depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    PokemonTcg,
    GoogleBooks,
    Nyt,
}

impl Credential {
    pub const ALL: [Credential; 3] = [Credential::PokemonTcg, Credential::GoogleBooks, Credential::Nyt];

    /// Name used in the status report.
    pub fn key(self) -> &'static str {
        match self {
            Credential::PokemonTcg => "pokemon_tcg",
            Credential::GoogleBooks => "google_books",
            Credential::Nyt => "nyt",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub pokemon_tcg: Option<String>,
    pub google_books: Option<String>,
    pub nyt: Option<String>,
}

impl Credentials {
    pub fn get(&self, credential: Credential) -> Option<&str> {
        let value = match credential {
            Credential::PokemonTcg => &self.pokemon_tcg,
            Credential::GoogleBooks => &self.google_books,
            Credential::Nyt => &self.nyt,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// Effective pacing for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTuning {
    /// Records requested per page.
    pub page_size: usize,
    /// Hard cap on pages (or keys) visited, regardless of `limit`.
    pub max_pages: usize,
    /// Sleep inserted between consecutive requests.
    pub delay: Duration,
    /// Default record cap when the caller gives none.
    pub default_limit: usize,
    /// Keyspace prefixes (years) for enumerating sources.
    pub years: Vec<i32>,
}

impl SourceTuning {
    pub fn paged(page_size: usize, max_pages: usize, delay_ms: u64, default_limit: usize) -> Self {
        Self {
            page_size,
            max_pages,
            delay: Duration::from_millis(delay_ms),
            default_limit,
            years: Vec::new(),
        }
    }

    fn apply(&mut self, o: &TuningOverride) {
        if let Some(v) = o.page_size {
            self.page_size = v.max(1);
        }
        if let Some(v) = o.max_pages {
            self.max_pages = v;
        }
        if let Some(v) = o.delay_ms {
            self.delay = Duration::from_millis(v);
        }
        if let Some(v) = o.default_limit {
            self.default_limit = v;
        }
        if let Some(v) = o.ids_per_year {
            self.max_pages = v;
        }
        if let Some(v) = &o.years {
            self.years = v.clone();
        }
    }
}

/// One entry of the YAML tuning file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TuningOverride {
    pub page_size: Option<usize>,
    pub max_pages: Option<usize>,
    pub delay_ms: Option<u64>,
    pub default_limit: Option<usize>,
    pub ids_per_year: Option<usize>,
    pub years: Option<Vec<i32>>,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub datastore: Option<DatastoreConfig>,
    pub credentials: Credentials,
    pub tuning: HashMap<String, TuningOverride>,
    pub upload: UploadSettings,
}

impl Config {
    #[instrument(level = "info", skip_all)]
    pub fn from_cli(cli: &Cli) -> Result<Self, Box<dyn Error>> {
        let datastore = match (&cli.datastore_url, &cli.datastore_key) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Some(DatastoreConfig {
                    url: url.trim_end_matches('/').to_string(),
                    service_key: key.clone(),
                })
            }
            _ => None,
        };

        let tuning = match &cli.tuning_file {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                let parsed = parse_tuning(&text)?;
                info!(path = %path, sources = parsed.len(), "Loaded tuning overrides");
                parsed
            }
            None => HashMap::new(),
        };

        Ok(Self {
            datastore,
            credentials: Credentials {
                pokemon_tcg: cli.pokemon_api_key.clone(),
                google_books: cli.google_books_api_key.clone(),
                nyt: cli.nyt_api_key.clone(),
            },
            tuning,
            upload: UploadSettings::default(),
        })
    }

    /// `defaults` with any YAML override for `source` applied.
    pub fn tuning_for(&self, source: &str, defaults: SourceTuning) -> SourceTuning {
        let mut tuning = defaults;
        if let Some(o) = self.tuning.get(source) {
            tuning.apply(o);
        }
        tuning
    }
}

pub fn parse_tuning(text: &str) -> Result<HashMap<String, TuningOverride>, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(HashMap::new());
    }
    serde_yaml::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tuning_file() {
        let yaml = "scryfall:\n  delay_ms: 150\n  max_pages: 20\nttb_cola:\n  years: [2023, 2024]\n  ids_per_year: 500\n";
        let parsed = parse_tuning(yaml).unwrap();
        assert_eq!(parsed["scryfall"].delay_ms, Some(150));
        assert_eq!(parsed["ttb_cola"].years, Some(vec![2023, 2024]));
    }

    #[test]
    fn test_unknown_tuning_key_rejected() {
        assert!(parse_tuning("punkapi:\n  delay: 5\n").is_err());
    }

    #[test]
    fn test_empty_tuning_file() {
        assert!(parse_tuning("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_tuning_for_applies_override() {
        let mut config = Config::default();
        config.tuning = parse_tuning("punkapi:\n  delay_ms: 0\n  page_size: 10\n").unwrap();
        let t = config.tuning_for("punkapi", SourceTuning::paged(80, 10, 500, 500));
        assert_eq!(t.delay, Duration::ZERO);
        assert_eq!(t.page_size, 10);
        assert_eq!(t.max_pages, 10);

        let untouched = config.tuning_for("scryfall", SourceTuning::paged(175, 5, 100, 500));
        assert_eq!(untouched.delay, Duration::from_millis(100));
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let creds = Credentials {
            nyt: Some("  ".into()),
            google_books: Some("key".into()),
            ..Default::default()
        };
        assert_eq!(creds.get(Credential::Nyt), None);
        assert_eq!(creds.get(Credential::GoogleBooks), Some("key"));
        assert_eq!(creds.get(Credential::PokemonTcg), None);
    }
}
