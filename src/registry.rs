//! Static registry of domains and their sources.
//!
//! Declaration order is significant: `source=all` runs sources in the order
//! they are listed here, and the status surface reports them the same way.

use crate::config::{Config, Credential, Credentials};
use crate::errors::ResolveError;
use crate::fetch::Fetcher;
use crate::models::Schedule;
use crate::scrapers::{
    SourceScraper, cocktaildb, google_books, gutendex, iowa_liquor, nyt_books, openfoodfacts,
    openlibrary, pokemon, punkapi, scryfall, ttb_cola,
};
use crate::transform::{BookTransformer, CardTransformer, SpiritTransformer, Transformer};
use std::fmt;
use std::sync::Arc;

/// Selector that expands to every source of a domain.
pub const ALL_SOURCES: &str = "all";

pub struct SourceDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub schedule: Schedule,
    pub estimated_records: u32,
    /// Credential without which the source is skipped.
    pub requires: Option<Credential>,
    pub scraper: Arc<dyn SourceScraper>,
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("key", &self.key)
            .field("schedule", &self.schedule)
            .field("requires", &self.requires)
            .finish()
    }
}

pub struct DomainDescriptor {
    pub key: &'static str,
    pub table: &'static str,
    pub description: &'static str,
    pub sources: Vec<SourceDescriptor>,
    pub transformer: Arc<dyn Transformer>,
}

impl DomainDescriptor {
    pub fn source_keys(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.key.to_string()).collect()
    }
}

/// A source picked for a run, or the reason it will not run.
#[derive(Debug)]
pub enum Planned<'a> {
    Run(&'a SourceDescriptor),
    Skip {
        source: &'a SourceDescriptor,
        reason: String,
    },
}

impl Planned<'_> {
    pub fn key(&self) -> &'static str {
        match self {
            Planned::Run(s) => s.key,
            Planned::Skip { source, .. } => source.key,
        }
    }
}

pub(crate) fn describe(
    key: &'static str,
    name: &'static str,
    schedule: Schedule,
    estimated_records: u32,
    requires: Option<Credential>,
    scraper: impl SourceScraper + 'static,
) -> SourceDescriptor {
    SourceDescriptor {
        key,
        name,
        schedule,
        estimated_records,
        requires,
        scraper: Arc::new(scraper),
    }
}

pub struct Registry {
    domains: Vec<DomainDescriptor>,
}

impl Registry {
    pub fn from_domains(domains: Vec<DomainDescriptor>) -> Self {
        Self { domains }
    }

    /// The production registry: spirits, cards and books.
    pub fn standard(fetcher: &Fetcher, config: &Config) -> Self {
        let f = || fetcher.clone();

        Self::from_domains(vec![
            DomainDescriptor {
                key: "spirits",
                table: "spirits",
                description: "Beers, wines and spirits from public product catalogs",
                transformer: Arc::new(SpiritTransformer),
                sources: vec![
                    describe(punkapi::KEY, "Punk API", Schedule::Weekly, 325, None,
                        punkapi::PunkApiScraper::new(f(), config)),
                    describe(openfoodfacts::KEY, "Open Food Facts", Schedule::Weekly, 1000, None,
                        openfoodfacts::OpenFoodFactsScraper::new(f(), config)),
                    describe(iowa_liquor::KEY, "Iowa Liquor Products", Schedule::Monthly, 5000, None,
                        iowa_liquor::IowaLiquorScraper::new(f(), config)),
                    describe(cocktaildb::KEY, "TheCocktailDB Ingredients", Schedule::Monthly, 300, None,
                        cocktaildb::CocktailDbScraper::new(f(), config)),
                    describe(ttb_cola::KEY, "TTB COLA Registry", Schedule::Monthly, 200, None,
                        ttb_cola::TtbColaScraper::new(f(), config)),
                ],
            },
            DomainDescriptor {
                key: "cards",
                table: "trading_cards",
                description: "Pokémon and Magic: The Gathering card catalogs",
                transformer: Arc::new(CardTransformer),
                sources: vec![
                    describe(pokemon::KEY, "Pokémon TCG API", Schedule::Weekly, 1000, None,
                        pokemon::PokemonScraper::new(f(), config)),
                    describe(scryfall::KEY, "Scryfall", Schedule::Weekly, 1000, None,
                        scryfall::ScryfallScraper::new(f(), config)),
                ],
            },
            DomainDescriptor {
                key: "books",
                table: "books",
                description: "Book metadata from open catalogs and best-seller lists",
                transformer: Arc::new(BookTransformer),
                sources: vec![
                    describe(openlibrary::KEY, "Open Library", Schedule::Weekly, 1000, None,
                        openlibrary::OpenLibraryScraper::new(f(), config)),
                    describe(gutendex::KEY, "Gutendex", Schedule::Monthly, 500, None,
                        gutendex::GutendexScraper::new(f(), config)),
                    describe(google_books::KEY, "Google Books", Schedule::Weekly, 1000,
                        Some(Credential::GoogleBooks),
                        google_books::GoogleBooksScraper::new(f(), config)),
                    describe(nyt_books::KEY, "NYT Best Sellers", Schedule::Daily, 300,
                        Some(Credential::Nyt),
                        nyt_books::NytBooksScraper::new(f(), config)),
                ],
            },
        ])
    }

    pub fn domains(&self) -> &[DomainDescriptor] {
        &self.domains
    }

    pub fn domain_keys(&self) -> Vec<String> {
        self.domains.iter().map(|d| d.key.to_string()).collect()
    }

    pub fn domain(&self, key: &str) -> Result<&DomainDescriptor, ResolveError> {
        self.domains
            .iter()
            .find(|d| d.key == key)
            .ok_or_else(|| ResolveError::UnknownDomain {
                domain: key.to_string(),
                available: self.domain_keys(),
            })
    }

    /// Sources named by `selector`, in declaration order.
    pub fn resolve(
        &self,
        domain: &str,
        selector: &str,
    ) -> Result<Vec<&SourceDescriptor>, ResolveError> {
        let d = self.domain(domain)?;
        if selector == ALL_SOURCES {
            return Ok(d.sources.iter().collect());
        }
        d.sources
            .iter()
            .find(|s| s.key == selector)
            .map(|s| vec![s])
            .ok_or_else(|| ResolveError::UnknownSource {
                domain: domain.to_string(),
                selector: selector.to_string(),
                valid_sources: d.source_keys(),
            })
    }

    /// [`resolve`](Self::resolve), then mark sources whose credential is
    /// missing as skipped.
    ///
    /// # Arguments
    ///
    /// * `domain` - domain key such as `"books"`
    /// * `selector` - a source key or `"all"`
    /// * `credentials` - configured API keys
    ///
    /// # Returns
    ///
    /// One [`Planned`] entry per selected source, in declaration order, or
    /// the [`ResolveError`] for an unknown domain or source.
    pub fn plan(
        &self,
        domain: &str,
        selector: &str,
        credentials: &Credentials,
    ) -> Result<Vec<Planned<'_>>, ResolveError> {
        Ok(self
            .resolve(domain, selector)?
            .into_iter()
            .map(|s| match s.requires {
                Some(c) if credentials.get(c).is_none() => Planned::Skip {
                    source: s,
                    reason: format!("missing credentials: {} is not configured", c.key()),
                },
                _ => Planned::Run(s),
            })
            .collect())
    }
}
