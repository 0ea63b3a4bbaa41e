//! Source scrapers, one module per external provider.
//!
//! Every scraper implements [`SourceScraper`] and turns one provider's
//! payloads into [`RawRecord`]s keyed by the domain's conventional field
//! names. The three driving patterns live in [`paginate`]:
//!
//! | Source | Module | Pattern | Notes |
//! |--------|--------|---------|-------|
//! | Punk API | [`punkapi`] | page | BrewDog beer catalog |
//! | Open Food Facts | [`openfoodfacts`] | page | alcoholic-beverages category |
//! | Iowa liquor products | [`iowa_liquor`] | offset | Socrata dataset, proof not ABV |
//! | TheCocktailDB | [`cocktaildb`] | listing + keyed detail | alcoholic ingredients only |
//! | TTB COLA registry | [`ttb_cola`] | keyspace enumeration | HTML, best effort |
//! | Pokémon TCG | [`pokemon`] | page | optional API key |
//! | Scryfall | [`scryfall`] | cursor | Magic: The Gathering |
//! | Open Library | [`openlibrary`] | offset | subject search |
//! | Gutendex | [`gutendex`] | cursor | Project Gutenberg |
//! | Google Books | [`google_books`] | offset | requires API key |
//! | NYT Books | [`nyt_books`] | single overview fetch | requires API key |
//!
//! A fetch failure inside a pagination loop ends that source early with
//! the records gathered so far.

pub mod cocktaildb;
pub mod google_books;
pub mod gutendex;
pub mod iowa_liquor;
pub mod nyt_books;
pub mod openfoodfacts;
pub mod openlibrary;
pub mod paginate;
pub mod pokemon;
pub mod punkapi;
pub mod scryfall;
pub mod ttb_cola;

use crate::errors::ScrapeError;
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::Value;

/// Collects raw records for one external source.
#[async_trait]
pub trait SourceScraper: Send + Sync {
    /// Gather at most `limit` records (the source default when `None`).
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError>;
}

/// Builds a [`RawRecord`] from `(key, value)` pairs, dropping nulls.
pub(crate) fn record<I>(fields: I) -> RawRecord
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    fields
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Walk a dotted path (`"set.name"`, `"images.0"`) into a JSON value.
pub(crate) fn at<'a>(value: &'a Value, path: &str) -> &'a Value {
    path.split('.').fold(value, |v, seg| match seg.parse::<usize>() {
        Ok(idx) if v.is_array() => &v[idx],
        _ => &v[seg],
    })
}

/// Identifier as a JSON string (`7` → `"7"`); null when absent.
pub(crate) fn id_string(value: &Value) -> Value {
    match value {
        Value::String(s) if !s.is_empty() => Value::String(s.clone()),
        Value::Number(n) => Value::String(n.to_string()),
        _ => Value::Null,
    }
}

/// The array at `path`, or an empty slice.
pub(crate) fn items<'a>(value: &'a Value, path: &str) -> &'a [Value] {
    at(value, path).as_array().map(Vec::as_slice).unwrap_or(&[])
}
