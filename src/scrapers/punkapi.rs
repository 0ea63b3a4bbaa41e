//! Punk API scraper (BrewDog's public beer catalog).
//!
//! Plain page pagination: `?page=N&per_page=80`, an empty array marks the end.

use super::paginate::{Page, collect_pages};
use super::{SourceScraper, at, id_string, record};
use crate::config::{Config, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

pub const KEY: &str = "punkapi";
const BASE_URL: &str = "https://api.punkapi.com/v2/beers";

pub fn default_tuning() -> SourceTuning {
    SourceTuning::paged(80, 10, 500, 500)
}

#[derive(Debug, Clone)]
pub struct PunkApiScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
}

impl PunkApiScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            tuning: config.tuning_for(KEY, default_tuning()),
        }
    }
}

fn parse_beer(beer: &Value) -> Option<RawRecord> {
    beer.as_object()?;
    Some(record([
        ("name", at(beer, "name").clone()),
        ("brand", json!("BrewDog")),
        ("category", json!("beer")),
        ("abv", at(beer, "abv").clone()),
        ("description", at(beer, "description").clone()),
        ("country", json!("United Kingdom")),
        ("image_url", at(beer, "image_url").clone()),
        ("source_id", id_string(at(beer, "id"))),
        (
            "external_ids",
            json!({ "punkapi_id": at(beer, "id"), "tagline": at(beer, "tagline") }),
        ),
    ]))
}

#[async_trait]
impl SourceScraper for PunkApiScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        let per_page = self.tuning.page_size;
        collect_pages(
            &self.fetcher,
            KEY,
            &self.tuning,
            limit.unwrap_or(self.tuning.default_limit),
            |page| {
                Ok(RequestSpec::get(format!(
                    "{BASE_URL}?page={}&per_page={per_page}",
                    page + 1
                )))
            },
            |body| Page::of(body.as_array().map(Vec::as_slice).unwrap_or(&[]), parse_beer),
        )
        .await
    }
}
