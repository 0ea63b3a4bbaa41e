//! TheCocktailDB ingredient scraper.
//!
//! The API has no paged listing of ingredient details, only a flat name
//! list. Each name is then looked up individually through the keyspace
//! driver; non-alcoholic ingredients and empty lookups are skipped.

use super::paginate::enumerate_keys;
use super::{SourceScraper, at, id_string, items, record};
use crate::config::{Config, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, HttpResponse, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, instrument};

pub const KEY: &str = "cocktaildb";
const API_URL: &str = "https://www.thecocktaildb.com/api/json/v1/1";

pub fn default_tuning() -> SourceTuning {
    SourceTuning::paged(1, 1000, 300, 500)
}

#[derive(Debug, Clone)]
pub struct CocktailDbScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
}

impl CocktailDbScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            tuning: config.tuning_for(KEY, default_tuning()),
        }
    }
}

fn ingredient_names(listing: &Value) -> Vec<String> {
    items(listing, "drinks")
        .iter()
        .filter_map(|d| at(d, "strIngredient1").as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_ingredient(_name: &str, resp: &HttpResponse) -> Option<RawRecord> {
    let body: Value = resp.json().ok()?;
    let ing = items(&body, "ingredients").first()?;
    if !at(ing, "strAlcohol").as_str()?.eq_ignore_ascii_case("yes") {
        return None;
    }
    Some(record([
        ("name", at(ing, "strIngredient").clone()),
        ("category", at(ing, "strType").clone()),
        ("abv", at(ing, "strABV").clone()),
        ("description", at(ing, "strDescription").clone()),
        ("source_id", id_string(at(ing, "idIngredient"))),
        ("external_ids", json!({ "cocktaildb_id": at(ing, "idIngredient") })),
    ]))
}

#[async_trait]
impl SourceScraper for CocktailDbScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        let listing: Value = self
            .fetcher
            .fetch_json(&RequestSpec::get(format!("{API_URL}/list.php?i=list")))
            .await?;
        let names = ingredient_names(&listing);
        info!(count = names.len(), "Listed ingredients");

        Ok(enumerate_keys(
            &self.fetcher,
            KEY,
            &self.tuning,
            limit.unwrap_or(self.tuning.default_limit),
            names.into_iter().take(self.tuning.max_pages),
            |name| {
                RequestSpec::get(format!(
                    "{API_URL}/search.php?i={}",
                    urlencoding::encode(name)
                ))
            },
            parse_ingredient,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::*;
    use std::sync::Arc;

    const LISTING: &str = r#"{"drinks":[{"strIngredient1":"Light rum"},{"strIngredient1":"Lemon"},{"strIngredient1":"Nope"}]}"#;

    #[tokio::test(start_paused = true)]
    async fn test_fetch_keeps_alcoholic_ingredients() {
        let t = Arc::new(
            ScriptedTransport::new()
                .route("list.php", vec![ok(LISTING)])
                .route(
                    "i=Light%20rum",
                    vec![ok(r#"{"ingredients":[{"idIngredient":"1","strIngredient":"Light rum","strType":"Rum","strAlcohol":"Yes","strABV":"40"}]}"#)],
                )
                .route(
                    "i=Lemon",
                    vec![ok(r#"{"ingredients":[{"idIngredient":"2","strIngredient":"Lemon","strAlcohol":"No"}]}"#)],
                )
                .route("i=Nope", vec![ok(r#"{"ingredients":null}"#)]),
        );
        let scraper = CocktailDbScraper::new(Fetcher::new(t.clone()), &Config::default());
        let out = scraper.fetch(None).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["name"], "Light rum");
        assert_eq!(out[0]["abv"], "40");
        assert_eq!(t.count("search.php"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_failure_is_an_error() {
        let t = Arc::new(ScriptedTransport::new().route("list.php", vec![status(500)]));
        let scraper = CocktailDbScraper::new(Fetcher::new(t), &Config::default());
        assert!(matches!(scraper.fetch(None).await, Err(ScrapeError::Fetch(_))));
    }
}
