//! Pokémon TCG API scraper.
//!
//! Works anonymously; an API key only lifts the rate limit, so it is sent
//! when configured and never required.

use super::paginate::{Page, collect_pages};
use super::{SourceScraper, at, id_string, items, record};
use crate::config::{Config, Credential, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

pub const KEY: &str = "pokemon";
const CARDS_URL: &str = "https://api.pokemontcg.io/v2/cards";

pub fn default_tuning() -> SourceTuning {
    SourceTuning::paged(250, 20, 500, 1000)
}

#[derive(Debug, Clone)]
pub struct PokemonScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
    api_key: Option<String>,
}

impl PokemonScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            tuning: config.tuning_for(KEY, default_tuning()),
            api_key: config
                .credentials
                .get(Credential::PokemonTcg)
                .map(str::to_string),
        }
    }

    fn request(&self, page: usize) -> RequestSpec {
        let req = RequestSpec::get(format!(
            "{CARDS_URL}?page={}&pageSize={}&orderBy=set.releaseDate",
            page + 1,
            self.tuning.page_size
        ));
        match &self.api_key {
            Some(key) => req.header("X-Api-Key", key.as_str()),
            None => req,
        }
    }
}

/// Highest market price across the card's TCGplayer printings.
fn market_price(card: &Value) -> Value {
    at(card, "tcgplayer.prices")
        .as_object()
        .into_iter()
        .flat_map(|printings| printings.values())
        .filter_map(|p| at(p, "market").as_f64())
        .fold(None, |best: Option<f64>, p| Some(best.map_or(p, |b| b.max(p))))
        .map(|p| json!(p))
        .unwrap_or(Value::Null)
}

fn parse_card(card: &Value) -> Option<RawRecord> {
    card.as_object()?;
    Some(record([
        ("name", at(card, "name").clone()),
        ("game", json!("pokemon")),
        ("set_name", at(card, "set.name").clone()),
        ("number", at(card, "number").clone()),
        ("rarity", at(card, "rarity").clone()),
        ("card_type", at(card, "supertype").clone()),
        ("image_url", at(card, "images.small").clone()),
        ("price", market_price(card)),
        ("source_id", id_string(at(card, "id"))),
        (
            "external_ids",
            json!({ "pokemontcg_id": at(card, "id"), "set_id": at(card, "set.id") }),
        ),
    ]))
}

#[async_trait]
impl SourceScraper for PokemonScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        collect_pages(
            &self.fetcher,
            KEY,
            &self.tuning,
            limit.unwrap_or(self.tuning.default_limit),
            |page| Ok(self.request(page)),
            |body| Page::of(items(body, "data"), parse_card),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::*;
    use std::sync::Arc;

    const PAGE: &str = r#"{"data":[
        {"id":"base1-4","name":"Charizard","supertype":"Pokémon","number":"4","rarity":"Rare Holo",
         "set":{"id":"base1","name":"Base"},"images":{"small":"https://images.pokemontcg.io/base1/4.png"},
         "tcgplayer":{"prices":{"holofoil":{"market":350.0},"1stEditionHolofoil":{"market":5000.0}}}},
        {"id":"base1-58","name":"Pikachu","number":"58"}
    ]}"#;

    #[test]
    fn test_parse_card_picks_highest_market_price() {
        let body: Value = serde_json::from_str(PAGE).unwrap();
        let cards: Vec<RawRecord> = items(&body, "data").iter().filter_map(parse_card).collect();
        assert_eq!(cards[0]["price"], 5000.0);
        assert_eq!(cards[0]["set_name"], "Base");
        assert!(cards[1].get("price").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_key_header_sent_when_configured() {
        let mut config = Config::default();
        config.credentials.pokemon_tcg = Some("secret".into());
        let t = Arc::new(
            ScriptedTransport::new()
                .route("page=1&", vec![ok(PAGE)])
                .route("page=2&", vec![ok(r#"{"data":[]}"#)]),
        );
        let out = PokemonScraper::new(Fetcher::new(t.clone()), &config)
            .fetch(None)
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(t.requests()[0]
            .headers
            .contains(&("X-Api-Key".to_string(), "secret".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_anonymous_request_has_no_key() {
        let t = Arc::new(ScriptedTransport::new().route("page=1&", vec![ok(r#"{"data":[]}"#)]));
        PokemonScraper::new(Fetcher::new(t.clone()), &Config::default())
            .fetch(None)
            .await
            .unwrap();
        assert!(t.requests()[0].headers.is_empty());
    }
}
