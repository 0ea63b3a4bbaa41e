//! Scryfall scraper (Magic: The Gathering).
//!
//! Cursor pagination: each search page carries `has_more` and an absolute
//! `next_page` URL. Scryfall asks for 50–100 ms between requests.

use super::paginate::{Page, collect_cursor};
use super::{SourceScraper, at, id_string, items, record};
use crate::config::{Config, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

pub const KEY: &str = "scryfall";
const SEARCH_URL: &str = "https://api.scryfall.com/cards/search?q=game%3Apaper&unique=prints&order=set";

pub fn default_tuning() -> SourceTuning {
    SourceTuning::paged(175, 30, 100, 1000)
}

#[derive(Debug, Clone)]
pub struct ScryfallScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
}

impl ScryfallScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            tuning: config.tuning_for(KEY, default_tuning()),
        }
    }
}

fn parse_card(card: &Value) -> Option<RawRecord> {
    card.as_object()?;
    // Double-faced cards keep their images on the faces.
    let image = match at(card, "image_uris.normal") {
        Value::Null => at(card, "card_faces.0.image_uris.normal").clone(),
        v => v.clone(),
    };
    Some(record([
        ("name", at(card, "name").clone()),
        ("game", json!("magic")),
        ("set_name", at(card, "set_name").clone()),
        ("number", at(card, "collector_number").clone()),
        ("rarity", at(card, "rarity").clone()),
        ("card_type", at(card, "type_line").clone()),
        ("image_url", image),
        ("price", at(card, "prices.usd").clone()),
        ("source_id", id_string(at(card, "id"))),
        (
            "external_ids",
            json!({
                "scryfall_id": at(card, "id"),
                "oracle_id": at(card, "oracle_id"),
                "tcgplayer_id": at(card, "tcgplayer_id"),
            }),
        ),
    ]))
}

/// Records on this page plus the next-page URL when `has_more` is set.
fn parse_page(body: &Value) -> (Page, Option<String>) {
    let cards = Page::of(items(body, "data"), parse_card);
    let next = if at(body, "has_more").as_bool().unwrap_or(false) {
        at(body, "next_page").as_str().map(str::to_string)
    } else {
        None
    };
    (cards, next)
}

#[async_trait]
impl SourceScraper for ScryfallScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        let first = RequestSpec::get(SEARCH_URL).header("Accept", "application/json");
        Ok(collect_cursor(
            &self.fetcher,
            KEY,
            &self.tuning,
            limit.unwrap_or(self.tuning.default_limit),
            first,
            parse_page,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::*;
    use std::sync::Arc;

    #[test]
    fn test_parse_page_ignores_next_without_has_more() {
        let body = json!({"data": [{"id": "a", "name": "Opt"}], "has_more": false, "next_page": "https://x"});
        let (cards, next) = parse_page(&body);
        assert_eq!(cards.records.len(), 1);
        assert!(next.is_none());
    }

    #[test]
    fn test_double_faced_card_image() {
        let card = json!({"id": "b", "name": "Delver of Secrets // Insectile Aberration",
            "card_faces": [{"image_uris": {"normal": "https://img/front.jpg"}}]});
        assert_eq!(parse_card(&card).unwrap()["image_url"], "https://img/front.jpg");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_follows_next_page() {
        let t = Arc::new(
            ScriptedTransport::new()
                .route("page=2", vec![ok(r#"{"data":[{"id":"c2","name":"Shock","prices":{"usd":"0.10"}}],"has_more":false}"#)])
                .route(
                    "cards/search",
                    vec![ok(r#"{"data":[{"id":"c1","name":"Opt"}],"has_more":true,"next_page":"https://api.scryfall.com/cards/search?page=2"}"#)],
                ),
        );
        let out = ScryfallScraper::new(Fetcher::new(t.clone()), &Config::default())
            .fetch(None)
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1]["price"], "0.10");
        assert_eq!(t.requests().len(), 2);
    }
}
