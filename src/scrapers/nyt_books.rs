//! New York Times best-seller overview scraper.
//!
//! One request returns every current list; books are flattened across
//! lists. Requires an API key; the registry skips this source without one.

use super::{SourceScraper, at, id_string, items, record};
use crate::config::{Config, Credential};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, instrument};

pub const KEY: &str = "nyt_books";
const OVERVIEW_URL: &str = "https://api.nytimes.com/svc/books/v3/lists/full-overview.json";
const DEFAULT_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct NytBooksScraper {
    fetcher: Fetcher,
    api_key: Option<String>,
}

impl NytBooksScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            api_key: config.credentials.get(Credential::Nyt).map(str::to_string),
        }
    }
}

fn parse_book(list_name: &Value, book: &Value) -> Option<RawRecord> {
    book.as_object()?;
    let isbn = match at(book, "primary_isbn13") {
        Value::String(s) if !s.is_empty() => json!(s),
        _ => at(book, "primary_isbn10").clone(),
    };
    Some(record([
        ("title", at(book, "title").clone()),
        ("authors", at(book, "author").clone()),
        ("source_id", id_string(&isbn)),
        ("isbn", isbn),
        ("publisher", at(book, "publisher").clone()),
        ("description", at(book, "description").clone()),
        ("cover_url", at(book, "book_image").clone()),
        (
            "external_ids",
            json!({ "nyt_list": list_name, "rank": at(book, "rank") }),
        ),
    ]))
}

pub fn parse_overview(body: &Value) -> Vec<RawRecord> {
    items(body, "results.lists")
        .iter()
        .flat_map(|list| {
            let name = at(list, "list_name");
            items(list, "books")
                .iter()
                .filter_map(move |b| parse_book(name, b))
        })
        .collect()
}

#[async_trait]
impl SourceScraper for NytBooksScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ScrapeError::InvalidRequest("NYT_API_KEY is not set".into()))?;
        let url = format!("{OVERVIEW_URL}?api-key={}", urlencoding::encode(key));

        let body: Value = self.fetcher.fetch_json(&RequestSpec::get(url)).await?;
        let mut books = parse_overview(&body);
        books.truncate(limit.unwrap_or(DEFAULT_LIMIT));
        info!(count = books.len(), "Parsed best-seller lists");
        Ok(books)
    }
}
