//! Google Books volumes scraper (`startIndex` offsets, 40 per page max).
//!
//! Requires an API key; the registry skips this source without one.

use super::paginate::{Page, collect_pages};
use super::{SourceScraper, at, id_string, items, record};
use crate::config::{Config, Credential, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

pub const KEY: &str = "google_books";
const VOLUMES_URL: &str = "https://www.googleapis.com/books/v1/volumes";
const QUERY: &str = "subject:fiction";

pub fn default_tuning() -> SourceTuning {
    SourceTuning::paged(40, 25, 1000, 1000)
}

#[derive(Debug, Clone)]
pub struct GoogleBooksScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
    api_key: Option<String>,
}

impl GoogleBooksScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        let mut tuning = config.tuning_for(KEY, default_tuning());
        tuning.page_size = tuning.page_size.min(40);
        Self {
            fetcher,
            tuning,
            api_key: config
                .credentials
                .get(Credential::GoogleBooks)
                .map(str::to_string),
        }
    }

    fn request(&self, key: &str, page: usize) -> Result<RequestSpec, ScrapeError> {
        let size = self.tuning.page_size;
        let url = Url::parse_with_params(
            VOLUMES_URL,
            &[
                ("q", QUERY.to_string()),
                ("printType", "books".to_string()),
                ("maxResults", size.to_string()),
                ("startIndex", (page * size).to_string()),
                ("key", key.to_string()),
            ],
        )?;
        Ok(RequestSpec::get(url.to_string()))
    }
}

/// ISBN-13 when present, else the first industry identifier.
fn isbn(info: &Value) -> Value {
    let ids = items(info, "industryIdentifiers");
    ids.iter()
        .find(|i| at(i, "type") == "ISBN_13")
        .or_else(|| ids.first())
        .map(|i| at(i, "identifier").clone())
        .unwrap_or(Value::Null)
}

fn parse_volume(volume: &Value) -> Option<RawRecord> {
    let info = at(volume, "volumeInfo");
    info.as_object()?;
    Some(record([
        ("title", at(info, "title").clone()),
        ("authors", at(info, "authors").clone()),
        ("isbn", isbn(info)),
        ("publisher", at(info, "publisher").clone()),
        ("published_date", at(info, "publishedDate").clone()),
        ("page_count", at(info, "pageCount").clone()),
        ("language", at(info, "language").clone()),
        ("description", at(info, "description").clone()),
        ("cover_url", at(info, "imageLinks.thumbnail").clone()),
        ("source_id", id_string(at(volume, "id"))),
        ("external_ids", json!({ "google_volume_id": at(volume, "id") })),
    ]))
}

#[async_trait]
impl SourceScraper for GoogleBooksScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ScrapeError::InvalidRequest("GOOGLE_BOOKS_API_KEY is not set".into()))?;
        collect_pages(
            &self.fetcher,
            KEY,
            &self.tuning,
            limit.unwrap_or(self.tuning.default_limit),
            |page| self.request(key, page),
            |body| Page::of(items(body, "items"), parse_volume),
        )
        .await
    }
}
