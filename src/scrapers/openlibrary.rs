//! Open Library search scraper, offset-paginated over a subject query.

use super::paginate::{Page, collect_pages};
use super::{SourceScraper, at, id_string, items, record};
use crate::config::{Config, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

pub const KEY: &str = "openlibrary";
const SEARCH_URL: &str = "https://openlibrary.org/search.json";
const SUBJECT: &str = "subject:fiction";
const FIELDS: &str = "key,title,author_name,isbn,publisher,first_publish_year,number_of_pages_median,language,cover_i";

pub fn default_tuning() -> SourceTuning {
    SourceTuning::paged(100, 10, 1000, 1000)
}

#[derive(Debug, Clone)]
pub struct OpenLibraryScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
}

impl OpenLibraryScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            tuning: config.tuning_for(KEY, default_tuning()),
        }
    }

    fn request(&self, page: usize) -> Result<RequestSpec, ScrapeError> {
        let size = self.tuning.page_size;
        let url = Url::parse_with_params(
            SEARCH_URL,
            &[
                ("q", SUBJECT.to_string()),
                ("fields", FIELDS.to_string()),
                ("limit", size.to_string()),
                ("offset", (page * size).to_string()),
            ],
        )?;
        Ok(RequestSpec::get(url.to_string()))
    }
}

fn parse_doc(doc: &Value) -> Option<RawRecord> {
    doc.as_object()?;
    let cover = at(doc, "cover_i")
        .as_i64()
        .map(|id| json!(format!("https://covers.openlibrary.org/b/id/{id}-L.jpg")))
        .unwrap_or(Value::Null);
    Some(record([
        ("title", at(doc, "title").clone()),
        ("authors", at(doc, "author_name").clone()),
        ("isbn", at(doc, "isbn.0").clone()),
        ("publisher", at(doc, "publisher.0").clone()),
        ("published_year", at(doc, "first_publish_year").clone()),
        ("page_count", at(doc, "number_of_pages_median").clone()),
        ("language", at(doc, "language.0").clone()),
        ("cover_url", cover),
        ("source_id", id_string(at(doc, "key"))),
        ("external_ids", json!({ "openlibrary_key": at(doc, "key") })),
    ]))
}

#[async_trait]
impl SourceScraper for OpenLibraryScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        collect_pages(
            &self.fetcher,
            KEY,
            &self.tuning,
            limit.unwrap_or(self.tuning.default_limit),
            |page| self.request(page),
            |body| Page::of(items(body, "docs"), parse_doc),
        )
        .await
    }
}
