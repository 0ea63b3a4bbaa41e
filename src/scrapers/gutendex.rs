//! Gutendex (Project Gutenberg catalog) scraper; follows the `next` cursor.

use super::paginate::{Page, collect_cursor};
use super::{SourceScraper, at, id_string, items, record};
use crate::config::{Config, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use itertools::Itertools;
use serde_json::{Value, json};
use tracing::instrument;

pub const KEY: &str = "gutendex";
const BOOKS_URL: &str = "https://gutendex.com/books/?sort=popular";

pub fn default_tuning() -> SourceTuning {
    SourceTuning::paged(32, 30, 500, 500)
}

#[derive(Debug, Clone)]
pub struct GutendexScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
}

impl GutendexScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            tuning: config.tuning_for(KEY, default_tuning()),
        }
    }
}

fn parse_book(book: &Value) -> Option<RawRecord> {
    book.as_object()?;
    let authors = items(book, "authors")
        .iter()
        .filter_map(|a| at(a, "name").as_str())
        .join("; ");
    Some(record([
        ("title", at(book, "title").clone()),
        ("authors", json!(authors)),
        ("publisher", json!("Project Gutenberg")),
        ("language", at(book, "languages.0").clone()),
        ("description", at(book, "summaries.0").clone()),
        ("cover_url", at(book, "formats.image/jpeg").clone()),
        ("source_id", id_string(at(book, "id"))),
        ("external_ids", json!({ "gutenberg_id": at(book, "id") })),
    ]))
}

fn parse_page(body: &Value) -> (Page, Option<String>) {
    let books = Page::of(items(body, "results"), parse_book);
    (books, at(body, "next").as_str().map(str::to_string))
}

#[async_trait]
impl SourceScraper for GutendexScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        Ok(collect_cursor(
            &self.fetcher,
            KEY,
            &self.tuning,
            limit.unwrap_or(self.tuning.default_limit),
            RequestSpec::get(BOOKS_URL),
            parse_page,
        )
        .await)
    }
}
