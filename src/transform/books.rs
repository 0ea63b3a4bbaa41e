//! `books` table normalization.

use super::{
    SOURCE_ID_MAX, SOURCE_MAX, Transformer, external_ids, first_text, integer, now_rfc3339, text,
};
use crate::models::{BookRecord, CanonicalRecord, RawRecord};
use once_cell::sync::Lazy;
use regex::Regex;

pub const TITLE_MAX: usize = 500;
pub const AUTHORS_MAX: usize = 500;
pub const ISBN_MAX: usize = 20;
pub const PUBLISHER_MAX: usize = 255;
pub const LANGUAGE_MAX: usize = 20;
pub const DESCRIPTION_MAX: usize = 2000;
pub const COVER_URL_MAX: usize = 500;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

/// First four-digit run in a date-ish string ("2004-05-01", "May 2004").
pub fn year_of(s: &str) -> Option<i32> {
    YEAR_RE
        .captures(s)
        .and_then(|c| c[1].parse::<i32>().ok())
        .filter(|y| (0..=2100).contains(y))
}

fn isbn(raw: &RawRecord) -> String {
    let cleaned: String = text(raw, "isbn", 100)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    cleaned.chars().take(ISBN_MAX).collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BookTransformer;

impl Transformer for BookTransformer {
    fn apply(&self, raw: &RawRecord) -> CanonicalRecord {
        let published_year = integer(raw, "published_year")
            .and_then(|y| i32::try_from(y).ok())
            .filter(|y| (0..=2100).contains(y))
            .or_else(|| year_of(&text(raw, "published_date", 100)));

        CanonicalRecord::Book(BookRecord {
            title: first_text(raw, &["title", "name"], TITLE_MAX),
            authors: text(raw, "authors", AUTHORS_MAX),
            isbn: isbn(raw),
            publisher: text(raw, "publisher", PUBLISHER_MAX),
            published_year,
            page_count: integer(raw, "page_count").filter(|n| *n > 0),
            language: text(raw, "language", LANGUAGE_MAX),
            description: text(raw, "description", DESCRIPTION_MAX),
            cover_url: text(raw, "cover_url", COVER_URL_MAX),
            source: text(raw, "source", SOURCE_MAX),
            source_id: text(raw, "source_id", SOURCE_ID_MAX),
            external_ids: external_ids(raw),
            scraped_at: now_rfc3339(),
        })
    }
}
