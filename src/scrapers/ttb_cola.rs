//! TTB COLA public registry scraper (best effort).
//!
//! The registry has no listing API. IDs are 14 digits: a two-digit year
//! prefix followed by a sequence number, so the keyspace is walked year by
//! year. Each ID is one HTML detail page; pages without a brand name are
//! "no record" answers and are skipped.
//!
//! Field extraction is label matching on the page text and breaks whenever
//! the registry markup changes. Failures stay inside this source.

use super::paginate::enumerate_keys;
use super::{SourceScraper, record};
use crate::config::{Config, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, HttpResponse, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::json;
use tracing::instrument;

pub const KEY: &str = "ttb_cola";
const DETAIL_URL: &str =
    "https://ttbonline.gov/colasonline/viewColaDetails.do?action=publicDisplaySearchBasic&ttbid=";

static BRAND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*Brand Name:\s*(.+)$").unwrap());
static FANCIFUL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Fanciful Name:\s*(.+)$").unwrap());
static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Class/Type Description:\s*(.+)$").unwrap());
static ORIGIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Origin(?: Code)?:\s*(.+)$").unwrap());
static ALCOHOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)alcohol content:\s*(\d+(?:\.\d+)?)\s*%").unwrap());

pub fn default_tuning() -> SourceTuning {
    // Undocumented rate budget; stay slow.
    SourceTuning::paged(1, 200, 1000, 200)
}

#[derive(Debug, Clone)]
pub struct TtbColaScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
}

impl TtbColaScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            tuning: config.tuning_for(KEY, default_tuning()),
        }
    }

    /// Configured years, or this year and last.
    fn years(&self) -> Vec<i32> {
        if self.tuning.years.is_empty() {
            let now = Utc::now().year();
            vec![now, now - 1]
        } else {
            self.tuning.years.clone()
        }
    }
}

pub fn ttb_id(year: i32, seq: usize) -> String {
    format!("{:02}{:012}", year.rem_euclid(100), seq)
}

/// Year-major sequence of candidate IDs, `per_year` per year.
pub fn keyspace(years: &[i32], per_year: usize) -> impl Iterator<Item = String> + '_ {
    years
        .iter()
        .flat_map(move |&y| (1..=per_year).map(move |seq| ttb_id(y, seq)))
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract a record from one detail page; `None` when the page holds no label.
pub fn parse_detail(ttb_id: &str, html: &str) -> Option<RawRecord> {
    let document = Html::parse_document(html);
    let body = Selector::parse("body").ok()?;
    let text = document
        .select(&body)
        .flat_map(|body| body.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let brand = capture(&BRAND_RE, &text)?;
    let fanciful = capture(&FANCIFUL_RE, &text);
    let name = match &fanciful {
        Some(f) => format!("{brand} {f}"),
        None => brand.clone(),
    };

    Some(record([
        ("name", json!(name)),
        ("brand", json!(brand)),
        ("category", json!(capture(&CLASS_RE, &text))),
        ("abv", json!(capture(&ALCOHOL_RE, &text))),
        ("country", json!(capture(&ORIGIN_RE, &text))),
        ("source_id", json!(ttb_id)),
        ("external_ids", json!({ "ttb_id": ttb_id })),
    ]))
}

#[async_trait]
impl SourceScraper for TtbColaScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        let years = self.years();
        Ok(enumerate_keys(
            &self.fetcher,
            KEY,
            &self.tuning,
            limit.unwrap_or(self.tuning.default_limit),
            keyspace(&years, self.tuning.max_pages),
            |id| RequestSpec::get(format!("{DETAIL_URL}{id}")),
            |id, resp: &HttpResponse| parse_detail(id, &resp.body),
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_tuning;
    use crate::fetch::testing::*;
    use std::sync::Arc;

    const DETAIL: &str = r#"<html><body>
        <div class="box"><strong>Brand Name:</strong> <span>BUFFALO TRACE</span></div>
        <div class="box"><strong>Fanciful Name:</strong> <span>SINGLE BARREL</span></div>
        <div><strong>Class/Type Description:</strong> STRAIGHT BOURBON WHISKY</div>
        <div><strong>Origin Code:</strong> KENTUCKY</div>
        <div>Alcohol Content: 45%</div>
    </body></html>"#;

    const NO_RECORD: &str = "<html><body><p>No COLA found for the ID provided.</p></body></html>";

    #[test]
    fn test_ttb_id_format() {
        assert_eq!(ttb_id(2024, 17), "24000000000017");
        assert_eq!(ttb_id(2024, 17).len(), 14);
        assert_eq!(ttb_id(2005, 1), "05000000000001");
    }

    #[test]
    fn test_keyspace_is_year_major() {
        let ids: Vec<String> = keyspace(&[2024, 2023], 2).collect();
        assert_eq!(
            ids,
            vec!["24000000000001", "24000000000002", "23000000000001", "23000000000002"]
        );
    }

    #[test]
    fn test_parse_detail() {
        let r = parse_detail("24000000000001", DETAIL).unwrap();
        assert_eq!(r["brand"], "BUFFALO TRACE");
        assert_eq!(r["name"], "BUFFALO TRACE SINGLE BARREL");
        assert_eq!(r["category"], "STRAIGHT BOURBON WHISKY");
        assert_eq!(r["country"], "KENTUCKY");
        assert_eq!(r["abv"], "45");
        assert_eq!(r["source_id"], "24000000000001");
    }

    #[test]
    fn test_no_record_page_is_skipped() {
        assert!(parse_detail("24000000000002", NO_RECORD).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_walks_configured_keyspace() {
        let mut config = Config::default();
        config.tuning = parse_tuning("ttb_cola:\n  years: [2024]\n  ids_per_year: 3\n").unwrap();
        let t = Arc::new(
            ScriptedTransport::new()
                .route("ttbid=24000000000001", vec![ok(DETAIL)])
                .route("ttbid=24000000000002", vec![ok(NO_RECORD)])
                .route("ttbid=24000000000003", vec![down()]),
        );
        let scraper = TtbColaScraper::new(Fetcher::new(t.clone()), &config);
        let out = scraper.fetch(None).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(t.count("ttbid=24000000000004"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_id_is_not_retried() {
        let mut config = Config::default();
        config.tuning = parse_tuning("ttb_cola:\n  years: [2024]\n  ids_per_year: 2\n").unwrap();
        let t = Arc::new(
            ScriptedTransport::new()
                .route("ttbid=24000000000001", vec![status(404)])
                .route("ttbid=24000000000002", vec![ok(DETAIL)]),
        );
        let scraper = TtbColaScraper::new(Fetcher::new(t.clone()), &config);
        let out = scraper.fetch(None).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(t.count("ttbid=24000000000001"), 1);
    }
}
