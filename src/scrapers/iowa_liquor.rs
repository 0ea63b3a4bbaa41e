//! Iowa Alcoholic Beverages Division product list (Socrata open data).
//!
//! Offset pagination via `$limit`/`$offset`. The dataset reports proof,
//! not ABV; the transform converts.

use super::paginate::{Page, collect_pages};
use super::{SourceScraper, at, id_string, record};
use crate::config::{Config, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

pub const KEY: &str = "iowa_liquor";
const DATASET_URL: &str = "https://data.iowa.gov/resource/gckp-fe7r.json";

pub fn default_tuning() -> SourceTuning {
    SourceTuning::paged(1000, 20, 250, 5000)
}

#[derive(Debug, Clone)]
pub struct IowaLiquorScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
}

impl IowaLiquorScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            tuning: config.tuning_for(KEY, default_tuning()),
        }
    }
}

fn parse_product(p: &Value) -> Option<RawRecord> {
    p.as_object()?;
    Some(record([
        ("name", at(p, "item_description").clone()),
        ("brand", at(p, "vendor_name").clone()),
        ("category", at(p, "category_name").clone()),
        ("proof", at(p, "proof").clone()),
        ("country", json!("United States")),
        ("source_id", id_string(at(p, "item_number"))),
        (
            "external_ids",
            json!({
                "iowa_item_number": at(p, "item_number"),
                "upc": at(p, "upc"),
                "bottle_volume_ml": at(p, "bottle_volume_ml"),
            }),
        ),
    ]))
}

#[async_trait]
impl SourceScraper for IowaLiquorScraper {
    #[instrument(level = "info", skip_all, fields(source = KEY))]
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<RawRecord>, ScrapeError> {
        let page_size = self.tuning.page_size;
        collect_pages(
            &self.fetcher,
            KEY,
            &self.tuning,
            limit.unwrap_or(self.tuning.default_limit),
            |page| {
                Ok(RequestSpec::get(format!(
                    "{DATASET_URL}?$order=item_number&$limit={page_size}&$offset={}",
                    page * page_size
                )))
            },
            |body| Page::of(body.as_array().map(Vec::as_slice).unwrap_or(&[]), parse_product),
        )
        .await
    }
}
