//! Open Food Facts scraper, restricted to the alcoholic-beverages category.

use super::paginate::{Page, collect_pages};
use super::{SourceScraper, at, id_string, items, record};
use crate::config::{Config, SourceTuning};
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, RequestSpec};
use crate::models::RawRecord;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

pub const KEY: &str = "openfoodfacts";
const SEARCH_URL: &str = "https://world.openfoodfacts.org/api/v2/search";
const FIELDS: &str = "code,product_name,brands,categories,alcohol_100g,nutriments,countries,image_url,generic_name";

pub fn default_tuning() -> SourceTuning {
    SourceTuning::paged(100, 10, 1000, 1000)
}

#[derive(Debug, Clone)]
pub struct OpenFoodFactsScraper {
    fetcher: Fetcher,
    tuning: SourceTuning,
}

impl OpenFoodFactsScraper {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            tuning: config.tuning_for(KEY, default_tuning()),
        }
    }
}

fn parse_product(p: &Value) -> Option<RawRecord> {
    // Products without a name are noise in this dataset.
    at(p, "product_name").as_str().filter(|n| !n.trim().is_empty())?;

    let abv = match at(p, "nutriments.alcohol_100g") {
        Value::Null => at(p, "nutriments.alcohol").clone(),
        v => v.clone(),
    };
    let country = at(p, "countries")
        .as_str()
        .and_then(|c| c.split(',').next())
        .map(|c| json!(c.trim()))
        .unwrap_or(Value::Null);

    Some(record([
        ("name", at(p, "product_name").clone()),
        ("brand", at(p, "brands").clone()),
        ("category", at(p, "categories").clone()),
        ("abv", abv),
        ("description", at(p, "generic_name").clone()),
        ("country", country),
        ("image_url", at(p, "image_url").clone()),
        ("source_id", id_string(at(p, "code"))),
        ("external_ids", json!({ "barcode": at(p, "code") })),
    ]))
}

#[async_trait]
impl SourceScraper for OpenFoodFactsScraper {
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
                    "{SEARCH_URL}?categories_tags_en=alcoholic-beverages&page={}&page_size={page_size}&fields={FIELDS}",
                    page + 1
                )))
            },
            |body| Page::of(items(body, "products"), parse_product),
        )
        .await
    }
}
