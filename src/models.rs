//! Data models shared across the pipeline.
//!
//! - [`RawRecord`]: one untyped record as a scraper produced it
//! - [`SpiritRecord`], [`CardRecord`], [`BookRecord`]: canonical per-domain rows
//! - [`UploadOutcome`], [`SourceOutcome`], [`ScrapeReport`]: run results
//!
//! Everything here lives for one orchestration run only.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// A source record before normalization: field name → JSON value.
pub type RawRecord = Map<String, Value>;

/// How often a source is expected to be re-scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    Daily,
    Weekly,
    Monthly,
}

/// Coarse beverage category stored in the `spirits` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpiritCategory {
    Bourbon,
    Vodka,
    Gin,
    Rum,
    Tequila,
    Brandy,
    Liqueur,
    Wine,
    Beer,
    Cider,
    Other,
}

/// Row for the `spirits` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpiritRecord {
    pub name: String,
    pub brand: String,
    pub category: SpiritCategory,
    /// Alcohol by volume in percent, null when unknown.
    pub abv: Option<f64>,
    pub description: String,
    pub country: String,
    pub image_url: String,
    pub source: String,
    pub source_id: String,
    /// Compact JSON object of external identifiers.
    pub external_ids: String,
    pub scraped_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardGame {
    Pokemon,
    Magic,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardRarity {
    Common,
    Uncommon,
    Rare,
    Secret,
    Promo,
    Other,
}

/// Row for the `trading_cards` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRecord {
    pub name: String,
    pub game: CardGame,
    pub set_name: String,
    pub card_number: String,
    pub rarity: CardRarity,
    pub card_type: String,
    pub image_url: String,
    /// Market price in USD, null when unknown.
    pub price_usd: Option<f64>,
    pub source: String,
    pub source_id: String,
    pub external_ids: String,
    pub scraped_at: String,
}

/// Row for the `books` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookRecord {
    pub title: String,
    pub authors: String,
    pub isbn: String,
    pub publisher: String,
    pub published_year: Option<i32>,
    pub page_count: Option<i64>,
    pub language: String,
    pub description: String,
    pub cover_url: String,
    pub source: String,
    pub source_id: String,
    pub external_ids: String,
    pub scraped_at: String,
}

/// A normalized row ready for upload; serializes as the bare row object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalRecord {
    Spirit(SpiritRecord),
    Card(CardRecord),
    Book(BookRecord),
}

/// Result of uploading one list of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub uploaded: usize,
    pub errors: usize,
}

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SourceOutcome {
    Completed {
        scraped: usize,
        uploaded: usize,
        errors: usize,
    },
    /// Scraped fine but the upload step could not run at all.
    UploadFailed { scraped: usize, error: String },
    Failed { error: String },
    Skipped { skipped: bool, reason: String },
}

impl SourceOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        SourceOutcome::Skipped {
            skipped: true,
            reason: reason.into(),
        }
    }

    pub fn scraped(&self) -> usize {
        match self {
            SourceOutcome::Completed { scraped, .. } | SourceOutcome::UploadFailed { scraped, .. } => {
                *scraped
            }
            _ => 0,
        }
    }

    pub fn uploaded(&self) -> usize {
        match self {
            SourceOutcome::Completed { uploaded, .. } => *uploaded,
            _ => 0,
        }
    }

    pub fn errors(&self) -> usize {
        match self {
            SourceOutcome::Completed { errors, .. } => *errors,
            _ => 0,
        }
    }
}

/// Aggregated response of one orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    #[serde(rename = "type")]
    pub domain: String,
    pub source: String,
    /// Keyed by source key, in the order the sources ran.
    pub results: IndexMap<String, SourceOutcome>,
    pub total_scraped: usize,
    pub uploaded: usize,
    pub errors: usize,
    pub duration_seconds: f64,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_serialization_shapes() {
        let done = SourceOutcome::Completed {
            scraped: 3,
            uploaded: 0,
            errors: 0,
        };
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            json!({"scraped": 3, "uploaded": 0, "errors": 0})
        );

        let skipped = SourceOutcome::skipped("missing credentials");
        assert_eq!(
            serde_json::to_value(&skipped).unwrap(),
            json!({"skipped": true, "reason": "missing credentials"})
        );

        let failed = SourceOutcome::Failed {
            error: "boom".into(),
        };
        assert_eq!(serde_json::to_value(&failed).unwrap(), json!({"error": "boom"}));
    }

    #[test]
    fn test_outcome_counters() {
        let partial = SourceOutcome::UploadFailed {
            scraped: 7,
            error: "no creds".into(),
        };
        assert_eq!(partial.scraped(), 7);
        assert_eq!(partial.uploaded(), 0);
        assert_eq!(SourceOutcome::skipped("x").scraped(), 0);
    }

    #[test]
    fn test_canonical_record_serializes_untagged() {
        let rec = CanonicalRecord::Card(CardRecord {
            name: "Pikachu".into(),
            game: CardGame::Pokemon,
            set_name: "Base".into(),
            card_number: "58".into(),
            rarity: CardRarity::Common,
            card_type: "Pokémon".into(),
            image_url: String::new(),
            price_usd: Some(1.5),
            source: "pokemon".into(),
            source_id: "base1-58".into(),
            external_ids: "{}".into(),
            scraped_at: "2025-01-01T00:00:00Z".into(),
        });
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["name"], "Pikachu");
        assert_eq!(v["game"], "pokemon");
        assert_eq!(v["rarity"], "common");
    }

    #[test]
    fn test_report_renames_domain_to_type() {
        let report = ScrapeReport {
            domain: "cards".into(),
            source: "all".into(),
            results: IndexMap::new(),
            total_scraped: 0,
            uploaded: 0,
            errors: 0,
            duration_seconds: 0.5,
            timestamp: "2025-01-01T00:00:00Z".into(),
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["type"], "cards");
        assert!(v.get("domain").is_none());
    }
}
