//! `spirits` table normalization.

use super::{
    Ladder, SOURCE_ID_MAX, SOURCE_MAX, Transformer, classify, external_ids, first_text, now_rfc3339,
    number, text,
};
use crate::models::{CanonicalRecord, RawRecord, SpiritCategory, SpiritRecord};

pub const NAME_MAX: usize = 255;
pub const BRAND_MAX: usize = 255;
pub const DESCRIPTION_MAX: usize = 2000;
pub const COUNTRY_MAX: usize = 100;
pub const IMAGE_URL_MAX: usize = 500;

// "ginger" and "root beer" must precede gin/beer; liqueurs precede the base
// spirits they are often named after ("bourbon cream").
const CATEGORY_LADDER: Ladder<SpiritCategory> = &[
    (&["ginger", "root beer"], SpiritCategory::Other),
    (
        &["liqueur", "cream", "schnapps", "amaretto", "triple sec"],
        SpiritCategory::Liqueur,
    ),
    (&["whisk", "bourbon", "scotch", "rye"], SpiritCategory::Bourbon),
    (&["vodka"], SpiritCategory::Vodka),
    (&["gin", "genever"], SpiritCategory::Gin),
    (&["rum", "cachaca", "cachaça"], SpiritCategory::Rum),
    (&["tequila", "mezcal"], SpiritCategory::Tequila),
    (&["brandy", "cognac", "armagnac", "pisco"], SpiritCategory::Brandy),
    (
        &["wine", "champagne", "prosecco", "sake", "vermouth"],
        SpiritCategory::Wine,
    ),
    (
        &["beer", "ale", "lager", "stout", "ipa", "porter", "pilsner"],
        SpiritCategory::Beer,
    ),
    (&["cider"], SpiritCategory::Cider),
];

pub fn categorize(raw_category: &str) -> SpiritCategory {
    classify(raw_category, CATEGORY_LADDER, SpiritCategory::Other)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpiritTransformer;

impl Transformer for SpiritTransformer {
    fn apply(&self, raw: &RawRecord) -> CanonicalRecord {
        let name = first_text(raw, &["name", "title"], NAME_MAX);

        // Fall back to the name when the source gives no category at all.
        let category_text = match text(raw, "category", 500) {
            c if c.is_empty() => name.clone(),
            c => c,
        };

        let abv = number(raw, "abv")
            .or_else(|| number(raw, "proof").map(|p| p / 2.0))
            .filter(|v| (0.0..=100.0).contains(v));

        CanonicalRecord::Spirit(SpiritRecord {
            category: categorize(&category_text),
            brand: text(raw, "brand", BRAND_MAX),
            abv,
            description: text(raw, "description", DESCRIPTION_MAX),
            country: text(raw, "country", COUNTRY_MAX),
            image_url: text(raw, "image_url", IMAGE_URL_MAX),
            source: text(raw, "source", SOURCE_MAX),
            source_id: text(raw, "source_id", SOURCE_ID_MAX),
            external_ids: external_ids(raw),
            scraped_at: now_rfc3339(),
            name,
        })
    }
}
