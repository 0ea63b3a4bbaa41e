//! `trading_cards` table normalization.

use super::{
    Ladder, SOURCE_ID_MAX, SOURCE_MAX, Transformer, classify, external_ids, first_text, now_rfc3339,
    number, text,
};
use crate::models::{CanonicalRecord, CardGame, CardRarity, CardRecord, RawRecord};

pub const NAME_MAX: usize = 255;
pub const SET_NAME_MAX: usize = 255;
pub const CARD_NUMBER_MAX: usize = 50;
pub const CARD_TYPE_MAX: usize = 255;
pub const IMAGE_URL_MAX: usize = 500;

const RARITY_LADDER: Ladder<CardRarity> = &[
    (&["secret", "hyper", "rainbow"], CardRarity::Secret),
    (&["promo"], CardRarity::Promo),
    (&["uncommon"], CardRarity::Uncommon),
    (&["common"], CardRarity::Common),
    (
        &["rare", "mythic", "holo", "special", "legend", "ultra"],
        CardRarity::Rare,
    ),
];

const GAME_LADDER: Ladder<CardGame> = &[
    (&["pokemon", "pokémon"], CardGame::Pokemon),
    (&["magic", "scryfall", "mtg"], CardGame::Magic),
];

pub fn rarity(raw_rarity: &str) -> CardRarity {
    classify(raw_rarity, RARITY_LADDER, CardRarity::Other)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CardTransformer;

impl Transformer for CardTransformer {
    fn apply(&self, raw: &RawRecord) -> CanonicalRecord {
        let source = text(raw, "source", SOURCE_MAX);
        let game_hint = match text(raw, "game", 100) {
            g if g.is_empty() => source.clone(),
            g => g,
        };

        CanonicalRecord::Card(CardRecord {
            name: first_text(raw, &["name", "title"], NAME_MAX),
            game: classify(&game_hint, GAME_LADDER, CardGame::Other),
            set_name: text(raw, "set_name", SET_NAME_MAX),
            card_number: text(raw, "number", CARD_NUMBER_MAX),
            rarity: rarity(&text(raw, "rarity", 100)),
            card_type: text(raw, "card_type", CARD_TYPE_MAX),
            image_url: text(raw, "image_url", IMAGE_URL_MAX),
            price_usd: number(raw, "price").filter(|p| *p >= 0.0),
            source_id: text(raw, "source_id", SOURCE_ID_MAX),
            external_ids: external_ids(raw),
            scraped_at: now_rfc3339(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card(v: serde_json::Value) -> CardRecord {
        match CardTransformer.apply(v.as_object().unwrap()) {
            CanonicalRecord::Card(c) => c,
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn test_rarity_ladder() {
        assert_eq!(rarity("Uncommon"), CardRarity::Uncommon);
        assert_eq!(rarity("common"), CardRarity::Common);
        assert_eq!(rarity("Rare Holo"), CardRarity::Rare);
        assert_eq!(rarity("mythic"), CardRarity::Rare);
        assert_eq!(rarity("Rare Secret"), CardRarity::Secret);
        assert_eq!(rarity("Promo"), CardRarity::Promo);
        assert_eq!(rarity(""), CardRarity::Other);
    }

    #[test]
    fn test_game_from_source() {
        assert_eq!(card(json!({"source": "scryfall"})).game, CardGame::Magic);
        assert_eq!(card(json!({"source": "pokemon"})).game, CardGame::Pokemon);
        assert_eq!(card(json!({})).game, CardGame::Other);
    }

    #[test]
    fn test_empty_record_gets_defaults() {
        let c = card(json!({}));
        assert_eq!(c.name, "");
        assert_eq!(c.rarity, CardRarity::Other);
        assert_eq!(c.price_usd, None);
        assert_eq!(c.source_id, "");
        assert_eq!(c.external_ids, "{}");
    }

    #[test]
    fn test_price_coercion() {
        assert_eq!(card(json!({"price": "0.25"})).price_usd, Some(0.25));
        assert_eq!(card(json!({"price": 12})).price_usd, Some(12.0));
        assert_eq!(card(json!({"price": null})).price_usd, None);
    }

    #[test]
    fn test_number_kept_as_text() {
        let c = card(json!({"number": 58, "card_number_too_long": "x"}));
        assert_eq!(c.card_number, "58");
        let long = card(json!({"number": "9".repeat(80)}));
        assert_eq!(long.card_number.len(), CARD_NUMBER_MAX);
    }
}
