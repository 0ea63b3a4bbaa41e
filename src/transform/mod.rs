//! Normalization of raw source records into canonical rows.
//!
//! A transform is total: whatever the scraper handed over, the result has
//! every required field, no string longer than its column allows, and
//! numeric columns either parsed or null.
//!
//! Category-like columns go through keyword ladders: ordered keyword rules
//! where the first hit wins, so specific rules sit above generic ones. A
//! keyword only matches at the start of a word, so "gin" finds "Dry Gin"
//! and "Ginger" but not "Virgin" or "Original".

pub mod books;
pub mod cards;
pub mod spirits;

use crate::models::{CanonicalRecord, RawRecord};
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub use books::BookTransformer;
pub use cards::CardTransformer;
pub use spirits::SpiritTransformer;

/// Longest serialized `external_ids` value stored.
pub const EXTERNAL_IDS_MAX: usize = 2000;
pub const SOURCE_MAX: usize = 50;
pub const SOURCE_ID_MAX: usize = 100;

/// Maps one raw record of a domain to its canonical row.
pub trait Transformer: Send + Sync {
    fn apply(&self, raw: &RawRecord) -> CanonicalRecord;
}

/// Ordered keyword rules; the first rule with a matching keyword wins.
pub type Ladder<T> = &'static [(&'static [&'static str], T)];

/// Classify free text against a keyword ladder.
///
/// # Arguments
///
/// * `haystack` - source text, matched case-insensitively
/// * `ladder` - rules in priority order
/// * `fallback` - value when no rule matches
///
/// # Returns
///
/// The value of the first rule with a keyword starting a word of `haystack`.
pub fn classify<T: Copy>(haystack: &str, ladder: Ladder<T>, fallback: T) -> T {
    let haystack = haystack.to_lowercase();
    ladder
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| starts_word(&haystack, k)))
        .map(|(_, value)| *value)
        .unwrap_or(fallback)
}

/// True when `needle` occurs in `haystack` right after a non-alphanumeric
/// character or at the very start.
fn starts_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        haystack[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

/// Keep at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// String field: trimmed, arrays joined with `, `, cut to `max` chars.
///
/// # Arguments
///
/// * `raw` - the source record
/// * `key` - field to read
/// * `max` - character cap for the column
///
/// # Returns
///
/// The text, or an empty string when the field is missing or not textual.
pub fn text(raw: &RawRecord, key: &str, max: usize) -> String {
    raw.get(key)
        .map(|v| truncate_chars(&value_text(v), max))
        .unwrap_or_default()
}

/// First field among `keys` that yields non-empty text.
pub fn first_text(raw: &RawRecord, keys: &[&str], max: usize) -> String {
    keys.iter()
        .map(|k| text(raw, k, max))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());

/// Best-effort numeric parse: JSON numbers as-is, strings by their first
/// numeric run ("40% ABV" → 40).
///
/// # Returns
///
/// `None` for missing, non-numeric or non-finite values.
pub fn number(raw: &RawRecord, key: &str) -> Option<f64> {
    let parsed = match raw.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => NUMBER_RE
            .find(&s.replace(',', ""))
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

pub fn integer(raw: &RawRecord, key: &str) -> Option<i64> {
    number(raw, key).map(|n| n.trunc() as i64)
}

/// `external_ids` as compact JSON; `{}` when absent or oversized.
pub fn external_ids(raw: &RawRecord) -> String {
    match raw.get("external_ids") {
        Some(v @ Value::Object(_)) => serde_json::to_string(v)
            .ok()
            .filter(|s| s.chars().count() <= EXTERNAL_IDS_MAX)
            .unwrap_or_else(|| "{}".to_string()),
        _ => "{}".to_string(),
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawRecord {
        v.as_object().cloned().unwrap()
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Kind {
        Specific,
        Generic,
        Other,
    }

    const LADDER: Ladder<Kind> = &[(&["ginger"], Kind::Specific), (&["gin"], Kind::Generic)];

    #[test]
    fn test_classify_first_match_wins() {
        assert_eq!(classify("Ginger Beer", LADDER, Kind::Other), Kind::Specific);
        assert_eq!(classify("London Dry GIN", LADDER, Kind::Other), Kind::Generic);
        assert_eq!(classify("water", LADDER, Kind::Other), Kind::Other);
    }

    #[test]
    fn test_classify_matches_at_word_start_only() {
        assert_eq!(classify("Virgin Islands", LADDER, Kind::Other), Kind::Other);
        assert_eq!(classify("Original Recipe", LADDER, Kind::Other), Kind::Other);
        assert_eq!(classify("en:gin-based", LADDER, Kind::Other), Kind::Generic);
        assert_eq!(classify("Gins", LADDER, Kind::Other), Kind::Generic);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("Pokémon", 4), "Poké");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_text_joins_arrays_and_trims() {
        let r = raw(json!({"authors": ["  A ", "B", ""], "name": "  x  ", "n": 5}));
        assert_eq!(text(&r, "authors", 100), "A, B");
        assert_eq!(text(&r, "name", 100), "x");
        assert_eq!(text(&r, "n", 100), "5");
        assert_eq!(text(&r, "missing", 100), "");
    }

    #[test]
    fn test_number_coercion() {
        let r = raw(json!({"a": 4.7, "b": "40% ABV", "c": "n/a", "d": null, "e": "1,250.5"}));
        assert_eq!(number(&r, "a"), Some(4.7));
        assert_eq!(number(&r, "b"), Some(40.0));
        assert_eq!(number(&r, "c"), None);
        assert_eq!(number(&r, "d"), None);
        assert_eq!(number(&r, "e"), Some(1250.5));
        assert_eq!(integer(&r, "a"), Some(4));
    }

    #[test]
    fn test_external_ids_fallbacks() {
        assert_eq!(external_ids(&raw(json!({}))), "{}");
        assert_eq!(external_ids(&raw(json!({"external_ids": "oops"}))), "{}");
        assert_eq!(
            external_ids(&raw(json!({"external_ids": {"upc": "123"}}))),
            r#"{"upc":"123"}"#
        );
        let huge = "x".repeat(EXTERNAL_IDS_MAX);
        assert_eq!(external_ids(&raw(json!({"external_ids": {"k": huge}}))), "{}");
    }
}
