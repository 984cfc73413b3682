//! Helpers shared by every provider adapter when folding raw JSON items into
//! `NormalizedArticle`s.

use crate::types::NormalizedArticle;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Deterministic dedup key: md5 over the concatenated parts, lowercase hex.
pub fn fingerprint(parts: &[&str]) -> String {
    format!("{:x}", md5::compute(parts.concat()))
}

/// Non-empty, trimmed string at a JSON pointer. Numbers are stringified.
pub fn text_at(item: &Value, pointer: &str) -> Option<String> {
    match item.pointer(pointer)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Array at a JSON pointer, or an empty slice when absent or of another type.
pub fn items_at<'a>(body: &'a Value, pointer: &str) -> &'a [Value] {
    body.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Parses the date formats the providers emit. Unknown or missing dates fall
/// back to `fallback` so a bad timestamp never drops an otherwise valid item.
pub fn parse_published_at(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return fallback;
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return dt.and_utc();
    }

    debug!("Unparseable publication date {:?}, using ingest time", raw);
    fallback
}

/// Drops later items whose `external_id` was already seen in the same batch.
pub fn deduplicate(articles: Vec<NormalizedArticle>) -> Vec<NormalizedArticle> {
    let total = articles.len();
    let mut seen = HashSet::new();
    let unique: Vec<NormalizedArticle> = articles
        .into_iter()
        .filter(|article| seen.insert(article.external_id.clone()))
        .collect();

    let removed = total - unique.len();
    if removed > 0 {
        debug!("Removed {} duplicate items from provider batch", removed);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn fingerprint_is_md5_of_concatenation() {
        let id = fingerprint(&["http://a/1", "2024-01-01T00:00:00Z"]);
        assert_eq!(id, format!("{:x}", md5::compute("http://a/12024-01-01T00:00:00Z")));
        assert_eq!(id.len(), 32);
        assert_eq!(id, fingerprint(&["http://a/1", "2024-01-01T00:00:00Z"]));
    }

    #[test]
    fn text_at_skips_blank_and_non_string_values() {
        let item = json!({"a": "  hi ", "b": "   ", "c": null, "d": {"e": 7}});
        assert_eq!(text_at(&item, "/a").as_deref(), Some("hi"));
        assert_eq!(text_at(&item, "/b"), None);
        assert_eq!(text_at(&item, "/c"), None);
        assert_eq!(text_at(&item, "/d/e").as_deref(), Some("7"));
        assert_eq!(text_at(&item, "/missing"), None);
    }

    #[test]
    fn parses_provider_date_formats() {
        let fallback = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();

        assert_eq!(parse_published_at(Some("2024-01-01T12:30:00Z"), fallback), expected);
        assert_eq!(parse_published_at(Some("2024-01-01T12:30:00+00:00"), fallback), expected);
        assert_eq!(parse_published_at(Some("2024-01-01T14:30:00+0200"), fallback), expected);
        assert_eq!(parse_published_at(Some("2024-01-01 12:30:00"), fallback), expected);
        assert_eq!(parse_published_at(Some("yesterday"), fallback), fallback);
        assert_eq!(parse_published_at(None, fallback), fallback);
    }

    #[test]
    fn items_at_tolerates_wrong_shapes() {
        let body = json!({"response": {"results": [1, 2]}, "data": "nope"});
        assert_eq!(items_at(&body, "/response/results").len(), 2);
        assert!(items_at(&body, "/data").is_empty());
        assert!(items_at(&body, "/articles").is_empty());
    }
}
