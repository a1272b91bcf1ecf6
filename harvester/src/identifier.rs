//! Listing identifier validation and discovery.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::errors::HarvestError;

#[allow(clippy::expect_used)]
fn zpid_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/(\d+)_zpid").expect("static pattern compiles"))
}

/// Returns the canonical form of a raw identifier, or `None` when it is
/// empty, non-numeric or zero.
#[must_use]
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match trimmed.parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(id.to_string()),
    }
}

/// Validates a raw identifier, returning its canonical form.
pub fn validate(raw: &str) -> Result<String, HarvestError> {
    normalize(raw).ok_or_else(|| HarvestError::invalid_identifier(raw))
}

/// Reads an identifier from a JSON value that may be a number or a string.
#[must_use]
pub fn from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize(s),
        Value::Number(n) => n.as_u64().filter(|id| *id > 0).map(|id| id.to_string()),
        _ => None,
    }
}

/// Extracts the identifier embedded in a detail page URL
/// (`.../homedetails/<slug>/<id>_zpid/`).
#[must_use]
pub fn from_detail_url(url: &str) -> Option<String> {
    zpid_url_pattern()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| normalize(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("123"), Some("123".to_string()));
        assert_eq!(normalize(" 0042 "), Some("42".to_string()));
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("abc"), None);
        assert_eq!(normalize("12a"), None);
        assert_eq!(normalize("-5"), None);
        assert_eq!(normalize("0"), None);
    }

    #[test]
    fn test_validate_error() {
        let err = validate("abc").unwrap_err();
        assert!(matches!(err, HarvestError::InvalidIdentifier { ref zpid } if zpid == "abc"));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(from_json(&serde_json::json!(2_077_123)), Some("2077123".to_string()));
        assert_eq!(from_json(&serde_json::json!("2077123")), Some("2077123".to_string()));
        assert_eq!(from_json(&serde_json::json!(null)), None);
        assert_eq!(from_json(&serde_json::json!(-1)), None);
        assert_eq!(from_json(&serde_json::json!("x1")), None);
    }

    #[test]
    fn test_from_detail_url() {
        assert_eq!(
            from_detail_url("https://www.example.com/homedetails/1-Main-St-Austin-TX-78701/29388227_zpid/"),
            Some("29388227".to_string())
        );
        assert_eq!(from_detail_url("/homedetails/12_zpid"), Some("12".to_string()));
        assert_eq!(from_detail_url("https://www.example.com/b/building/1-main/"), None);
    }
}
