//! Wire encoding of search regions.
//!
//! The search endpoint takes the whole query as one JSON object under the
//! `searchQueryState` parameter. Encoding is canonical: object keys are
//! emitted in sorted order, so equal states encode to equal strings.

use md5::{Digest, Md5};
use serde_json::{Map, Value};
use url::Url;

use super::region::{validate_page, SearchRegion, PAGINATION_KEY};
use crate::errors::HarvestError;

/// Query parameter carrying the encoded state.
pub const QUERY_STATE_PARAM: &str = "searchQueryState";

/// Path of the intercepted search endpoint.
pub const SEARCH_ENDPOINT_PATH: &str = "/search/GetSearchPageState.htm";

/// Length of the identifier returned by [`identify`].
pub const IDENTITY_LEN: usize = 16;

/// Encodes a region to its canonical wire string.
#[must_use]
pub fn encode(region: &SearchRegion) -> String {
    let mut state = region.state().clone();
    let pagination = match region.page() {
        Some(page) => serde_json::json!({ "currentPage": page }),
        None => Value::Object(Map::new()),
    };
    state.insert(PAGINATION_KEY.to_string(), pagination);
    Value::Object(state).to_string()
}

/// Decodes a wire string into a top-level region.
///
/// Split depth is not part of the wire format and decodes as zero.
pub fn decode(encoded: &str) -> Result<SearchRegion, HarvestError> {
    let value: Value = serde_json::from_str(encoded)
        .map_err(|e| HarvestError::InvalidRegion(format!("undecodable query state: {e}")))?;

    let page = value
        .get(PAGINATION_KEY)
        .and_then(|p| p.get("currentPage"))
        .and_then(Value::as_u64);

    let region = SearchRegion::from_state(value)?;
    match page {
        Some(page) => {
            let page = u32::try_from(page)
                .map_err(|_| HarvestError::InvalidRegion(format!("page {page} out of range")))?;
            validate_page(page)?;
            region.with_page(page)
        }
        None => Ok(region),
    }
}

/// Stable short hash of the logical query.
///
/// Pagination is excluded, so a region and any of its pages share an
/// identity; split depth is excluded because it is bookkeeping, not query.
#[must_use]
pub fn identify(region: &SearchRegion) -> String {
    let canonical = Value::Object(region.state().clone()).to_string();
    let mut hasher = Md5::new();
    hasher.update(canonical.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..IDENTITY_LEN].to_string()
}

/// Key under which the work queue dedups a region request.
#[must_use]
pub fn unique_key(region: &SearchRegion) -> String {
    format!("{}:p{}", identify(region), region.effective_page())
}

/// Builds the search page URL for a region.
pub fn search_url(base_url: &str, region: &SearchRegion) -> Result<String, HarvestError> {
    let mut url = Url::parse(base_url)
        .and_then(|base| base.join("/homes/"))
        .map_err(|e| HarvestError::Config(format!("invalid base URL '{base_url}': {e}")))?;
    url.query_pairs_mut()
        .append_pair(QUERY_STATE_PARAM, &encode(region));
    Ok(url.to_string())
}

/// Recovers a region from a search page URL.
pub fn region_from_search_url(raw_url: &str) -> Result<SearchRegion, HarvestError> {
    let url = Url::parse(raw_url)
        .map_err(|e| HarvestError::InvalidRegion(format!("invalid search URL '{raw_url}': {e}")))?;
    let encoded = url
        .query_pairs()
        .find(|(key, _)| key == QUERY_STATE_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| {
            HarvestError::InvalidRegion(format!("URL has no {QUERY_STATE_PARAM}: {raw_url}"))
        })?;
    decode(&encoded)
}

/// Whether an intercepted response URL belongs to the search endpoint and
/// carries the same logical query as `region`.
#[must_use]
pub fn response_matches(response_url: &str, region: &SearchRegion) -> bool {
    let Ok(url) = Url::parse(response_url) else {
        return false;
    };
    if !url.path().ends_with(SEARCH_ENDPOINT_PATH) {
        return false;
    }
    match url.query_pairs().find(|(key, _)| key == QUERY_STATE_PARAM) {
        Some((_, encoded)) => decode(&encoded).is_ok_and(|other| identify(&other) == identify(region)),
        // Some page builds omit the state from the XHR URL; accept any search response.
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MapBounds;
    use pretty_assertions::assert_eq;

    fn region() -> SearchRegion {
        SearchRegion::from_bounds(MapBounds::new(-80.3, -80.1, 25.7, 25.9).unwrap())
            .with_state_entry("filterState", serde_json::json!({"sort": {"value": "days"}}))
            .with_state_entry("category", serde_json::json!("cat1"))
    }

    #[test]
    fn test_encode_decode() {
        let original = region().with_page(3).unwrap();
        let decoded = decode(&encode(&original)).unwrap();

        assert_eq!(decoded.page(), Some(3));
        assert_eq!(decoded.state(), original.state());
    }

    #[test]
    fn test_encode_shape() {
        let encoded: Value = serde_json::from_str(&encode(&region().with_page(2).unwrap())).unwrap();
        assert_eq!(encoded["pagination"], serde_json::json!({"currentPage": 2}));
        assert_eq!(encoded["mapBounds"]["west"], serde_json::json!(-80.3));

        let root: Value = serde_json::from_str(&encode(&region())).unwrap();
        assert_eq!(root["pagination"], serde_json::json!({}));
    }

    #[test]
    fn test_encode_is_key_order_independent() {
        let a = SearchRegion::from_state(serde_json::json!({"b": 1, "a": {"y": 2, "x": 1}})).unwrap();
        let b = SearchRegion::from_state(serde_json::json!({"a": {"x": 1, "y": 2}, "b": 1})).unwrap();
        assert_eq!(encode(&a), encode(&b));
        assert_eq!(identify(&a), identify(&b));
    }

    #[test]
    fn test_identify_ignores_pagination_and_depth() {
        let root = region();
        let page = root.with_page(7).unwrap();
        let deep = root.clone().at_depth(3);

        assert_eq!(identify(&root), identify(&page));
        assert_eq!(identify(&root), identify(&deep));
        assert_eq!(identify(&root).len(), IDENTITY_LEN);
    }

    #[test]
    fn test_identify_differs_for_different_bounds() {
        let other = SearchRegion::from_bounds(MapBounds::new(-80.3, -80.2, 25.7, 25.9).unwrap());
        assert_ne!(identify(&region()), identify(&other));
    }

    #[test]
    fn test_unique_key_includes_page() {
        let root = region();
        assert_ne!(unique_key(&root), unique_key(&root.with_page(2).unwrap()));
        assert_eq!(unique_key(&root), unique_key(&root.with_page(1).unwrap()));
    }

    #[test]
    fn test_decode_rejects_bad_page() {
        assert!(decode(r#"{"pagination":{"currentPage":21}}"#).is_err());
        assert!(decode(r#"{"pagination":{"currentPage":0}}"#).is_err());
        assert!(decode("not json").is_err());
    }

    #[test]
    fn test_search_url_round_trip() {
        let original = region().with_page(5).unwrap();
        let url = search_url("https://www.example.com", &original).unwrap();

        assert!(url.starts_with("https://www.example.com/homes/?searchQueryState="));
        let recovered = region_from_search_url(&url).unwrap();
        assert_eq!(recovered.page(), Some(5));
        assert_eq!(identify(&recovered), identify(&original));
    }

    #[test]
    fn test_region_from_url_without_state() {
        assert!(region_from_search_url("https://www.example.com/homes/").is_err());
    }

    #[test]
    fn test_response_matches() {
        let root = region();
        let page_two = root.with_page(2).unwrap();
        let matching = format!(
            "https://www.example.com{SEARCH_ENDPOINT_PATH}?{QUERY_STATE_PARAM}={}",
            url::form_urlencoded::byte_serialize(encode(&page_two).as_bytes()).collect::<String>()
        );

        assert!(response_matches(&matching, &root));
        assert!(response_matches(
            &format!("https://www.example.com{SEARCH_ENDPOINT_PATH}"),
            &root
        ));
        assert!(!response_matches("https://www.example.com/graphql", &root));

        let other = SearchRegion::from_bounds(MapBounds::new(0.0, 1.0, 0.0, 1.0).unwrap());
        assert!(!response_matches(&matching, &other));
    }
}
