//! Detail payload sources.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{HarvestError, HarvestResult};
use crate::ports::BrowserPage;

/// Persisted query of the detail endpoint.
pub const DETAIL_QUERY_ID: &str = "4c19ac196fb9c4e3d5e8e3b0c4f8cb3a";

/// Posts the identifier to the site's GraphQL endpoint from inside the page,
/// so the request carries the page's cookies.
pub const GRAPHQL_DETAIL_SCRIPT: &str = r"
async ({ zpid, queryId }) => {
    const response = await fetch(`/graphql/?zpid=${zpid}`, {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        credentials: 'include',
        body: JSON.stringify({
            operationName: 'ForSaleDoubleScrollFullRenderQuery',
            variables: { zpid: +zpid, contactFormRenderParameter: { zpid: +zpid, platform: 'desktop', isDoubleScroll: true } },
            queryId,
        }),
    });
    if (!response.ok) {
        throw new Error(`detail request failed with status ${response.status}`);
    }
    return response.json();
}
";

/// Fetches the structured detail payload of one listing.
#[async_trait]
pub trait DetailSource: Send + Sync {
    /// Returns the listing payload.
    ///
    /// Fails with [`HarvestError::ListingNotFound`] when the endpoint knows no
    /// such listing; any other failure is transient.
    async fn fetch(&self, page: &dyn BrowserPage, zpid: &str) -> HarvestResult<Value>;
}

/// Default source: evaluates [`GRAPHQL_DETAIL_SCRIPT`] in the page.
#[derive(Debug, Clone)]
pub struct GraphQlDetailSource {
    query_id: String,
}

impl GraphQlDetailSource {
    /// Creates a source for a specific persisted query.
    #[must_use]
    pub fn new(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
        }
    }
}

impl Default for GraphQlDetailSource {
    fn default() -> Self {
        Self::new(DETAIL_QUERY_ID)
    }
}

/// Reads the listing out of a GraphQL response body.
pub fn property_from_response(zpid: &str, body: Value) -> HarvestResult<Value> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array).filter(|e| !e.is_empty()) {
        let reason = errors
            .iter()
            .filter_map(|e| e.get("message").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(HarvestError::detail_fetch(zpid, reason));
    }

    let Some(data) = body.get("data") else {
        return Err(HarvestError::detail_fetch(zpid, "response has no data"));
    };
    match data.get("property") {
        Some(property) if property.is_object() => Ok(property.clone()),
        _ => Err(HarvestError::listing_not_found(zpid)),
    }
}

#[async_trait]
impl DetailSource for GraphQlDetailSource {
    async fn fetch(&self, page: &dyn BrowserPage, zpid: &str) -> HarvestResult<Value> {
        let args = serde_json::json!({ "zpid": zpid, "queryId": self.query_id });
        let body = page
            .evaluate(GRAPHQL_DETAIL_SCRIPT, args)
            .await
            .map_err(|e| HarvestError::detail_fetch(zpid, e.to_string()))?;
        property_from_response(zpid, body)
    }
}
