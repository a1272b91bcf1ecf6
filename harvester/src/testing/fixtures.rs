//! Canned payloads and a ready-made run context.

use serde_json::{json, Value};
use std::sync::Arc;

use super::mocks::StaticDetailSource;
use crate::config::HarvestConfig;
use crate::context::HarvestContext;
use crate::errors::HarvestResult;
use crate::ports::{CollectingRecordSink, InMemoryWorkQueue, InterceptedResponse};
use crate::query::codec::SEARCH_ENDPOINT_PATH;
use crate::query::{self, MapBounds, SearchRegion};

/// Base URL used by fixtures.
pub const TEST_BASE_URL: &str = "https://www.zillow.com";

/// A detail payload for a listing.
#[must_use]
pub fn listing_payload(zpid: &str, home_status: &str) -> Value {
    let id = zpid.parse::<u64>().map_or_else(|_| json!(zpid), |id| json!(id));
    json!({
        "zpid": id,
        "homeStatus": home_status,
        "streetAddress": format!("{zpid} Congress Ave"),
        "city": "Austin",
        "state": "TX",
        "zipcode": "78701",
        "price": 450_000,
        "bedrooms": 3,
        "bathrooms": 2,
        "datePostedString": "2024-03-05",
        "hdpUrl": format!("/homedetails/{zpid}-Congress-Ave-Austin-TX-78701/{zpid}_zpid/"),
        "description": "Fixture listing",
    })
}

/// A search result entry.
#[must_use]
pub fn search_stub(zpid: &str) -> Value {
    json!({
        "zpid": zpid,
        "detailUrl": format!("{TEST_BASE_URL}/homedetails/{zpid}_zpid/"),
    })
}

/// A search endpoint body with list results and a declared total.
#[must_use]
pub fn search_body(zpids: &[&str], total: u64) -> Value {
    search_body_from(zpids.iter().map(|z| search_stub(z)).collect(), total)
}

/// A search endpoint body from raw list entries.
#[must_use]
pub fn search_body_from(list_results: Vec<Value>, total: u64) -> Value {
    json!({
        "cat1": {
            "searchResults": {"listResults": list_results, "mapResults": []},
            "searchList": {"totalResultCount": total},
        }
    })
}

/// Rendered page data wrapping a search state.
#[must_use]
pub fn rendered_page(search_state: Value) -> Value {
    json!({"props": {"pageProps": {"searchPageState": search_state}}})
}

/// An intercepted search response for `region`.
pub fn search_response(region: &SearchRegion, body: Value) -> HarvestResult<InterceptedResponse> {
    let page_url = query::search_url(TEST_BASE_URL, region)?;
    let query_string = page_url.split_once('?').map_or("", |(_, q)| q);
    Ok(InterceptedResponse {
        url: format!("{TEST_BASE_URL}{SEARCH_ENDPOINT_PATH}?{query_string}"),
        status: 200,
        body,
    })
}

/// A top-level region over central Austin.
#[must_use]
pub fn austin_region() -> SearchRegion {
    let bounds = MapBounds {
        west: -97.80,
        east: -97.70,
        south: 30.22,
        north: 30.32,
    };
    SearchRegion::from_bounds(bounds)
        .with_state_entry("mapZoom", json!(12))
        .with_state_entry("category", json!("cat1"))
        .with_state_entry("filterState", json!({"sortSelection": {"value": "days"}}))
}

/// Configuration suited to tests: no throttle and a short response wait.
#[must_use]
pub fn test_config() -> HarvestConfig {
    HarvestConfig::new()
        .with_base_url(TEST_BASE_URL)
        .with_detail_delay_ms(0)
        .with_response_timeout(0.05)
}

/// A run context wired to in-memory collaborators.
pub struct HarvestFixture {
    /// The context.
    pub ctx: Arc<HarvestContext>,
    /// The queue behind the context.
    pub queue: Arc<InMemoryWorkQueue>,
    /// The sink behind the context.
    pub sink: Arc<CollectingRecordSink>,
    /// The detail source behind the context.
    pub source: Arc<StaticDetailSource>,
}

impl HarvestFixture {
    /// Builds a fixture for `config`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: HarvestConfig) -> Self {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let sink = Arc::new(CollectingRecordSink::new());
        let source = Arc::new(StaticDetailSource::new());

        let ctx = HarvestContext::builder(config, queue.clone())
            .sink(sink.clone())
            .detail_source(source.clone())
            .build()
            .expect("fixture configuration is valid");

        Self {
            ctx: Arc::new(ctx),
            queue,
            sink,
            source,
        }
    }
}

impl Default for HarvestFixture {
    fn default() -> Self {
        Self::new(test_config())
    }
}
