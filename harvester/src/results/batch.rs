//! Raw search result batches as served by the search endpoint or embedded in
//! the rendered page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result categories carried by one search payload.
pub const CATEGORY_KEYS: [&str; 2] = ["cat1", "cat2"];

/// One listing stub from a search result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStub {
    /// Identifier exactly as served; may be empty or malformed.
    pub zpid: String,
    /// Detail page URL, when served.
    pub detail_url: Option<String>,
    /// Whether the stub came from an under-constrained match.
    pub relaxed: bool,
}

impl ListingStub {
    /// Creates a stub.
    #[must_use]
    pub fn new(zpid: impl Into<String>) -> Self {
        Self {
            zpid: zpid.into(),
            detail_url: None,
            relaxed: false,
        }
    }

    /// Sets the detail URL.
    #[must_use]
    pub fn with_detail_url(mut self, url: impl Into<String>) -> Self {
        self.detail_url = Some(url.into());
        self
    }

    /// Marks the stub as relaxed.
    #[must_use]
    pub fn relaxed(mut self) -> Self {
        self.relaxed = true;
        self
    }

    /// Reads a stub from a search result entry.
    #[must_use]
    pub fn from_value(entry: &Value, relaxed: bool) -> Self {
        let zpid = match entry.get("zpid") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let detail_url = entry
            .get("detailUrl")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(String::from);

        Self {
            zpid,
            detail_url,
            relaxed,
        }
    }
}

/// Stubs and declared total of one result category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResults {
    /// List view results.
    pub list_results: Vec<ListingStub>,
    /// Map view results.
    pub map_results: Vec<ListingStub>,
    /// Results from relaxed matching.
    pub relaxed_results: Vec<ListingStub>,
    /// Upstream declared match count.
    pub total_result_count: u64,
}

impl CategoryResults {
    /// Creates a category from list results and a declared total.
    #[must_use]
    pub fn with_list(list_results: Vec<ListingStub>, total_result_count: u64) -> Self {
        Self {
            list_results,
            total_result_count,
            ..Self::default()
        }
    }

    /// All stubs, list first, then map, then relaxed.
    pub fn stubs(&self) -> impl Iterator<Item = &ListingStub> {
        self.list_results
            .iter()
            .chain(self.map_results.iter())
            .chain(self.relaxed_results.iter())
    }

    fn from_value(category: &Value) -> Self {
        let results = category.get("searchResults");
        let read = |key: &str, relaxed: bool| -> Vec<ListingStub> {
            results
                .and_then(|r| r.get(key))
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|entry| ListingStub::from_value(entry, relaxed))
                        .collect()
                })
                .unwrap_or_default()
        };

        let total_result_count = category
            .get("searchList")
            .and_then(|list| list.get("totalResultCount"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Self {
            list_results: read("listResults", false),
            map_results: read("mapResults", false),
            relaxed_results: read("relaxedResults", true),
            total_result_count,
        }
    }
}

/// Results of one search payload, across categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResultBatch {
    /// Per-category results.
    pub categories: Vec<CategoryResults>,
}

impl RawResultBatch {
    /// Creates a batch from categories.
    #[must_use]
    pub fn new(categories: Vec<CategoryResults>) -> Self {
        Self { categories }
    }

    /// Reads a batch from a search payload.
    ///
    /// Accepts either the search endpoint response (category keys at the
    /// root) or the rendered page data, where the same object sits under
    /// `props.pageProps.searchPageState`. Returns `None` when neither shape
    /// carries any category.
    #[must_use]
    pub fn from_search_state(payload: &Value) -> Option<Self> {
        let state = payload
            .pointer("/props/pageProps/searchPageState")
            .or_else(|| payload.get("searchPageState"))
            .unwrap_or(payload);

        let categories: Vec<CategoryResults> = CATEGORY_KEYS
            .iter()
            .filter_map(|key| state.get(*key))
            .map(CategoryResults::from_value)
            .collect();

        if categories.is_empty() {
            None
        } else {
            Some(Self { categories })
        }
    }

    /// Largest declared total across categories.
    #[must_use]
    pub fn declared_total(&self) -> u64 {
        self.categories
            .iter()
            .map(|c| c.total_result_count)
            .max()
            .unwrap_or(0)
    }

    /// All stubs across categories.
    pub fn stubs(&self) -> impl Iterator<Item = &ListingStub> {
        self.categories.iter().flat_map(CategoryResults::stubs)
    }
}
