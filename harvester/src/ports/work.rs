//! Work items exchanged with the work queue.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::HarvestResult;
use crate::query::{self, SearchRegion};
use crate::results::ListingStub;

/// Route of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkLabel {
    /// Top-level search supplied by the caller.
    InitialSearch,
    /// A region derived by splitting.
    Query,
    /// A further page of a region.
    Pagination,
    /// A batch of identifiers to extract inline.
    Zpids,
    /// A single identifier to extract.
    Detail,
    /// A detail URL to resolve into an identifier.
    DetailRedirect,
}

impl WorkLabel {
    /// Returns the label as its wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSearch => "INITIAL_SEARCH",
            Self::Query => "QUERY",
            Self::Pagination => "PAGINATION",
            Self::Zpids => "ZPIDS",
            Self::Detail => "DETAIL",
            Self::DetailRedirect => "DETAIL_REDIRECT",
        }
    }

    /// Whether the label routes to the discovery orchestrator.
    #[must_use]
    pub fn is_search(&self) -> bool {
        matches!(self, Self::InitialSearch | Self::Query | Self::Pagination)
    }
}

impl fmt::Display for WorkLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label-specific data carried by a work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkPayload {
    /// A region to search.
    Search {
        /// The region.
        region: SearchRegion,
    },
    /// Listing stubs to extract.
    Listings {
        /// The stubs, identifiers canonical.
        stubs: Vec<ListingStub>,
    },
    /// One identifier to extract.
    Detail {
        /// Identifier as received.
        zpid: String,
    },
    /// A detail page whose identifier is unknown.
    Redirect,
}

/// One unit of follow-up work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// URL to open.
    pub url: String,
    /// Dedup key for the queue.
    pub unique_key: String,
    /// Route.
    pub label: WorkLabel,
    /// Route data.
    pub payload: WorkPayload,
    /// Bypass the status category check for records of this item.
    #[serde(default)]
    pub ignore_status: bool,
    /// Attempts already spent on this item.
    #[serde(default)]
    pub retry_count: u32,
}

impl WorkItem {
    /// Creates a search item for a region.
    pub fn search(base_url: &str, label: WorkLabel, region: SearchRegion) -> HarvestResult<Self> {
        Ok(Self {
            url: query::search_url(base_url, &region)?,
            unique_key: query::unique_key(&region),
            label,
            payload: WorkPayload::Search { region },
            ignore_status: false,
            retry_count: 0,
        })
    }

    /// Creates an identifier batch item for a region's merged stubs.
    #[must_use]
    pub fn zpids(region_url: impl Into<String>, stubs: Vec<ListingStub>) -> Self {
        let mut hasher = Md5::new();
        for stub in &stubs {
            hasher.update(stub.zpid.as_bytes());
            hasher.update(b",");
        }
        let digest = format!("{:x}", hasher.finalize());

        Self {
            url: region_url.into(),
            unique_key: format!("zpids:{digest}"),
            label: WorkLabel::Zpids,
            payload: WorkPayload::Listings { stubs },
            ignore_status: false,
            retry_count: 0,
        }
    }

    /// Creates a single detail item.
    #[must_use]
    pub fn detail(url: impl Into<String>, zpid: impl Into<String>) -> Self {
        let zpid = zpid.into();
        Self {
            url: url.into(),
            unique_key: format!("detail:{zpid}"),
            label: WorkLabel::Detail,
            payload: WorkPayload::Detail { zpid },
            ignore_status: false,
            retry_count: 0,
        }
    }

    /// Creates a legacy redirect item for a detail URL.
    #[must_use]
    pub fn redirect(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            unique_key: format!("redirect:{url}"),
            url,
            label: WorkLabel::DetailRedirect,
            payload: WorkPayload::Redirect,
            ignore_status: false,
            retry_count: 0,
        }
    }

    /// Sets the status bypass flag.
    #[must_use]
    pub fn with_ignore_status(mut self, ignore_status: bool) -> Self {
        self.ignore_status = ignore_status;
        self
    }

    /// Derives a fresh item for another attempt at the same work.
    ///
    /// The key carries the attempt number so the queue accepts it even though
    /// the original key was already seen.
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        let retry_count = self.retry_count + 1;
        let base_key = self
            .unique_key
            .split_once("#retry")
            .map_or(self.unique_key.as_str(), |(base, _)| base);
        Self {
            unique_key: format!("{base_key}#retry{retry_count}"),
            retry_count,
            ..self.clone()
        }
    }

    /// The region of a search item.
    #[must_use]
    pub fn region(&self) -> Option<&SearchRegion> {
        match &self.payload {
            WorkPayload::Search { region } => Some(region),
            _ => None,
        }
    }
}

/// Options for an enqueue call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueOptions {
    /// Put the item at the head of the queue.
    pub forefront: bool,
}

impl EnqueueOptions {
    /// Head-of-queue enqueue.
    #[must_use]
    pub fn forefront() -> Self {
        Self { forefront: true }
    }
}

/// Result of an enqueue call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueReceipt {
    /// The key had already been seen; nothing was added.
    pub was_already_present: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MapBounds;

    fn region() -> SearchRegion {
        SearchRegion::from_bounds(MapBounds::new(-98.0, -97.0, 30.0, 31.0).unwrap())
    }

    #[test]
    fn test_label_wire_form() {
        assert_eq!(
            serde_json::to_value(WorkLabel::DetailRedirect).unwrap(),
            serde_json::json!("DETAIL_REDIRECT")
        );
        assert_eq!(WorkLabel::InitialSearch.to_string(), "INITIAL_SEARCH");
        assert!(WorkLabel::Pagination.is_search());
        assert!(!WorkLabel::Zpids.is_search());
    }

    #[test]
    fn test_search_item_keys_by_page() {
        let first = WorkItem::search("https://www.example.com", WorkLabel::Query, region()).unwrap();
        let second = WorkItem::search(
            "https://www.example.com",
            WorkLabel::Pagination,
            region().with_page(2).unwrap(),
        )
        .unwrap();

        assert_ne!(first.unique_key, second.unique_key);
        assert!(first.url.contains("searchQueryState="));
        assert_eq!(first.region(), Some(&region()));
    }

    #[test]
    fn test_zpids_key_depends_on_content() {
        let a = WorkItem::zpids("u", vec![ListingStub::new("1"), ListingStub::new("2")]);
        let b = WorkItem::zpids("u", vec![ListingStub::new("1"), ListingStub::new("2")]);
        let c = WorkItem::zpids("u", vec![ListingStub::new("12")]);
        assert_eq!(a.unique_key, b.unique_key);
        assert_ne!(a.unique_key, c.unique_key);
    }

    #[test]
    fn test_next_attempt() {
        let item = WorkItem::detail("https://www.example.com/homedetails/1_zpid/", "1");
        let retry = item.next_attempt();
        assert_eq!(retry.retry_count, 1);
        assert_eq!(retry.unique_key, "detail:1#retry1");
        assert_eq!(retry.next_attempt().unique_key, "detail:1#retry2");
    }

    #[test]
    fn test_item_serializes_for_resume() {
        let item = WorkItem::detail("u", "7").with_ignore_status(true);
        let json = serde_json::to_string(&item).unwrap();
        let back: WorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
