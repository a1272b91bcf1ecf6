//! Error types for the harvester.
//!
//! The taxonomy separates terminal failures (skip and continue) from
//! retryable ones (the collaborator queue schedules another attempt, usually
//! on a fresh session).

use std::collections::HashMap;
use thiserror::Error;

/// The main error type for harvester operations.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The identifier is empty or not purely numeric.
    #[error("Invalid listing identifier: '{zpid}'")]
    InvalidIdentifier {
        /// The rejected identifier.
        zpid: String,
    },

    /// The detail payload came back without a listing.
    #[error("Listing not found: {zpid}")]
    ListingNotFound {
        /// The identifier that resolved to nothing.
        zpid: String,
    },

    /// A legacy page layout with no extractable identifier.
    #[error("Legacy page layout without an identifier: {url}")]
    LegacyLayout {
        /// The page URL.
        url: String,
    },

    /// The search returned no listings while declaring a positive total.
    #[error("Search returned no listings but declared {declared_total} results")]
    InconsistentResults {
        /// The upstream declared total.
        declared_total: u64,
    },

    /// A blocking marker (captcha) was found on the page.
    #[error("Blocked by anti-bot page: {marker}")]
    Blocked {
        /// The marker that matched.
        marker: String,
    },

    /// A region could not be built, decoded, or derived.
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// The configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Fetching a detail payload failed.
    #[error("Detail fetch failed for {zpid}: {reason}")]
    DetailFetch {
        /// The identifier being fetched.
        zpid: String,
        /// The failure reason.
        reason: String,
    },

    /// The work queue rejected an operation.
    #[error("Queue error: {0}")]
    Queue(String),

    /// The browser page failed.
    #[error("Page error: {0}")]
    Page(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An opaque failure reported by a collaborator.
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] anyhow::Error),
}

impl HarvestError {
    /// Creates an invalid identifier error.
    #[must_use]
    pub fn invalid_identifier(zpid: impl Into<String>) -> Self {
        Self::InvalidIdentifier { zpid: zpid.into() }
    }

    /// Creates a listing not found error.
    #[must_use]
    pub fn listing_not_found(zpid: impl Into<String>) -> Self {
        Self::ListingNotFound { zpid: zpid.into() }
    }

    /// Creates a legacy layout error.
    #[must_use]
    pub fn legacy_layout(url: impl Into<String>) -> Self {
        Self::LegacyLayout { url: url.into() }
    }

    /// Creates a detail fetch error.
    #[must_use]
    pub fn detail_fetch(zpid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DetailFetch {
            zpid: zpid.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failing request should be attempted again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidIdentifier { .. }
            | Self::ListingNotFound { .. }
            | Self::LegacyLayout { .. }
            | Self::InvalidRegion(_)
            | Self::Config(_)
            | Self::Serialization(_) => false,
            Self::InconsistentResults { .. }
            | Self::Blocked { .. }
            | Self::DetailFetch { .. }
            | Self::Queue(_)
            | Self::Page(_)
            | Self::Io(_)
            | Self::Collaborator(_) => true,
        }
    }

    /// Whether this is one of the identifier errors that are never retried.
    #[must_use]
    pub fn is_terminal_identifier(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier { .. } | Self::ListingNotFound { .. }
        )
    }

    /// Short machine-readable name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "InvalidIdentifier",
            Self::ListingNotFound { .. } => "ListingNotFound",
            Self::LegacyLayout { .. } => "LegacyLayout",
            Self::InconsistentResults { .. } => "InconsistentResults",
            Self::Blocked { .. } => "Blocked",
            Self::InvalidRegion(_) => "InvalidRegion",
            Self::Config(_) => "Config",
            Self::DetailFetch { .. } => "DetailFetch",
            Self::Queue(_) => "Queue",
            Self::Page(_) => "Page",
            Self::Serialization(_) => "Serialization",
            Self::Io(_) => "Io",
            Self::Collaborator(_) => "Collaborator",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("retryable".to_string(), serde_json::json!(self.is_retryable()));

        match self {
            Self::InvalidIdentifier { zpid } | Self::ListingNotFound { zpid } => {
                map.insert("zpid".to_string(), serde_json::json!(zpid));
            }
            Self::DetailFetch { zpid, reason } => {
                map.insert("zpid".to_string(), serde_json::json!(zpid));
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
            Self::LegacyLayout { url } => {
                map.insert("url".to_string(), serde_json::json!(url));
            }
            Self::InconsistentResults { declared_total } => {
                map.insert("declared_total".to_string(), serde_json::json!(declared_total));
            }
            Self::Blocked { marker } => {
                map.insert("marker".to_string(), serde_json::json!(marker));
            }
            _ => {}
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Convenience alias used across the crate.
pub type HarvestResult<T> = Result<T, HarvestError>;
