//! Session and browser page ports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Handle on the identity (proxy, cookies) a page runs under.
#[cfg_attr(test, mockall::automock)]
pub trait Session: Send + Sync {
    /// Marks the session unhealthy so the pool rotates it out.
    fn retire(&self);

    /// Whether the session may still be used.
    fn is_usable(&self) -> bool;
}

/// A network response intercepted by the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptedResponse {
    /// Request URL.
    pub url: String,
    /// HTTP status.
    pub status: u16,
    /// Parsed JSON body.
    pub body: Value,
}

/// Predicate selecting which response to wait for.
#[derive(Clone)]
pub struct ResponseMatcher(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl ResponseMatcher {
    /// Wraps a URL predicate.
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Tests a response URL.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        (self.0)(url)
    }
}

impl fmt::Debug for ResponseMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseMatcher").finish_non_exhaustive()
    }
}

/// A browser page driven by the collaborator.
///
/// Methods report collaborator failures as `anyhow::Error`; the harvester
/// wraps them into its own taxonomy.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigates to a URL and waits for the document.
    async fn navigate(&self, url: &str) -> anyhow::Result<()>;

    /// Waits up to `timeout` for the next response whose URL satisfies the
    /// matcher. Returns `None` if none arrives in time.
    async fn wait_for_response(
        &self,
        matcher: ResponseMatcher,
        timeout: Duration,
    ) -> anyhow::Result<Option<InterceptedResponse>>;

    /// Evaluates a script in the page with JSON arguments.
    async fn evaluate(&self, script: &str, args: Value) -> anyhow::Result<Value>;

    /// Text of the first element matching a selector, if any.
    async fn element_text(&self, selector: &str) -> anyhow::Result<Option<String>>;

    /// URL of the page after redirects.
    async fn current_url(&self) -> anyhow::Result<String>;
}
