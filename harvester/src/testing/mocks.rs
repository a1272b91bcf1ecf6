//! Scripted collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::fixtures::listing_payload;
use crate::crawler::{PageLease, PageProvider};
use crate::detail::DetailSource;
use crate::discovery::RENDER_STATE_SCRIPT;
use crate::errors::{HarvestError, HarvestResult};
use crate::ports::{BrowserPage, InterceptedResponse, ResponseMatcher, Session};

/// A browser page that serves canned responses.
///
/// Each `wait_for_response` call takes the first queued search response the
/// matcher accepts; when there is none the wait runs into its timeout.
/// Rendered page data is served in order, one per `RENDER_STATE_SCRIPT`
/// evaluation.
#[derive(Debug, Default)]
pub struct ScriptedPage {
    responses: Mutex<VecDeque<InterceptedResponse>>,
    rendered: Mutex<VecDeque<Value>>,
    evaluations: Mutex<HashMap<String, Value>>,
    captcha: Mutex<Option<String>>,
    current_url: Mutex<Option<String>>,
    fail_navigation: AtomicBool,
    navigations: Mutex<Vec<String>>,
}

impl ScriptedPage {
    /// Creates a page with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an intercepted search response.
    #[must_use]
    pub fn with_response(self, response: InterceptedResponse) -> Self {
        self.responses.lock().push_back(response);
        self
    }

    /// Queues rendered page data.
    #[must_use]
    pub fn with_rendered(self, state: Value) -> Self {
        self.rendered.lock().push_back(state);
        self
    }

    /// Sets the result of evaluating `script`.
    #[must_use]
    pub fn with_evaluation(self, script: &str, result: Value) -> Self {
        self.evaluations.lock().insert(script.to_string(), result);
        self
    }

    /// Shows a captcha element.
    #[must_use]
    pub fn with_captcha(self, text: impl Into<String>) -> Self {
        *self.captcha.lock() = Some(text.into());
        self
    }

    /// Sets the URL the page lands on after navigation.
    #[must_use]
    pub fn with_current_url(self, url: impl Into<String>) -> Self {
        *self.current_url.lock() = Some(url.into());
        self
    }

    /// Makes every navigation fail.
    #[must_use]
    pub fn failing_navigation(self) -> Self {
        self.fail_navigation.store(true, Ordering::SeqCst);
        self
    }

    /// Queues one more search response.
    pub fn push_response(&self, response: InterceptedResponse) {
        self.responses.lock().push_back(response);
    }

    /// URLs navigated to, in order.
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.navigations.lock().push(url.to_string());
        if self.fail_navigation.load(Ordering::SeqCst) {
            anyhow::bail!("net::ERR_TUNNEL_CONNECTION_FAILED at {url}");
        }
        Ok(())
    }

    async fn wait_for_response(
        &self,
        matcher: ResponseMatcher,
        timeout: Duration,
    ) -> anyhow::Result<Option<InterceptedResponse>> {
        let next = {
            let mut responses = self.responses.lock();
            responses
                .iter()
                .position(|response| matcher.matches(&response.url))
                .and_then(|index| responses.remove(index))
        };
        if next.is_none() {
            tokio::time::sleep(timeout).await;
        }
        Ok(next)
    }

    async fn evaluate(&self, script: &str, _args: Value) -> anyhow::Result<Value> {
        if script == RENDER_STATE_SCRIPT {
            return Ok(self.rendered.lock().pop_front().unwrap_or(Value::Null));
        }
        Ok(self.evaluations.lock().get(script).cloned().unwrap_or(Value::Null))
    }

    async fn element_text(&self, _selector: &str) -> anyhow::Result<Option<String>> {
        Ok(self.captcha.lock().clone())
    }

    async fn current_url(&self) -> anyhow::Result<String> {
        let landed = self.current_url.lock().clone();
        match landed.or_else(|| self.navigations.lock().last().cloned()) {
            Some(url) => Ok(url),
            None => anyhow::bail!("page has not navigated"),
        }
    }
}

/// A session that only remembers whether it was retired.
#[derive(Debug, Default)]
pub struct StaticSession {
    retired: AtomicBool,
    retire_count: AtomicUsize,
}

impl StaticSession {
    /// Creates a usable session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `retire` was called.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Number of `retire` calls.
    #[must_use]
    pub fn retire_count(&self) -> usize {
        self.retire_count.load(Ordering::SeqCst)
    }
}

impl Session for StaticSession {
    fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
        self.retire_count.fetch_add(1, Ordering::SeqCst);
    }

    fn is_usable(&self) -> bool {
        !self.is_retired()
    }
}

/// Scripted reply of a [`StaticDetailSource`].
#[derive(Debug, Clone)]
pub enum DetailReply {
    /// Serve this payload.
    Found(Value),
    /// The endpoint knows no such listing.
    NotFound,
    /// The fetch fails transiently.
    Fail(String),
}

/// A detail source serving scripted replies.
///
/// Identifiers without a scripted reply get a for-sale listing payload.
#[derive(Debug, Default)]
pub struct StaticDetailSource {
    replies: Mutex<HashMap<String, DetailReply>>,
    fetched: Mutex<Vec<String>>,
}

impl StaticDetailSource {
    /// Creates a source with no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the reply for an identifier.
    pub fn reply(&self, zpid: impl Into<String>, reply: DetailReply) {
        self.replies.lock().insert(zpid.into(), reply);
    }

    /// Identifiers fetched, in order.
    #[must_use]
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl DetailSource for StaticDetailSource {
    async fn fetch(&self, _page: &dyn BrowserPage, zpid: &str) -> HarvestResult<Value> {
        self.fetched.lock().push(zpid.to_string());
        let reply = self.replies.lock().get(zpid).cloned();
        match reply {
            Some(DetailReply::Found(payload)) => Ok(payload),
            Some(DetailReply::NotFound) => Err(HarvestError::listing_not_found(zpid)),
            Some(DetailReply::Fail(reason)) => Err(HarvestError::detail_fetch(zpid, reason)),
            None => Ok(listing_payload(zpid, "FOR_SALE")),
        }
    }
}

/// Leases one shared [`ScriptedPage`] with a fresh [`StaticSession`] per
/// lease, keeping every session it handed out.
#[derive(Debug)]
pub struct StaticPageProvider {
    page: Arc<ScriptedPage>,
    sessions: Mutex<Vec<Arc<StaticSession>>>,
}

impl StaticPageProvider {
    /// Creates a provider around `page`.
    #[must_use]
    pub fn new(page: ScriptedPage) -> Self {
        Self {
            page: Arc::new(page),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// The shared page.
    #[must_use]
    pub fn page(&self) -> &Arc<ScriptedPage> {
        &self.page
    }

    /// Sessions handed out, in order.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<StaticSession>> {
        self.sessions.lock().clone()
    }
}

#[async_trait]
impl PageProvider for StaticPageProvider {
    async fn acquire(&self) -> HarvestResult<PageLease> {
        let session = Arc::new(StaticSession::new());
        self.sessions.lock().push(session.clone());
        Ok(PageLease {
            page: self.page.clone(),
            session,
        })
    }
}
