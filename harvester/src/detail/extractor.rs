//! Per-identifier detail extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::HarvestContext;
use crate::errors::{HarvestError, HarvestResult};
use crate::identifier;
use crate::observability::ProgressReporter;
use crate::ports::{BrowserPage, EnqueueOptions, Session, WorkItem};
use crate::results::ListingStub;
use crate::transform::Projection;

/// Evaluated on a detail page to find its identifier when the URL has none.
pub const PAGE_ZPID_SCRIPT: &str = r"
() => {
    const data = window.__NEXT_DATA__ || {};
    const props = (data.props || {}).pageProps || {};
    const property = (props.componentProps || {}).initialReduxState || props.initialReduxState || {};
    const gdp = property.gdp || {};
    return { zpid: props.zpid || gdp.building && gdp.building.zpid || null };
}
";

/// One identifier to extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRequest {
    /// Identifier as received.
    pub zpid: String,
    /// Detail page URL, when known.
    pub detail_url: Option<String>,
    /// The identifier came from a relaxed result.
    pub relaxed: bool,
    /// Bypass the status category check.
    pub ignore_status: bool,
    /// Attempts already spent on this identifier.
    pub attempt: u32,
}

impl DetailRequest {
    /// Creates a request for an identifier.
    #[must_use]
    pub fn new(zpid: impl Into<String>) -> Self {
        Self {
            zpid: zpid.into(),
            detail_url: None,
            relaxed: false,
            ignore_status: false,
            attempt: 0,
        }
    }

    /// Creates a request from a merged stub.
    #[must_use]
    pub fn from_stub(stub: &ListingStub) -> Self {
        Self {
            zpid: stub.zpid.clone(),
            detail_url: stub.detail_url.clone(),
            relaxed: stub.relaxed,
            ignore_status: false,
            attempt: 0,
        }
    }

    /// Sets the detail URL.
    #[must_use]
    pub fn with_detail_url(mut self, url: impl Into<String>) -> Self {
        self.detail_url = Some(url.into());
        self
    }

    /// Marks the request as relaxed.
    #[must_use]
    pub fn relaxed(mut self) -> Self {
        self.relaxed = true;
        self
    }

    /// Sets the status bypass flag.
    #[must_use]
    pub fn with_ignore_status(mut self, ignore_status: bool) -> Self {
        self.ignore_status = ignore_status;
        self
    }

    /// Sets the attempt count.
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// Why an identifier was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Already emitted.
    AlreadyExtracted,
    /// The item cap is reached.
    OverBudget,
}

/// Result of one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionOutcome {
    /// The record reached the sink.
    Extracted,
    /// The transform rejected the record.
    Filtered,
    /// Nothing was fetched.
    Skipped(SkipReason),
    /// Handed off as a standalone detail item.
    Deferred,
    /// Fetch failed; a retry item was enqueued.
    Retried,
}

/// Tally of a batch of extractions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Records emitted.
    pub extracted: usize,
    /// Records rejected by the transform.
    pub filtered: usize,
    /// Identifiers skipped.
    pub skipped: usize,
    /// Identifiers deferred to standalone items.
    pub deferred: usize,
    /// Identifiers re-enqueued after a failed fetch.
    pub retried: usize,
    /// Identifiers that failed for good.
    pub failed: usize,
    /// Identifiers handed back unprocessed after the session was retired.
    pub requeued: usize,
    /// The budget stopped the batch early.
    pub stopped_by_budget: bool,
}

impl BatchReport {
    fn record(&mut self, outcome: ExtractionOutcome) {
        match outcome {
            ExtractionOutcome::Extracted => self.extracted += 1,
            ExtractionOutcome::Filtered => self.filtered += 1,
            ExtractionOutcome::Skipped(_) => self.skipped += 1,
            ExtractionOutcome::Deferred => self.deferred += 1,
            ExtractionOutcome::Retried => self.retried += 1,
        }
    }
}

/// Absolute detail page URL for an identifier.
#[must_use]
pub fn detail_page_url(base_url: &str, zpid: &str, detail_url: Option<&str>) -> String {
    let path = detail_url.map_or_else(|| format!("/homedetails/{zpid}_zpid/"), String::from);
    url::Url::parse(base_url)
        .and_then(|base| base.join(&path))
        .map_or(path, |u| u.to_string())
}

/// Fetches, transforms and emits listing details.
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    ctx: Arc<HarvestContext>,
}

impl DetailExtractor {
    /// Creates an extractor over a run context.
    #[must_use]
    pub fn new(ctx: Arc<HarvestContext>) -> Self {
        Self { ctx }
    }

    /// Extracts one identifier.
    ///
    /// Malformed identifiers and listings the endpoint does not know fail
    /// with a terminal error and no enqueue or delay. Other fetch failures
    /// retire the session, set the run error flag and enqueue a standalone
    /// retry item.
    pub async fn extract(
        &self,
        page: &dyn BrowserPage,
        session: &dyn Session,
        request: &DetailRequest,
    ) -> HarvestResult<ExtractionOutcome> {
        let zpid = identifier::validate(&request.zpid)?;
        let tracker = self.ctx.tracker();

        if tracker.contains(&zpid) {
            return Ok(ExtractionOutcome::Skipped(SkipReason::AlreadyExtracted));
        }
        if tracker.is_over_budget(0) {
            return Ok(ExtractionOutcome::Skipped(SkipReason::OverBudget));
        }

        if request.relaxed {
            self.enqueue_detail(&zpid, request, request.attempt).await;
            return Ok(ExtractionOutcome::Deferred);
        }

        let payload = match self.ctx.detail_source().fetch(page, &zpid).await {
            Ok(payload) => payload,
            Err(e) if e.is_terminal_identifier() => return Err(e),
            Err(e) => return self.handle_transient(&zpid, request, session, e).await,
        };

        let outcome = self.project(payload, request.ignore_status).await?;
        tokio::time::sleep(self.ctx.config().detail_delay()).await;
        Ok(outcome)
    }

    /// Extracts a sequence of stubs.
    ///
    /// Stops at the first loop boundary where the budget is exhausted. If the
    /// session is retired mid-batch the rest of the stubs are handed back to
    /// the queue as a new batch item.
    pub async fn extract_batch(
        &self,
        page: &dyn BrowserPage,
        session: &dyn Session,
        stubs: &[ListingStub],
        ignore_status: bool,
    ) -> HarvestResult<BatchReport> {
        let reporter = ProgressReporter::start(
            self.ctx.tracker().clone(),
            self.ctx.config().progress_interval(),
        );
        let mut report = BatchReport::default();

        for (index, stub) in stubs.iter().enumerate() {
            if self.ctx.tracker().is_over_budget(0) {
                report.stopped_by_budget = true;
                break;
            }
            if !session.is_usable() {
                report.requeued = self.requeue_rest(&stubs[index..], ignore_status).await;
                break;
            }

            let request = DetailRequest::from_stub(stub).with_ignore_status(ignore_status);
            match self.extract(page, session, &request).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!(zpid = %stub.zpid, error = %e, "Detail extraction failed");
                    if !e.is_terminal_identifier() {
                        self.ctx.record_error();
                    }
                    report.failed += 1;
                }
            }
        }

        reporter.finish();
        debug!(?report, "Batch finished");
        Ok(report)
    }

    /// Resolves a detail page whose identifier is unknown and extracts it.
    ///
    /// Fails with [`HarvestError::LegacyLayout`] when neither the final URL
    /// nor the page data carries an identifier.
    pub async fn resolve_redirect(
        &self,
        page: &dyn BrowserPage,
        session: &dyn Session,
        url: &str,
        ignore_status: bool,
    ) -> HarvestResult<ExtractionOutcome> {
        page.navigate(url).await.map_err(|e| HarvestError::Page(e.to_string()))?;
        let landed = page.current_url().await.unwrap_or_else(|_| url.to_string());

        let zpid = match identifier::from_detail_url(&landed) {
            Some(zpid) => Some(zpid),
            None => page
                .evaluate(PAGE_ZPID_SCRIPT, Value::Null)
                .await
                .ok()
                .and_then(|data| data.get("zpid").and_then(identifier::from_json)),
        };

        let Some(zpid) = zpid else {
            return Err(HarvestError::legacy_layout(landed));
        };
        info!(%zpid, url = %landed, "Resolved redirect");

        let request = DetailRequest::new(zpid)
            .with_detail_url(landed)
            .with_ignore_status(ignore_status);
        self.extract(page, session, &request).await
    }

    async fn project(&self, payload: Value, ignore_status: bool) -> HarvestResult<ExtractionOutcome> {
        let ctx = self.ctx.transform_context(ignore_status);
        let outcome = match self.ctx.transform().project(payload, &ctx).await? {
            Projection::Emitted => ExtractionOutcome::Extracted,
            Projection::Filtered | Projection::Declined => ExtractionOutcome::Filtered,
        };
        Ok(outcome)
    }

    async fn handle_transient(
        &self,
        zpid: &str,
        request: &DetailRequest,
        session: &dyn Session,
        error: HarvestError,
    ) -> HarvestResult<ExtractionOutcome> {
        warn!(%zpid, error = %error, attempt = request.attempt, "Detail fetch failed");
        session.retire();
        self.ctx.record_error();

        if request.attempt >= self.ctx.config().max_request_retries {
            return Err(error);
        }
        self.enqueue_detail(zpid, request, request.attempt + 1).await;
        Ok(ExtractionOutcome::Retried)
    }

    async fn enqueue_detail(&self, zpid: &str, request: &DetailRequest, attempt: u32) {
        let url = detail_page_url(&self.ctx.config().base_url, zpid, request.detail_url.as_deref());
        let mut item = WorkItem::detail(url, zpid).with_ignore_status(request.ignore_status);
        if attempt > 0 {
            item.retry_count = attempt - 1;
            item = item.next_attempt();
        }

        if let Err(e) = self.ctx.queue().enqueue(item, EnqueueOptions::default()).await {
            warn!(%zpid, error = %e, "Failed to enqueue detail item");
            self.ctx.record_error();
        }
    }

    async fn requeue_rest(&self, rest: &[ListingStub], ignore_status: bool) -> usize {
        let item = WorkItem::zpids(
            self.ctx.config().base_url.clone(),
            rest.to_vec(),
        )
        .with_ignore_status(ignore_status);

        match self.ctx.queue().enqueue(item, EnqueueOptions::default()).await {
            Ok(_) => rest.len(),
            Err(e) => {
                warn!(error = %e, remaining = rest.len(), "Failed to requeue batch remainder");
                self.ctx.record_error();
                0
            }
        }
    }
}
