//! Region processing: fetch, merge, validate, fan out.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state::{DiscoveryOutcome, DiscoveryState, FollowUpCounts, FollowUpPlan};
use crate::config::HarvestConfig;
use crate::context::HarvestContext;
use crate::errors::{HarvestError, HarvestResult};
use crate::observability::SpanTimer;
use crate::ports::{
    BrowserPage, EnqueueOptions, InterceptedResponse, ResponseMatcher, Session, WorkItem, WorkLabel,
};
use crate::query::{self, RegionSplitter, SearchRegion};
use crate::results::{merge, MergeVerdict, MergedResultSet, RawResultBatch};

/// Reads the server-rendered page data.
pub const RENDER_STATE_SCRIPT: &str = r"
() => {
    const el = document.querySelector('script#__NEXT_DATA__');
    return el ? JSON.parse(el.textContent) : null;
}
";

/// Decides which pages and sub-regions a merged region fans out into.
///
/// Nothing is planned when the budget is met, when the region is itself a
/// pagination page, or when upstream served everything it declared. A region
/// the splitter rejects still gets its pages; the rejection is reported in
/// [`FollowUpPlan::split_error`].
pub fn plan_follow_ups(
    config: &HarvestConfig,
    splitter: &dyn RegionSplitter,
    region: &SearchRegion,
    merged: &MergedResultSet,
    over_budget: bool,
) -> HarvestResult<FollowUpPlan> {
    let mut plan = FollowUpPlan::default();
    if over_budget || region.is_pagination_derived() || !merged.is_truncated() {
        return Ok(plan);
    }

    let per_page = u64::from(config.results_per_page.max(1));
    let wanted = merged.declared_total.div_ceil(per_page);
    let last_page = u32::try_from(wanted).unwrap_or(u32::MAX).min(config.max_pages);
    for page in 2..=last_page {
        plan.pages.push(region.with_page(page)?);
    }

    if config.max_depth > 0 {
        if region.split_depth() < config.max_depth {
            match splitter.split(region) {
                Ok(splits) => plan.splits = splits,
                Err(e) => plan.split_error = Some(e.to_string()),
            }
        } else {
            plan.depth_limited = true;
        }
    }

    Ok(plan)
}

/// Processes search regions.
#[derive(Debug, Clone)]
pub struct DiscoveryOrchestrator {
    ctx: Arc<HarvestContext>,
}

impl DiscoveryOrchestrator {
    /// Creates an orchestrator over a run context.
    #[must_use]
    pub fn new(ctx: Arc<HarvestContext>) -> Self {
        Self { ctx }
    }

    /// Searches one region and issues its follow-ups.
    ///
    /// Fails with a retryable error after retiring the session when the page
    /// is blocked or the results contradict the declared total.
    pub async fn process_region(
        &self,
        page: &dyn BrowserPage,
        session: &dyn Session,
        region: &SearchRegion,
        ignore_status: bool,
    ) -> HarvestResult<DiscoveryOutcome> {
        let timer = SpanTimer::start("region");
        let region_id = query::identify(region);
        let mut outcome = DiscoveryOutcome::new();

        if self.ctx.tracker().is_over_budget(0) {
            debug!(region = %region_id, "Budget met, region not searched");
            outcome.enter(DiscoveryState::Done);
            return Ok(outcome);
        }

        outcome.enter(DiscoveryState::AwaitingBatches);
        let url = query::search_url(&self.ctx.config().base_url, region)?;
        let (response, rendered) = self.await_batches(page, region, &url).await?;

        if let Some(marker) = self.blocking_marker(page).await {
            session.retire();
            return Err(HarvestError::Blocked { marker });
        }

        outcome.enter(DiscoveryState::Validating);
        let batches = [
            response.and_then(|r| RawResultBatch::from_search_state(&r.body)),
            rendered.and_then(|state| RawResultBatch::from_search_state(&state)),
        ];
        let merged = merge(&batches, self.ctx.tracker().extracted());
        let verdict = merged.verdict();
        outcome.verdict = Some(verdict);

        match verdict {
            MergeVerdict::Inconsistent => {
                outcome.enter(DiscoveryState::Inconsistent);
                warn!(
                    region = %region_id,
                    declared_total = merged.declared_total,
                    "Search returned nothing despite declared results, retiring session"
                );
                session.retire();
                return Err(HarvestError::InconsistentResults {
                    declared_total: merged.declared_total,
                });
            }
            MergeVerdict::EmptyTerminal => {
                outcome.enter(DiscoveryState::EmptyTerminal);
                info!(region = %region_id, page = region.effective_page(), "No results");
                outcome.merged = merged;
                outcome.enter(DiscoveryState::Done);
                return Ok(outcome);
            }
            MergeVerdict::Accepted => outcome.enter(DiscoveryState::Accepted),
        }

        info!(
            region = %region_id,
            page = region.effective_page(),
            depth = region.split_depth(),
            new = merged.len(),
            observed = merged.observed,
            declared_total = merged.declared_total,
            "Region results merged"
        );

        let mut counts = FollowUpCounts::default();
        self.issue_listings(&url, &merged, ignore_status, &mut counts).await;

        let plan = plan_follow_ups(
            self.ctx.config(),
            self.ctx.splitter(),
            region,
            &merged,
            self.ctx.tracker().is_over_budget(0),
        )?;
        if let Some(reason) = &plan.split_error {
            warn!(region = %region_id, error = %reason, "Region cannot be split, paginating only");
            self.ctx.record_error();
            counts.failed += 1;
        }
        if plan.depth_limited {
            info!(
                region = %region_id,
                depth = region.split_depth(),
                declared_total = merged.declared_total,
                "Maximum split depth reached, not splitting"
            );
        }

        if !plan.pages.is_empty() {
            outcome.enter(DiscoveryState::Paginating);
            for page_region in plan.pages {
                self.issue_region(WorkLabel::Pagination, page_region, ignore_status, &mut counts, |c| {
                    c.pages += 1;
                })
                .await;
            }
        }
        if !plan.splits.is_empty() {
            outcome.enter(DiscoveryState::Splitting);
            for sub_region in plan.splits {
                self.issue_region(WorkLabel::Query, sub_region, ignore_status, &mut counts, |c| {
                    c.splits += 1;
                })
                .await;
            }
        }

        outcome.enter(DiscoveryState::Done);
        outcome.depth_limited = plan.depth_limited;
        outcome.follow_ups = counts;
        outcome.merged = merged;

        debug!(
            region = %region_id,
            issued = counts.issued(),
            duration_ms = timer.finish(),
            "Region processed"
        );
        Ok(outcome)
    }

    /// Navigates and, concurrently, waits for the intercepted search
    /// response. The rendered page data is read once navigation completes.
    async fn await_batches(
        &self,
        page: &dyn BrowserPage,
        region: &SearchRegion,
        url: &str,
    ) -> HarvestResult<(Option<InterceptedResponse>, Option<Value>)> {
        let timeout = self.ctx.config().response_timeout();
        let wanted = region.clone();
        let matcher = ResponseMatcher::new(move |candidate| query::response_matches(candidate, &wanted));

        let wait = async {
            match tokio::time::timeout(timeout, page.wait_for_response(matcher, timeout)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    debug!(error = %e, "Search response interception failed");
                    None
                }
                Err(_) => {
                    debug!(timeout_secs = timeout.as_secs_f64(), "Search response timed out");
                    None
                }
            }
        };
        let render = async {
            page.navigate(url).await?;
            let state = match page.evaluate(RENDER_STATE_SCRIPT, Value::Null).await {
                Ok(Value::Null) => None,
                Ok(state) => Some(state),
                Err(e) => {
                    debug!(error = %e, "Rendered page data unavailable");
                    None
                }
            };
            Ok::<Option<Value>, anyhow::Error>(state)
        };

        let (response, rendered) = tokio::join!(wait, render);
        let rendered = rendered.map_err(|e| HarvestError::Page(format!("navigation to {url} failed: {e}")))?;
        Ok((response, rendered))
    }

    async fn blocking_marker(&self, page: &dyn BrowserPage) -> Option<String> {
        let selector = &self.ctx.config().captcha_selector;
        match page.element_text(selector).await {
            Ok(Some(_)) => Some(selector.clone()),
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "Captcha probe failed");
                None
            }
        }
    }

    async fn issue_listings(
        &self,
        region_url: &str,
        merged: &MergedResultSet,
        ignore_status: bool,
        counts: &mut FollowUpCounts,
    ) {
        if self.ctx.tracker().is_over_budget(0) {
            return;
        }

        if !merged.stubs.is_empty() {
            let item = WorkItem::zpids(region_url, merged.stubs.clone()).with_ignore_status(ignore_status);
            self.issue(item, counts, |c| c.zpid_batches += 1).await;
        }
        for url in &merged.deferred {
            let absolute = url::Url::parse(&self.ctx.config().base_url)
                .and_then(|base| base.join(url))
                .map_or_else(|_| url.clone(), |u| u.to_string());
            let item = WorkItem::redirect(absolute).with_ignore_status(ignore_status);
            self.issue(item, counts, |c| c.redirects += 1).await;
        }
    }

    async fn issue_region(
        &self,
        label: WorkLabel,
        region: SearchRegion,
        ignore_status: bool,
        counts: &mut FollowUpCounts,
        on_added: impl FnOnce(&mut FollowUpCounts),
    ) {
        match WorkItem::search(&self.ctx.config().base_url, label, region) {
            Ok(item) => self.issue(item.with_ignore_status(ignore_status), counts, on_added).await,
            Err(e) => {
                warn!(%label, error = %e, "Could not build follow-up");
                self.ctx.record_error();
                counts.failed += 1;
            }
        }
    }

    async fn issue(
        &self,
        item: WorkItem,
        counts: &mut FollowUpCounts,
        on_added: impl FnOnce(&mut FollowUpCounts),
    ) {
        let label = item.label;
        let key = item.unique_key.clone();
        match self.ctx.queue().enqueue(item, EnqueueOptions::default()).await {
            Ok(receipt) if receipt.was_already_present => {
                debug!(%label, %key, "Follow-up already queued");
                counts.duplicates += 1;
            }
            Ok(_) => on_added(counts),
            Err(e) => {
                warn!(%label, %key, error = %e, "Failed to enqueue follow-up");
                self.ctx.record_error();
                counts.failed += 1;
            }
        }
    }
}
