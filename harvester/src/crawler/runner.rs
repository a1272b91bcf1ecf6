//! Drives the work list to completion.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::harvester::{HandleOutcome, Harvester};
use crate::errors::{HarvestError, HarvestResult};
use crate::observability::SpanTimer;
use crate::ports::{BrowserPage, InMemoryWorkQueue, Session, WorkItem};

/// A browser page together with the session it runs under.
#[derive(Clone)]
pub struct PageLease {
    /// The page.
    pub page: Arc<dyn BrowserPage>,
    /// The session behind the page.
    pub session: Arc<dyn Session>,
}

impl fmt::Debug for PageLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageLease")
            .field("session_usable", &self.session.is_usable())
            .finish_non_exhaustive()
    }
}

/// Hands out pages for work items.
///
/// A provider may reuse a page across items but must not hand out a session
/// that reports itself unusable.
#[async_trait]
pub trait PageProvider: Send + Sync {
    /// Leases a page for one work item.
    async fn acquire(&self) -> HarvestResult<PageLease>;
}

/// Totals of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run ID.
    pub run_id: Uuid,
    /// Records emitted.
    pub extracted: usize,
    /// Work items finished.
    pub processed_requests: usize,
    /// Work items given up on.
    pub failed_requests: usize,
    /// Attempts put back for another try.
    pub retried_requests: usize,
    /// Work items left in the queue.
    pub pending: usize,
    /// Whether any error was recorded during the run.
    pub errors_occurred: bool,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

impl RunSummary {
    /// True when nothing failed and no error was recorded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.errors_occurred && self.failed_requests == 0
    }
}

#[derive(Debug, Default)]
struct RunStats {
    processed: usize,
    failed: usize,
    retried: usize,
}

/// Processes an [`InMemoryWorkQueue`] with bounded concurrency.
///
/// Items are fetched as slots free up, so follow-ups issued by one item are
/// picked up while its siblings are still running. Failed items are put back
/// until they run out of retries.
pub struct WorkListRunner {
    harvester: Harvester,
    queue: Arc<InMemoryWorkQueue>,
    pages: Arc<dyn PageProvider>,
}

impl fmt::Debug for WorkListRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkListRunner")
            .field("harvester", &self.harvester)
            .field("pending", &self.queue.pending_count())
            .finish_non_exhaustive()
    }
}

impl WorkListRunner {
    /// Creates a runner.
    ///
    /// `queue` must be the queue the harvester's context enqueues into.
    #[must_use]
    pub fn new(harvester: Harvester, queue: Arc<InMemoryWorkQueue>, pages: Arc<dyn PageProvider>) -> Self {
        Self {
            harvester,
            queue,
            pages,
        }
    }

    /// The harvester items are dispatched to.
    #[must_use]
    pub fn harvester(&self) -> &Harvester {
        &self.harvester
    }

    /// Runs until the queue is drained.
    pub async fn run(&self) -> HarvestResult<RunSummary> {
        self.run_with_limit(None).await
    }

    /// Runs until the queue is drained or `max_requests` items were started.
    ///
    /// Items not started stay in the queue, so a limited run can be resumed
    /// from a queue snapshot.
    pub async fn run_with_limit(&self, max_requests: Option<usize>) -> HarvestResult<RunSummary> {
        let ctx = self.harvester.context().clone();
        let concurrency = ctx.config().concurrency.max(1);
        let timer = SpanTimer::start("harvest_run");
        let mut stats = RunStats::default();
        let mut started = 0usize;
        let mut active = FuturesUnordered::new();

        info!(
            run_id = %ctx.identity().run_id,
            concurrency,
            pending = self.queue.pending_count(),
            max_items = ?ctx.tracker().cap(),
            "Harvest run started"
        );

        loop {
            while active.len() < concurrency && !max_requests.is_some_and(|limit| started >= limit) {
                let Some(item) = self.queue.fetch_next() else {
                    break;
                };
                started += 1;
                active.push(self.process(item));
            }

            let Some((item, result)) = active.next().await else {
                break;
            };
            self.settle(item, result, &mut stats);
        }

        let summary = RunSummary {
            run_id: ctx.identity().run_id,
            extracted: ctx.tracker().extracted_count(),
            processed_requests: stats.processed,
            failed_requests: stats.failed,
            retried_requests: stats.retried,
            pending: self.queue.pending_count(),
            errors_occurred: ctx.errors_occurred(),
            duration_ms: millis(timer.finish()),
        };

        if summary.succeeded() {
            info!(
                extracted = summary.extracted,
                processed = summary.processed_requests,
                duration_ms = summary.duration_ms,
                "Harvest finished successfully"
            );
        } else {
            warn!(
                extracted = summary.extracted,
                processed = summary.processed_requests,
                failed = summary.failed_requests,
                retried = summary.retried_requests,
                duration_ms = summary.duration_ms,
                "Harvest finished with errors"
            );
        }
        Ok(summary)
    }

    async fn process(&self, item: WorkItem) -> (WorkItem, HarvestResult<HandleOutcome>) {
        let result = match self.pages.acquire().await {
            Ok(lease) => {
                self.harvester
                    .handle(lease.page.as_ref(), lease.session.as_ref(), &item)
                    .await
            }
            Err(e) => Err(e),
        };
        (item, result)
    }

    fn settle(&self, item: WorkItem, result: HarvestResult<HandleOutcome>, stats: &mut RunStats) {
        let ctx = self.harvester.context();
        match result {
            Ok(outcome) => {
                debug!(label = %item.label, key = %item.unique_key, ?outcome, "Work item handled");
                stats.processed += 1;
                self.queue.mark_handled(item);
            }
            Err(e) if e.is_terminal_identifier() => {
                warn!(label = %item.label, key = %item.unique_key, error = %e, "Skipping unusable identifier");
                stats.processed += 1;
                self.queue.mark_handled(item);
            }
            Err(e) if e.is_retryable() && item.retry_count < ctx.config().max_request_retries => {
                warn!(
                    label = %item.label,
                    key = %item.unique_key,
                    attempt = item.retry_count + 1,
                    error = %e,
                    "Work item failed, retrying"
                );
                ctx.record_error();
                stats.retried += 1;
                self.queue.reclaim(item);
            }
            Err(e) => {
                log_failure(&item, &e);
                ctx.record_error();
                stats.failed += 1;
                self.queue.mark_failed(item);
            }
        }
    }
}

fn log_failure(item: &WorkItem, e: &HarvestError) {
    error!(
        label = %item.label,
        key = %item.unique_key,
        url = %item.url,
        attempts = item.retry_count + 1,
        kind = e.kind(),
        error = %e,
        "Work item failed"
    );
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn millis(ms: f64) -> u64 {
    ms.max(0.0).round() as u64
}
