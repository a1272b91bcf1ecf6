//! Label dispatch of work items.

use std::sync::Arc;
use tracing::{debug, info};

use crate::context::HarvestContext;
use crate::detail::{BatchReport, DetailExtractor, DetailRequest, ExtractionOutcome};
use crate::discovery::{DiscoveryOrchestrator, DiscoveryOutcome};
use crate::errors::{HarvestError, HarvestResult};
use crate::identifier;
use crate::ports::{BrowserPage, EnqueueOptions, Session, WorkItem, WorkLabel, WorkPayload};
use crate::query::{self, SearchRegion};

/// What handling a work item produced.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// A region was searched.
    Discovery(DiscoveryOutcome),
    /// An identifier batch was extracted.
    Batch(BatchReport),
    /// A single identifier was extracted.
    Extraction(ExtractionOutcome),
}

/// Routes work items to discovery or detail extraction by label.
#[derive(Debug, Clone)]
pub struct Harvester {
    ctx: Arc<HarvestContext>,
    discovery: DiscoveryOrchestrator,
    detail: DetailExtractor,
}

impl Harvester {
    /// Creates a harvester over a run context.
    #[must_use]
    pub fn new(ctx: Arc<HarvestContext>) -> Self {
        Self {
            discovery: DiscoveryOrchestrator::new(ctx.clone()),
            detail: DetailExtractor::new(ctx.clone()),
            ctx,
        }
    }

    /// The run context.
    #[must_use]
    pub fn context(&self) -> &Arc<HarvestContext> {
        &self.ctx
    }

    /// Enqueues top-level regions. Returns the number newly queued.
    pub async fn seed_regions(&self, regions: Vec<SearchRegion>) -> HarvestResult<usize> {
        let mut added = 0;
        for region in regions {
            let item = WorkItem::search(&self.ctx.config().base_url, WorkLabel::InitialSearch, region)?;
            added += self.seed(item).await?;
        }
        Ok(added)
    }

    /// Enqueues start URLs: search pages become initial searches, detail
    /// pages with an identifier become detail items, anything else on the
    /// site is resolved as a legacy redirect.
    pub async fn seed_urls(&self, urls: &[String]) -> HarvestResult<usize> {
        let mut added = 0;
        for raw in urls {
            let parsed = url::Url::parse(raw)
                .map_err(|e| HarvestError::InvalidRegion(format!("invalid start URL '{raw}': {e}")))?;

            let item = if parsed.query_pairs().any(|(k, _)| k == query::codec::QUERY_STATE_PARAM) {
                let region = query::region_from_search_url(raw)?;
                WorkItem::search(&self.ctx.config().base_url, WorkLabel::InitialSearch, region)?
            } else if let Some(zpid) = identifier::from_detail_url(raw) {
                WorkItem::detail(raw.clone(), zpid).with_ignore_status(true)
            } else {
                WorkItem::redirect(raw.clone()).with_ignore_status(true)
            };
            added += self.seed(item).await?;
        }
        Ok(added)
    }

    /// Enqueues identifiers for direct extraction.
    ///
    /// Identifiers are validated when handled, not here, so a malformed one
    /// fails as its own request.
    pub async fn seed_zpids(&self, zpids: &[String]) -> HarvestResult<usize> {
        let mut added = 0;
        for zpid in zpids {
            let url = crate::detail::detail_page_url(&self.ctx.config().base_url, zpid, None);
            added += self.seed(WorkItem::detail(url, zpid.clone()).with_ignore_status(true)).await?;
        }
        Ok(added)
    }

    async fn seed(&self, item: WorkItem) -> HarvestResult<usize> {
        debug!(label = %item.label, key = %item.unique_key, "Seeding");
        let receipt = self.ctx.queue().enqueue(item, EnqueueOptions::default()).await?;
        Ok(usize::from(!receipt.was_already_present))
    }

    /// Handles one work item.
    pub async fn handle(
        &self,
        page: &dyn BrowserPage,
        session: &dyn Session,
        item: &WorkItem,
    ) -> HarvestResult<HandleOutcome> {
        match (item.label, &item.payload) {
            (label, WorkPayload::Search { region }) if label.is_search() => {
                info!(%label, page = region.effective_page(), depth = region.split_depth(), "Searching region");
                let outcome = self
                    .discovery
                    .process_region(page, session, region, item.ignore_status)
                    .await?;
                Ok(HandleOutcome::Discovery(outcome))
            }
            (WorkLabel::Zpids, WorkPayload::Listings { stubs }) => {
                let report = self
                    .detail
                    .extract_batch(page, session, stubs, item.ignore_status)
                    .await?;
                Ok(HandleOutcome::Batch(report))
            }
            (WorkLabel::Detail, WorkPayload::Detail { zpid }) => {
                let request = DetailRequest::new(zpid.clone())
                    .with_detail_url(item.url.clone())
                    .with_ignore_status(item.ignore_status)
                    .with_attempt(item.retry_count);
                let outcome = self.detail.extract(page, session, &request).await?;
                Ok(HandleOutcome::Extraction(outcome))
            }
            (WorkLabel::DetailRedirect, WorkPayload::Redirect) => {
                let outcome = self
                    .detail
                    .resolve_redirect(page, session, &item.url, item.ignore_status)
                    .await?;
                Ok(HandleOutcome::Extraction(outcome))
            }
            (label, _) => Err(HarvestError::Queue(format!(
                "work item {} labelled {label} carries a mismatched payload",
                item.unique_key
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{austin_region, HarvestFixture, ScriptedPage, StaticSession, TEST_BASE_URL};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_seed_urls_routes_by_shape() {
        let fx = HarvestFixture::default();
        let harvester = Harvester::new(fx.ctx.clone());
        let search = query::search_url(TEST_BASE_URL, &austin_region()).unwrap();

        let added = harvester
            .seed_urls(&[
                search.clone(),
                format!("{TEST_BASE_URL}/homedetails/1-Main-St/123_zpid/"),
                format!("{TEST_BASE_URL}/b/the-monarch/5XkKpR/"),
                search,
            ])
            .await
            .unwrap();

        assert_eq!(added, 3);
        let labels: Vec<WorkLabel> = fx.queue.pending().iter().map(|i| i.label).collect();
        assert_eq!(
            labels,
            vec![WorkLabel::InitialSearch, WorkLabel::Detail, WorkLabel::DetailRedirect]
        );
        assert_eq!(fx.queue.pending()[0].region(), Some(&austin_region()));
    }

    #[tokio::test]
    async fn test_seed_urls_rejects_garbage() {
        let fx = HarvestFixture::default();
        let harvester = Harvester::new(fx.ctx.clone());
        assert!(harvester.seed_urls(&["not a url".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_handle_rejects_mismatched_payload() {
        let fx = HarvestFixture::default();
        let harvester = Harvester::new(fx.ctx.clone());
        let mut item = WorkItem::detail("u", "1");
        item.label = WorkLabel::Zpids;

        let err = harvester
            .handle(&ScriptedPage::new(), &StaticSession::new(), &item)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Queue(_)));
    }

    #[tokio::test]
    async fn test_handle_detail_item() {
        let fx = HarvestFixture::default();
        let harvester = Harvester::new(fx.ctx.clone());
        harvester.seed_zpids(&["55".to_string()]).await.unwrap();
        let item = fx.queue.fetch_next().unwrap();

        let outcome = harvester
            .handle(&ScriptedPage::new(), &StaticSession::new(), &item)
            .await
            .unwrap();

        assert_eq!(outcome, HandleOutcome::Extraction(ExtractionOutcome::Extracted));
        assert_eq!(fx.sink.zpids(), vec!["55".to_string()]);
    }
}
