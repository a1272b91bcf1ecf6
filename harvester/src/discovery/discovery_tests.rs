//! Tests for region discovery.

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::config::HarvestConfig;
    use crate::discovery::{plan_follow_ups, DiscoveryOrchestrator, DiscoveryState};
    use crate::errors::HarvestError;
    use crate::ports::{WorkItem, WorkLabel, WorkPayload};
    use crate::query::{QuadrantSplitter, SearchRegion};
    use crate::results::{merge, CategoryResults, ListingStub, MergeVerdict, RawResultBatch};
    use crate::budget::ExtractedSet;
    use crate::testing::{
        austin_region, rendered_page, search_body, search_body_from, search_response, test_config,
        HarvestFixture, ScriptedPage, StaticSession,
    };

    fn page_with(region: &SearchRegion, zpids: &[&str], total: u64) -> ScriptedPage {
        ScriptedPage::new().with_response(search_response(region, search_body(zpids, total)).unwrap())
    }

    fn labels(items: &[WorkItem], label: WorkLabel) -> Vec<WorkItem> {
        items.iter().filter(|i| i.label == label).cloned().collect()
    }

    fn batched_zpids(items: &[WorkItem]) -> Vec<String> {
        items
            .iter()
            .filter_map(|i| match &i.payload {
                WorkPayload::Listings { stubs } => Some(stubs.iter().map(|s| s.zpid.clone()).collect::<Vec<_>>()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[tokio::test]
    async fn test_accepted_region_fans_out() {
        let fx = HarvestFixture::new(test_config().with_max_depth(1));
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = austin_region();
        let page = page_with(&region, &["1", "2", "3"], 100);
        let session = StaticSession::new();

        let outcome = orchestrator.process_region(&page, &session, &region, false).await.unwrap();

        assert_eq!(outcome.verdict, Some(MergeVerdict::Accepted));
        assert_eq!(
            outcome.states,
            vec![
                DiscoveryState::Initial,
                DiscoveryState::AwaitingBatches,
                DiscoveryState::Validating,
                DiscoveryState::Accepted,
                DiscoveryState::Paginating,
                DiscoveryState::Splitting,
                DiscoveryState::Done,
            ]
        );
        assert_eq!(outcome.follow_ups.zpid_batches, 1);
        assert_eq!(outcome.follow_ups.pages, 2);
        assert_eq!(outcome.follow_ups.splits, 4);

        let pending = fx.queue.pending();
        assert_eq!(batched_zpids(&pending), vec!["1", "2", "3"]);

        let pages: Vec<u32> = labels(&pending, WorkLabel::Pagination)
            .iter()
            .filter_map(|i| i.region().and_then(SearchRegion::page))
            .collect();
        assert_eq!(pages, vec![2, 3]);
        assert!(!session.is_retired());
    }

    #[tokio::test]
    async fn test_empty_region_is_terminal() {
        let fx = HarvestFixture::default();
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = austin_region();
        let page = page_with(&region, &[], 0);
        let session = StaticSession::new();

        let outcome = orchestrator.process_region(&page, &session, &region, false).await.unwrap();

        assert_eq!(outcome.verdict, Some(MergeVerdict::EmptyTerminal));
        assert!(outcome.visited(DiscoveryState::EmptyTerminal));
        assert_eq!(outcome.final_state(), DiscoveryState::Done);
        assert!(fx.queue.pending().is_empty());
        assert!(!session.is_retired());
    }

    #[tokio::test]
    async fn test_missing_batches_are_empty() {
        let fx = HarvestFixture::default();
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let session = StaticSession::new();

        let outcome = orchestrator
            .process_region(&ScriptedPage::new(), &session, &austin_region(), false)
            .await
            .unwrap();

        assert_eq!(outcome.verdict, Some(MergeVerdict::EmptyTerminal));
    }

    #[tokio::test]
    async fn test_inconsistent_results_retire_session() {
        let fx = HarvestFixture::default();
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = austin_region();
        let page = page_with(&region, &[], 5);
        let session = StaticSession::new();

        let err = orchestrator
            .process_region(&page, &session, &region, false)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::InconsistentResults { declared_total: 5 }));
        assert!(err.is_retryable());
        assert!(session.is_retired());
        assert!(fx.queue.pending().is_empty());
    }

    #[tokio::test]
    async fn test_rendered_state_alone_is_enough() {
        let fx = HarvestFixture::default();
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let page = ScriptedPage::new().with_rendered(rendered_page(search_body(&["7"], 1)));
        let session = StaticSession::new();

        let outcome = orchestrator
            .process_region(&page, &session, &austin_region(), false)
            .await
            .unwrap();

        assert_eq!(outcome.verdict, Some(MergeVerdict::Accepted));
        assert_eq!(batched_zpids(&fx.queue.pending()), vec!["7"]);
    }

    #[tokio::test]
    async fn test_response_and_render_are_merged() {
        let fx = HarvestFixture::default();
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = austin_region();
        let page = page_with(&region, &["1", "2"], 3)
            .with_rendered(rendered_page(search_body(&["2", "3"], 3)));
        let session = StaticSession::new();

        let outcome = orchestrator.process_region(&page, &session, &region, false).await.unwrap();

        assert_eq!(outcome.merged.observed, 3);
        assert_eq!(outcome.follow_ups.pages, 0);
        assert_eq!(batched_zpids(&fx.queue.pending()), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_captcha_blocks() {
        let fx = HarvestFixture::default();
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = austin_region();
        let page = page_with(&region, &["1"], 1).with_captcha("Press & Hold");
        let session = StaticSession::new();

        let err = orchestrator
            .process_region(&page, &session, &region, false)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Blocked { .. }));
        assert!(err.is_retryable());
        assert!(session.is_retired());
        assert!(fx.queue.pending().is_empty());
    }

    #[tokio::test]
    async fn test_navigation_failure() {
        let fx = HarvestFixture::default();
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let session = StaticSession::new();

        let err = orchestrator
            .process_region(&ScriptedPage::new().failing_navigation(), &session, &austin_region(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Page(_)));
    }

    #[tokio::test]
    async fn test_pagination_region_never_fans_out() {
        let fx = HarvestFixture::new(test_config().with_max_depth(3));
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = austin_region().with_page(2).unwrap();
        let page = page_with(&region, &["41", "42"], 900);
        let session = StaticSession::new();

        let outcome = orchestrator.process_region(&page, &session, &region, false).await.unwrap();

        assert_eq!(outcome.follow_ups.pages, 0);
        assert_eq!(outcome.follow_ups.splits, 0);
        assert_eq!(outcome.follow_ups.zpid_batches, 1);
        assert!(!outcome.visited(DiscoveryState::Paginating));
    }

    #[tokio::test]
    async fn test_depth_ceiling_stops_splitting_but_paginates() {
        let fx = HarvestFixture::new(test_config().with_max_depth(1));
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = austin_region().at_depth(1);
        let page = page_with(&region, &["1"], 90);
        let session = StaticSession::new();

        let outcome = orchestrator.process_region(&page, &session, &region, false).await.unwrap();

        assert!(outcome.depth_limited);
        assert_eq!(outcome.follow_ups.splits, 0);
        assert_eq!(outcome.follow_ups.pages, 2);
    }

    #[tokio::test]
    async fn test_unsplittable_region_still_paginates() {
        let fx = HarvestFixture::new(test_config().with_max_depth(1));
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = SearchRegion::from_state(json!({"usersSearchTerm": "Austin, TX"})).unwrap();
        let page = page_with(&region, &["1", "2"], 100);
        let session = StaticSession::new();

        let outcome = orchestrator.process_region(&page, &session, &region, false).await.unwrap();

        assert_eq!(outcome.verdict, Some(MergeVerdict::Accepted));
        assert_eq!(outcome.follow_ups.zpid_batches, 1);
        assert_eq!(outcome.follow_ups.pages, 2);
        assert_eq!(outcome.follow_ups.splits, 0);
        assert_eq!(outcome.follow_ups.failed, 1);
        assert!(fx.ctx.errors_occurred());
        assert_eq!(labels(&fx.queue.pending(), WorkLabel::Pagination).len(), 2);
        assert!(!session.is_retired());
    }

    #[tokio::test]
    async fn test_split_scenario_depth_zero_to_one() {
        let fx = HarvestFixture::new(test_config().with_max_depth(1));
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let session = StaticSession::new();
        let root = austin_region();

        let page = page_with(&root, &["1"], 41);
        orchestrator.process_region(&page, &session, &root, false).await.unwrap();

        let splits = labels(&fx.queue.pending(), WorkLabel::Query);
        assert_eq!(splits.len(), 4);
        assert!(splits.iter().all(|i| i.region().map(SearchRegion::split_depth) == Some(1)));

        let child = splits[0].region().unwrap().clone();
        let before = fx.queue.pending_count();
        let page = page_with(&child, &["2"], 41);
        let outcome = orchestrator.process_region(&page, &session, &child, false).await.unwrap();

        assert_eq!(outcome.follow_ups.splits, 0);
        let new_items = &fx.queue.pending()[before..];
        assert!(labels(new_items, WorkLabel::Query).is_empty());
    }

    #[tokio::test]
    async fn test_reprocessing_never_reissues_extracted() {
        let fx = HarvestFixture::default();
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = austin_region();
        let session = StaticSession::new();

        let page = page_with(&region, &["1", "2", "3"], 3);
        orchestrator.process_region(&page, &session, &region, false).await.unwrap();

        fx.ctx.tracker().record("1");
        fx.ctx.tracker().record("2");
        let before = fx.queue.pending_count();

        let page = page_with(&region, &["1", "2", "3"], 3);
        let outcome = orchestrator.process_region(&page, &session, &region, false).await.unwrap();

        assert_eq!(outcome.verdict, Some(MergeVerdict::Accepted));
        let issued = batched_zpids(&fx.queue.pending()[before..]);
        assert_eq!(issued, vec!["3"]);

        fx.ctx.tracker().record("3");
        let before = fx.queue.pending_count();
        let page = page_with(&region, &["1", "2", "3"], 3);
        let outcome = orchestrator.process_region(&page, &session, &region, false).await.unwrap();

        assert_eq!(outcome.verdict, Some(MergeVerdict::Accepted));
        assert_eq!(fx.queue.pending_count(), before);
    }

    #[tokio::test]
    async fn test_over_budget_skips_region() {
        let fx = HarvestFixture::new(test_config().with_max_items(1));
        fx.ctx.tracker().record("99");
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let page = ScriptedPage::new();

        let outcome = orchestrator
            .process_region(&page, &StaticSession::new(), &austin_region(), false)
            .await
            .unwrap();

        assert_eq!(outcome.verdict, None);
        assert_eq!(outcome.final_state(), DiscoveryState::Done);
        assert!(page.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_deferred_stubs_become_redirects() {
        let fx = HarvestFixture::default();
        let orchestrator = DiscoveryOrchestrator::new(fx.ctx.clone());
        let region = austin_region();
        let body = search_body_from(
            vec![json!({"zpid": null, "detailUrl": "/b/the-monarch-austin-tx/5XkKpR/"}), json!({"zpid": "4"})],
            2,
        );
        let page = ScriptedPage::new().with_response(search_response(&region, body).unwrap());

        let outcome = orchestrator
            .process_region(&page, &StaticSession::new(), &region, true)
            .await
            .unwrap();

        assert_eq!(outcome.follow_ups.redirects, 1);
        let redirects = labels(&fx.queue.pending(), WorkLabel::DetailRedirect);
        assert_eq!(redirects[0].url, "https://www.zillow.com/b/the-monarch-austin-tx/5XkKpR/");
        assert!(redirects[0].ignore_status);
    }

    fn merged(zpids: &[&str], total: u64) -> crate::results::MergedResultSet {
        let stubs = zpids.iter().map(|z| ListingStub::new(*z)).collect();
        merge(
            &[Some(RawResultBatch::new(vec![CategoryResults::with_list(stubs, total)]))],
            &ExtractedSet::new(),
        )
    }

    #[test]
    fn test_plan_page_count_is_capped() {
        let config = HarvestConfig::new();
        let plan = plan_follow_ups(&config, &QuadrantSplitter, &austin_region(), &merged(&["1"], 5_000), false)
            .unwrap();
        assert_eq!(plan.pages.len(), 19);
        assert_eq!(plan.pages.last().and_then(SearchRegion::page), Some(20));
        assert!(plan.splits.is_empty());
        assert!(!plan.depth_limited);
    }

    #[test]
    fn test_plan_nothing_when_fully_served() {
        let config = HarvestConfig::new().with_max_depth(2);
        let plan = plan_follow_ups(&config, &QuadrantSplitter, &austin_region(), &merged(&["1", "2"], 2), false)
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_keeps_pages_when_split_fails() {
        let config = HarvestConfig::new().with_max_depth(2);
        let region = SearchRegion::from_state(json!({"usersSearchTerm": "78701"})).unwrap();
        let plan = plan_follow_ups(&config, &QuadrantSplitter, &region, &merged(&["1"], 100), false).unwrap();

        assert_eq!(plan.pages.len(), 2);
        assert!(plan.splits.is_empty());
        assert!(plan.split_error.is_some());
    }

    #[test]
    fn test_plan_nothing_when_over_budget() {
        let config = HarvestConfig::new().with_max_depth(2);
        let plan = plan_follow_ups(&config, &QuadrantSplitter, &austin_region(), &merged(&["1"], 500), true)
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_single_extra_page() {
        let config = HarvestConfig::new();
        let zpids: Vec<String> = (1..=40).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = zpids.iter().map(String::as_str).collect();
        let plan = plan_follow_ups(&config, &QuadrantSplitter, &austin_region(), &merged(&refs, 41), false)
            .unwrap();
        assert_eq!(plan.pages.len(), 1);
    }
}
