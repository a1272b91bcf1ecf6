//! Discovery of listings in a region.
//!
//! A region is searched once: the intercepted search response and the
//! rendered page data are merged, the result is validated against the
//! declared total, and the region fans out into identifier batches, further
//! pages and sub-regions through the work queue. Recursion happens only by
//! way of the queue, so depth and budget are checked at every expansion.

mod orchestrator;
mod state;

pub use orchestrator::{plan_follow_ups, DiscoveryOrchestrator, RENDER_STATE_SCRIPT};
pub use state::{DiscoveryOutcome, DiscoveryState, FollowUpCounts, FollowUpPlan};

mod discovery_tests;
