//! Discovery states and outcomes.

use serde::{Deserialize, Serialize};

use crate::query::SearchRegion;
use crate::results::{MergeVerdict, MergedResultSet};

/// Step of processing one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryState {
    /// Nothing done yet.
    Initial,
    /// Waiting for the intercepted response and the rendered state.
    AwaitingBatches,
    /// Merging and classifying the batches.
    Validating,
    /// Listings found.
    Accepted,
    /// Nothing found and nothing declared.
    EmptyTerminal,
    /// Nothing found although upstream declared matches.
    Inconsistent,
    /// Issuing page follow-ups.
    Paginating,
    /// Issuing split follow-ups.
    Splitting,
    /// No further work from this region.
    Done,
}

/// Follow-ups a region should issue, decided before any is enqueued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowUpPlan {
    /// Further pages of the region.
    pub pages: Vec<SearchRegion>,
    /// Sub-regions.
    pub splits: Vec<SearchRegion>,
    /// Splitting was wanted but the region is at the depth ceiling.
    pub depth_limited: bool,
    /// Splitting was wanted but the splitter rejected the region.
    pub split_error: Option<String>,
}

impl FollowUpPlan {
    /// Returns true if nothing is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.splits.is_empty()
    }
}

/// Counts of follow-ups newly accepted by the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpCounts {
    /// Identifier batches.
    pub zpid_batches: usize,
    /// Legacy redirect items.
    pub redirects: usize,
    /// Page items.
    pub pages: usize,
    /// Sub-region items.
    pub splits: usize,
    /// Items the queue already knew.
    pub duplicates: usize,
    /// Follow-ups that could not be planned or enqueued.
    pub failed: usize,
}

impl FollowUpCounts {
    /// Total items newly accepted.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.zpid_batches + self.redirects + self.pages + self.splits
    }
}

/// Result of processing one region.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOutcome {
    /// States visited, in order.
    pub states: Vec<DiscoveryState>,
    /// Classification of the merge, absent if the region was not searched.
    pub verdict: Option<MergeVerdict>,
    /// The merged results.
    pub merged: MergedResultSet,
    /// Follow-ups issued.
    pub follow_ups: FollowUpCounts,
    /// Splitting stopped at the depth ceiling.
    pub depth_limited: bool,
}

impl DiscoveryOutcome {
    pub(crate) fn new() -> Self {
        Self {
            states: vec![DiscoveryState::Initial],
            verdict: None,
            merged: MergedResultSet::default(),
            follow_ups: FollowUpCounts::default(),
            depth_limited: false,
        }
    }

    pub(crate) fn enter(&mut self, state: DiscoveryState) {
        self.states.push(state);
    }

    /// The last state reached.
    #[must_use]
    pub fn final_state(&self) -> DiscoveryState {
        self.states.last().copied().unwrap_or(DiscoveryState::Initial)
    }

    /// Whether a state was visited.
    #[must_use]
    pub fn visited(&self, state: DiscoveryState) -> bool {
        self.states.contains(&state)
    }
}
