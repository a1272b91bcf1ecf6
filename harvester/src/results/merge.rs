//! Merging of overlapping result batches.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::batch::{ListingStub, RawResultBatch};
use crate::budget::ExtractedSet;
use crate::identifier;

/// Outcome of validating a merged result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeVerdict {
    /// Listings were found.
    Accepted,
    /// Nothing found and nothing declared.
    EmptyTerminal,
    /// Nothing found although upstream declared matches.
    Inconsistent,
}

/// Deduplicated stubs from all batches of one region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedResultSet {
    /// New stubs in first-seen order, identifiers canonical.
    pub stubs: Vec<ListingStub>,
    /// Largest declared total across batches. A lower bound on true matches.
    pub declared_total: u64,
    /// Unique valid identifiers seen, including already extracted ones.
    pub observed: usize,
    /// Detail URLs of stubs with no usable identifier.
    pub deferred: Vec<String>,
}

impl MergedResultSet {
    /// Classifies the merge.
    ///
    /// Validation counts every valid identifier seen, so a region whose
    /// listings were all extracted earlier is still `Accepted`.
    #[must_use]
    pub fn verdict(&self) -> MergeVerdict {
        if self.observed > 0 || !self.deferred.is_empty() {
            MergeVerdict::Accepted
        } else if self.declared_total == 0 {
            MergeVerdict::EmptyTerminal
        } else {
            MergeVerdict::Inconsistent
        }
    }

    /// Whether upstream declared more matches than were served.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        u64::try_from(self.observed).map_or(false, |observed| self.declared_total > observed)
    }

    /// Number of new stubs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    /// Returns true if no new stubs were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }
}

/// Merges result batches for one region.
///
/// Absent batches contribute nothing. Stubs with unusable identifiers are
/// dropped (their detail URL is kept for deferred lookup). The first stub
/// seen for an identifier wins; identifiers already in `extracted` are
/// counted as observed but not returned.
#[must_use]
pub fn merge(batches: &[Option<RawResultBatch>], extracted: &ExtractedSet) -> MergedResultSet {
    let mut merged = MergedResultSet::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut deferred_seen: HashSet<String> = HashSet::new();

    for batch in batches.iter().flatten() {
        merged.declared_total = merged.declared_total.max(batch.declared_total());

        for stub in batch.stubs() {
            let Some(zpid) = identifier::normalize(&stub.zpid) else {
                if let Some(url) = &stub.detail_url {
                    if deferred_seen.insert(url.clone()) {
                        merged.deferred.push(url.clone());
                    }
                }
                continue;
            };

            if !seen.insert(zpid.clone()) {
                continue;
            }
            merged.observed += 1;

            if extracted.contains(&zpid) {
                continue;
            }

            merged.stubs.push(ListingStub {
                zpid,
                detail_url: stub.detail_url.clone(),
                relaxed: stub.relaxed,
            });
        }
    }

    merged
}
