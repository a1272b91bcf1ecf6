//! Run-wide record of emitted identifiers and the item cap.
//!
//! The extracted set only grows. Membership and size checks taken by
//! concurrent regions are snapshots, so the cap is enforced best effort and
//! may be overshot by in-flight work.

use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Concurrent append-only set of emitted identifiers.
#[derive(Debug, Default)]
pub struct ExtractedSet {
    ids: DashSet<String>,
}

impl ExtractedSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an identifier. Returns true if it was not present.
    pub fn insert(&self, zpid: &str) -> bool {
        self.ids.insert(zpid.to_string())
    }

    /// Whether the identifier has been emitted.
    #[must_use]
    pub fn contains(&self, zpid: &str) -> bool {
        self.ids.contains(zpid)
    }

    /// Number of emitted identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Tracks emitted identifiers against the optional cap.
#[derive(Debug, Default)]
pub struct BudgetTracker {
    extracted: ExtractedSet,
    cap: Option<usize>,
    limit_logged: AtomicBool,
}

impl BudgetTracker {
    /// Creates a tracker. A cap of `None` or zero is unbounded.
    #[must_use]
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            extracted: ExtractedSet::new(),
            cap: cap.filter(|cap| *cap > 0),
            limit_logged: AtomicBool::new(false),
        }
    }

    /// Creates an unbounded tracker.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// The configured cap.
    #[must_use]
    pub fn cap(&self) -> Option<usize> {
        self.cap
    }

    /// The underlying set.
    #[must_use]
    pub fn extracted(&self) -> &ExtractedSet {
        &self.extracted
    }

    /// Number of emitted records.
    #[must_use]
    pub fn extracted_count(&self) -> usize {
        self.extracted.len()
    }

    /// Whether the identifier has already been emitted.
    #[must_use]
    pub fn contains(&self, zpid: &str) -> bool {
        self.extracted.contains(zpid)
    }

    /// True iff a cap is set and `emitted + extra` has reached it.
    #[must_use]
    pub fn is_over_budget(&self, extra: usize) -> bool {
        match self.cap {
            Some(cap) => {
                let over = self.extracted.len().saturating_add(extra) >= cap;
                if over && extra == 0 && !self.limit_logged.swap(true, Ordering::Relaxed) {
                    info!(cap, "Reached the maximum number of items");
                }
                over
            }
            None => false,
        }
    }

    /// Records an emitted identifier. Returns true if it was new.
    pub fn record(&self, zpid: &str) -> bool {
        self.extracted.insert(zpid)
    }

    /// Records still allowed under the cap, `None` when unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<usize> {
        self.cap.map(|cap| cap.saturating_sub(self.extracted.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_extracted_set_insert() {
        let set = ExtractedSet::new();
        assert!(set.is_empty());
        assert!(set.insert("1"));
        assert!(!set.insert("1"));
        assert!(set.contains("1"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_unbounded_never_over() {
        let tracker = BudgetTracker::unbounded();
        for i in 0..100 {
            tracker.record(&i.to_string());
        }
        assert!(!tracker.is_over_budget(0));
        assert!(!tracker.is_over_budget(1_000));
        assert!(tracker.remaining().is_none());
    }

    #[test]
    fn test_zero_cap_is_unbounded() {
        let tracker = BudgetTracker::new(Some(0));
        assert!(tracker.cap().is_none());
        assert!(!tracker.is_over_budget(0));
    }

    #[test]
    fn test_over_budget_exactly_at_cap_and_stays() {
        let tracker = BudgetTracker::new(Some(3));

        tracker.record("1");
        tracker.record("2");
        assert!(!tracker.is_over_budget(0));
        assert!(tracker.is_over_budget(1));
        assert_eq!(tracker.remaining(), Some(1));

        tracker.record("3");
        assert!(tracker.is_over_budget(0));

        tracker.record("4");
        assert!(tracker.is_over_budget(0));
        assert_eq!(tracker.remaining(), Some(0));
    }

    #[test]
    fn test_duplicate_record_does_not_count() {
        let tracker = BudgetTracker::new(Some(2));
        assert!(tracker.record("7"));
        assert!(!tracker.record("7"));
        assert_eq!(tracker.extracted_count(), 1);
        assert!(!tracker.is_over_budget(0));
    }

    #[tokio::test]
    async fn test_concurrent_inserts() {
        let tracker = Arc::new(BudgetTracker::unbounded());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    tracker.record(&((worker * 50) + i).to_string());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Workers overlap by 50 ids each, leaving 8 * 50 + 50 unique ids.
        assert_eq!(tracker.extracted_count(), 450);
    }
}
