//! Work queue port and an in-memory work list.

use async_trait::async_trait;
use dashmap::DashSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::work::{EnqueueOptions, EnqueueReceipt, WorkItem};
use crate::errors::HarvestResult;

/// Queue of follow-up work.
///
/// The queue is the dedup authority for region-level work: an item whose
/// `unique_key` was seen before is not added again.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Adds an item.
    async fn enqueue(&self, item: WorkItem, options: EnqueueOptions) -> HarvestResult<EnqueueReceipt>;
}

/// Serialized pending state of an [`InMemoryWorkQueue`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Items not yet fetched, in order.
    pub pending: Vec<WorkItem>,
    /// Every key ever accepted.
    pub seen_keys: Vec<String>,
}

/// In-memory work list.
///
/// Items are served in FIFO order, forefront items first. The whole pending
/// state can be snapshotted and restored to pause and resume a run.
#[derive(Debug, Default)]
pub struct InMemoryWorkQueue {
    pending: Mutex<VecDeque<WorkItem>>,
    seen: DashSet<String>,
    handled: Mutex<Vec<WorkItem>>,
    failed: Mutex<Vec<WorkItem>>,
}

impl InMemoryWorkQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a queue from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: QueueSnapshot) -> Self {
        let queue = Self::new();
        for key in snapshot.seen_keys {
            queue.seen.insert(key);
        }
        for item in snapshot.pending {
            queue.seen.insert(item.unique_key.clone());
            queue.pending.lock().push_back(item);
        }
        queue
    }

    /// Captures the pending state.
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        let mut seen_keys: Vec<String> = self.seen.iter().map(|k| k.key().clone()).collect();
        seen_keys.sort();
        QueueSnapshot {
            pending: self.pending.lock().iter().cloned().collect(),
            seen_keys,
        }
    }

    /// Takes the next item.
    pub fn fetch_next(&self) -> Option<WorkItem> {
        self.pending.lock().pop_front()
    }

    /// Takes up to `limit` items.
    pub fn fetch_batch(&self, limit: usize) -> Vec<WorkItem> {
        let mut pending = self.pending.lock();
        let take = limit.min(pending.len());
        pending.drain(..take).collect()
    }

    /// Puts an item back for another attempt, bypassing dedup.
    pub fn reclaim(&self, item: WorkItem) {
        let mut item = item;
        item.retry_count += 1;
        self.pending.lock().push_back(item);
    }

    /// Records a finished item.
    pub fn mark_handled(&self, item: WorkItem) {
        self.handled.lock().push(item);
    }

    /// Records an item that will not be attempted again.
    pub fn mark_failed(&self, item: WorkItem) {
        self.failed.lock().push(item);
    }

    /// Number of pending items.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Pending items, in order.
    #[must_use]
    pub fn pending(&self) -> Vec<WorkItem> {
        self.pending.lock().iter().cloned().collect()
    }

    /// Items handled so far.
    #[must_use]
    pub fn handled(&self) -> Vec<WorkItem> {
        self.handled.lock().clone()
    }

    /// Items that failed for good.
    #[must_use]
    pub fn failed(&self) -> Vec<WorkItem> {
        self.failed.lock().clone()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, item: WorkItem, options: EnqueueOptions) -> HarvestResult<EnqueueReceipt> {
        if !self.seen.insert(item.unique_key.clone()) {
            return Ok(EnqueueReceipt {
                was_already_present: true,
            });
        }

        let mut pending = self.pending.lock();
        if options.forefront {
            pending.push_front(item);
        } else {
            pending.push_back(item);
        }
        Ok(EnqueueReceipt::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_dedup_by_unique_key() {
        let queue = InMemoryWorkQueue::new();

        let first = queue.enqueue(WorkItem::detail("u", "1"), EnqueueOptions::default()).await.unwrap();
        let again = queue.enqueue(WorkItem::detail("u2", "1"), EnqueueOptions::default()).await.unwrap();

        assert!(!first.was_already_present);
        assert!(again.was_already_present);
        assert_eq!(queue.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_forefront_order() {
        let queue = InMemoryWorkQueue::new();
        queue.enqueue(WorkItem::detail("u", "1"), EnqueueOptions::default()).await.unwrap();
        queue.enqueue(WorkItem::detail("u", "2"), EnqueueOptions::forefront()).await.unwrap();

        let order: Vec<String> = queue.fetch_batch(5).into_iter().map(|i| i.unique_key).collect();
        assert_eq!(order, vec!["detail:2".to_string(), "detail:1".to_string()]);
        assert!(queue.is_finished());
    }

    #[tokio::test]
    async fn test_reclaim_bypasses_dedup() {
        let queue = InMemoryWorkQueue::new();
        queue.enqueue(WorkItem::detail("u", "1"), EnqueueOptions::default()).await.unwrap();

        let item = queue.fetch_next().unwrap();
        queue.reclaim(item);

        let item = queue.fetch_next().unwrap();
        assert_eq!(item.retry_count, 1);
    }

    #[tokio::test]
    async fn test_snapshot_restore() {
        let queue = InMemoryWorkQueue::new();
        queue.enqueue(WorkItem::detail("u", "1"), EnqueueOptions::default()).await.unwrap();
        queue.enqueue(WorkItem::detail("u", "2"), EnqueueOptions::default()).await.unwrap();
        let done = queue.fetch_next().unwrap();
        queue.mark_handled(done);

        let json = serde_json::to_string(&queue.snapshot()).unwrap();
        let restored = InMemoryWorkQueue::from_snapshot(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.pending_count(), 1);
        let replay = restored
            .enqueue(WorkItem::detail("u", "1"), EnqueueOptions::default())
            .await
            .unwrap();
        assert!(replay.was_already_present);
    }
}
