//! Periodic extraction progress.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::budget::BudgetTracker;

/// Logs the emitted record count at a fixed interval until finished.
#[derive(Debug)]
pub struct ProgressReporter {
    tracker: Arc<BudgetTracker>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Starts reporting. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(tracker: Arc<BudgetTracker>, interval: Duration) -> Self {
        let watched = tracker.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                info!(extracted = watched.extracted_count(), "Extracted so far");
            }
        });
        Self { tracker, handle }
    }

    /// Stops reporting and logs the final count, which it returns.
    pub fn finish(self) -> usize {
        self.handle.abort();
        let extracted = self.tracker.extracted_count();
        info!(extracted, "Extraction finished");
        extracted
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reports_until_finished() {
        let tracker = Arc::new(BudgetTracker::unbounded());
        let reporter = ProgressReporter::start(tracker.clone(), Duration::from_secs(10));

        tracker.record("1");
        tokio::time::sleep(Duration::from_secs(25)).await;
        tracker.record("2");

        assert_eq!(reporter.finish(), 2);
    }
}
