//! Shared run state threaded through every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::budget::BudgetTracker;
use crate::config::HarvestConfig;
use crate::detail::{DetailSource, GraphQlDetailSource};
use crate::errors::HarvestResult;
use crate::ports::{NoOpRecordSink, RecordSink, WorkQueue};
use crate::query::{QuadrantSplitter, RegionSplitter};
use crate::transform::{DefaultTransform, OutputTransform, TransformContext};

/// Identity of one harvest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Unique run ID.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates an identity with a fresh ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    /// Creates an identity with a specific ID.
    #[must_use]
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
        }
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

/// Run-wide state: configuration, the budget tracker, the transform, and the
/// collaborators that receive work and records.
///
/// The tracker is the only mutable state shared between concurrent region
/// and extraction units; everything else is read-only after construction.
pub struct HarvestContext {
    config: Arc<HarvestConfig>,
    tracker: Arc<BudgetTracker>,
    transform: Arc<dyn OutputTransform>,
    sink: Arc<dyn RecordSink>,
    queue: Arc<dyn WorkQueue>,
    splitter: Arc<dyn RegionSplitter>,
    detail_source: Arc<dyn DetailSource>,
    errors_occurred: AtomicBool,
    identity: RunIdentity,
}

impl HarvestContext {
    /// Starts building a context for `config` feeding `queue`.
    #[must_use]
    pub fn builder(config: HarvestConfig, queue: Arc<dyn WorkQueue>) -> HarvestContextBuilder {
        HarvestContextBuilder::new(config, queue)
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// The budget tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<BudgetTracker> {
        &self.tracker
    }

    /// The output transform.
    #[must_use]
    pub fn transform(&self) -> &dyn OutputTransform {
        self.transform.as_ref()
    }

    /// The record sink.
    #[must_use]
    pub fn sink(&self) -> &dyn RecordSink {
        self.sink.as_ref()
    }

    /// The work queue.
    #[must_use]
    pub fn queue(&self) -> &dyn WorkQueue {
        self.queue.as_ref()
    }

    /// The region splitter.
    #[must_use]
    pub fn splitter(&self) -> &dyn RegionSplitter {
        self.splitter.as_ref()
    }

    /// The detail payload source.
    #[must_use]
    pub fn detail_source(&self) -> &dyn DetailSource {
        self.detail_source.as_ref()
    }

    /// The run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Transform context for a request.
    #[must_use]
    pub fn transform_context(&self, ignore_status: bool) -> TransformContext<'_> {
        TransformContext::new(&self.tracker, self.sink.as_ref()).with_ignore_status(ignore_status)
    }

    /// Records that some request failed.
    pub fn record_error(&self) {
        self.errors_occurred.store(true, Ordering::Relaxed);
    }

    /// Whether any request failed so far.
    #[must_use]
    pub fn errors_occurred(&self) -> bool {
        self.errors_occurred.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for HarvestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestContext")
            .field("run_id", &self.identity.run_id)
            .field("extracted", &self.tracker.extracted_count())
            .field("cap", &self.tracker.cap())
            .field("errors_occurred", &self.errors_occurred())
            .finish_non_exhaustive()
    }
}

/// Builder for [`HarvestContext`].
pub struct HarvestContextBuilder {
    config: HarvestConfig,
    queue: Arc<dyn WorkQueue>,
    tracker: Option<Arc<BudgetTracker>>,
    transform: Option<Arc<dyn OutputTransform>>,
    sink: Option<Arc<dyn RecordSink>>,
    splitter: Option<Arc<dyn RegionSplitter>>,
    detail_source: Option<Arc<dyn DetailSource>>,
    identity: Option<RunIdentity>,
}

impl HarvestContextBuilder {
    fn new(config: HarvestConfig, queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            config,
            queue,
            tracker: None,
            transform: None,
            sink: None,
            splitter: None,
            detail_source: None,
            identity: None,
        }
    }

    /// Shares an existing tracker, e.g. one restored on resume.
    #[must_use]
    pub fn tracker(mut self, tracker: Arc<BudgetTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Sets the transform.
    #[must_use]
    pub fn transform(mut self, transform: Arc<dyn OutputTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Sets the record sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the region splitter.
    #[must_use]
    pub fn splitter(mut self, splitter: Arc<dyn RegionSplitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    /// Sets the detail payload source.
    #[must_use]
    pub fn detail_source(mut self, source: Arc<dyn DetailSource>) -> Self {
        self.detail_source = Some(source);
        self
    }

    /// Sets the run identity.
    #[must_use]
    pub fn identity(mut self, identity: RunIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Validates the configuration and builds the context.
    pub fn build(self) -> HarvestResult<HarvestContext> {
        self.config.validate()?;

        let tracker = self
            .tracker
            .unwrap_or_else(|| Arc::new(BudgetTracker::new(self.config.item_cap())));
        let transform = self
            .transform
            .unwrap_or_else(|| Arc::new(DefaultTransform::from_config(&self.config)));

        Ok(HarvestContext {
            tracker,
            transform,
            sink: self.sink.unwrap_or_else(|| Arc::new(NoOpRecordSink)),
            queue: self.queue,
            splitter: self.splitter.unwrap_or_else(|| Arc::new(QuadrantSplitter)),
            detail_source: self
                .detail_source
                .unwrap_or_else(|| Arc::new(GraphQlDetailSource::default())),
            errors_occurred: AtomicBool::new(false),
            identity: self.identity.unwrap_or_default(),
            config: Arc::new(self.config),
        })
    }
}
