//! Output transform: map, filter and output of detail records.
//!
//! This module provides:
//! - The [`OutputTransform`] trait (`project = output ∘ filter ∘ map`)
//! - [`DefaultTransform`], driven by the run configuration
//! - [`TransformBuilder`] for caller overrides of any stage

mod builder;
mod default;
mod projection;
mod status;

use async_trait::async_trait;
use serde_json::Value;

use crate::budget::BudgetTracker;
use crate::errors::HarvestResult;
use crate::ports::RecordSink;

pub use builder::{CustomTransform, TransformBuilder};
pub use default::DefaultTransform;
pub use projection::{project, EXTENDED_FIELDS, SIMPLE_FIELDS};
pub use status::{record_date, StatusCategory};

/// Run state visible to the filter and output stages.
pub struct TransformContext<'a> {
    /// Emitted identifiers and the cap.
    pub tracker: &'a BudgetTracker,
    /// Destination of emitted records.
    pub sink: &'a dyn RecordSink,
    /// Skip the status category check.
    pub ignore_status: bool,
}

impl<'a> TransformContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(tracker: &'a BudgetTracker, sink: &'a dyn RecordSink) -> Self {
        Self {
            tracker,
            sink,
            ignore_status: false,
        }
    }

    /// Sets the status bypass flag.
    #[must_use]
    pub fn with_ignore_status(mut self, ignore_status: bool) -> Self {
        self.ignore_status = ignore_status;
        self
    }
}

/// What happened to a payload passed through [`OutputTransform::project`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// The record reached the sink.
    Emitted,
    /// The filter rejected the record.
    Filtered,
    /// The output stage declined the record (already emitted or over budget).
    Declined,
}

/// Three-stage record pipeline applied to every detail payload.
#[async_trait]
pub trait OutputTransform: Send + Sync {
    /// Shapes a raw detail payload into a record.
    fn map(&self, payload: Value) -> HarvestResult<Value>;

    /// Whether the record should be emitted.
    fn filter(&self, record: &Value, ctx: &TransformContext<'_>) -> bool;

    /// Emits the record. Returns true if it reached the sink.
    async fn output(&self, record: Value, ctx: &TransformContext<'_>) -> HarvestResult<bool>;

    /// Runs map, filter and output in order.
    async fn project(&self, payload: Value, ctx: &TransformContext<'_>) -> HarvestResult<Projection> {
        let record = self.map(payload)?;
        if !self.filter(&record, ctx) {
            return Ok(Projection::Filtered);
        }
        if self.output(record, ctx).await? {
            Ok(Projection::Emitted)
        } else {
            Ok(Projection::Declined)
        }
    }
}

/// Identifier of a projected record, whether stored as a string or a number.
#[must_use]
pub fn record_zpid(record: &Value) -> Option<String> {
    record.get("zpid").and_then(crate::identifier::from_json)
}
