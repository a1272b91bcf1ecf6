//! Collaborator ports.
//!
//! This module provides:
//! - The work item model and route labels
//! - The work queue trait and an in-memory work list
//! - Session and browser page traits
//! - The record sink trait with no-op, logging and collecting sinks

mod browser;
mod queue;
mod sink;
mod work;

pub use browser::{BrowserPage, InterceptedResponse, ResponseMatcher, Session};
#[cfg(test)]
pub use browser::MockSession;
pub use queue::{InMemoryWorkQueue, QueueSnapshot, WorkQueue};
pub use sink::{CollectingRecordSink, LoggingRecordSink, NoOpRecordSink, RecordSink};
pub use work::{EnqueueOptions, EnqueueReceipt, WorkItem, WorkLabel, WorkPayload};
