//! # Harvester
//!
//! Discovery and deduplicated extraction of listings from a map-search site
//! that caps how many results one query returns.
//!
//! Harvester provides:
//!
//! - **Query state codec**: Regions round-trip through the site's URL query state
//! - **Region splitting**: Truncated regions are split into quadrants up to a depth limit
//! - **Result merging**: Overlapping result batches collapse to unique identifiers
//! - **Discovery**: Each region fans out into pages, sub-regions and detail work
//! - **Budgeted extraction**: Details are fetched, filtered and emitted once each, up to a cap
//! - **Output transforms**: Pluggable map, filter and output stages
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use harvester::prelude::*;
//! use std::sync::Arc;
//!
//! let config = HarvestConfig::from_json_file("input.json")?.with_max_depth(2);
//! let queue = Arc::new(InMemoryWorkQueue::new());
//! let ctx = HarvestContext::builder(config, queue.clone())
//!     .sink(Arc::new(LoggingRecordSink::default()))
//!     .build()?;
//!
//! let harvester = Harvester::new(Arc::new(ctx));
//! harvester.seed_urls(&start_urls).await?;
//!
//! let summary = WorkListRunner::new(harvester, queue, browser_pool).run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod budget;
pub mod config;
pub mod context;
pub mod crawler;
pub mod detail;
pub mod discovery;
pub mod errors;
pub mod identifier;
pub mod observability;
pub mod ports;
pub mod query;
pub mod results;
pub mod testing;
pub mod transform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::budget::{BudgetTracker, ExtractedSet};
    pub use crate::config::{HarvestConfig, ProjectionMode};
    pub use crate::context::{HarvestContext, HarvestContextBuilder, RunIdentity};
    pub use crate::crawler::{HandleOutcome, Harvester, PageLease, PageProvider, RunSummary, WorkListRunner};
    pub use crate::detail::{DetailExtractor, DetailSource, ExtractionOutcome, GraphQlDetailSource};
    pub use crate::discovery::{DiscoveryOrchestrator, DiscoveryOutcome, DiscoveryState};
    pub use crate::errors::{HarvestError, HarvestResult};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::ports::{
        BrowserPage, CollectingRecordSink, InMemoryWorkQueue, LoggingRecordSink, NoOpRecordSink,
        RecordSink, Session, WorkItem, WorkLabel, WorkQueue,
    };
    pub use crate::query::{MapBounds, QuadrantSplitter, RegionSplitter, SearchRegion};
    pub use crate::results::{merge, MergeVerdict, MergedResultSet, RawResultBatch};
    pub use crate::transform::{DefaultTransform, OutputTransform, StatusCategory, TransformBuilder};
}
