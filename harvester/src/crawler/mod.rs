//! Work item dispatch and the run loop.
//!
//! This module provides:
//! - [`Harvester`], which routes each work item by label to region discovery,
//!   batch extraction, single extraction or redirect resolution
//! - Seeding from regions, start URLs and identifiers
//! - [`WorkListRunner`], which drains an in-memory work list with bounded
//!   concurrency and per-item retries
//! - The [`PageProvider`] port that leases browser pages to the runner

mod harvester;
mod runner;

pub use harvester::{HandleOutcome, Harvester};
pub use runner::{PageLease, PageProvider, RunSummary, WorkListRunner};
