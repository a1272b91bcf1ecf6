//! Search result batches and their merger.

mod batch;
mod merge;

pub use batch::{CategoryResults, ListingStub, RawResultBatch, CATEGORY_KEYS};
pub use merge::{merge, MergeVerdict, MergedResultSet};
