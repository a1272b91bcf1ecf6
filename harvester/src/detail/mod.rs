//! Detail extraction pipeline.
//!
//! This module provides:
//! - The [`DetailSource`] trait and the default in-page GraphQL source
//! - [`DetailExtractor`] for single identifiers, batches and legacy redirects

mod extractor;
mod source;

pub use extractor::{
    detail_page_url, BatchReport, DetailExtractor, DetailRequest, ExtractionOutcome, SkipReason,
    PAGE_ZPID_SCRIPT,
};
pub use source::{
    property_from_response, DetailSource, GraphQlDetailSource, DETAIL_QUERY_ID, GRAPHQL_DETAIL_SCRIPT,
};
