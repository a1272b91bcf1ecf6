//! Testing utilities for harvester components.
//!
//! This module provides:
//! - A scripted browser page, static sessions, a page provider and a scripted
//!   detail source
//! - Search and detail payload fixtures
//! - A run context wired to in-memory collaborators

mod fixtures;
mod mocks;

pub use fixtures::{
    austin_region, listing_payload, rendered_page, search_body, search_body_from, search_response,
    search_stub, test_config, HarvestFixture, TEST_BASE_URL,
};
pub use mocks::{DetailReply, ScriptedPage, StaticDetailSource, StaticPageProvider, StaticSession};
