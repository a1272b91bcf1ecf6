//! Search regions and their wire encoding.
//!
//! This module provides:
//! - The immutable `SearchRegion` value and its map bounds
//! - The canonical query-state codec and region identity hash
//! - The quadrant splitter used for recursive narrowing

pub mod codec;
mod region;
mod split;

pub use codec::{
    decode, encode, identify, region_from_search_url, response_matches, search_url, unique_key,
};
pub use region::{MapBounds, SearchRegion};
pub use split::{QuadrantSplitter, RegionSplitter, SPLIT_FANOUT};
