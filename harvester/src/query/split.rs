//! Quadrant splitting of search regions.

use super::region::{MapBounds, SearchRegion};
use crate::errors::HarvestError;

/// Number of sub-regions produced by one split.
pub const SPLIT_FANOUT: usize = 4;

/// Geometric primitive that narrows a region into sub-regions.
pub trait RegionSplitter: Send + Sync {
    /// Splits `region` into sub-regions covering its area.
    ///
    /// Every sub-region inherits filters and category, has pagination reset
    /// and sits one split level deeper than `region`.
    fn split(&self, region: &SearchRegion) -> Result<Vec<SearchRegion>, HarvestError>;
}

/// Splits bounds into four quadrants around the midpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadrantSplitter;

impl QuadrantSplitter {
    /// Quadrant bounds in NW, NE, SW, SE order.
    #[must_use]
    pub fn quadrants(bounds: &MapBounds) -> [MapBounds; SPLIT_FANOUT] {
        let lng = bounds.center_lng();
        let lat = bounds.center_lat();
        [
            MapBounds {
                west: bounds.west,
                east: lng,
                south: lat,
                north: bounds.north,
            },
            MapBounds {
                west: lng,
                east: bounds.east,
                south: lat,
                north: bounds.north,
            },
            MapBounds {
                west: bounds.west,
                east: lng,
                south: bounds.south,
                north: lat,
            },
            MapBounds {
                west: lng,
                east: bounds.east,
                south: bounds.south,
                north: lat,
            },
        ]
    }
}

impl RegionSplitter for QuadrantSplitter {
    fn split(&self, region: &SearchRegion) -> Result<Vec<SearchRegion>, HarvestError> {
        let bounds = region.bounds()?.ok_or_else(|| {
            HarvestError::InvalidRegion("cannot split a region without map bounds".to_string())
        })?;

        Ok(Self::quadrants(&bounds)
            .into_iter()
            .map(|quadrant| region.with_split_bounds(quadrant))
            .collect())
    }
}
