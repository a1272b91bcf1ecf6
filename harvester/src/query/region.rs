//! Search region value type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PAGE_CEILING;
use crate::errors::HarvestError;

/// Key of the pagination object in the wire state.
pub(crate) const PAGINATION_KEY: &str = "pagination";
/// Key of the map bounds object in the wire state.
pub(crate) const MAP_BOUNDS_KEY: &str = "mapBounds";
/// Key of the map zoom level in the wire state.
pub(crate) const MAP_ZOOM_KEY: &str = "mapZoom";

/// Geographic bounding box of a search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    /// Western longitude.
    pub west: f64,
    /// Eastern longitude.
    pub east: f64,
    /// Southern latitude.
    pub south: f64,
    /// Northern latitude.
    pub north: f64,
}

impl MapBounds {
    /// Creates bounds, rejecting inverted or non-finite edges.
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self, HarvestError> {
        let bounds = Self {
            west,
            east,
            south,
            north,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Checks the edges are finite and ordered.
    pub fn validate(&self) -> Result<(), HarvestError> {
        let edges = [self.west, self.east, self.south, self.north];
        if edges.iter().any(|edge| !edge.is_finite()) {
            return Err(HarvestError::InvalidRegion(
                "map bounds must be finite".to_string(),
            ));
        }
        if self.west >= self.east || self.south >= self.north {
            return Err(HarvestError::InvalidRegion(format!(
                "map bounds are inverted or empty: {self:?}"
            )));
        }
        Ok(())
    }

    /// Longitude midpoint.
    #[must_use]
    pub fn center_lng(&self) -> f64 {
        (self.west + self.east) / 2.0
    }

    /// Latitude midpoint.
    #[must_use]
    pub fn center_lat(&self) -> f64 {
        (self.south + self.north) / 2.0
    }

    /// Area in square degrees.
    #[must_use]
    pub fn area(&self) -> f64 {
        (self.east - self.west) * (self.north - self.south)
    }
}

/// A search query scoped to map bounds and filters, with an optional page
/// cursor and the number of splits applied since the top-level query.
///
/// Regions are values: pagination and splitting derive new regions and
/// never modify the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRegion {
    /// Wire state without the pagination key.
    state: Map<String, Value>,
    /// Page cursor, when the region is a specific result page.
    page: Option<u32>,
    /// Number of splits since the top-level query.
    split_depth: u32,
}

impl SearchRegion {
    /// Creates a top-level region from a wire state object.
    ///
    /// Any pagination key in `state` is dropped; use [`Self::with_page`] to
    /// address a specific page.
    pub fn from_state(state: Value) -> Result<Self, HarvestError> {
        let Value::Object(mut state) = state else {
            return Err(HarvestError::InvalidRegion(
                "search state must be a JSON object".to_string(),
            ));
        };
        state.remove(PAGINATION_KEY);

        let region = Self {
            state,
            page: None,
            split_depth: 0,
        };
        if region.state.contains_key(MAP_BOUNDS_KEY) {
            region.bounds()?;
        }
        Ok(region)
    }

    /// Creates a top-level region covering `bounds`.
    #[must_use]
    pub fn from_bounds(bounds: MapBounds) -> Self {
        let mut state = Map::new();
        state.insert(MAP_BOUNDS_KEY.to_string(), serde_json::json!(bounds));
        state.insert("isMapVisible".to_string(), Value::Bool(true));
        state.insert("isListVisible".to_string(), Value::Bool(true));
        Self {
            state,
            page: None,
            split_depth: 0,
        }
    }

    /// Returns a copy with a state key set.
    #[must_use]
    pub fn with_state_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if key != PAGINATION_KEY {
            self.state.insert(key, value);
        }
        self
    }

    /// Returns the same query addressed at `page`.
    pub fn with_page(&self, page: u32) -> Result<Self, HarvestError> {
        validate_page(page)?;
        Ok(Self {
            state: self.state.clone(),
            page: Some(page),
            split_depth: self.split_depth,
        })
    }

    /// Returns a sub-region with replaced bounds, reset pagination and one
    /// more level of split depth.
    #[must_use]
    pub fn with_split_bounds(&self, bounds: MapBounds) -> Self {
        let mut state = self.state.clone();
        state.insert(MAP_BOUNDS_KEY.to_string(), serde_json::json!(bounds));
        if let Some(zoom) = state.get(MAP_ZOOM_KEY).and_then(Value::as_u64) {
            state.insert(MAP_ZOOM_KEY.to_string(), serde_json::json!(zoom + 1));
        }
        state.insert("isMapVisible".to_string(), Value::Bool(true));
        Self {
            state,
            page: None,
            split_depth: self.split_depth + 1,
        }
    }

    /// Returns a copy carrying a split depth restored from queue metadata.
    #[must_use]
    pub fn at_depth(mut self, split_depth: u32) -> Self {
        self.split_depth = split_depth;
        self
    }

    /// The wire state without pagination.
    #[must_use]
    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// The page cursor, if any.
    #[must_use]
    pub fn page(&self) -> Option<u32> {
        self.page
    }

    /// The page actually served for this region.
    #[must_use]
    pub fn effective_page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    /// Whether this region was derived by pagination from another region.
    #[must_use]
    pub fn is_pagination_derived(&self) -> bool {
        self.page.is_some_and(|page| page > 1)
    }

    /// Number of splits applied since the top-level query.
    #[must_use]
    pub fn split_depth(&self) -> u32 {
        self.split_depth
    }

    /// The map bounds, if the state carries them.
    pub fn bounds(&self) -> Result<Option<MapBounds>, HarvestError> {
        match self.state.get(MAP_BOUNDS_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => {
                let bounds: MapBounds = serde_json::from_value(raw.clone()).map_err(|e| {
                    HarvestError::InvalidRegion(format!("malformed map bounds: {e}"))
                })?;
                bounds.validate()?;
                Ok(Some(bounds))
            }
        }
    }

    /// The filter state object, if present.
    #[must_use]
    pub fn filter_state(&self) -> Option<&Map<String, Value>> {
        self.state.get("filterState").and_then(Value::as_object)
    }

    /// The result category, if present.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.state.get("category").and_then(Value::as_str)
    }
}

/// Checks a page number is within the served range.
pub(crate) fn validate_page(page: u32) -> Result<(), HarvestError> {
    if (1..=PAGE_CEILING).contains(&page) {
        Ok(())
    } else {
        Err(HarvestError::InvalidRegion(format!(
            "page {page} outside 1..={PAGE_CEILING}"
        )))
    }
}
