//! Caller overrides of the transform stages.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::default::DefaultTransform;
use super::{OutputTransform, TransformContext};
use crate::config::HarvestConfig;
use crate::errors::HarvestResult;

type MapFn = Arc<dyn Fn(Value) -> HarvestResult<Value> + Send + Sync>;
type FilterFn = Arc<dyn Fn(&Value, &TransformContext<'_>) -> bool + Send + Sync>;
type OutputFn = Arc<dyn Fn(Value) -> HarvestResult<Option<Value>> + Send + Sync>;

/// Builds a transform from the default plus caller closures.
///
/// - `map` replaces the default projection.
/// - `filter` runs after the default filter; both must accept.
/// - `output` reshapes or drops the record before the default output stage
///   records it and hands it to the sink.
///
/// # Example
///
/// ```rust,ignore
/// let transform = TransformBuilder::new(config)
///     .filter(|record, _ctx| record["price"].as_u64().unwrap_or(0) < 500_000)
///     .build()?;
/// ```
pub struct TransformBuilder {
    config: HarvestConfig,
    map: Option<MapFn>,
    filter: Option<FilterFn>,
    output: Option<OutputFn>,
}

impl TransformBuilder {
    /// Starts from the default transform for `config`.
    #[must_use]
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            config,
            map: None,
            filter: None,
            output: None,
        }
    }

    /// Replaces the map stage.
    #[must_use]
    pub fn map(mut self, f: impl Fn(Value) -> HarvestResult<Value> + Send + Sync + 'static) -> Self {
        self.map = Some(Arc::new(f));
        self
    }

    /// Adds a filter predicate.
    #[must_use]
    pub fn filter(
        mut self,
        f: impl Fn(&Value, &TransformContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(f));
        self
    }

    /// Adds an output hook.
    #[must_use]
    pub fn output(
        mut self,
        f: impl Fn(Value) -> HarvestResult<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.output = Some(Arc::new(f));
        self
    }

    /// Validates the configuration and builds the transform.
    pub fn build(self) -> HarvestResult<CustomTransform> {
        self.config.validate()?;
        Ok(CustomTransform {
            inner: DefaultTransform::from_config(&self.config),
            map: self.map,
            filter: self.filter,
            output: self.output,
        })
    }
}

impl fmt::Debug for TransformBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformBuilder")
            .field("map", &self.map.is_some())
            .field("filter", &self.filter.is_some())
            .field("output", &self.output.is_some())
            .finish_non_exhaustive()
    }
}

/// A transform with caller overrides.
pub struct CustomTransform {
    inner: DefaultTransform,
    map: Option<MapFn>,
    filter: Option<FilterFn>,
    output: Option<OutputFn>,
}

impl fmt::Debug for CustomTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomTransform")
            .field("inner", &self.inner)
            .field("map", &self.map.is_some())
            .field("filter", &self.filter.is_some())
            .field("output", &self.output.is_some())
            .finish()
    }
}

#[async_trait]
impl OutputTransform for CustomTransform {
    fn map(&self, payload: Value) -> HarvestResult<Value> {
        match &self.map {
            Some(map) => map(payload),
            None => self.inner.map(payload),
        }
    }

    fn filter(&self, record: &Value, ctx: &TransformContext<'_>) -> bool {
        self.inner.filter(record, ctx) && self.filter.as_ref().map_or(true, |f| f(record, ctx))
    }

    async fn output(&self, record: Value, ctx: &TransformContext<'_>) -> HarvestResult<bool> {
        let record = match &self.output {
            Some(hook) => match hook(record)? {
                Some(record) => record,
                None => return Ok(false),
            },
            None => record,
        };
        self.inner.output(record, ctx).await
    }
}
