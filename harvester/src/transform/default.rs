//! Configuration-driven transform.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use super::projection::project;
use super::status::{record_date, StatusCategory};
use super::{record_zpid, OutputTransform, TransformContext};
use crate::config::{HarvestConfig, ProjectionMode};
use crate::errors::HarvestResult;

/// The transform every run uses unless the caller overrides a stage.
#[derive(Debug, Clone)]
pub struct DefaultTransform {
    projection: ProjectionMode,
    status: StatusCategory,
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
    base_url: String,
}

impl DefaultTransform {
    /// Creates the transform from the run configuration.
    #[must_use]
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            projection: config.projection,
            status: config.status,
            min_date: config.min_date,
            max_date: config.max_date,
            base_url: config.base_url.clone(),
        }
    }

    /// The accepted status category.
    #[must_use]
    pub fn status(&self) -> StatusCategory {
        self.status
    }

    fn has_date_range(&self) -> bool {
        self.min_date.is_some() || self.max_date.is_some()
    }

    fn within_date_range(&self, record: &Value) -> bool {
        if !self.has_date_range() {
            return true;
        }
        let Some(date) = record_date(record) else {
            return false;
        };
        self.min_date.map_or(true, |min| date >= min) && self.max_date.map_or(true, |max| date <= max)
    }
}

impl Default for DefaultTransform {
    fn default() -> Self {
        Self::from_config(&HarvestConfig::default())
    }
}

#[async_trait]
impl OutputTransform for DefaultTransform {
    fn map(&self, payload: Value) -> HarvestResult<Value> {
        Ok(project(&payload, self.projection, &self.base_url))
    }

    fn filter(&self, record: &Value, ctx: &TransformContext<'_>) -> bool {
        if ctx.tracker.is_over_budget(0) {
            return false;
        }
        let Some(zpid) = record_zpid(record) else {
            debug!("Record without identifier rejected");
            return false;
        };
        if ctx.tracker.contains(&zpid) {
            return false;
        }
        if !ctx.ignore_status && !self.status.matches(record) {
            debug!(zpid = %zpid, status = %self.status, "Record outside status category");
            return false;
        }
        if !self.within_date_range(record) {
            debug!(zpid = %zpid, "Record outside date range");
            return false;
        }
        true
    }

    async fn output(&self, mut record: Value, ctx: &TransformContext<'_>) -> HarvestResult<bool> {
        let Some(zpid) = record_zpid(&record) else {
            return Ok(false);
        };
        if ctx.tracker.is_over_budget(0) || !ctx.tracker.record(&zpid) {
            return Ok(false);
        }
        if let Some(fields) = record.as_object_mut() {
            fields.insert("zpid".to_string(), Value::String(zpid));
        }
        ctx.sink.emit(record).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetTracker;
    use crate::ports::CollectingRecordSink;
    use crate::transform::Projection;
    use serde_json::json;

    fn listing(zpid: u64, status: &str) -> Value {
        json!({"zpid": zpid, "homeStatus": status, "datePostedString": "2024-03-05"})
    }

    #[tokio::test]
    async fn test_project_emits_once() {
        let transform = DefaultTransform::default();
        let tracker = BudgetTracker::unbounded();
        let sink = CollectingRecordSink::new();
        let ctx = TransformContext::new(&tracker, &sink);

        let first = transform.project(listing(1, "FOR_SALE"), &ctx).await.unwrap();
        let second = transform.project(listing(1, "FOR_SALE"), &ctx).await.unwrap();

        assert_eq!(first, Projection::Emitted);
        assert_eq!(second, Projection::Filtered);
        assert_eq!(sink.zpids(), vec!["1".to_string()]);
        assert!(tracker.contains("1"));
    }

    #[tokio::test]
    async fn test_status_filter_and_bypass() {
        let config = HarvestConfig::new().with_status(StatusCategory::Rent);
        let transform = DefaultTransform::from_config(&config);
        let tracker = BudgetTracker::unbounded();
        let sink = CollectingRecordSink::new();

        let strict = TransformContext::new(&tracker, &sink);
        assert_eq!(
            transform.project(listing(1, "FOR_SALE"), &strict).await.unwrap(),
            Projection::Filtered
        );

        let bypass = TransformContext::new(&tracker, &sink).with_ignore_status(true);
        assert_eq!(
            transform.project(listing(1, "FOR_SALE"), &bypass).await.unwrap(),
            Projection::Emitted
        );
    }

    #[tokio::test]
    async fn test_date_range_filter() {
        let config = HarvestConfig::new().with_date_range(NaiveDate::from_ymd_opt(2024, 4, 1), None);
        let transform = DefaultTransform::from_config(&config);
        let tracker = BudgetTracker::unbounded();
        let sink = CollectingRecordSink::new();
        let ctx = TransformContext::new(&tracker, &sink);

        let early = transform.map(listing(1, "FOR_SALE")).unwrap();
        let undated = transform.map(json!({"zpid": 2, "homeStatus": "FOR_SALE"})).unwrap();
        let late = transform
            .map(json!({"zpid": 3, "homeStatus": "FOR_SALE", "datePostedString": "2024-06-01"}))
            .unwrap();

        assert!(!transform.filter(&early, &ctx));
        assert!(!transform.filter(&undated, &ctx));
        assert!(transform.filter(&late, &ctx));
    }

    #[tokio::test]
    async fn test_undated_record_accepted_without_range() {
        let transform = DefaultTransform::default();
        let tracker = BudgetTracker::unbounded();
        let sink = CollectingRecordSink::new();
        let ctx = TransformContext::new(&tracker, &sink);

        let record = transform.map(json!({"zpid": 2})).unwrap();
        assert!(transform.filter(&record, &ctx));
    }

    #[tokio::test]
    async fn test_budget_blocks_filter_and_output() {
        let transform = DefaultTransform::default();
        let tracker = BudgetTracker::new(Some(1));
        let sink = CollectingRecordSink::new();
        let ctx = TransformContext::new(&tracker, &sink);

        assert_eq!(
            transform.project(listing(1, "FOR_SALE"), &ctx).await.unwrap(),
            Projection::Emitted
        );
        assert_eq!(
            transform.project(listing(2, "FOR_SALE"), &ctx).await.unwrap(),
            Projection::Filtered
        );

        let record = transform.map(listing(3, "FOR_SALE")).unwrap();
        assert!(!transform.output(record, &ctx).await.unwrap());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_identifier_never_emitted() {
        let transform = DefaultTransform::default();
        let tracker = BudgetTracker::unbounded();
        let sink = CollectingRecordSink::new();
        let ctx = TransformContext::new(&tracker, &sink);

        assert!(!transform.output(json!({"price": 1}), &ctx).await.unwrap());
        assert!(tracker.extracted().is_empty());
    }
}
