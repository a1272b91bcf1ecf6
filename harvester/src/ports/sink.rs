//! Record sink trait and implementations.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, Level};

use crate::errors::HarvestResult;

/// Destination for emitted listing records.
///
/// Persistence is owned by the collaborator; the harvester hands over each
/// record once and never reads it back.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Emits a record.
    async fn emit(&self, record: Value) -> HarvestResult<()>;
}

/// A sink that discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRecordSink;

#[async_trait]
impl RecordSink for NoOpRecordSink {
    async fn emit(&self, _record: Value) -> HarvestResult<()> {
        Ok(())
    }
}

/// A sink that logs records through tracing.
#[derive(Debug, Clone)]
pub struct LoggingRecordSink {
    level: Level,
}

impl Default for LoggingRecordSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingRecordSink {
    /// Creates a logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl RecordSink for LoggingRecordSink {
    async fn emit(&self, record: Value) -> HarvestResult<()> {
        let zpid = record.get("zpid").cloned().unwrap_or(Value::Null);
        if self.level == Level::DEBUG {
            debug!(%zpid, record = %record, "Record emitted");
        } else {
            info!(%zpid, "Record emitted");
        }
        Ok(())
    }
}

/// A sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct CollectingRecordSink {
    records: parking_lot::RwLock<Vec<Value>>,
}

impl CollectingRecordSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected records.
    #[must_use]
    pub fn records(&self) -> Vec<Value> {
        self.records.read().clone()
    }

    /// Returns the identifiers of collected records, in emission order.
    #[must_use]
    pub fn zpids(&self) -> Vec<String> {
        self.records
            .read()
            .iter()
            .filter_map(|r| r.get("zpid").and_then(Value::as_str).map(String::from))
            .collect()
    }

    /// Returns the number of collected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clears all collected records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[async_trait]
impl RecordSink for CollectingRecordSink {
    async fn emit(&self, record: Value) -> HarvestResult<()> {
        self.records.write().push(record);
        Ok(())
    }
}
