//! Run configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::HarvestError;
use crate::transform::StatusCategory;

/// Highest page number the search endpoint serves for one region.
pub const PAGE_CEILING: u32 = 20;

/// Longest response wait or progress interval accepted, in seconds.
pub const MAX_WAIT_SECONDS: f64 = 86_400.0;

/// Which field allow-list the default map stage applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMode {
    /// Core listing fields only.
    #[default]
    Simple,
    /// Core fields plus descriptive and historical fields.
    Extended,
}

/// Configuration for one harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Site origin used to build search and detail URLs.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Cap on emitted records; zero or negative means unbounded.
    #[serde(default)]
    pub max_items: i64,
    /// Maximum recursive split depth; zero disables splitting.
    #[serde(default)]
    pub max_depth: u32,
    /// Highest page requested for one region.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Listings served per search page.
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u32,
    /// Wait for the intercepted search response, in seconds.
    #[serde(default = "default_response_timeout")]
    pub response_timeout_seconds: f64,
    /// Delay after each inline extraction, in milliseconds.
    #[serde(default = "default_detail_delay")]
    pub detail_delay_ms: u64,
    /// Interval of the progress log line, in seconds.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_seconds: f64,
    /// Field projection mode.
    #[serde(default)]
    pub projection: ProjectionMode,
    /// Accepted listing status category.
    #[serde(default)]
    pub status: StatusCategory,
    /// Earliest accepted listing date.
    #[serde(default)]
    pub min_date: Option<NaiveDate>,
    /// Latest accepted listing date.
    #[serde(default)]
    pub max_date: Option<NaiveDate>,
    /// Work items processed concurrently by the runner.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Attempts per request before it is marked failed.
    #[serde(default = "default_max_request_retries")]
    pub max_request_retries: u32,
    /// Selector whose presence marks an anti-bot page.
    #[serde(default = "default_captcha_selector")]
    pub captcha_selector: String,
}

fn default_base_url() -> String {
    "https://www.zillow.com".to_string()
}

fn default_max_pages() -> u32 {
    PAGE_CEILING
}

fn default_results_per_page() -> u32 {
    40
}

fn default_response_timeout() -> f64 {
    45.0
}

fn default_detail_delay() -> u64 {
    100
}

fn default_progress_interval() -> f64 {
    10.0
}

fn default_concurrency() -> usize {
    4
}

fn default_max_request_retries() -> u32 {
    5
}

fn default_captcha_selector() -> String {
    ".captcha-container".to_string()
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_items: 0,
            max_depth: 0,
            max_pages: default_max_pages(),
            results_per_page: default_results_per_page(),
            response_timeout_seconds: default_response_timeout(),
            detail_delay_ms: default_detail_delay(),
            progress_interval_seconds: default_progress_interval(),
            projection: ProjectionMode::default(),
            status: StatusCategory::default(),
            min_date: None,
            max_date: None,
            concurrency: default_concurrency(),
            max_request_retries: default_max_request_retries(),
            captcha_selector: default_captcha_selector(),
        }
    }
}

impl HarvestConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, HarvestError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Sets the item cap.
    #[must_use]
    pub fn with_max_items(mut self, max_items: i64) -> Self {
        self.max_items = max_items;
        self
    }

    /// Sets the maximum split depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the inline extraction delay.
    #[must_use]
    pub fn with_detail_delay_ms(mut self, delay: u64) -> Self {
        self.detail_delay_ms = delay;
        self
    }

    /// Sets the response wait.
    #[must_use]
    pub fn with_response_timeout(mut self, seconds: f64) -> Self {
        self.response_timeout_seconds = seconds;
        self
    }

    /// Sets the status category.
    #[must_use]
    pub fn with_status(mut self, status: StatusCategory) -> Self {
        self.status = status;
        self
    }

    /// Sets the projection mode.
    #[must_use]
    pub fn with_projection(mut self, projection: ProjectionMode) -> Self {
        self.projection = projection;
        self
    }

    /// Sets the accepted date range.
    #[must_use]
    pub fn with_date_range(mut self, min: Option<NaiveDate>, max: Option<NaiveDate>) -> Self {
        self.min_date = min;
        self.max_date = max;
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the runner concurrency.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets how often a failed work item is retried.
    #[must_use]
    pub fn with_max_request_retries(mut self, retries: u32) -> Self {
        self.max_request_retries = retries;
        self
    }

    /// The item cap, or `None` when unbounded.
    #[must_use]
    pub fn item_cap(&self) -> Option<usize> {
        usize::try_from(self.max_items).ok().filter(|cap| *cap > 0)
    }

    /// Response wait as a Duration.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        wait_duration(self.response_timeout_seconds)
    }

    /// Detail delay as a Duration.
    #[must_use]
    pub fn detail_delay(&self) -> Duration {
        Duration::from_millis(self.detail_delay_ms)
    }

    /// Progress interval as a Duration.
    #[must_use]
    pub fn progress_interval(&self) -> Duration {
        wait_duration(self.progress_interval_seconds)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.base_url.is_empty() {
            return Err(HarvestError::Config("base_url must not be empty".to_string()));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(HarvestError::Config(format!(
                "base_url is not a valid URL: {}",
                self.base_url
            )));
        }
        if self.max_pages == 0 || self.max_pages > PAGE_CEILING {
            return Err(HarvestError::Config(format!(
                "max_pages must be within 1..={PAGE_CEILING}"
            )));
        }
        if self.results_per_page == 0 {
            return Err(HarvestError::Config("results_per_page must be positive".to_string()));
        }
        check_wait("response_timeout_seconds", self.response_timeout_seconds)?;
        check_wait("progress_interval_seconds", self.progress_interval_seconds)?;
        if self.concurrency == 0 {
            return Err(HarvestError::Config("concurrency must be at least 1".to_string()));
        }
        if let (Some(min), Some(max)) = (self.min_date, self.max_date) {
            if min > max {
                return Err(HarvestError::Config(format!(
                    "min_date {min} is after max_date {max}"
                )));
            }
        }
        Ok(())
    }
}

// Out-of-range values clamp to the ceiling so an unvalidated config cannot panic.
fn wait_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.min(MAX_WAIT_SECONDS))
        .unwrap_or_else(|_| Duration::from_secs_f64(MAX_WAIT_SECONDS))
}

fn check_wait(field: &str, seconds: f64) -> Result<(), HarvestError> {
    if seconds.is_finite() && seconds > 0.0 && seconds <= MAX_WAIT_SECONDS {
        Ok(())
    } else {
        Err(HarvestError::Config(format!(
            "{field} must be within (0, {MAX_WAIT_SECONDS}] seconds, got {seconds}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::default();
        assert_eq!(config.max_pages, 20);
        assert_eq!(config.response_timeout(), Duration::from_secs(45));
        assert_eq!(config.detail_delay(), Duration::from_millis(100));
        assert_eq!(config.progress_interval(), Duration::from_secs(10));
        assert!(config.item_cap().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_item_cap_non_positive_is_unbounded() {
        assert!(HarvestConfig::new().with_max_items(-5).item_cap().is_none());
        assert!(HarvestConfig::new().with_max_items(0).item_cap().is_none());
        assert_eq!(HarvestConfig::new().with_max_items(3).item_cap(), Some(3));
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = HarvestConfig::from_json_str(
            r#"{"max_items": 50, "max_depth": 2, "status": "fsbo", "projection": "extended"}"#,
        )
        .unwrap();

        assert_eq!(config.item_cap(), Some(50));
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.status, StatusCategory::Fsbo);
        assert_eq!(config.projection, ProjectionMode::Extended);
        assert_eq!(config.results_per_page, 40);
    }

    #[test]
    fn test_rejects_inverted_date_range() {
        let config = HarvestConfig::new().with_date_range(
            NaiveDate::from_ymd_opt(2024, 5, 1),
            NaiveDate::from_ymd_opt(2024, 1, 1),
        );
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));
    }

    #[test]
    fn test_rejects_page_ceiling_overflow() {
        let mut config = HarvestConfig::new();
        config.max_pages = 21;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_waits() {
        let huge = HarvestConfig::from_json_str(r#"{"response_timeout_seconds": 1e300}"#);
        assert!(matches!(huge, Err(HarvestError::Config(_))));

        let huge = HarvestConfig::from_json_str(r#"{"progress_interval_seconds": 1e300}"#);
        assert!(matches!(huge, Err(HarvestError::Config(_))));

        let infinite = HarvestConfig::new().with_response_timeout(f64::INFINITY);
        assert!(infinite.validate().is_err());

        let mut nan = HarvestConfig::new();
        nan.progress_interval_seconds = f64::NAN;
        assert!(nan.validate().is_err());

        let day = HarvestConfig::new().with_response_timeout(MAX_WAIT_SECONDS);
        assert!(day.validate().is_ok());

        let mut unchecked = HarvestConfig::new();
        unchecked.response_timeout_seconds = 1e300;
        assert_eq!(unchecked.response_timeout(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_items": 10, "min_date": "2024-01-01"}}"#).unwrap();

        let config = HarvestConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.item_cap(), Some(10));
        assert_eq!(config.min_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }
}
