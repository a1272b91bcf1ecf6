//! Listing status categories and record dates.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Listing status category accepted by the default filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    /// Listed for sale.
    Sale,
    /// Listed for sale by owner.
    Fsbo,
    /// Listed for rent.
    Rent,
    /// Recently sold.
    Sold,
    /// Any status.
    #[default]
    All,
}

impl StatusCategory {
    /// Whether a projected record belongs to this category.
    #[must_use]
    pub fn matches(&self, record: &Value) -> bool {
        let status = record.get("homeStatus").and_then(Value::as_str).unwrap_or_default();
        match self {
            Self::All => true,
            Self::Sale => status == "FOR_SALE",
            Self::Fsbo => status == "FOR_SALE" && is_by_owner(record),
            Self::Rent => status == "FOR_RENT",
            Self::Sold => matches!(status, "RECENTLY_SOLD" | "SOLD"),
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sale => "sale",
            Self::Fsbo => "fsbo",
            Self::Rent => "rent",
            Self::Sold => "sold",
            Self::All => "all",
        };
        f.write_str(name)
    }
}

fn is_by_owner(record: &Value) -> bool {
    let keystone = record.get("keystoneHomeStatus").and_then(Value::as_str) == Some("ForSaleByOwner");
    let sub_type = record
        .pointer("/listingSubType/isFSBO")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    keystone || sub_type
}

/// The date a record is filtered on: the sale date for sold listings, the
/// posting date otherwise.
#[must_use]
pub fn record_date(record: &Value) -> Option<NaiveDate> {
    let sold = matches!(
        record.get("homeStatus").and_then(Value::as_str),
        Some("RECENTLY_SOLD" | "SOLD")
    );
    let field = if sold { "dateSold" } else { "datePostedString" };
    record.get(field).and_then(parse_date)
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive()),
        Value::String(s) => s
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()),
        _ => None,
    }
}
