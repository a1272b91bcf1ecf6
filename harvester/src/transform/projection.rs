//! Field allow-lists for the default map stage.

use serde_json::{Map, Value};

use crate::config::ProjectionMode;
use crate::identifier;

/// Fields kept by the simple projection.
pub const SIMPLE_FIELDS: &[&str] = &[
    "zpid",
    "homeStatus",
    "keystoneHomeStatus",
    "listingSubType",
    "address",
    "streetAddress",
    "city",
    "state",
    "zipcode",
    "latitude",
    "longitude",
    "price",
    "currency",
    "bedrooms",
    "bathrooms",
    "livingArea",
    "lotAreaValue",
    "lotAreaUnits",
    "homeType",
    "yearBuilt",
    "zestimate",
    "rentZestimate",
    "daysOnZillow",
    "datePostedString",
    "dateSold",
    "hdpUrl",
    "imgSrc",
];

/// Fields added on top of [`SIMPLE_FIELDS`] by the extended projection.
pub const EXTENDED_FIELDS: &[&str] = &[
    "description",
    "priceHistory",
    "taxHistory",
    "resoFacts",
    "schools",
    "responsivePhotos",
    "attributionInfo",
    "monthlyHoaFee",
    "propertyTaxRate",
    "timeOnZillow",
    "pageViewCount",
    "favoriteCount",
    "brokerageName",
    "contingentListingType",
];

/// Projects a detail payload onto the allow-list of `mode`.
///
/// The identifier is rewritten to its canonical string form (or removed if
/// unusable) and a `url` field is derived from `hdpUrl` against `base_url`.
#[must_use]
pub fn project(payload: &Value, mode: ProjectionMode, base_url: &str) -> Value {
    let Some(source) = payload.as_object() else {
        return Value::Object(Map::new());
    };

    let extra: &[&str] = match mode {
        ProjectionMode::Simple => &[],
        ProjectionMode::Extended => EXTENDED_FIELDS,
    };

    let mut record: Map<String, Value> = SIMPLE_FIELDS
        .iter()
        .chain(extra.iter())
        .filter_map(|field| source.get(*field).map(|v| ((*field).to_string(), v.clone())))
        .collect();

    match source.get("zpid").and_then(identifier::from_json) {
        Some(zpid) => {
            record.insert("zpid".to_string(), Value::String(zpid));
        }
        None => {
            record.remove("zpid");
        }
    }

    if let Some(path) = source.get("hdpUrl").and_then(Value::as_str) {
        let url = url::Url::parse(base_url)
            .and_then(|base| base.join(path))
            .map_or_else(|_| path.to_string(), |u| u.to_string());
        record.insert("url".to_string(), Value::String(url));
    }

    Value::Object(record)
}
