//! Free-form index metadata carried in the binary format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive information attached to an index.
///
/// Serialized as a JSON object between the header and the node records.
/// All fields are optional; a default metadata value occupies zero bytes
/// on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// When the source dataset was built, ISO-8601 UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_date: Option<DateTime<Utc>>,

    /// Short dataset name, e.g. "GeoLite2 Country".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Human-readable description of the dataset.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Opaque payload for whatever the producer wants to carry along.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl Metadata {
    /// True when every field is unset; such metadata is omitted from the
    /// encoded file entirely.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
