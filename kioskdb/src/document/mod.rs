// Stored documents, reserved fields and server-side timestamps

pub mod typed;

use crate::catalog::TimestampFields;
use crate::error::{KioskDbError, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub const ID_FIELD: &str = "_id";
pub const VERSION_FIELD: &str = "_version";
/// Stable key carried by each element of an embedded record list
pub const ELEMENT_KEY_FIELD: &str = "_key";
pub const PARENT_ID_FIELD: &str = "originalDocId";
pub const RECORD_INDEX_FIELD: &str = "recordIndex";

/// A persisted record in a named collection
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub version: i64,
    pub fields: Map<String, Value>,
}

impl StoredDocument {
    /// The document as clients see it: its fields plus `_id` and `_version`.
    pub fn to_json(&self) -> Value {
        let mut obj = self.fields.clone();
        obj.insert(ID_FIELD.into(), Value::String(self.id.clone()));
        obj.insert(VERSION_FIELD.into(), Value::from(self.version));
        Value::Object(obj)
    }

    /// Read a top-level timestamp field.
    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.fields.get(field).and_then(parse_timestamp)
    }
}

impl Serialize for StoredDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Newest first by a timestamp field; documents without one go last.
pub fn sort_newest_first(docs: &mut [StoredDocument], field: &str) {
    docs.sort_by(|a, b| b.timestamp(field).cmp(&a.timestamp(field)));
}

/// Current server time in the format every timestamp is stored in.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp: RFC 3339, a bare `YYYY-MM-DD` date, or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Require a JSON object body.
pub fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(KioskDbError::Validation(format!(
            "Expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Set both timestamps on a new document, overriding anything the client sent.
pub fn stamp_created(fields: &mut Map<String, Value>, timestamps: &TimestampFields, now: &str) {
    fields.insert(timestamps.created.clone(), Value::String(now.to_string()));
    fields.insert(timestamps.updated.clone(), Value::String(now.to_string()));
}

pub fn stamp_updated(fields: &mut Map<String, Value>, timestamps: &TimestampFields, now: &str) {
    fields.insert(timestamps.updated.clone(), Value::String(now.to_string()));
}

/// Remove fields a client may not set: identifiers, versions, the creation
/// timestamp and flatten metadata.
pub fn strip_protected(fields: &mut Map<String, Value>, timestamps: &TimestampFields) {
    for key in [
        ID_FIELD,
        VERSION_FIELD,
        ELEMENT_KEY_FIELD,
        PARENT_ID_FIELD,
        RECORD_INDEX_FIELD,
        timestamps.created.as_str(),
    ] {
        fields.remove(key);
    }
}

pub fn lookup_path<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
