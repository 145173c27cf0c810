// Flattened records - documents holding an embedded list of records are
// exposed as one addressable record per list element.

use crate::catalog::DatasetDefinition;
use crate::document::{
    into_object, now_timestamp, stamp_updated, strip_protected, typed, StoredDocument,
    ELEMENT_KEY_FIELD, ID_FIELD, PARENT_ID_FIELD, RECORD_INDEX_FIELD, VERSION_FIELD,
};
use crate::error::{KioskDbError, Result};
use crate::filter::Filter;
use crate::store::{paginate, Collection, Created, Page, PageRequest};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Records field used by bundle uploads when the catalog names none
pub const DEFAULT_RECORDS_FIELD: &str = "records";

// ── Record ids ─────────────────────────────────────────────────

/// A record address: a plain document id, or `{parent}_{key}` for an
/// element of an embedded list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordId {
    Plain(String),
    Element { parent: String, key: u64 },
}

impl RecordId {
    /// Split on the last `_`. Document ids never contain the delimiter, so
    /// the split is unambiguous; the suffix must be an element key.
    pub fn parse(id: &str) -> Result<RecordId> {
        let id = id.trim();
        if id.is_empty() {
            return Err(KioskDbError::InvalidId("empty record id".into()));
        }
        match id.rsplit_once('_') {
            None => Ok(RecordId::Plain(id.to_string())),
            Some((parent, suffix)) => {
                let key = suffix.parse::<u64>().map_err(|_| {
                    KioskDbError::InvalidId(format!("'{id}' has a non-numeric record key"))
                })?;
                if parent.is_empty() {
                    return Err(KioskDbError::InvalidId(format!("'{id}' has no parent id")));
                }
                Ok(RecordId::Element {
                    parent: parent.to_string(),
                    key,
                })
            }
        }
    }

    /// The document this record lives in.
    pub fn document_id(&self) -> &str {
        match self {
            RecordId::Plain(id) => id,
            RecordId::Element { parent, .. } => parent,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Plain(id) => write!(f, "{id}"),
            RecordId::Element { parent, key } => write!(f, "{parent}_{key}"),
        }
    }
}

// ── Array detection and element keys ──────────────────────────

/// The list field that makes a document array-backed, if any.
///
/// A named records field must hold a non-empty list of objects. Without a
/// name, exactly one top-level field may hold a list and it must be a
/// non-empty list of objects.
pub fn records_field(def: &DatasetDefinition, fields: &Map<String, Value>) -> Option<String> {
    if let Some(name) = &def.records_field {
        return fields
            .get(name)
            .filter(|v| is_record_list(v))
            .map(|_| name.clone());
    }

    let mut lists = fields.iter().filter(|(_, v)| v.is_array());
    match (lists.next(), lists.next()) {
        (Some((name, value)), None) if is_record_list(value) => Some(name.clone()),
        _ => None,
    }
}

fn is_record_list(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
        _ => false,
    }
}

fn element_key(element: &Value) -> Option<u64> {
    element.get(ELEMENT_KEY_FIELD).and_then(Value::as_u64)
}

/// Give every element of a record list a unique `_key`. Elements that
/// already carry one keep it; the rest are numbered upward from the largest
/// existing key, in list order. Returns true if anything changed.
pub fn ensure_keys(items: &mut [Value]) -> bool {
    let mut next = items
        .iter()
        .filter_map(element_key)
        .max()
        .map(|max| max + 1)
        .unwrap_or(0);

    let mut seen = std::collections::HashSet::new();
    let mut changed = false;
    for item in items.iter_mut() {
        let Some(obj) = item.as_object_mut() else {
            continue;
        };
        match obj.get(ELEMENT_KEY_FIELD).and_then(Value::as_u64) {
            Some(key) if seen.insert(key) => {}
            _ => {
                obj.insert(ELEMENT_KEY_FIELD.into(), Value::from(next));
                seen.insert(next);
                next += 1;
                changed = true;
            }
        }
    }
    changed
}

/// Assign element keys in place if the document is array-backed.
fn key_document(def: &DatasetDefinition, fields: &mut Map<String, Value>) -> bool {
    let Some(field) = records_field(def, fields) else {
        return false;
    };
    match fields.get_mut(&field) {
        Some(Value::Array(items)) => ensure_keys(items),
        _ => false,
    }
}

// ── Logical records ───────────────────────────────────────────

/// The unit clients list, edit and delete.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalRecord {
    pub id: RecordId,
    /// Position in the parent's list when the record was flattened
    pub index: Option<usize>,
    pub version: i64,
    pub fields: Map<String, Value>,
}

impl LogicalRecord {
    pub fn plain(doc: StoredDocument) -> LogicalRecord {
        LogicalRecord {
            id: RecordId::Plain(doc.id),
            index: None,
            version: doc.version,
            fields: doc.fields,
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match &self.id {
            RecordId::Plain(_) => None,
            RecordId::Element { parent, .. } => Some(parent),
        }
    }

    /// Fields plus `_id`, `_version` and, for elements, `originalDocId` and `recordIndex`.
    pub fn to_object(&self) -> Map<String, Value> {
        let mut obj = self.fields.clone();
        obj.insert(ID_FIELD.into(), Value::String(self.id.to_string()));
        obj.insert(VERSION_FIELD.into(), Value::from(self.version));
        if let Some(parent) = self.parent_id() {
            obj.insert(PARENT_ID_FIELD.into(), Value::String(parent.to_string()));
            obj.insert(RECORD_INDEX_FIELD.into(), Value::from(self.index));
        }
        obj
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_object())
    }
}

impl Serialize for LogicalRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_object().serialize(serializer)
    }
}

/// Expand one document into its logical records.
pub fn flatten_document(def: &DatasetDefinition, doc: StoredDocument) -> Vec<LogicalRecord> {
    let Some(field) = records_field(def, &doc.fields) else {
        return vec![LogicalRecord::plain(doc)];
    };
    let mut items = match doc.fields.get(&field) {
        Some(Value::Array(items)) => items.clone(),
        _ => return vec![LogicalRecord::plain(doc)],
    };
    ensure_keys(&mut items);

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let mut fields = match item {
                Value::Object(map) => map,
                _ => return None,
            };
            let key = fields.remove(ELEMENT_KEY_FIELD).and_then(|k| k.as_u64())?;
            for ts in [&def.timestamps.created, &def.timestamps.updated] {
                if !fields.contains_key(ts) {
                    if let Some(value) = doc.fields.get(ts) {
                        fields.insert(ts.clone(), value.clone());
                    }
                }
            }
            Some(LogicalRecord {
                id: RecordId::Element {
                    parent: doc.id.clone(),
                    key,
                },
                index: Some(index),
                version: doc.version,
                fields,
            })
        })
        .collect()
}

/// Expand documents in order.
pub fn flatten(def: &DatasetDefinition, docs: Vec<StoredDocument>) -> Vec<LogicalRecord> {
    docs.into_iter()
        .flat_map(|doc| flatten_document(def, doc))
        .collect()
}

// ── Record set ────────────────────────────────────────────────

/// How an uploaded JSON array is stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadMode {
    /// One document per array element
    #[default]
    Split,
    /// One document holding the whole array as its record list
    Bundle,
}

impl UploadMode {
    pub fn parse(mode: Option<&str>) -> Result<UploadMode> {
        match mode.map(str::trim).filter(|m| !m.is_empty()) {
            None => Ok(UploadMode::Split),
            Some(m) if m.eq_ignore_ascii_case("split") => Ok(UploadMode::Split),
            Some(m) if m.eq_ignore_ascii_case("bundle") => Ok(UploadMode::Bundle),
            Some(m) => Err(KioskDbError::BadRequest(format!(
                "Unknown upload mode '{m}' (expected split or bundle)"
            ))),
        }
    }
}

/// Counts reported alongside a flattened listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenCounts {
    pub raw_document_count: usize,
    pub flattened_record_count: usize,
    pub filtered_record_count: usize,
    pub paginated_record_count: usize,
}

#[derive(Debug, Clone)]
pub struct RecordListing {
    pub page: Page<LogicalRecord>,
    pub counts: FlattenCounts,
}

/// Record-level access over a collection whose documents may embed record lists.
pub struct RecordSet<'a> {
    collection: Collection<'a>,
}

impl<'a> RecordSet<'a> {
    /// Only datasets the catalog marks `flatten` expose record-level access.
    pub fn new(collection: Collection<'a>) -> Result<Self> {
        if !collection.definition().flatten {
            return Err(KioskDbError::BadRequest(format!(
                "{}/{} does not hold flattened records",
                collection.database(),
                collection.name()
            )));
        }
        Ok(RecordSet { collection })
    }

    pub fn collection(&self) -> &Collection<'a> {
        &self.collection
    }

    fn def(&self) -> &DatasetDefinition {
        self.collection.definition()
    }

    fn record_not_found(&self, id: &RecordId) -> KioskDbError {
        KioskDbError::RecordNotFound {
            collection: self.collection.name().to_string(),
            id: id.to_string(),
        }
    }

    pub fn get_record(&self, id: &str) -> Result<LogicalRecord> {
        let record_id = RecordId::parse(id)?;
        match &record_id {
            RecordId::Plain(id) => Ok(LogicalRecord::plain(self.collection.get(id)?)),
            RecordId::Element { parent, .. } => {
                let doc = self.collection.get(parent)?;
                flatten_document(self.def(), doc)
                    .into_iter()
                    .find(|r| r.id == record_id)
                    .ok_or_else(|| self.record_not_found(&record_id))
            }
        }
    }

    /// Every record, most recent document first, filtered by a search over all values.
    pub fn all_records(&self, search: Option<&str>) -> Result<Vec<LogicalRecord>> {
        Ok(self.search_records(search)?.2)
    }

    /// Records whose configured search fields match the term. Used by exports.
    pub fn matching_records(&self, search: Option<&str>) -> Result<Vec<LogicalRecord>> {
        let filter = self.collection.search_filter(search)?;
        let docs = self.collection.find(&Filter::All)?;
        Ok(flatten(self.def(), docs)
            .into_iter()
            .filter(|r| filter.matches(&r.fields))
            .collect())
    }

    fn search_records(&self, search: Option<&str>) -> Result<(usize, usize, Vec<LogicalRecord>)> {
        let filter = Filter::any_value(search)?;
        let docs = self.collection.find(&Filter::All)?;
        let raw = docs.len();
        let records = flatten(self.def(), docs);
        let flattened = records.len();
        let filtered = records
            .into_iter()
            .filter(|r| filter.matches(&r.to_object()))
            .collect();
        Ok((raw, flattened, filtered))
    }

    /// One page of flattened, filtered records plus the counts at each stage.
    pub fn list_records(&self, search: Option<&str>, request: PageRequest) -> Result<RecordListing> {
        let (raw, flattened, filtered) = self.search_records(search)?;
        let filtered_count = filtered.len();
        let page = paginate(filtered, request);
        let counts = FlattenCounts {
            raw_document_count: raw,
            flattened_record_count: flattened,
            filtered_record_count: filtered_count,
            paginated_record_count: page.data.len(),
        };
        Ok(RecordListing { page, counts })
    }

    /// Store an upload. Objects become one document; arrays are split into
    /// one document per element or bundled into a single array-backed document.
    pub fn upload(&self, body: Value, mode: UploadMode) -> Result<Created> {
        match (body, mode) {
            (Value::Array(items), UploadMode::Split) => {
                let items = items
                    .into_iter()
                    .map(|item| self.keyed(item))
                    .collect::<Vec<_>>();
                Ok(Created::Many(self.collection.insert_many(items)?))
            }
            (Value::Array(items), UploadMode::Bundle) => {
                if items.is_empty() {
                    return Err(KioskDbError::BadRequest("Cannot upload an empty array".into()));
                }
                if let Some(i) = items.iter().position(|v| !v.is_object()) {
                    return Err(KioskDbError::Validation(format!(
                        "item {i}: bundled records must be JSON objects"
                    )));
                }
                let field = self
                    .def()
                    .records_field
                    .clone()
                    .unwrap_or_else(|| DEFAULT_RECORDS_FIELD.to_string());
                let mut body = Map::new();
                body.insert(field, Value::Array(items));
                let doc = self.collection.insert(self.keyed(Value::Object(body)))?;
                log::info!(
                    "Bundled upload stored as {}/{}/{}",
                    self.collection.database(),
                    self.collection.name(),
                    doc.id
                );
                Ok(Created::One(doc))
            }
            (body, _) => Ok(Created::One(self.collection.insert(self.keyed(body))?)),
        }
    }

    fn keyed(&self, body: Value) -> Value {
        match body {
            Value::Object(mut fields) => {
                key_document(self.def(), &mut fields);
                Value::Object(fields)
            }
            other => other,
        }
    }

    /// Replace one element of a parent's list, or merge into a plain document.
    pub fn update_record(
        &self,
        id: &str,
        body: Value,
        expected_version: Option<i64>,
    ) -> Result<LogicalRecord> {
        let record_id = RecordId::parse(id)?;
        let key = match &record_id {
            RecordId::Plain(id) => {
                return Ok(LogicalRecord::plain(
                    self.collection.update(id, body, expected_version)?,
                ))
            }
            RecordId::Element { key, .. } => *key,
        };

        let mut element = into_object(body)?;
        strip_protected(&mut element, &self.def().timestamps);
        // Elements read back with the parent's update time; the parent owns it.
        element.remove(&self.def().timestamps.updated);
        element.insert(ELEMENT_KEY_FIELD.into(), Value::from(key));

        let mut doc = self.locked_parent(&record_id, expected_version)?;
        let field = self.list_field(&record_id, &doc)?;
        let items = self.list_mut(&mut doc, &field)?;
        let position = items
            .iter()
            .position(|item| element_key(item) == Some(key))
            .ok_or_else(|| self.record_not_found(&record_id))?;
        items[position] = Value::Object(element);

        stamp_updated(&mut doc.fields, &self.def().timestamps, &now_timestamp());
        typed::validate(self.def().kind, &doc.fields)?;
        self.collection.write(&mut doc)?;
        log::info!(
            "Updated record {} of {}/{}",
            record_id,
            self.collection.database(),
            self.collection.name()
        );

        flatten_document(self.def(), doc)
            .into_iter()
            .find(|r| r.id == record_id)
            .ok_or_else(|| self.record_not_found(&record_id))
    }

    /// Remove one element of a parent's list (the parent too once the list is
    /// empty), or delete a plain document.
    pub fn delete_record(&self, id: &str, expected_version: Option<i64>) -> Result<DeletedRecord> {
        let record_id = RecordId::parse(id)?;
        let key = match &record_id {
            RecordId::Plain(id) => {
                self.collection.delete(id, expected_version)?;
                return Ok(DeletedRecord::Document);
            }
            RecordId::Element { key, .. } => *key,
        };

        let mut doc = self.locked_parent(&record_id, expected_version)?;
        let field = self.list_field(&record_id, &doc)?;
        let items = self.list_mut(&mut doc, &field)?;
        let position = items
            .iter()
            .position(|item| element_key(item) == Some(key))
            .ok_or_else(|| self.record_not_found(&record_id))?;
        items.remove(position);

        if items.is_empty() {
            self.collection.delete(&doc.id, Some(doc.version))?;
            log::info!(
                "Deleted record {}; parent document removed as its list is empty",
                record_id
            );
            return Ok(DeletedRecord::ParentRemoved);
        }

        stamp_updated(&mut doc.fields, &self.def().timestamps, &now_timestamp());
        self.collection.write(&mut doc)?;
        log::info!(
            "Deleted record {} of {}/{}",
            record_id,
            self.collection.database(),
            self.collection.name()
        );
        Ok(DeletedRecord::Element)
    }

    pub fn delete_all(&self) -> Result<usize> {
        self.collection.delete_all()
    }

    /// Fetch the parent document and check the caller's version against it.
    fn locked_parent(
        &self,
        record_id: &RecordId,
        expected_version: Option<i64>,
    ) -> Result<StoredDocument> {
        let doc = self.collection.get(record_id.document_id())?;
        self.collection.check_version(&doc, expected_version)?;
        Ok(doc)
    }

    fn list_field(&self, record_id: &RecordId, doc: &StoredDocument) -> Result<String> {
        records_field(self.def(), &doc.fields).ok_or_else(|| self.record_not_found(record_id))
    }

    /// The document's record list with keys backfilled.
    fn list_mut<'d>(&self, doc: &'d mut StoredDocument, field: &str) -> Result<&'d mut Vec<Value>> {
        let id = doc.id.clone();
        match doc.fields.get_mut(field) {
            Some(Value::Array(items)) => {
                if ensure_keys(items) {
                    log::warn!("Assigned missing element keys in {}/{}", field, id);
                }
                Ok(items)
            }
            _ => Err(KioskDbError::Other(format!(
                "Records field '{field}' of {id} is not a list"
            ))),
        }
    }
}

/// What a record delete removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletedRecord {
    Document,
    Element,
    /// The last element went, taking its parent with it
    ParentRemoved,
}
