use crate::catalog::{Catalog, DatasetDefinition};
use crate::document::{
    self, into_object, now_timestamp, strip_protected, typed, StoredDocument,
};
use crate::error::{KioskDbError, Result};
use crate::filter::Filter;
use crate::system_db::SystemDb;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

/// The main entry point for KioskDB.
/// Owns the document database connection and the dataset catalog, and hands
/// out collection handles for CRUD operations.
pub struct Store {
    db: SystemDb,
    catalog: Catalog,
}

impl Store {
    /// Open the document database at the given path.
    pub fn open(path: impl AsRef<Path>, catalog: Catalog) -> Result<Self> {
        let db = SystemDb::open(path.as_ref())?;
        log::info!(
            "Opened document store at {} ({} datasets, {} events)",
            path.as_ref().display(),
            catalog.datasets.len(),
            catalog.events.len()
        );
        Ok(Store { db, catalog })
    }

    /// Open a throwaway in-memory store (for tests and dry runs).
    pub fn open_in_memory(catalog: Catalog) -> Result<Self> {
        let db = SystemDb::open_in_memory()?;
        Ok(Store { db, catalog })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Health check: one round trip to the database.
    pub fn ping(&self) -> Result<()> {
        self.db.ping()
    }

    /// Get a handle for an arbitrary database/collection pair.
    pub fn collection(&self, database: &str, collection: &str) -> Result<Collection<'_>> {
        if database.trim().is_empty() || collection.trim().is_empty() {
            return Err(KioskDbError::BadRequest(
                "Database and collection are required".into(),
            ));
        }
        Ok(self.collection_for(self.catalog.dataset_for(database, collection)))
    }

    /// Get a handle for a dataset named in the catalog.
    pub fn dataset(&self, name: &str) -> Result<Collection<'_>> {
        let def = self.catalog.dataset(name)?.clone();
        Ok(self.collection_for(def))
    }

    pub fn collection_for(&self, definition: DatasetDefinition) -> Collection<'_> {
        Collection {
            store: self,
            def: definition,
        }
    }

    /// Status information: health plus per-collection document counts.
    pub fn status(&self) -> Result<Value> {
        self.ping()?;
        let collections: Vec<Value> = self
            .db
            .collection_counts()?
            .into_iter()
            .map(|(database, collection, count)| {
                serde_json::json!({
                    "database": database,
                    "collection": collection,
                    "count": count,
                })
            })
            .collect();

        Ok(serde_json::json!({
            "ok": true,
            "collections": collections,
            "datasets": self.catalog.datasets.keys().collect::<Vec<_>>(),
            "events": self.catalog.events.len(),
        }))
    }
}

// ── Pagination ─────────────────────────────────────────────────

/// Page/limit pair validated from query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// `page` defaults to 1 and `limit` to the dataset's page size. Both must be at least 1.
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> Result<Self> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(default_limit);
        if page == 0 {
            return Err(KioskDbError::BadRequest("page must be at least 1".into()));
        }
        if limit == 0 {
            return Err(KioskDbError::BadRequest("limit must be at least 1".into()));
        }
        Ok(PageRequest { page, limit })
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1).saturating_mul(self.limit)) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Slice one page out of a fully materialized, already ordered result set.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let data: Vec<T> = items
        .into_iter()
        .skip(request.offset())
        .take(request.limit as usize)
        .collect();
    Page {
        data,
        pagination: Pagination {
            page: request.page,
            limit: request.limit,
            total,
            pages: total.div_ceil(request.limit),
        },
    }
}

// ── Collection handle ──────────────────────────────────────────

/// Result of a create call: one document, or the ids of a bulk insert
#[derive(Debug, Clone)]
pub enum Created {
    One(StoredDocument),
    Many(Vec<String>),
}

/// A handle to one collection of one database.
pub struct Collection<'a> {
    store: &'a Store,
    def: DatasetDefinition,
}

impl<'a> Collection<'a> {
    pub fn definition(&self) -> &DatasetDefinition {
        &self.def
    }

    pub fn database(&self) -> &str {
        &self.def.database
    }

    pub fn name(&self) -> &str {
        &self.def.collection
    }

    /// Filter over this collection's configured search fields.
    pub fn search_filter(&self, term: Option<&str>) -> Result<Filter> {
        Filter::search(term, &self.def.search)
    }

    fn not_found(&self, id: &str) -> KioskDbError {
        KioskDbError::NotFound {
            collection: self.def.collection.clone(),
            id: id.to_string(),
        }
    }

    /// Get a document by id.
    pub fn get(&self, id: &str) -> Result<StoredDocument> {
        check_document_id(id)?;
        self.store
            .db
            .get_document(&self.def.database, &self.def.collection, id)?
            .ok_or_else(|| self.not_found(id))?
            .into_document()
    }

    /// All matching documents, most recently inserted first.
    pub fn find(&self, filter: &Filter) -> Result<Vec<StoredDocument>> {
        let records = self
            .store
            .db
            .list_documents(&self.def.database, &self.def.collection)?;
        let mut docs = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id.clone();
            match record.into_document() {
                Ok(doc) => {
                    if filter.matches(&doc.fields) {
                        docs.push(doc);
                    }
                }
                Err(e) => {
                    log::warn!(
                        "Skipping unreadable document {}/{}/{}: {}",
                        self.def.database,
                        self.def.collection,
                        id,
                        e
                    );
                }
            }
        }
        Ok(docs)
    }

    pub fn count(&self, filter: &Filter) -> Result<usize> {
        if filter.is_all() {
            return self
                .store
                .db
                .count_documents(&self.def.database, &self.def.collection);
        }
        Ok(self.find(filter)?.len())
    }

    /// One page of matching documents plus pagination totals.
    pub fn list(&self, filter: &Filter, request: PageRequest) -> Result<Page<StoredDocument>> {
        Ok(paginate(self.find(filter)?, request))
    }

    /// Create one document from an object, or many from an array.
    pub fn create(&self, body: Value) -> Result<Created> {
        match body {
            Value::Array(items) => Ok(Created::Many(self.insert_many(items)?)),
            other => Ok(Created::One(self.insert(other)?)),
        }
    }

    /// Insert a single document with server-stamped timestamps.
    pub fn insert(&self, body: Value) -> Result<StoredDocument> {
        let fields = self.prepare_new(body, &now_timestamp())?;
        self.insert_fields(fields)
    }

    /// Insert already prepared fields under a fresh id.
    pub(crate) fn insert_fields(&self, fields: Map<String, Value>) -> Result<StoredDocument> {
        let id = generate_id();
        self.store
            .db
            .insert_document(&self.def.database, &self.def.collection, &id, &fields)?;
        log::info!(
            "Inserted {}/{}/{}",
            self.def.database,
            self.def.collection,
            id
        );
        Ok(StoredDocument {
            id,
            version: 1,
            fields,
        })
    }

    /// Insert every object of an array in one transaction. Returns the new ids in order.
    pub fn insert_many(&self, items: Vec<Value>) -> Result<Vec<String>> {
        if items.is_empty() {
            return Err(KioskDbError::BadRequest(
                "Cannot insert an empty array".into(),
            ));
        }
        let now = now_timestamp();
        let mut docs = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let fields = self.prepare_new(item, &now).map_err(|e| match e {
                KioskDbError::Validation(msg) => {
                    KioskDbError::Validation(format!("item {index}: {msg}"))
                }
                other => other,
            })?;
            docs.push((generate_id(), fields));
        }

        self.store
            .db
            .insert_documents(&self.def.database, &self.def.collection, &docs)?;
        log::info!(
            "Inserted {} documents into {}/{}",
            docs.len(),
            self.def.database,
            self.def.collection
        );
        Ok(docs.into_iter().map(|(id, _)| id).collect())
    }

    /// Merge the patch's top-level fields into the document and refresh its
    /// update timestamp. Identifier and protected metadata fields are ignored.
    pub fn update(
        &self,
        id: &str,
        patch: Value,
        expected_version: Option<i64>,
    ) -> Result<StoredDocument> {
        let mut patch = into_object(patch)?;
        strip_protected(&mut patch, &self.def.timestamps);

        let mut doc = self.get(id)?;
        self.check_version(&doc, expected_version)?;

        for (key, value) in patch {
            doc.fields.insert(key, value);
        }
        document::stamp_updated(&mut doc.fields, &self.def.timestamps, &now_timestamp());
        typed::validate(self.def.kind, &doc.fields)?;

        self.write(&mut doc)?;
        log::info!(
            "Updated {}/{}/{} to version {}",
            self.def.database,
            self.def.collection,
            id,
            doc.version
        );
        Ok(doc)
    }

    /// Delete a document by id.
    pub fn delete(&self, id: &str, expected_version: Option<i64>) -> Result<()> {
        check_document_id(id)?;
        self.store.db.delete_document(
            &self.def.database,
            &self.def.collection,
            id,
            expected_version,
        )?;
        log::info!(
            "Deleted {}/{}/{}",
            self.def.database,
            self.def.collection,
            id
        );
        Ok(())
    }

    /// Delete every document in the collection. Returns how many were removed.
    pub fn delete_all(&self) -> Result<usize> {
        let deleted = self
            .store
            .db
            .delete_collection_documents(&self.def.database, &self.def.collection)?;
        log::info!(
            "Deleted all {} documents from {}/{}",
            deleted,
            self.def.database,
            self.def.collection
        );
        Ok(deleted)
    }

    /// Persist a modified document over the version it was read at.
    pub(crate) fn write(&self, doc: &mut StoredDocument) -> Result<()> {
        doc.version = self.store.db.replace_document(
            &self.def.database,
            &self.def.collection,
            &doc.id,
            &doc.fields,
            doc.version,
        )?;
        Ok(())
    }

    pub(crate) fn check_version(
        &self,
        doc: &StoredDocument,
        expected_version: Option<i64>,
    ) -> Result<()> {
        match expected_version {
            Some(expected) if expected != doc.version => Err(KioskDbError::Conflict {
                collection: self.def.collection.clone(),
                id: doc.id.clone(),
                expected,
                actual: doc.version,
            }),
            _ => Ok(()),
        }
    }

    fn prepare_new(&self, body: Value, now: &str) -> Result<Map<String, Value>> {
        let mut fields = into_object(body)?;
        strip_protected(&mut fields, &self.def.timestamps);
        document::stamp_created(&mut fields, &self.def.timestamps, now);
        typed::validate(self.def.kind, &fields)?;
        Ok(fields)
    }
}

#[cfg(test)]
impl Collection<'_> {
    /// Overwrite one field as stored, bypassing protected-field stripping.
    pub(crate) fn force_field(&self, id: &str, field: &str, value: Value) {
        let mut doc = self.get(id).unwrap();
        doc.fields.insert(field.to_string(), value);
        self.write(&mut doc).unwrap();
    }
}

/// New document ids are lowercase ULIDs: sortable and free of the `_`
/// delimiter used by composite record ids.
pub fn generate_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// Reject ids that could never have been generated by [`generate_id`].
pub fn check_document_id(id: &str) -> Result<()> {
    const CROCKFORD: &str = "0123456789abcdefghjkmnpqrstvwxyz";
    let valid = id.len() == 26
        && id
            .chars()
            .all(|c| CROCKFORD.contains(c.to_ascii_lowercase()));
    if valid {
        Ok(())
    } else {
        Err(KioskDbError::InvalidId(format!("'{id}' is not a document id")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_catalog;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup_test_store() -> Store {
        Store::open_in_memory(builtin_catalog().unwrap()).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();

        let doc = col.insert(json!({ "nic": "901234567V" })).unwrap();
        assert_eq!(doc.version, 1);
        assert!(doc.fields["createdAt"].is_string());
        assert_eq!(doc.fields["createdAt"], doc.fields["updatedAt"]);

        let fetched = col.get(&doc.id).unwrap();
        assert_eq!(fetched, doc);
    }

    #[test]
    fn test_insert_ignores_client_id_and_timestamps() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        let doc = col
            .insert(json!({ "_id": "mine", "createdAt": "1999-01-01", "a": 1 }))
            .unwrap();
        assert_ne!(doc.id, "mine");
        assert!(!doc.fields.contains_key("_id"));
        assert_ne!(doc.fields["createdAt"], "1999-01-01");
    }

    #[test]
    fn test_missing_database_or_collection() {
        let store = setup_test_store();
        assert!(matches!(
            store.collection("", "things"),
            Err(KioskDbError::BadRequest(_))
        ));
        assert!(matches!(
            store.collection("misc", " "),
            Err(KioskDbError::BadRequest(_))
        ));
    }

    #[test]
    fn test_get_invalid_and_missing_ids() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        assert!(matches!(col.get("not-an-id"), Err(KioskDbError::InvalidId(_))));
        assert!(matches!(
            col.get(&generate_id()),
            Err(KioskDbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_bulk_create_returns_every_id() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        let created = col
            .create(json!([{ "n": 1 }, { "n": 2 }, { "n": 3 }, { "n": 4 }]))
            .unwrap();
        let Created::Many(ids) = created else {
            panic!("expected a bulk insert");
        };
        assert_eq!(ids.len(), 4);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(col.get(id).unwrap().fields["n"], json!(i + 1));
        }
        assert_eq!(col.count(&Filter::All).unwrap(), 4);
    }

    #[test]
    fn test_bulk_create_is_all_or_nothing() {
        let store = setup_test_store();
        let col = store.dataset("registrations").unwrap();
        let err = col
            .create(json!([
                { "dealerInfo": { "ownerName": "A" } },
                { "dealerInfo": "broken" }
            ]))
            .unwrap_err();
        assert!(matches!(err, KioskDbError::Validation(ref m) if m.starts_with("item 1")));
        assert_eq!(col.count(&Filter::All).unwrap(), 0);

        assert!(matches!(col.create(json!([])), Err(KioskDbError::BadRequest(_))));
        assert!(matches!(col.create(json!("text")), Err(KioskDbError::Validation(_))));
    }

    #[test]
    fn test_list_most_recent_first_with_pagination() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        for n in 0..7 {
            col.insert(json!({ "n": n })).unwrap();
        }

        let page = col
            .list(&Filter::All, PageRequest::new(Some(1), Some(3), 10).unwrap())
            .unwrap();
        assert_eq!(
            page.pagination,
            Pagination { page: 1, limit: 3, total: 7, pages: 3 }
        );
        let ns: Vec<Value> = page.data.iter().map(|d| d.fields["n"].clone()).collect();
        assert_eq!(ns, vec![json!(6), json!(5), json!(4)]);

        let last = col
            .list(&Filter::All, PageRequest::new(Some(3), Some(3), 10).unwrap())
            .unwrap();
        assert_eq!(last.data.len(), 1);
        assert_eq!(last.data[0].fields["n"], 0);

        let beyond = col
            .list(&Filter::All, PageRequest::new(Some(9), Some(3), 10).unwrap())
            .unwrap();
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.pagination.total, 7);
    }

    #[test]
    fn test_pages_concatenate_to_full_result() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        for n in 0..11 {
            col.insert(json!({ "n": n, "nic": if n % 2 == 0 { "even" } else { "odd" } }))
                .unwrap();
        }
        let filter = col.search_filter(Some("EVEN")).unwrap();
        let everything: Vec<String> = col.find(&filter).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(everything.len(), 6);

        for limit in 1..=7u64 {
            let first = col
                .list(&filter, PageRequest::new(Some(1), Some(limit), 10).unwrap())
                .unwrap();
            let pages = first.pagination.pages;
            assert_eq!(pages, (6 + limit - 1) / limit);

            let mut joined = Vec::new();
            for page in 1..=pages {
                let p = col
                    .list(&filter, PageRequest::new(Some(page), Some(limit), 10).unwrap())
                    .unwrap();
                joined.extend(p.data.into_iter().map(|d| d.id));
            }
            assert_eq!(joined, everything);
        }
    }

    #[test]
    fn test_blank_search_counts_everything() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        col.insert(json!({ "nic": "1" })).unwrap();
        col.insert(json!({ "other": "2" })).unwrap();
        let blank = col.search_filter(Some("")).unwrap();
        assert_eq!(col.count(&blank).unwrap(), col.count(&Filter::All).unwrap());
    }

    #[test]
    fn test_page_request_validation() {
        assert_eq!(
            PageRequest::new(None, None, 20).unwrap(),
            PageRequest { page: 1, limit: 20 }
        );
        assert!(PageRequest::new(Some(0), None, 20).is_err());
        assert!(PageRequest::new(None, Some(0), 20).is_err());
        assert_eq!(PageRequest::new(Some(3), Some(5), 20).unwrap().offset(), 10);
    }

    #[test]
    fn test_empty_collection_has_zero_pages() {
        let page = paginate::<u8>(Vec::new(), PageRequest::new(None, None, 10).unwrap());
        assert_eq!(page.pagination.pages, 0);
        assert_eq!(page.pagination.total, 0);
    }

    #[test]
    fn test_update_merges_and_strips_protected_fields() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        let doc = col
            .insert(json!({ "name": "Alice", "role": "member" }))
            .unwrap();
        let created_at = doc.fields["createdAt"].clone();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let updated = col
            .update(
                &doc.id,
                json!({ "_id": "hijack", "createdAt": "1999", "role": "admin" }),
                None,
            )
            .unwrap();

        assert_eq!(updated.id, doc.id);
        assert_eq!(updated.version, 2);
        assert_eq!(updated.fields["name"], "Alice");
        assert_eq!(updated.fields["role"], "admin");
        assert_eq!(updated.fields["createdAt"], created_at);
        assert_ne!(updated.fields["updatedAt"], doc.fields["updatedAt"]);
        assert_eq!(col.get(&doc.id).unwrap(), updated);
    }

    #[test]
    fn test_update_version_checks() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        let doc = col.insert(json!({ "a": 1 })).unwrap();

        col.update(&doc.id, json!({ "a": 2 }), Some(1)).unwrap();
        let err = col.update(&doc.id, json!({ "a": 3 }), Some(1)).unwrap_err();
        assert!(matches!(err, KioskDbError::Conflict { expected: 1, actual: 2, .. }));
        assert_eq!(col.get(&doc.id).unwrap().fields["a"], 2);

        let err = col.delete(&doc.id, Some(1)).unwrap_err();
        assert!(matches!(err, KioskDbError::Conflict { .. }));
        col.delete(&doc.id, Some(2)).unwrap();
    }

    #[test]
    fn test_update_missing_document() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        assert!(matches!(
            col.update(&generate_id(), json!({ "a": 1 }), None),
            Err(KioskDbError::NotFound { .. })
        ));
        assert!(matches!(
            col.update("bogus", json!({ "a": 1 }), None),
            Err(KioskDbError::InvalidId(_))
        ));
    }

    #[test]
    fn test_typed_dataset_rejects_bad_update() {
        let store = setup_test_store();
        let col = store.dataset("registrations").unwrap();
        let doc = col
            .insert(json!({ "dealerInfo": { "ownerName": "Kamal" } }))
            .unwrap();
        let err = col
            .update(&doc.id, json!({ "dealerInfo": ["nope"] }), None)
            .unwrap_err();
        assert!(matches!(err, KioskDbError::Validation(_)));
        assert_eq!(col.get(&doc.id).unwrap().version, 1);
    }

    #[test]
    fn test_delete_and_delete_all() {
        let store = setup_test_store();
        let col = store.collection("misc", "things").unwrap();
        let a = col.insert(json!({})).unwrap();
        col.insert(json!({})).unwrap();
        col.insert(json!({})).unwrap();

        col.delete(&a.id, None).unwrap();
        assert!(matches!(col.get(&a.id), Err(KioskDbError::NotFound { .. })));
        assert!(matches!(col.delete(&a.id, None), Err(KioskDbError::NotFound { .. })));

        assert_eq!(col.delete_all().unwrap(), 2);
        assert_eq!(col.count(&Filter::All).unwrap(), 0);
    }

    #[test]
    fn test_collections_are_isolated() {
        let store = setup_test_store();
        let a = store.collection("db1", "c").unwrap();
        let b = store.collection("db2", "c").unwrap();
        let doc = a.insert(json!({ "x": 1 })).unwrap();
        assert!(b.get(&doc.id).is_err());
        assert_eq!(b.count(&Filter::All).unwrap(), 0);
    }

    #[test]
    fn test_status() {
        let store = setup_test_store();
        store
            .collection("misc", "things")
            .unwrap()
            .insert(json!({}))
            .unwrap();
        let status = store.status().unwrap();
        assert_eq!(status["ok"], true);
        assert_eq!(status["collections"][0]["count"], 1);
        assert_eq!(status["events"], 12);
    }

    #[test]
    fn test_generated_ids_are_valid_document_ids() {
        let id = generate_id();
        assert!(!id.contains('_'));
        check_document_id(&id).unwrap();
        assert!(check_document_id("").is_err());
        assert!(check_document_id("01hx_0").is_err());
    }
}
