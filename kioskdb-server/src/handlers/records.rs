use actix_web::{web, HttpResponse};
use kioskdb::flatten::DeletedRecord;
use kioskdb::report::{self, ReportFormat};
use kioskdb::{Created, Filter, PageRequest, RecordSet, Store, UploadMode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{created_json, ok_json, report_response, required, respond};
use crate::AppState;

/// Catalog dataset behind the json-data routes
const DATASET: &str = "uploaded_data";
/// Raw documents returned by a debug listing
const DEBUG_SAMPLE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQuery {
    id: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
    search: Option<String>,
    format: Option<String>,
    #[serde(default)]
    debug: bool,
    mode: Option<String>,
    version: Option<i64>,
    #[serde(default)]
    delete_all: bool,
}

fn records(store: &Store) -> kioskdb::Result<RecordSet<'_>> {
    RecordSet::new(store.dataset(DATASET)?)
}

pub async fn get(state: web::Data<AppState>, query: web::Query<RecordsQuery>) -> HttpResponse {
    respond(read(&state.store, &query))
}

fn read(store: &Store, query: &RecordsQuery) -> kioskdb::Result<HttpResponse> {
    let set = records(store)?;

    if query.id.is_some() {
        let record = set.get_record(required(&query.id, "ID is required")?)?;
        return Ok(ok_json(json!({ "success": true, "data": record })));
    }

    if query.debug {
        let mut docs = set.collection().find(&Filter::All)?;
        docs.truncate(DEBUG_SAMPLE);
        let first_keys: Vec<&String> = docs
            .first()
            .map(|d| d.fields.keys().collect())
            .unwrap_or_default();
        return Ok(ok_json(json!({
            "success": true,
            "debug": true,
            "documentCount": docs.len(),
            "firstDocumentKeys": first_keys,
            "firstDocumentStructure": docs.first(),
            "rawDocuments": docs,
        })));
    }

    if query.format.as_deref() == Some("all") {
        let data = set.all_records(query.search.as_deref())?;
        return Ok(ok_json(json!({
            "success": true,
            "total": data.len(),
            "data": data,
        })));
    }

    let page_size = set.collection().definition().page_size;
    let request = PageRequest::new(query.page, query.limit, page_size)?;
    let listing = set.list_records(query.search.as_deref(), request)?;
    Ok(ok_json(json!({
        "success": true,
        "data": listing.page.data,
        "pagination": listing.page.pagination,
        "debug": listing.counts,
    })))
}

pub async fn upload(
    state: web::Data<AppState>,
    query: web::Query<RecordsQuery>,
    body: web::Json<Value>,
) -> HttpResponse {
    respond(store_upload(&state.store, &query, body.into_inner()))
}

fn store_upload(store: &Store, query: &RecordsQuery, body: Value) -> kioskdb::Result<HttpResponse> {
    let mode = UploadMode::parse(query.mode.as_deref())?;
    match records(store)?.upload(body, mode)? {
        Created::Many(ids) => Ok(created_json(json!({
            "success": true,
            "message": format!("{} records uploaded successfully", ids.len()),
            "data": { "insertedCount": ids.len(), "insertedIds": ids },
        }))),
        Created::One(doc) => Ok(created_json(json!({
            "success": true,
            "message": "Record created successfully",
            "data": doc,
        }))),
    }
}

pub async fn update(
    state: web::Data<AppState>,
    query: web::Query<RecordsQuery>,
    body: web::Json<Value>,
) -> HttpResponse {
    respond(
        required(&query.id, "ID is required for update")
            .and_then(|id| {
                records(&state.store)?.update_record(id, body.into_inner(), query.version)
            })
            .map(|record| {
                ok_json(json!({
                    "success": true,
                    "message": "Record updated successfully",
                    "data": record,
                }))
            }),
    )
}

pub async fn delete(state: web::Data<AppState>, query: web::Query<RecordsQuery>) -> HttpResponse {
    respond(remove(&state.store, &query))
}

fn remove(store: &Store, query: &RecordsQuery) -> kioskdb::Result<HttpResponse> {
    let set = records(store)?;
    if query.delete_all {
        let deleted = set.delete_all()?;
        return Ok(ok_json(json!({
            "success": true,
            "message": format!("{deleted} records deleted successfully"),
            "data": { "deletedCount": deleted },
        })));
    }

    let id = required(&query.id, "ID is required for delete")?;
    let message = match set.delete_record(id, query.version)? {
        DeletedRecord::ParentRemoved => {
            "Record deleted successfully (document removed as array became empty)"
        }
        DeletedRecord::Document | DeletedRecord::Element => "Record deleted successfully",
    };
    Ok(ok_json(json!({ "success": true, "message": message })))
}

pub async fn download(state: web::Data<AppState>, query: web::Query<RecordsQuery>) -> HttpResponse {
    respond(export(&state.store, &query))
}

fn export(store: &Store, query: &RecordsQuery) -> kioskdb::Result<HttpResponse> {
    let format = ReportFormat::parse(query.format.as_deref(), ReportFormat::Json)?;
    let search = query.search.as_deref();
    let set = records(store)?;
    let data = set.matching_records(search)?;
    let def = set.collection().definition();
    let now = chrono::Utc::now();

    let report = match format {
        ReportFormat::Csv => report::uploaded_csv(def, &data, now)?,
        ReportFormat::Json => report::uploaded_json(&data, now)?,
        ReportFormat::Html => report::uploaded_html(def, &data, search, now),
    };
    Ok(report_response(report))
}
