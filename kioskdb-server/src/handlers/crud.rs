use actix_web::{web, HttpResponse};
use kioskdb::{Collection, Created, Filter, KioskDbError, PageRequest, Store};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{created_json, ok_json, required, respond};
use crate::AppState;

/// Default page size of the generic listing, whatever the collection
const PAGE_SIZE: u64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrudQuery {
    database: Option<String>,
    collection: Option<String>,
    id: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
    search: Option<String>,
    version: Option<i64>,
    delete_all: Option<bool>,
}

impl CrudQuery {
    fn collection<'s>(&self, store: &'s Store) -> kioskdb::Result<Collection<'s>> {
        store.collection(
            self.database.as_deref().unwrap_or_default(),
            self.collection.as_deref().unwrap_or_default(),
        )
    }

    fn id(&self) -> kioskdb::Result<&str> {
        required(&self.id, "Database, collection, and ID are required")
    }
}

pub async fn get(state: web::Data<AppState>, query: web::Query<CrudQuery>) -> HttpResponse {
    respond(read(&state.store, &query))
}

fn read(store: &Store, query: &CrudQuery) -> kioskdb::Result<HttpResponse> {
    let col = query.collection(store)?;
    if query.id.is_some() {
        let doc = col.get(query.id()?)?;
        return Ok(ok_json(json!({ "success": true, "data": doc })));
    }

    let request = PageRequest::new(query.page, query.limit, PAGE_SIZE)?;
    let filter = Filter::search(query.search.as_deref(), &store.catalog().generic_search)?;
    let page = col.list(&filter, request)?;
    Ok(ok_json(json!({
        "success": true,
        "data": page.data,
        "pagination": page.pagination,
    })))
}

pub async fn create(
    state: web::Data<AppState>,
    query: web::Query<CrudQuery>,
    body: web::Json<Value>,
) -> HttpResponse {
    respond(
        query
            .collection(&state.store)
            .and_then(|col| col.create(body.into_inner()))
            .map(|created| match created {
                Created::One(doc) => created_json(json!({
                    "success": true,
                    "message": "Document created successfully",
                    "data": doc,
                })),
                Created::Many(ids) => created_json(json!({
                    "success": true,
                    "message": format!("{} documents created successfully", ids.len()),
                    "data": { "insertedCount": ids.len(), "insertedIds": ids },
                })),
            }),
    )
}

pub async fn update(
    state: web::Data<AppState>,
    query: web::Query<CrudQuery>,
    body: web::Json<Value>,
) -> HttpResponse {
    respond(patch(&state.store, &query, body.into_inner()))
}

fn patch(store: &Store, query: &CrudQuery, body: Value) -> kioskdb::Result<HttpResponse> {
    let col = query.collection(store)?;
    let doc = col.update(query.id()?, body, query.version)?;
    Ok(ok_json(json!({
        "success": true,
        "message": "Document updated successfully",
        "data": doc,
    })))
}

pub async fn delete(state: web::Data<AppState>, query: web::Query<CrudQuery>) -> HttpResponse {
    respond(remove(&state.store, &query))
}

fn remove(store: &Store, query: &CrudQuery) -> kioskdb::Result<HttpResponse> {
    let col = query.collection(store)?;
    if query.delete_all == Some(true) {
        let deleted = col.delete_all()?;
        return Ok(ok_json(json!({
            "success": true,
            "message": format!("{deleted} documents deleted successfully"),
            "data": { "deletedCount": deleted },
        })));
    }
    if query.id.is_none() {
        return Err(KioskDbError::BadRequest(
            "Database, collection, and ID are required".into(),
        ));
    }
    col.delete(query.id()?, query.version)?;
    Ok(ok_json(json!({
        "success": true,
        "message": "Document deleted successfully",
    })))
}
