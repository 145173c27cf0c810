use actix_web::{web, HttpResponse};
use kioskdb::report::{self, RegistrationStats, ReportFormat};
use kioskdb::{Collection, KioskDbError, PageRequest, StoredDocument, Store};
use serde::Deserialize;
use serde_json::json;

use super::{ok_json, report_response, respond};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegistrationsQuery {
    page: Option<u64>,
    limit: Option<u64>,
    search: Option<String>,
    format: Option<String>,
}

fn registrations(store: &Store) -> kioskdb::Result<Collection<'_>> {
    store.dataset(&store.catalog().dashboard.registrations)
}

/// Every registration matching the search, newest first.
fn matching(col: &Collection<'_>, search: Option<&str>) -> kioskdb::Result<Vec<StoredDocument>> {
    col.find(&col.search_filter(search)?)
}

pub async fn list(
    state: web::Data<AppState>,
    query: web::Query<RegistrationsQuery>,
) -> HttpResponse {
    respond(read(&state.store, &query))
}

fn read(store: &Store, query: &RegistrationsQuery) -> kioskdb::Result<HttpResponse> {
    let col = registrations(store)?;
    let search = query.search.as_deref();

    if query.format.as_deref() == Some("all") {
        let docs = matching(&col, search)?;
        let stats = RegistrationStats::compute(&docs);
        return Ok(ok_json(json!({
            "success": true,
            "data": {
                "totalCount": docs.len(),
                "registrations": docs,
                "statistics": stats.statistics,
                "classificationStats": stats.classification_stats,
                "locationStats": stats.location_stats,
            },
        })));
    }

    let request = PageRequest::new(query.page, query.limit, col.definition().page_size)?;
    let page = col.list(&col.search_filter(search)?, request)?;
    Ok(ok_json(json!({
        "success": true,
        "data": page.data,
        "pagination": page.pagination,
    })))
}

pub async fn download(
    state: web::Data<AppState>,
    query: web::Query<RegistrationsQuery>,
) -> HttpResponse {
    respond(export(&state.store, &query))
}

fn export(store: &Store, query: &RegistrationsQuery) -> kioskdb::Result<HttpResponse> {
    let format = ReportFormat::parse(query.format.as_deref(), ReportFormat::Html)?;
    let col = registrations(store)?;
    let search = query.search.as_deref();
    let docs = matching(&col, search)?;
    let now = chrono::Utc::now();
    let report = match format {
        ReportFormat::Csv => report::registrations_csv(&docs, now),
        ReportFormat::Html => report::registrations_html(col.definition(), &docs, search, now),
        ReportFormat::Json => {
            return Err(KioskDbError::BadRequest(
                "Registrations download as csv or html".into(),
            ))
        }
    };
    Ok(report_response(report))
}

/// The complete registration report, opened in the browser for printing.
pub async fn print(
    state: web::Data<AppState>,
    query: web::Query<RegistrationsQuery>,
) -> HttpResponse {
    let search = query.search.as_deref();
    respond(registrations(&state.store).and_then(|col| {
        let docs = matching(&col, search)?;
        let report = report::registrations_print(col.definition(), &docs, search, chrono::Utc::now());
        Ok(report_response(report))
    }))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{state, test_app};
    use actix_web::test;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn seed(state: &actix_web::web::Data<crate::AppState>) {
        let col = state.store.dataset("registrations").unwrap();
        col.create(json!([
            { "dealerInfo": { "ownerName": "Nimal", "classification": "Gold", "event": "Galle", "contactNo": "0771234567" }, "goldenPass": "GP-1" },
            { "dealerInfo": { "ownerName": "Kamal", "classification": "Gold", "event": "Kandy" } },
            { "dealerInfo": { "ownerName": "Sunil", "classification": "Silver", "event": "Galle" }, "goldenPass": "" },
        ]))
        .unwrap();
    }

    #[actix_web::test]
    async fn test_listing_and_statistics() {
        let state = state();
        seed(&state);
        let app = test_app!(state);

        let req = test::TestRequest::get().uri("/api/registrations").to_request();
        let page: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page["pagination"]["limit"], 50);
        assert_eq!(page["pagination"]["total"], 3);

        let req = test::TestRequest::get()
            .uri("/api/registrations?format=all")
            .to_request();
        let all: Value = test::call_and_read_body_json(&app, req).await;
        let data = &all["data"];
        assert_eq!(data["totalCount"], 3);
        assert_eq!(data["statistics"]["goldenPassHolders"], 1);
        assert_eq!(data["statistics"]["classifications"], json!(["Gold", "Silver"]));
        assert_eq!(data["classificationStats"][0], json!({ "_id": "Gold", "count": 2 }));
        assert_eq!(data["locationStats"][0], json!({ "_id": "Galle", "count": 2 }));

        let req = test::TestRequest::get()
            .uri("/api/registrations?search=kamal")
            .to_request();
        let found: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found["pagination"]["total"], 1);
    }

    #[actix_web::test]
    async fn test_downloads() {
        let state = state();
        seed(&state);
        let app = test_app!(state);

        let req = test::TestRequest::get()
            .uri("/api/registrations/download?format=csv")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/csv; charset=utf-8"
        );
        let body = test::read_body(resp).await;
        assert_eq!(String::from_utf8(body.to_vec()).unwrap().lines().count(), 4);

        let req = test::TestRequest::get()
            .uri("/api/registrations/pdf?search=gold")
            .to_request();
        let resp = test::call_service(&app, req).await;
        let disposition = resp.headers().get("content-disposition").unwrap();
        assert!(disposition
            .to_str()
            .unwrap()
            .starts_with("inline; filename=\"complete-registration-report-"));

        let req = test::TestRequest::get()
            .uri("/api/registrations/download?format=xls")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }
}
