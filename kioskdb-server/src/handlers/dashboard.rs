use actix_web::{web, HttpResponse};
use kioskdb::dashboard::{Dashboard, DashboardData, DateWindow, ReportType, Summary};
use kioskdb::report;
use kioskdb::{KioskDbError, Store};
use serde::Deserialize;
use serde_json::json;

use super::{err_response, ok_json, report_response, respond};
use crate::AppState;

/// Rows per section in a printed dashboard report
const PRINT_RECORD_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    #[serde(rename = "type")]
    report_type: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

impl DashboardQuery {
    fn parse(&self) -> kioskdb::Result<(ReportType, DateWindow)> {
        let report = ReportType::parse(self.report_type.as_deref())?;
        let window = DateWindow::new(self.start_date.as_deref(), self.end_date.as_deref());
        window.filter()?;
        Ok((report, window))
    }
}

/// Run one dashboard read on the blocking pool.
async fn blocking<T, F>(state: &web::Data<AppState>, window: &DateWindow, read: F) -> kioskdb::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Dashboard<'_>) -> kioskdb::Result<T> + Send + 'static,
{
    let state = state.clone();
    let window = window.clone();
    web::block(move || read(&Dashboard::new(&state.store, &window)?))
        .await
        .map_err(|e| KioskDbError::Other(format!("Dashboard worker failed: {e}")))?
}

/// Summary counts are independent reads, run concurrently.
async fn summary(state: &web::Data<AppState>, window: &DateWindow) -> kioskdb::Result<Summary> {
    let (registrations, images, submissions) = futures::try_join!(
        blocking(state, window, |d| d.count_registrations()),
        blocking(state, window, |d| d.count_processed_images()),
        blocking(state, window, |d| d.count_kiosk_submissions()),
    )?;
    Ok(Summary::new(registrations, images, submissions))
}

async fn load(
    state: &web::Data<AppState>,
    report: ReportType,
    window: &DateWindow,
    limit: Option<usize>,
) -> kioskdb::Result<DashboardData> {
    if report == ReportType::Summary {
        return Ok(DashboardData {
            summary: Some(summary(state, window).await?),
            ..Default::default()
        });
    }
    blocking(state, window, move |d| d.data(report, limit)).await
}

fn databases(store: &Store) -> kioskdb::Result<serde_json::Value> {
    let catalog = store.catalog();
    Ok(json!({
        "testEvent": catalog.dataset(&catalog.dashboard.registrations)?.database,
        "backgroundRemoval": catalog.dataset(&catalog.dashboard.processed_images)?.database,
        "kiosk": catalog.kiosk.database,
    }))
}

pub async fn data(state: web::Data<AppState>, query: web::Query<DashboardQuery>) -> HttpResponse {
    let (report, window) = match query.parse() {
        Ok(parsed) => parsed,
        Err(e) => return err_response(e),
    };
    log::info!("Dashboard {} requested ({:?})", report.as_str(), window.describe());

    let data = match load(&state, report, &window, None).await {
        Ok(data) => data,
        Err(e) => return err_response(e),
    };
    respond(databases(&state.store).map(|databases| {
        ok_json(json!({
            "success": true,
            "data": data,
            "collectionName": state.store.catalog().kiosk.collection,
            "databases": databases,
        }))
    }))
}

/// The dashboard as a print-styled page.
pub async fn print(state: web::Data<AppState>, query: web::Query<DashboardQuery>) -> HttpResponse {
    let (report, window) = match query.parse() {
        Ok(parsed) => parsed,
        Err(e) => return err_response(e),
    };
    let data = match load(&state, report, &window, Some(PRINT_RECORD_LIMIT)).await {
        Ok(data) => data,
        Err(e) => return err_response(e),
    };
    let kiosk = &state.store.catalog().kiosk.collection;
    report_response(report::dashboard_html(
        report,
        kiosk,
        &window,
        &data,
        chrono::Utc::now(),
    ))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{state, test_app};
    use actix_web::test;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn seed(state: &actix_web::web::Data<crate::AppState>) {
        let store = &state.store;
        store
            .dataset("registrations")
            .unwrap()
            .create(json!([{ "goldenPass": "1" }, { "goldenPass": "2" }]))
            .unwrap();
        store
            .dataset("processed_images")
            .unwrap()
            .create(json!({ "nic": "901234567V", "imageUrl": "https://img/1.png" }))
            .unwrap();
        store
            .collection("muthupalasa_kiosk", "EventDaySubmission")
            .unwrap()
            .create(json!([
                { "eventuserdata": { "ownerName": "Nimal" } },
                { "eventuserdata": { "ownerName": "Kamal" } },
                { "eventuserdata": { "ownerName": "Sunil" } },
            ]))
            .unwrap();
    }

    #[actix_web::test]
    async fn test_summary_counts() {
        let state = state();
        seed(&state);
        let app = test_app!(state);

        let req = test::TestRequest::get().uri("/api/dashboard-data").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body["data"]["summary"],
            json!({
                "testRegistrations": 2,
                "processedImages": 1,
                "kioskSubmissions": 3,
                "totalUsers": 2,
            })
        );
        assert_eq!(body["collectionName"], "EventDaySubmission");
        assert_eq!(body["databases"]["backgroundRemoval"], "background-removal");

        let req = test::TestRequest::get()
            .uri("/api/dashboard-data?startDate=2000-01-01&endDate=2000-12-31")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["summary"]["kioskSubmissions"], 0);
        assert_eq!(body["data"]["summary"]["testRegistrations"], 2);
    }

    #[actix_web::test]
    async fn test_sections_by_type() {
        let state = state();
        seed(&state);
        let app = test_app!(state);

        let req = test::TestRequest::get()
            .uri("/api/dashboard-data?type=kiosk-submissions")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["submissions"].as_array().unwrap().len(), 3);
        assert!(body["data"].get("summary").is_none());

        let req = test::TestRequest::get()
            .uri("/api/dashboard-data?type=detailed")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["summary"]["processedImages"], 1);
        assert_eq!(body["data"]["registrations"].as_array().unwrap().len(), 2);

        let req = test::TestRequest::get()
            .uri("/api/dashboard-data?type=weekly")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::get()
            .uri("/api/dashboard-data?startDate=yesterday")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn test_printed_report() {
        let state = state();
        seed(&state);
        let app = test_app!(state);

        let req = test::TestRequest::get()
            .uri("/api/generate-pdf?type=processed-images")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let disposition = resp.headers().get("content-disposition").unwrap();
        assert!(disposition
            .to_str()
            .unwrap()
            .starts_with("inline; filename=\"dashboard-report-processed-images-"));
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Processed Images (1 records)"));
    }
}
