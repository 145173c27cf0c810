use actix_web::http::header;
use actix_web::{error, web, HttpResponse};
use kioskdb::report::Report;
use kioskdb::KioskDbError;
use serde_json::json;

use crate::AppState;

mod crud;
mod dashboard;
mod events;
mod records;
mod registrations;

/// Uploads of whole spreadsheets arrive as one JSON body
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_BODY_BYTES)
            .error_handler(|err, _req| bad_input(err)),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _req| bad_input(err)))
    .service(
        web::scope("/api")
            // Status
            .route("/status", web::get().to(status))
            // Generic CRUD over any database/collection
            .route("/crud", web::get().to(crud::get))
            .route("/crud", web::post().to(crud::create))
            .route("/crud", web::put().to(crud::update))
            .route("/crud", web::delete().to(crud::delete))
            // Uploaded data, addressed per flattened record
            .route("/json-data", web::get().to(records::get))
            .route("/json-data", web::post().to(records::upload))
            .route("/json-data", web::put().to(records::update))
            .route("/json-data", web::delete().to(records::delete))
            .route("/json-data/download", web::get().to(records::download))
            // Registrations
            .route("/registrations", web::get().to(registrations::list))
            .route("/registrations/download", web::get().to(registrations::download))
            .route("/registrations/pdf", web::get().to(registrations::print))
            // Kiosk events
            .route("/events", web::get().to(events::list))
            .route("/events/pdf", web::get().to(events::print))
            // Dashboard
            .route("/dashboard-data", web::get().to(dashboard::data))
            .route("/generate-pdf", web::get().to(dashboard::print)),
    );
}

// ── Helpers ─────────────────────────────────────────────────────────

fn ok_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse::Ok().json(value)
}

fn created_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse::Created().json(value)
}

fn respond(result: kioskdb::Result<HttpResponse>) -> HttpResponse {
    result.unwrap_or_else(err_response)
}

/// Send a rendered report as a file.
fn report_response(report: Report) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(report.content_type())
        .insert_header((header::CONTENT_DISPOSITION, report.content_disposition()))
        .body(report.body)
}

fn err_response(e: KioskDbError) -> HttpResponse {
    let body = json!({ "success": false, "message": e.to_string() });
    match &e {
        KioskDbError::BadRequest(_) | KioskDbError::InvalidId(_) | KioskDbError::Validation(_) => {
            HttpResponse::BadRequest().json(body)
        }
        KioskDbError::NotFound { .. } | KioskDbError::RecordNotFound { .. } => {
            HttpResponse::NotFound().json(body)
        }
        KioskDbError::Conflict { .. } => HttpResponse::Conflict().json(body),
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Internal server error",
                "error": e.to_string(),
            }))
        }
    }
}

/// Malformed query strings and bodies get the same envelope as other 400s.
fn bad_input<E>(err: E) -> actix_web::Error
where
    E: std::fmt::Debug + std::fmt::Display + 'static,
{
    let response = HttpResponse::BadRequest().json(json!({
        "success": false,
        "message": err.to_string(),
    }));
    error::InternalError::from_response(err, response).into()
}

/// A query parameter that must be present and non-blank.
fn required<'q>(value: &'q Option<String>, message: &str) -> kioskdb::Result<&'q str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| KioskDbError::BadRequest(message.to_string()))
}

// ── Status ──────────────────────────────────────────────────────────

async fn status(state: web::Data<AppState>) -> HttpResponse {
    respond(
        state
            .store
            .status()
            .map(|v| ok_json(json!({ "success": true, "data": v }))),
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use kioskdb::{builtin_catalog, Store};

    pub fn state() -> web::Data<AppState> {
        let store = Store::open_in_memory(builtin_catalog().unwrap()).unwrap();
        web::Data::new(AppState { store })
    }

    /// Initialise the API over the given state.
    macro_rules! test_app {
        ($state:expr) => {
            actix_web::test::init_service(
                actix_web::App::new()
                    .app_data($state)
                    .configure($crate::handlers::configure),
            )
            .await
        };
    }
    pub(crate) use test_app;
}

#[cfg(test)]
mod tests {
    use super::err_response;
    use super::test_support::{state, test_app};
    use actix_web::test;
    use kioskdb::KioskDbError;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    #[actix_web::test]
    async fn test_status() {
        let app = test_app!(state());
        let req = test::TestRequest::get().uri("/api/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["ok"], true);
    }

    #[actix_web::test]
    async fn test_malformed_query_is_enveloped() {
        let app = test_app!(state());
        let req = test::TestRequest::get()
            .uri("/api/crud?database=a&collection=b&page=x")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_error_statuses() {
        let cases = [
            (KioskDbError::BadRequest("x".into()), 400),
            (KioskDbError::InvalidId("x".into()), 400),
            (KioskDbError::Validation("x".into()), 400),
            (
                KioskDbError::NotFound {
                    collection: "c".into(),
                    id: "i".into(),
                },
                404,
            ),
            (
                KioskDbError::RecordNotFound {
                    collection: "c".into(),
                    id: "i_0".into(),
                },
                404,
            ),
            (
                KioskDbError::Conflict {
                    collection: "c".into(),
                    id: "i".into(),
                    expected: 1,
                    actual: 2,
                },
                409,
            ),
            (KioskDbError::Other("boom".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err_response(err).status().as_u16(), status);
        }
    }
}
