use actix_web::{web, HttpResponse};
use kioskdb::dashboard::Events;
use kioskdb::report::{self, EventsScope};
use kioskdb::Store;
use serde::Deserialize;
use serde_json::json;

use super::{ok_json, report_response, respond};
use crate::AppState;

/// Submissions listed per event when every event is requested at once
const ALL_EVENTS_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    all: bool,
    location: Option<String>,
    collection: Option<String>,
}

impl EventsQuery {
    fn location(&self) -> Option<&str> {
        self.location.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    fn collection(&self) -> Option<&str> {
        self.collection.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

pub async fn list(state: web::Data<AppState>, query: web::Query<EventsQuery>) -> HttpResponse {
    respond(read(&state.store, &query))
}

fn read(store: &Store, query: &EventsQuery) -> kioskdb::Result<HttpResponse> {
    let events = Events::new(store);

    if query.all {
        let (data, summary) = events.all(Some(ALL_EVENTS_LIMIT))?;
        return Ok(ok_json(json!({ "success": true, "data": data, "summary": summary })));
    }
    if let Some(location) = query.location() {
        let (data, summary) = events.at_location(location)?;
        return Ok(ok_json(json!({
            "success": true,
            "data": data,
            "location": location,
            "summary": {
                "totalEvents": summary.total_events,
                "totalRegistrations": summary.total_registrations,
            },
        })));
    }
    if let Some(collection) = query.collection() {
        let data = events.event(collection)?;
        return Ok(ok_json(json!({ "success": true, "data": data })));
    }

    let (data, summary) = events.counts()?;
    Ok(ok_json(json!({ "success": true, "data": data, "summary": summary })))
}

pub async fn print(state: web::Data<AppState>, query: web::Query<EventsQuery>) -> HttpResponse {
    respond(render(&state.store, &query))
}

fn render(store: &Store, query: &EventsQuery) -> kioskdb::Result<HttpResponse> {
    let events = Events::new(store);
    let scope = if let Some(collection) = query.collection() {
        EventsScope::Event(events.event(collection)?)
    } else if let Some(location) = query.location() {
        let (events, summary) = events.at_location(location)?;
        EventsScope::Location {
            location: location.to_string(),
            events,
            summary,
        }
    } else {
        let (events, summary) = events.all(None)?;
        EventsScope::All {
            events,
            summary,
            locations: store.catalog().locations().len(),
        }
    };
    let database = &store.catalog().kiosk.database;
    Ok(report_response(report::events_html(
        database,
        &scope,
        chrono::Utc::now(),
    )))
}
