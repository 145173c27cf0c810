use super::html::HtmlReport;
use super::{date_text, generated_lines, or_missing, short_id, Report, ReportFormat};
use crate::dashboard::{EventRegistrations, EventsSummary};
use crate::document::typed::{read_lenient, KioskSubmission};
use crate::document::StoredDocument;
use chrono::{DateTime, Utc};

const HEADERS: [&str; 7] = [
    "ID",
    "Owner Name",
    "NIC",
    "Shop Name",
    "Golden Pass",
    "Classification",
    "Registered At",
];

/// Which events an events report covers
#[derive(Debug, Clone)]
pub enum EventsScope {
    All {
        events: Vec<EventRegistrations>,
        summary: EventsSummary,
        locations: usize,
    },
    Location {
        location: String,
        events: Vec<EventRegistrations>,
        summary: EventsSummary,
    },
    Event(EventRegistrations),
}

fn row(doc: &StoredDocument) -> Vec<String> {
    let sub: KioskSubmission = read_lenient(&doc.id, &doc.fields);
    let data = sub.eventuserdata.unwrap_or_default();
    vec![
        short_id(&doc.id),
        or_missing(data.owner_name),
        or_missing(data.owner_nic),
        or_missing(data.shop_name),
        or_missing(data.golden_pass_number),
        or_missing(data.classification),
        or_missing(date_text(doc.fields.get("createdAt"))),
    ]
}

fn event_block(report: HtmlReport, data: &EventRegistrations, with_url: bool) -> HtmlReport {
    let event = &data.event;
    let mut detail = format!("{} | {} registrations", event.location, data.total_count);
    if with_url {
        if let Some(url) = &event.url {
            detail.push_str(&format!(" | {url}"));
        }
    }
    let report = report.begin_block(
        &event.name,
        &[detail, format!("Collection: {}", event.collection)],
    );
    let report = if data.registrations.is_empty() {
        report.no_data("No registrations found for this event")
    } else {
        report.table(&HEADERS, data.registrations.iter().map(row))
    };
    report.end_block()
}

/// Print-styled report of kiosk event submissions.
pub fn events_html(database: &str, scope: &EventsScope, now: DateTime<Utc>) -> Report {
    let (generated, timestamp) = generated_lines(now);
    let mut report = HtmlReport::new("Event Registrations Report")
        .print_instructions()
        .header(
            "Event Registrations Report",
            &[("Generated on", generated), ("Database", database.to_string())],
        );

    match scope {
        EventsScope::All {
            events,
            summary,
            locations,
        } => {
            report = report.summary(&[
                (summary.total_events.to_string(), "Total Events"),
                (summary.active_events.to_string(), "Active Events"),
                (summary.total_registrations.to_string(), "Total Registrations"),
                (locations.to_string(), "Locations"),
            ]);
            let mut grouped: Vec<&str> = Vec::new();
            for data in events {
                if !grouped.contains(&data.event.location.as_str()) {
                    grouped.push(&data.event.location);
                }
            }
            for location in grouped {
                report = report.page_break().section(location);
                for data in events.iter().filter(|d| d.event.location == location) {
                    report = event_block(report, data, true);
                }
            }
        }
        EventsScope::Location {
            location,
            events,
            summary,
        } => {
            let label = format!("Events in {location}");
            report = report.section(&format!("{location} Events")).summary(&[
                (summary.total_events.to_string(), label.as_str()),
                (summary.total_registrations.to_string(), "Total Registrations"),
            ]);
            for data in events {
                report = event_block(report, data, false);
            }
        }
        EventsScope::Event(data) => {
            report = report
                .section(&format!("{} - {}", data.event.name, data.event.location))
                .summary(&[
                    (data.total_count.to_string(), "Total Registrations"),
                    (data.event.collection.clone(), "Collection Name"),
                ]);
            report = event_block(report, data, true);
        }
    }

    let body = report.finish("Event Registrations", &timestamp);
    Report::new(ReportFormat::Html, "events-report", now, body).inline()
}
