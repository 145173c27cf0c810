use super::csv::CsvTable;
use super::html::HtmlReport;
use super::stats::{has_golden_pass, RegistrationStats};
use super::{date_text, generated_lines, or_missing, Report, ReportFormat};
use crate::catalog::DatasetDefinition;
use crate::document::typed::{read_lenient, Registration};
use crate::document::StoredDocument;
use chrono::{DateTime, Utc};
use serde_json::Value;

const HEADERS: [&str; 9] = [
    "ID",
    "Owner Name",
    "NIC Number",
    "Shop Name",
    "Contact Number",
    "Event",
    "Classification",
    "Golden Pass",
    "Registered Date",
];

const NO_PASS: &str = "No Pass";

fn row(index: usize, doc: &StoredDocument) -> Vec<String> {
    let reg: Registration = read_lenient(&doc.id, &doc.fields);
    let registered = reg
        .registered_at
        .as_ref()
        .and_then(|at| date_text(Some(&Value::String(at.clone()))));
    let golden = if has_golden_pass(&reg) {
        reg.golden_pass.clone().unwrap_or_default()
    } else {
        NO_PASS.to_string()
    };
    let dealer = reg.dealer_info.unwrap_or_default();
    vec![
        (index + 1).to_string(),
        or_missing(dealer.owner_name),
        or_missing(dealer.owner_nic),
        or_missing(dealer.shop_name),
        or_missing(dealer.contact_no),
        or_missing(dealer.event),
        or_missing(dealer.classification),
        golden,
        or_missing(registered),
    ]
}

/// One row per registration, numbered from 1 in the order given.
pub fn registrations_csv(docs: &[StoredDocument], now: DateTime<Utc>) -> Report {
    let mut table = CsvTable::new(HEADERS);
    for (i, doc) in docs.iter().enumerate() {
        table.push_row(row(i, doc));
    }
    Report::new(ReportFormat::Csv, "registration-report", now, table.finish())
}

/// Print-styled registration report as a download.
pub fn registrations_html(
    def: &DatasetDefinition,
    docs: &[StoredDocument],
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Report {
    let body = render_html(def, docs, search, now);
    Report::new(ReportFormat::Html, "registration-report", now, body)
}

/// The same report opened in the browser for printing.
pub fn registrations_print(
    def: &DatasetDefinition,
    docs: &[StoredDocument],
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Report {
    let body = render_html(def, docs, search, now);
    Report::new(ReportFormat::Html, "complete-registration-report", now, body).inline()
}

fn render_html(
    def: &DatasetDefinition,
    docs: &[StoredDocument],
    search: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let stats = RegistrationStats::compute(docs);
    let (generated, timestamp) = generated_lines(now);

    let mut lines = vec![
        ("Database", format!("{}.{}", def.database, def.collection)),
        ("Generated", generated),
    ];
    if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
        lines.push(("Filter", format!("\"{term}\"")));
    }
    lines.push(("Total Records", docs.len().to_string()));

    HtmlReport::new("Registration Report")
        .print_instructions()
        .header("Complete Registration Report", &lines)
        .summary(&[
            (docs.len().to_string(), "Total Registrations"),
            (
                stats.statistics.golden_pass_holders.to_string(),
                "Golden Pass Holders",
            ),
            (
                stats.classification_stats.len().to_string(),
                "Different Classifications",
            ),
            (stats.location_stats.len().to_string(), "Different Events"),
        ])
        .table(
            &HEADERS,
            docs.iter().enumerate().map(|(i, doc)| row(i, doc)),
        )
        .finish("Complete Registration Analysis", &timestamp)
}
