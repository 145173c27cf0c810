// Downloadable reports: CSV exports, JSON exports and print-styled HTML pages

pub mod csv;
pub mod html;
mod dashboard;
mod events;
mod registrations;
pub mod stats;
mod uploaded;

pub use dashboard::dashboard_html;
pub use events::{events_html, EventsScope};
pub use registrations::{registrations_csv, registrations_html, registrations_print};
pub use stats::RegistrationStats;
pub use uploaded::{uploaded_csv, uploaded_html, uploaded_json};

use crate::document::parse_timestamp;
use crate::error::{KioskDbError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Placeholder for missing values in tabular reports
const MISSING: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
    Html,
}

impl ReportFormat {
    /// `pdf` is accepted as an alias for the print-styled HTML page.
    pub fn parse(value: Option<&str>, default: ReportFormat) -> Result<ReportFormat> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(default),
            Some(v) if v.eq_ignore_ascii_case("csv") => Ok(ReportFormat::Csv),
            Some(v) if v.eq_ignore_ascii_case("json") => Ok(ReportFormat::Json),
            Some(v) if v.eq_ignore_ascii_case("html") || v.eq_ignore_ascii_case("pdf") => {
                Ok(ReportFormat::Html)
            }
            Some(v) => Err(KioskDbError::BadRequest(format!(
                "Unknown format '{v}' (expected csv, json or html)"
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Csv => CSV_CONTENT_TYPE,
            ReportFormat::Json => JSON_CONTENT_TYPE,
            ReportFormat::Html => HTML_CONTENT_TYPE,
        }
    }
}

/// A rendered report ready to be sent as a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub format: ReportFormat,
    pub filename: String,
    /// Shown in the browser rather than saved
    pub inline: bool,
    pub body: String,
}

impl Report {
    /// `filename` is `<stem>-<YYYY-MM-DD>.<ext>` for the report date.
    pub fn new(format: ReportFormat, stem: &str, now: DateTime<Utc>, body: String) -> Self {
        Report {
            format,
            filename: format!("{stem}-{}.{}", now.format("%Y-%m-%d"), format.extension()),
            inline: false,
            body,
        }
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn content_disposition(&self) -> String {
        let kind = if self.inline { "inline" } else { "attachment" };
        format!("{kind}; filename=\"{}\"", self.filename)
    }
}

/// Text for a table cell: strings as-is, other scalars by their JSON text,
/// nested values as compact JSON, null and missing as empty.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Date part of a timestamp value; unparsable text is shown unchanged.
pub fn date_text(value: Option<&Value>) -> Option<String> {
    let value = value?;
    match parse_timestamp(value) {
        Some(at) => Some(at.format("%Y-%m-%d").to_string()),
        None => Some(cell_text(Some(value))).filter(|s| !s.is_empty()),
    }
}

fn or_missing(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| MISSING.to_string())
}

/// First eight characters of an id, as printed in dense tables.
fn short_id(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("{prefix}...")
}

fn generated_lines(now: DateTime<Utc>) -> (String, String) {
    (
        now.format("%Y-%m-%d at %H:%M:%S UTC").to_string(),
        crate::document::format_timestamp(now),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_format_parse() {
        assert_eq!(
            ReportFormat::parse(None, ReportFormat::Json).unwrap(),
            ReportFormat::Json
        );
        assert_eq!(
            ReportFormat::parse(Some("PDF"), ReportFormat::Json).unwrap(),
            ReportFormat::Html
        );
        assert!(ReportFormat::parse(Some("xls"), ReportFormat::Json).is_err());
    }

    #[test]
    fn test_report_headers() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let report = Report::new(ReportFormat::Csv, "registration-report", now, String::new());
        assert_eq!(report.filename, "registration-report-2024-05-01.csv");
        assert_eq!(
            report.content_disposition(),
            "attachment; filename=\"registration-report-2024-05-01.csv\""
        );
        assert_eq!(report.content_type(), "text/csv; charset=utf-8");
        assert!(report.inline().content_disposition().starts_with("inline;"));
    }

    #[test]
    fn test_cell_and_date_text() {
        assert_eq!(cell_text(None), "");
        assert_eq!(cell_text(Some(&json!(0))), "0");
        assert_eq!(cell_text(Some(&json!({ "a": 1 }))), "{\"a\":1}");
        assert_eq!(
            date_text(Some(&json!("2024-05-01T23:00:00.000Z"))),
            Some("2024-05-01".to_string())
        );
        assert_eq!(date_text(Some(&json!("soon"))), Some("soon".to_string()));
        assert_eq!(date_text(Some(&json!(null))), None);
    }
}
