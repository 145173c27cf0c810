use super::csv::CsvTable;
use super::html::{empty_page, HtmlReport};
use super::{cell_text, date_text, generated_lines, Report, ReportFormat};
use crate::catalog::DatasetDefinition;
use crate::document::{ID_FIELD, PARENT_ID_FIELD, RECORD_INDEX_FIELD, VERSION_FIELD};
use crate::error::{KioskDbError, Result};
use crate::flatten::LogicalRecord;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

const STEM: &str = "json-data-export";

/// Union of the record fields in first-seen order, without identifiers and timestamps.
fn columns(def: &DatasetDefinition, records: &[LogicalRecord]) -> Vec<String> {
    let skip = [
        ID_FIELD,
        VERSION_FIELD,
        PARENT_ID_FIELD,
        RECORD_INDEX_FIELD,
        def.timestamps.created.as_str(),
        def.timestamps.updated.as_str(),
    ];
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for record in records {
        for key in record.fields.keys() {
            if !skip.contains(&key.as_str()) && seen.insert(key.as_str()) {
                out.push(key.clone());
            }
        }
    }
    out
}

/// Every record as a CSV row. An empty export is refused.
pub fn uploaded_csv(
    def: &DatasetDefinition,
    records: &[LogicalRecord],
    now: DateTime<Utc>,
) -> Result<Report> {
    if records.is_empty() {
        return Err(KioskDbError::BadRequest("No data to export".into()));
    }
    let keys = columns(def, records);

    let mut headers = vec!["ID".to_string()];
    headers.extend(keys.iter().cloned());
    headers.push("Uploaded At".into());
    headers.push("Updated At".into());
    let mut table = CsvTable::new(headers);

    for (i, record) in records.iter().enumerate() {
        let mut row = vec![(i + 1).to_string()];
        row.extend(keys.iter().map(|k| cell_text(record.fields.get(k))));
        row.push(cell_text(record.fields.get(&def.timestamps.created)));
        row.push(cell_text(record.fields.get(&def.timestamps.updated)));
        table.push_row(row);
    }
    Ok(Report::new(ReportFormat::Csv, STEM, now, table.finish()))
}

/// Records as a pretty-printed JSON array.
pub fn uploaded_json(records: &[LogicalRecord], now: DateTime<Utc>) -> Result<Report> {
    let body = serde_json::to_string_pretty(records)?;
    Ok(Report::new(ReportFormat::Json, STEM, now, body))
}

pub fn uploaded_html(
    def: &DatasetDefinition,
    records: &[LogicalRecord],
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Report {
    let stem = "json-data-report";
    if records.is_empty() {
        return Report::new(ReportFormat::Html, stem, now, empty_page("No data to export"));
    }

    let keys = columns(def, records);
    let distinct = |field: &str| {
        records
            .iter()
            .map(|r| cell_text(r.fields.get(field)))
            .collect::<HashSet<_>>()
            .len()
    };
    let (generated, timestamp) = generated_lines(now);

    let mut lines = vec![
        ("Database", format!("{}.{}", def.database, def.collection)),
        ("Generated", generated),
    ];
    if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
        lines.push(("Filter", format!("\"{term}\"")));
    }
    lines.push(("Total Records", records.len().to_string()));

    let mut headers: Vec<&str> = vec!["ID"];
    headers.extend(keys.iter().map(String::as_str));
    headers.push("Uploaded");

    let body = HtmlReport::new("JSON Data Report")
        .header("JSON Data Report", &lines)
        .summary(&[
            (records.len().to_string(), "Total Records"),
            (keys.len().to_string(), "Data Fields"),
            (distinct("AREA").to_string(), "Unique Areas"),
            (distinct("CLASSIFICATION").to_string(), "Classifications"),
        ])
        .table(
            &headers,
            records.iter().enumerate().map(|(i, record)| {
                let mut row = vec![(i + 1).to_string()];
                row.extend(keys.iter().map(|k| cell_text(record.fields.get(k))));
                row.push(date_text(record.fields.get(&def.timestamps.created)).unwrap_or_default());
                row
            }),
        )
        .finish("JSON Data Management System", &timestamp);

    Report::new(ReportFormat::Html, stem, now, body)
}
