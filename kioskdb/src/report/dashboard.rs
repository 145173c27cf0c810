use super::html::HtmlReport;
use super::{date_text, generated_lines, or_missing, short_id, Report, ReportFormat};
use crate::dashboard::{DashboardData, DateWindow, ReportType};
use crate::document::typed::{read_lenient, KioskSubmission, ProcessedImage, Registration};
use crate::document::StoredDocument;
use chrono::{DateTime, Utc};

fn registration_row(doc: &StoredDocument) -> Vec<String> {
    let reg: Registration = read_lenient(&doc.id, &doc.fields);
    let dealer = reg.dealer_info.unwrap_or_default();
    vec![
        short_id(&doc.id),
        or_missing(dealer.owner_name),
        or_missing(dealer.owner_nic),
        or_missing(dealer.shop_name),
        or_missing(dealer.classification),
        or_missing(reg.golden_pass),
        or_missing(dealer.contact_no),
    ]
}

fn submission_row(doc: &StoredDocument) -> Vec<String> {
    let sub: KioskSubmission = read_lenient(&doc.id, &doc.fields);
    let data = sub.eventuserdata.unwrap_or_default();
    vec![
        short_id(&doc.id),
        or_missing(data.owner_name),
        or_missing(data.owner_nic),
        or_missing(data.shop_name),
        or_missing(data.classification),
        or_missing(data.golden_pass_number),
        or_missing(data.selected_background),
        or_missing(date_text(doc.fields.get("createdAt"))),
    ]
}

fn image_row(doc: &StoredDocument) -> Vec<String> {
    let img: ProcessedImage = read_lenient(&doc.id, &doc.fields);
    let available = img.image_url.map(|_| "Available".to_string());
    vec![
        short_id(&doc.id),
        or_missing(img.nic),
        or_missing(available),
        or_missing(date_text(doc.fields.get("createdAt"))),
    ]
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Print-styled dashboard report for one report type.
pub fn dashboard_html(
    report_type: ReportType,
    kiosk_collection: &str,
    window: &DateWindow,
    data: &DashboardData,
    now: DateTime<Utc>,
) -> Report {
    let (generated, timestamp) = generated_lines(now);
    let mut lines = vec![
        ("Report Type", title_case(report_type.as_str())),
        ("Generated on", generated),
    ];
    if let Some(range) = window.describe() {
        lines.push(("Date Range", range));
    }
    lines.push(("Collection", kiosk_collection.to_string()));

    let mut report = HtmlReport::new(&format!("Dashboard Report - {}", report_type.as_str()))
        .print_instructions()
        .header("Dashboard Report", &lines);

    if let Some(summary) = &data.summary {
        report = report.section("Summary Statistics").summary(&[
            (summary.test_registrations.to_string(), "Test Registrations"),
            (summary.processed_images.to_string(), "Processed Images"),
            (summary.kiosk_submissions.to_string(), "Kiosk Submissions"),
            (summary.total_users.to_string(), "Total Users"),
        ]);
    }
    if let Some(regs) = &data.registrations {
        report = report
            .section(&format!("Test Registrations ({} records)", regs.len()))
            .table(
                &["ID", "Owner Name", "NIC", "Shop Name", "Classification", "Golden Pass", "Contact"],
                regs.iter().map(registration_row),
            );
    }
    if let Some(subs) = &data.submissions {
        report = report
            .section(&format!(
                "Kiosk Submissions - {kiosk_collection} ({} records)",
                subs.len()
            ))
            .table(
                &[
                    "ID",
                    "Owner Name",
                    "NIC",
                    "Shop Name",
                    "Classification",
                    "Golden Pass",
                    "Background",
                    "Created At",
                ],
                subs.iter().map(submission_row),
            );
    }
    if let Some(images) = &data.processed_images {
        report = report
            .section(&format!("Processed Images ({} records)", images.len()))
            .table(
                &["ID", "NIC", "Image URL", "Processed At"],
                images.iter().map(image_row),
            );
    }

    let body = report.finish("Dashboard Report", &timestamp);
    Report::new(
        ReportFormat::Html,
        &format!("dashboard-report-{}", report_type.as_str()),
        now,
        body,
    )
    .inline()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::Summary;
    use crate::document::into_object;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_summary_report() {
        let data = DashboardData {
            summary: Some(Summary::new(4, 2, 9)),
            ..Default::default()
        };
        let window = DateWindow::new(Some("2024-04-01"), Some("2024-04-30"));
        let report = dashboard_html(ReportType::Summary, "EventDaySubmission", &window, &data, now());
        assert_eq!(report.filename, "dashboard-report-summary-2024-05-01.html");
        assert!(report.body.contains("2024-04-01 to 2024-04-30"));
        assert!(report.body.contains("<h3>9</h3><p>Kiosk Submissions</p>"));
        assert!(!report.body.contains("<table>"));
    }

    #[test]
    fn test_processed_images_section() {
        let data = DashboardData {
            processed_images: Some(vec![StoredDocument {
                id: "01hxyz0123456789".into(),
                version: 1,
                fields: into_object(json!({ "nic": "123", "imageUrl": "https://x" })).unwrap(),
            }]),
            ..Default::default()
        };
        let report = dashboard_html(
            ReportType::ProcessedImages,
            "EventDaySubmission",
            &DateWindow::default(),
            &data,
            now(),
        );
        assert!(report.body.contains("Processed Images (1 records)"));
        assert!(report.body.contains("<td>01hxyz01...</td>"));
        assert!(report.body.contains("<td>Available</td>"));
        assert!(report.body.contains("Report Type:</strong> Processed-images"));
    }
}
