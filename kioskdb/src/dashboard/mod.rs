// Dashboard aggregation across the registration, image and kiosk databases

mod events;

pub use events::{EventCount, EventRegistrations, Events, EventsSummary};

use crate::document::{sort_newest_first, StoredDocument};
use crate::error::{KioskDbError, Result};
use crate::filter::Filter;
use crate::store::{Collection, Store};
use serde::Serialize;

/// Field the dashboard date window applies to
pub const DATE_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Summary,
    Registrations,
    KioskSubmissions,
    ProcessedImages,
    Detailed,
}

impl ReportType {
    /// Defaults to the summary.
    pub fn parse(value: Option<&str>) -> Result<ReportType> {
        match value.map(str::trim).unwrap_or("summary") {
            "" | "summary" => Ok(ReportType::Summary),
            "registrations" => Ok(ReportType::Registrations),
            "kiosk-submissions" => Ok(ReportType::KioskSubmissions),
            "processed-images" => Ok(ReportType::ProcessedImages),
            "detailed" => Ok(ReportType::Detailed),
            other => Err(KioskDbError::BadRequest(format!(
                "Invalid report type '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Summary => "summary",
            ReportType::Registrations => "registrations",
            ReportType::KioskSubmissions => "kiosk-submissions",
            ReportType::ProcessedImages => "processed-images",
            ReportType::Detailed => "detailed",
        }
    }

    pub fn includes_summary(&self) -> bool {
        matches!(self, ReportType::Summary | ReportType::Detailed)
    }

    pub fn includes(&self, section: ReportType) -> bool {
        *self == section || *self == ReportType::Detailed
    }
}

/// Optional `startDate`/`endDate` window on kiosk submissions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateWindow {
    pub fn new(start: Option<&str>, end: Option<&str>) -> Self {
        let clean = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        DateWindow {
            start: clean(start),
            end: clean(end),
        }
    }

    pub fn filter(&self) -> Result<Filter> {
        Filter::date_range(DATE_FIELD, self.start.as_deref(), self.end.as_deref())
    }

    /// Human readable range, if any bound is set.
    pub fn describe(&self) -> Option<String> {
        match (&self.start, &self.end) {
            (None, None) => None,
            (Some(s), Some(e)) => Some(format!("{s} to {e}")),
            (Some(s), None) => Some(format!("from {s}")),
            (None, Some(e)) => Some(format!("until {e}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub test_registrations: usize,
    pub processed_images: usize,
    pub kiosk_submissions: usize,
    pub total_users: usize,
}

impl Summary {
    pub fn new(registrations: usize, processed_images: usize, kiosk_submissions: usize) -> Self {
        Summary {
            test_registrations: registrations,
            processed_images,
            kiosk_submissions,
            total_users: registrations,
        }
    }
}

/// The sections a report type asks for; absent sections are omitted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrations: Option<Vec<StoredDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submissions: Option<Vec<StoredDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_images: Option<Vec<StoredDocument>>,
}

/// Read side of the dashboard.
pub struct Dashboard<'a> {
    store: &'a Store,
    window: Filter,
}

impl<'a> Dashboard<'a> {
    pub fn new(store: &'a Store, window: &DateWindow) -> Result<Self> {
        Ok(Dashboard {
            store,
            window: window.filter()?,
        })
    }

    fn registrations_collection(&self) -> Result<Collection<'a>> {
        self.store
            .dataset(&self.store.catalog().dashboard.registrations)
    }

    fn processed_images_collection(&self) -> Result<Collection<'a>> {
        self.store
            .dataset(&self.store.catalog().dashboard.processed_images)
    }

    fn kiosk_collection(&self) -> Collection<'a> {
        self.store.collection_for(self.store.catalog().kiosk_dataset())
    }

    /// Name of the kiosk collection submissions are read from.
    pub fn kiosk_collection_name(&self) -> &str {
        &self.store.catalog().kiosk.collection
    }

    pub fn count_registrations(&self) -> Result<usize> {
        self.registrations_collection()?.count(&Filter::All)
    }

    pub fn count_processed_images(&self) -> Result<usize> {
        self.processed_images_collection()?.count(&Filter::All)
    }

    /// Kiosk submissions inside the date window.
    pub fn count_kiosk_submissions(&self) -> Result<usize> {
        self.kiosk_collection().count(&self.window)
    }

    pub fn summary(&self) -> Result<Summary> {
        Ok(Summary::new(
            self.count_registrations()?,
            self.count_processed_images()?,
            self.count_kiosk_submissions()?,
        ))
    }

    pub fn registrations(&self, limit: Option<usize>) -> Result<Vec<StoredDocument>> {
        Ok(truncate(self.registrations_collection()?.find(&Filter::All)?, limit))
    }

    /// Submissions inside the date window, newest first.
    pub fn kiosk_submissions(&self, limit: Option<usize>) -> Result<Vec<StoredDocument>> {
        let mut docs = self.kiosk_collection().find(&self.window)?;
        sort_newest_first(&mut docs, DATE_FIELD);
        Ok(truncate(docs, limit))
    }

    pub fn processed_images(&self, limit: Option<usize>) -> Result<Vec<StoredDocument>> {
        Ok(truncate(self.processed_images_collection()?.find(&Filter::All)?, limit))
    }

    /// Everything the report type covers. For `detailed` the summary counts
    /// are taken from the returned lists.
    pub fn data(&self, report: ReportType, limit: Option<usize>) -> Result<DashboardData> {
        let mut data = DashboardData::default();
        if report == ReportType::Summary {
            data.summary = Some(self.summary()?);
            return Ok(data);
        }
        if report.includes(ReportType::Registrations) {
            data.registrations = Some(self.registrations(limit)?);
        }
        if report.includes(ReportType::KioskSubmissions) {
            data.submissions = Some(self.kiosk_submissions(limit)?);
        }
        if report.includes(ReportType::ProcessedImages) {
            data.processed_images = Some(self.processed_images(limit)?);
        }
        if report == ReportType::Detailed {
            data.summary = Some(Summary::new(
                data.registrations.as_ref().map_or(0, Vec::len),
                data.processed_images.as_ref().map_or(0, Vec::len),
                data.submissions.as_ref().map_or(0, Vec::len),
            ));
        }
        Ok(data)
    }
}

fn truncate(mut docs: Vec<StoredDocument>, limit: Option<usize>) -> Vec<StoredDocument> {
    if let Some(limit) = limit {
        docs.truncate(limit);
    }
    docs
}
