use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level dataset catalog parsed from catalog.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetDefinition>,
    /// Fields searched by the generic CRUD route, whatever collection it targets
    #[serde(default = "default_generic_search")]
    pub generic_search: Vec<String>,
    pub kiosk: KioskDefinition,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    #[serde(default)]
    pub dashboard: DashboardDefinition,
}

/// A named database/collection pair and how its documents are shaped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDefinition {
    pub database: String,
    pub collection: String,
    #[serde(default)]
    pub kind: RecordKind,
    #[serde(default)]
    pub search: Vec<String>,
    #[serde(default)]
    pub timestamps: TimestampFields,
    /// Expose embedded lists as individually addressable records
    #[serde(default)]
    pub flatten: bool,
    /// Name of the list field holding embedded records. When unset the
    /// list is found by shape: exactly one top-level list of objects.
    #[serde(default)]
    pub records_field: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

/// Field names the server stamps on create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampFields {
    #[serde(default = "default_created_field")]
    pub created: String,
    #[serde(default = "default_updated_field")]
    pub updated: String,
}

impl Default for TimestampFields {
    fn default() -> Self {
        TimestampFields {
            created: default_created_field(),
            updated: default_updated_field(),
        }
    }
}

/// Known record shapes, validated at the API boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Registration,
    KioskSubmission,
    ProcessedImage,
    #[default]
    Opaque,
}

/// The kiosk database: one collection per event plus the day-submission collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskDefinition {
    pub database: String,
    #[serde(default = "default_kiosk_collection")]
    pub collection: String,
    #[serde(default)]
    pub search: Vec<String>,
}

/// One kiosk event, stored in its own collection of the kiosk database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    pub location: String,
    pub collection: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Which datasets feed the dashboard summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardDefinition {
    #[serde(default = "default_registrations_dataset")]
    pub registrations: String,
    #[serde(default = "default_processed_images_dataset")]
    pub processed_images: String,
}

impl Default for DashboardDefinition {
    fn default() -> Self {
        DashboardDefinition {
            registrations: default_registrations_dataset(),
            processed_images: default_processed_images_dataset(),
        }
    }
}

fn default_generic_search() -> Vec<String> {
    Vec::new()
}

fn default_page_size() -> u64 {
    10
}

fn default_created_field() -> String {
    "createdAt".to_string()
}

fn default_updated_field() -> String {
    "updatedAt".to_string()
}

fn default_kiosk_collection() -> String {
    "EventDaySubmission".to_string()
}

fn default_registrations_dataset() -> String {
    "registrations".to_string()
}

fn default_processed_images_dataset() -> String {
    "processed_images".to_string()
}
