// Dataset catalog - which database/collection pairs exist and how they are shaped

mod parser;
mod types;

pub use parser::{builtin_catalog, parse_catalog, parse_catalog_str};
pub use types::*;

use crate::error::{KioskDbError, Result};

impl Catalog {
    /// Look up a named dataset.
    pub fn dataset(&self, name: &str) -> Result<&DatasetDefinition> {
        self.datasets
            .get(name)
            .ok_or_else(|| KioskDbError::Catalog(format!("Dataset '{name}' not found in catalog")))
    }

    /// Resolve the definition for an arbitrary database/collection pair.
    /// Pairs the catalog doesn't name get an opaque definition that searches
    /// the generic field list.
    pub fn dataset_for(&self, database: &str, collection: &str) -> DatasetDefinition {
        if let Some(ds) = self
            .datasets
            .values()
            .find(|ds| ds.database == database && ds.collection == collection)
        {
            return ds.clone();
        }

        if database == self.kiosk.database {
            let mut ds = self.kiosk_dataset();
            ds.collection = collection.to_string();
            return ds;
        }

        DatasetDefinition {
            database: database.to_string(),
            collection: collection.to_string(),
            kind: RecordKind::Opaque,
            search: self.generic_search.clone(),
            timestamps: TimestampFields::default(),
            flatten: false,
            records_field: None,
            page_size: 10,
        }
    }

    /// The kiosk day-submission collection.
    pub fn kiosk_dataset(&self) -> DatasetDefinition {
        DatasetDefinition {
            database: self.kiosk.database.clone(),
            collection: self.kiosk.collection.clone(),
            kind: RecordKind::KioskSubmission,
            search: self.kiosk.search.clone(),
            timestamps: TimestampFields::default(),
            flatten: false,
            records_field: None,
            page_size: 10,
        }
    }

    /// The collection backing a single kiosk event.
    pub fn event_dataset(&self, event: &EventDefinition) -> DatasetDefinition {
        let mut ds = self.kiosk_dataset();
        ds.collection = event.collection.clone();
        ds
    }

    pub fn event(&self, collection: &str) -> Option<&EventDefinition> {
        self.events.iter().find(|e| e.collection == collection)
    }

    /// Events held at a location, compared case-insensitively.
    pub fn events_at(&self, location: &str) -> Vec<&EventDefinition> {
        self.events
            .iter()
            .filter(|e| e.location.eq_ignore_ascii_case(location))
            .collect()
    }

    /// Distinct event locations in catalog order.
    pub fn locations(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for event in &self.events {
            if !out.contains(&event.location.as_str()) {
                out.push(&event.location);
            }
        }
        out
    }

    /// Override the kiosk day-submission collection (set from the environment).
    pub fn with_kiosk_collection(mut self, collection: impl Into<String>) -> Self {
        self.kiosk.collection = collection.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_for_known_pair() {
        let catalog = builtin_catalog().unwrap();
        let ds = catalog.dataset_for("json_data_management", "uploaded_data");
        assert!(ds.flatten);
        assert_eq!(ds.timestamps.created, "uploadedAt");
    }

    #[test]
    fn test_dataset_for_unknown_pair_uses_generic_search() {
        let catalog = builtin_catalog().unwrap();
        let ds = catalog.dataset_for("misc", "things");
        assert_eq!(ds.kind, RecordKind::Opaque);
        assert_eq!(ds.search, catalog.generic_search);
        assert_eq!(ds.timestamps.created, "createdAt");
    }

    #[test]
    fn test_dataset_for_kiosk_collection() {
        let catalog = builtin_catalog().unwrap();
        let ds = catalog.dataset_for("muthupalasa_kiosk", "mp6-galle");
        assert_eq!(ds.kind, RecordKind::KioskSubmission);
        assert_eq!(ds.collection, "mp6-galle");
    }

    #[test]
    fn test_events_at_location() {
        let catalog = builtin_catalog().unwrap();
        assert_eq!(catalog.events_at("kandalama").len(), 5);
        assert_eq!(catalog.events_at("Galle").len(), 2);
        assert!(catalog.events_at("Colombo").is_empty());
    }

    #[test]
    fn test_locations_are_distinct() {
        let catalog = builtin_catalog().unwrap();
        assert_eq!(
            catalog.locations(),
            vec!["Kandalama", "Nuwara Eliya", "Embilipitiya", "Galle", "Monarch"]
        );
    }

    #[test]
    fn test_unknown_dataset() {
        let catalog = builtin_catalog().unwrap();
        assert!(catalog.dataset("nope").is_err());
    }

    #[test]
    fn test_kiosk_collection_override() {
        let catalog = builtin_catalog().unwrap().with_kiosk_collection("Day2");
        assert_eq!(catalog.kiosk_dataset().collection, "Day2");
    }
}
