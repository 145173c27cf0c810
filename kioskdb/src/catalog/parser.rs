use super::types::Catalog;
use crate::error::{KioskDbError, Result};
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("catalog.yaml");

/// Parse a catalog.yaml file into a Catalog
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)?;
    parse_catalog_str(&content)
}

/// Parse a catalog YAML string into a Catalog
pub fn parse_catalog_str(content: &str) -> Result<Catalog> {
    let catalog: Catalog = serde_yaml::from_str(content)?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// The catalog compiled into the binary
pub fn builtin_catalog() -> Result<Catalog> {
    parse_catalog_str(BUILTIN_CATALOG)
}

fn validate_catalog(catalog: &Catalog) -> Result<()> {
    for (name, dataset) in &catalog.datasets {
        if dataset.database.is_empty() || dataset.collection.is_empty() {
            return Err(KioskDbError::Catalog(format!(
                "Dataset '{name}' needs both a database and a collection"
            )));
        }
        if dataset.page_size == 0 {
            return Err(KioskDbError::Catalog(format!(
                "Dataset '{name}' has a page_size of 0"
            )));
        }
        if dataset.records_field.is_some() && !dataset.flatten {
            return Err(KioskDbError::Catalog(format!(
                "Dataset '{name}' names a records_field but does not flatten"
            )));
        }
    }

    let mut seen = HashSet::new();
    for event in &catalog.events {
        if !seen.insert(event.collection.as_str()) {
            return Err(KioskDbError::Catalog(format!(
                "Event collection '{}' is listed twice",
                event.collection
            )));
        }
    }

    for name in [
        &catalog.dashboard.registrations,
        &catalog.dashboard.processed_images,
    ] {
        if !catalog.datasets.contains_key(name) {
            return Err(KioskDbError::Catalog(format!(
                "Dashboard refers to unknown dataset '{name}'"
            )));
        }
    }

    Ok(())
}
