use crate::catalog::EventDefinition;
use crate::document::{sort_newest_first, StoredDocument};
use crate::error::{KioskDbError, Result};
use crate::filter::Filter;
use crate::store::{Collection, Store};
use serde::Serialize;

use super::DATE_FIELD;

/// An event and how many submissions its collection holds
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCount {
    #[serde(flatten)]
    pub event: EventDefinition,
    pub total_count: usize,
}

/// An event with its submissions, newest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistrations {
    #[serde(flatten)]
    pub event: EventDefinition,
    pub registrations: Vec<StoredDocument>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsSummary {
    pub total_events: usize,
    pub total_registrations: usize,
    pub active_events: usize,
}

impl EventsSummary {
    fn from_counts(counts: impl Iterator<Item = usize>) -> Self {
        let mut summary = EventsSummary {
            total_events: 0,
            total_registrations: 0,
            active_events: 0,
        };
        for count in counts {
            summary.total_events += 1;
            summary.total_registrations += count;
            if count > 0 {
                summary.active_events += 1;
            }
        }
        summary
    }
}

/// Kiosk events from the catalog, each backed by its own collection.
pub struct Events<'a> {
    store: &'a Store,
}

impl<'a> Events<'a> {
    pub fn new(store: &'a Store) -> Self {
        Events { store }
    }

    fn collection(&self, event: &EventDefinition) -> Collection<'a> {
        self.store
            .collection_for(self.store.catalog().event_dataset(event))
    }

    /// Every event with its submission count.
    pub fn counts(&self) -> Result<(Vec<EventCount>, EventsSummary)> {
        let mut out = Vec::with_capacity(self.store.catalog().events.len());
        for event in &self.store.catalog().events {
            out.push(EventCount {
                total_count: self.collection(event).count(&Filter::All)?,
                event: event.clone(),
            });
        }
        let summary = EventsSummary::from_counts(out.iter().map(|e| e.total_count));
        Ok((out, summary))
    }

    fn load(&self, event: &EventDefinition, limit: Option<usize>) -> Result<EventRegistrations> {
        let collection = self.collection(event);
        let mut registrations = collection.find(&Filter::All)?;
        let total_count = registrations.len();
        sort_newest_first(&mut registrations, DATE_FIELD);
        if let Some(limit) = limit {
            registrations.truncate(limit);
        }
        Ok(EventRegistrations {
            event: event.clone(),
            registrations,
            total_count,
        })
    }

    fn load_all<'e>(
        &self,
        events: impl IntoIterator<Item = &'e EventDefinition>,
        limit: Option<usize>,
    ) -> Result<(Vec<EventRegistrations>, EventsSummary)> {
        let data = events
            .into_iter()
            .map(|event| self.load(event, limit))
            .collect::<Result<Vec<_>>>()?;
        let summary = EventsSummary::from_counts(data.iter().map(|e| e.total_count));
        Ok((data, summary))
    }

    /// Every event with its submissions, at most `limit` each.
    pub fn all(&self, limit: Option<usize>) -> Result<(Vec<EventRegistrations>, EventsSummary)> {
        self.load_all(&self.store.catalog().events, limit)
    }

    /// Events held at a location (case-insensitive). Unknown locations yield no events.
    pub fn at_location(&self, location: &str) -> Result<(Vec<EventRegistrations>, EventsSummary)> {
        self.load_all(self.store.catalog().events_at(location), None)
    }

    pub fn event(&self, collection: &str) -> Result<EventRegistrations> {
        let event = self
            .store
            .catalog()
            .event(collection)
            .ok_or_else(|| KioskDbError::NotFound {
                collection: "events".into(),
                id: collection.to_string(),
            })?;
        self.load(event, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_catalog;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup_test_store() -> Store {
        let store = Store::open_in_memory(builtin_catalog().unwrap()).unwrap();
        let galle = store.collection("muthupalasa_kiosk", "mp6-galle").unwrap();
        galle.insert(json!({ "eventuserdata": { "ownerName": "A" } })).unwrap();
        galle.insert(json!({ "eventuserdata": { "ownerName": "B" } })).unwrap();
        store
            .collection("muthupalasa_kiosk", "MP1_KANDALAMA")
            .unwrap()
            .insert(json!({ "eventuserdata": { "ownerName": "C" } }))
            .unwrap();
        store
    }

    #[test]
    fn test_counts() {
        let store = setup_test_store();
        let (counts, summary) = Events::new(&store).counts().unwrap();
        assert_eq!(counts.len(), 12);
        assert_eq!(
            summary,
            EventsSummary { total_events: 12, total_registrations: 3, active_events: 2 }
        );
        let galle = counts.iter().find(|c| c.event.collection == "mp6-galle").unwrap();
        assert_eq!(galle.total_count, 2);
    }

    #[test]
    fn test_location_is_case_insensitive() {
        let store = setup_test_store();
        let (events, summary) = Events::new(&store).at_location("GALLE").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(summary.total_registrations, 2);
        assert_eq!(events[0].registrations.len(), 2);

        let (none, summary) = Events::new(&store).at_location("Colombo").unwrap();
        assert!(none.is_empty());
        assert_eq!(summary.total_events, 0);
    }

    #[test]
    fn test_all_respects_limit_but_counts_everything() {
        let store = setup_test_store();
        let (events, summary) = Events::new(&store).all(Some(1)).unwrap();
        let galle = events.iter().find(|e| e.event.collection == "mp6-galle").unwrap();
        assert_eq!(galle.registrations.len(), 1);
        assert_eq!(galle.total_count, 2);
        assert_eq!(summary.total_registrations, 3);
    }

    #[test]
    fn test_single_event() {
        let store = setup_test_store();
        let event = Events::new(&store).event("MP1_KANDALAMA").unwrap();
        assert_eq!(event.event.name, "Muthupalasa 1");
        assert_eq!(event.total_count, 1);

        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["location"], "Kandalama");
        assert_eq!(v["totalCount"], 1);
        assert_eq!(v["registrations"][0]["eventuserdata"]["ownerName"], "C");

        assert!(matches!(
            Events::new(&store).event("nope"),
            Err(KioskDbError::NotFound { .. })
        ));
    }
}
