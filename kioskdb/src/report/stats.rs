use crate::document::typed::{read_lenient, Registration};
use crate::document::StoredDocument;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Number of registrations sharing one value; `_id` is null for registrations without it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    #[serde(rename = "_id")]
    pub value: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationTotals {
    pub total_registrations: usize,
    /// Distinct non-empty classifications, sorted
    pub classifications: Vec<String>,
    pub golden_pass_holders: usize,
    /// Mean length in characters of the contact numbers present
    pub avg_contact_length: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStats {
    pub statistics: RegistrationTotals,
    /// Per classification, largest group first
    pub classification_stats: Vec<GroupCount>,
    /// Per event, largest group first
    pub location_stats: Vec<GroupCount>,
}

impl RegistrationStats {
    pub fn compute(docs: &[StoredDocument]) -> Self {
        let registrations: Vec<Registration> = docs
            .iter()
            .map(|d| read_lenient(&d.id, &d.fields))
            .collect();

        let mut classifications = BTreeSet::new();
        let mut by_classification: HashMap<Option<String>, usize> = HashMap::new();
        let mut by_event: HashMap<Option<String>, usize> = HashMap::new();
        let mut golden = 0;
        let mut contact_total = 0usize;
        let mut contact_count = 0usize;

        for reg in &registrations {
            let dealer = reg.dealer_info.clone().unwrap_or_default();
            let classification = non_empty(dealer.classification);
            if let Some(c) = &classification {
                classifications.insert(c.clone());
            }
            *by_classification.entry(classification).or_default() += 1;
            *by_event.entry(non_empty(dealer.event)).or_default() += 1;

            if has_golden_pass(reg) {
                golden += 1;
            }
            if let Some(contact) = dealer.contact_no {
                contact_total += contact.chars().count();
                contact_count += 1;
            }
        }

        RegistrationStats {
            statistics: RegistrationTotals {
                total_registrations: registrations.len(),
                classifications: classifications.into_iter().collect(),
                golden_pass_holders: golden,
                avg_contact_length: (contact_count > 0)
                    .then(|| contact_total as f64 / contact_count as f64),
            },
            classification_stats: sorted_groups(by_classification),
            location_stats: sorted_groups(by_event),
        }
    }
}

pub fn has_golden_pass(reg: &Registration) -> bool {
    reg.golden_pass
        .as_deref()
        .map(|p| !p.trim().is_empty())
        .unwrap_or(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Largest count first; ties by value so output is stable.
fn sorted_groups(groups: HashMap<Option<String>, usize>) -> Vec<GroupCount> {
    let mut out: Vec<GroupCount> = groups
        .into_iter()
        .map(|(value, count)| GroupCount { value, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    out
}
