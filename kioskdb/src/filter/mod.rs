// Filter builder - turns a search term or date range into a document predicate

use crate::document::{lookup_path, parse_timestamp, parse_timestamp_str};
use crate::error::{KioskDbError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

/// Upper bound on the compiled size of a search pattern
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
pub enum Filter {
    All,
    /// Case-insensitive substring match on ANY of the listed dot-paths
    AnyField { fields: Vec<String>, pattern: Regex },
    /// Case-insensitive substring match on any scalar value, at any depth
    AnyValue(Regex),
    /// Inclusive range on a timestamp field
    DateRange {
        field: String,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
    And(Vec<Filter>),
}

impl Filter {
    /// Search the given fields for a term. A missing or blank term matches everything.
    pub fn search(term: Option<&str>, fields: &[String]) -> Result<Filter> {
        match normalize_term(term) {
            None => Ok(Filter::All),
            Some(term) => Ok(Filter::AnyField {
                fields: fields.to_vec(),
                pattern: substring_pattern(term)?,
            }),
        }
    }

    /// Search every value of a record for a term.
    pub fn any_value(term: Option<&str>) -> Result<Filter> {
        match normalize_term(term) {
            None => Ok(Filter::All),
            Some(term) => Ok(Filter::AnyValue(substring_pattern(term)?)),
        }
    }

    /// Restrict a timestamp field to `[start, end]`. Either bound may be
    /// omitted. A bare `YYYY-MM-DD` end date includes that whole day.
    pub fn date_range(field: &str, start: Option<&str>, end: Option<&str>) -> Result<Filter> {
        let start = normalize_term(start).map(parse_bound).transpose()?;
        let end = match normalize_term(end) {
            Some(s) => Some(match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(_) => parse_bound(s)? + Duration::days(1) - Duration::milliseconds(1),
                Err(_) => parse_bound(s)?,
            }),
            None => None,
        };
        if start.is_none() && end.is_none() {
            return Ok(Filter::All);
        }
        Ok(Filter::DateRange {
            field: field.to_string(),
            start,
            end,
        })
    }

    /// Both filters must match.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) | (f, Filter::And(mut a)) => {
                a.push(f);
                Filter::And(a)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }

    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        match self {
            Filter::All => true,
            Filter::AnyField {
                fields: paths,
                pattern,
            } => paths.iter().any(|path| {
                lookup_path(fields, path)
                    .map(|v| value_matches_shallow(v, pattern))
                    .unwrap_or(false)
            }),
            Filter::AnyValue(pattern) => fields.values().any(|v| value_matches_deep(v, pattern)),
            Filter::DateRange { field, start, end } => {
                match lookup_path(fields, field).and_then(parse_timestamp) {
                    Some(at) => {
                        start.map(|s| at >= s).unwrap_or(true) && end.map(|e| at <= e).unwrap_or(true)
                    }
                    None => false,
                }
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(fields)),
        }
    }
}

fn normalize_term(term: Option<&str>) -> Option<&str> {
    term.map(str::trim).filter(|t| !t.is_empty())
}

fn substring_pattern(term: &str) -> Result<Regex> {
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| KioskDbError::BadRequest(format!("Unusable search term: {e}")))
}

fn parse_bound(s: &str) -> Result<DateTime<Utc>> {
    parse_timestamp_str(s)
        .ok_or_else(|| KioskDbError::BadRequest(format!("Invalid date '{s}'")))
}

/// Scalars match on their text; a list matches if any scalar element does.
fn value_matches_shallow(value: &Value, pattern: &Regex) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| scalar_matches(v, pattern)),
        other => scalar_matches(other, pattern),
    }
}

fn value_matches_deep(value: &Value, pattern: &Regex) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| value_matches_deep(v, pattern)),
        Value::Object(map) => map.values().any(|v| value_matches_deep(v, pattern)),
        other => scalar_matches(other, pattern),
    }
}

fn scalar_matches(value: &Value, pattern: &Regex) -> bool {
    match value {
        Value::String(s) => pattern.is_match(s),
        Value::Number(n) => pattern.is_match(&n.to_string()),
        Value::Bool(b) => pattern.is_match(if *b { "true" } else { "false" }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::into_object;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        into_object(v).unwrap()
    }

    fn search_fields() -> Vec<String> {
        vec![
            "dealerInfo.ownerName".to_string(),
            "dealerInfo.ownerNIC".to_string(),
            "nic".to_string(),
        ]
    }

    #[test]
    fn test_blank_term_matches_everything() {
        assert!(Filter::search(None, &search_fields()).unwrap().is_all());
        assert!(Filter::search(Some("   "), &search_fields()).unwrap().is_all());
        assert!(Filter::any_value(Some("")).unwrap().is_all());
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let filter = Filter::search(Some("pere"), &search_fields()).unwrap();
        assert!(filter.matches(&fields(json!({ "dealerInfo": { "ownerName": "Kamal PERERA" } }))));
        assert!(!filter.matches(&fields(json!({ "dealerInfo": { "shopName": "Perera Stores" } }))));
        assert!(!filter.matches(&fields(json!({}))));
    }

    #[test]
    fn test_search_any_of_the_fields() {
        let filter = Filter::search(Some("9012"), &search_fields()).unwrap();
        assert!(filter.matches(&fields(json!({ "nic": "199012345678" }))));
        assert!(filter.matches(&fields(json!({ "nic": 199012345678i64 }))));
        assert!(filter.matches(&fields(json!({ "dealerInfo": { "ownerNIC": "901234567V" } }))));
    }

    #[test]
    fn test_search_term_is_literal() {
        let filter = Filter::search(Some("a.c"), &search_fields()).unwrap();
        assert!(!filter.matches(&fields(json!({ "nic": "abc" }))));
        assert!(filter.matches(&fields(json!({ "nic": "xa.cx" }))));

        let filter = Filter::search(Some("(unclosed"), &search_fields()).unwrap();
        assert!(filter.matches(&fields(json!({ "nic": "x(UNCLOSED" }))));
    }

    #[test]
    fn test_any_value_searches_nested_values() {
        let filter = Filter::any_value(Some("galle")).unwrap();
        assert!(filter.matches(&fields(json!({ "AREA": "Galle" }))));
        assert!(filter.matches(&fields(json!({ "meta": { "area": ["Kandy", "GALLE"] } }))));
        assert!(!filter.matches(&fields(json!({ "AREA": "Kandy", "n": 5 }))));
    }

    #[test]
    fn test_date_range() {
        let filter = Filter::date_range("createdAt", Some("2024-05-01"), Some("2024-05-02")).unwrap();
        assert!(filter.matches(&fields(json!({ "createdAt": "2024-05-01T00:00:00.000Z" }))));
        assert!(filter.matches(&fields(json!({ "createdAt": "2024-05-02T23:59:00.000Z" }))));
        assert!(!filter.matches(&fields(json!({ "createdAt": "2024-05-03T00:00:00.000Z" }))));
        assert!(!filter.matches(&fields(json!({ "createdAt": "2024-04-30T23:59:59.000Z" }))));
        assert!(!filter.matches(&fields(json!({}))));
    }

    #[test]
    fn test_date_range_open_and_invalid() {
        assert!(Filter::date_range("createdAt", None, None).unwrap().is_all());
        let filter = Filter::date_range("createdAt", Some("2024-05-01"), None).unwrap();
        assert!(filter.matches(&fields(json!({ "createdAt": "2030-01-01" }))));
        assert!(matches!(
            Filter::date_range("createdAt", Some("last tuesday"), None),
            Err(KioskDbError::BadRequest(_))
        ));
    }

    #[test]
    fn test_and_combines() {
        let filter = Filter::search(Some("kamal"), &search_fields())
            .unwrap()
            .and(Filter::date_range("createdAt", Some("2024-01-01"), None).unwrap());
        assert!(filter.matches(&fields(json!({
            "dealerInfo": { "ownerName": "Kamal" }, "createdAt": "2024-06-01"
        }))));
        assert!(!filter.matches(&fields(json!({
            "dealerInfo": { "ownerName": "Kamal" }, "createdAt": "2023-06-01"
        }))));
        assert!(Filter::All.and(Filter::All).is_all());
    }
}
