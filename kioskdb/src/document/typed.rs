// Typed views over the known collection shapes

use crate::catalog::RecordKind;
use crate::error::{KioskDbError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub owner_name: Option<String>,
    #[serde(rename = "ownerNIC", default, deserialize_with = "lenient_string")]
    pub owner_nic: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub shop_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contact_no: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub event: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub classification: Option<String>,
}

/// A pre-event dealer registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default, deserialize_with = "object_only")]
    pub dealer_info: Option<DealerInfo>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub golden_pass: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub registered_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUserData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub owner_name: Option<String>,
    #[serde(rename = "ownerNIC", default, deserialize_with = "lenient_string")]
    pub owner_nic: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub shop_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub classification: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub golden_pass_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub selected_background: Option<String>,
}

/// A submission captured by an event-day kiosk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KioskSubmission {
    #[serde(default, deserialize_with = "object_only")]
    pub eventuserdata: Option<EventUserData>,
}

/// Output of the background-removal pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    #[serde(default, deserialize_with = "lenient_string")]
    pub nic: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedRecord {
    Registration(Registration),
    KioskSubmission(KioskSubmission),
    ProcessedImage(ProcessedImage),
    Opaque(Map<String, Value>),
}

impl TypedRecord {
    /// Parse document fields according to the dataset's record kind.
    pub fn parse(kind: RecordKind, fields: &Map<String, Value>) -> Result<Self> {
        let value = Value::Object(fields.clone());
        let parsed = match kind {
            RecordKind::Registration => {
                TypedRecord::Registration(from_fields(kind, value)?)
            }
            RecordKind::KioskSubmission => {
                TypedRecord::KioskSubmission(from_fields(kind, value)?)
            }
            RecordKind::ProcessedImage => {
                TypedRecord::ProcessedImage(from_fields(kind, value)?)
            }
            RecordKind::Opaque => TypedRecord::Opaque(fields.clone()),
        };
        Ok(parsed)
    }
}

/// Check that the fields a kind knows about carry the right JSON types.
/// Unknown fields are always allowed.
pub fn validate(kind: RecordKind, fields: &Map<String, Value>) -> Result<()> {
    TypedRecord::parse(kind, fields).map(|_| ())
}

/// Read a stored document as `T` for reporting. Documents written before
/// validation existed may not fit; their known fields read as empty.
pub fn read_lenient<T: serde::de::DeserializeOwned + Default>(
    id: &str,
    fields: &Map<String, Value>,
) -> T {
    match serde_json::from_value(Value::Object(fields.clone())) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Document {id} does not fit its record shape: {e}");
            T::default()
        }
    }
}

fn from_fields<T: serde::de::DeserializeOwned>(kind: RecordKind, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| KioskDbError::Validation(format!("Invalid {kind:?} record: {e}")))
}

/// Nested records must be JSON objects; serde would otherwise read a
/// sequence positionally into the struct.
fn object_only<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected an object, found {}",
            super::json_type_name(&other)
        ))),
    }
}

/// Accept strings, numbers and booleans as text; null and absent become None.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected text, found {}",
            super::json_type_name(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::into_object;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_registration() {
        let fields = into_object(json!({
            "dealerInfo": {
                "ownerName": "Kamal Perera",
                "ownerNIC": "901234567V",
                "shopName": "Perera Stores",
                "contactNo": 771234567,
                "classification": "Gold"
            },
            "goldenPass": "GP-001",
            "extra": [1, 2, 3]
        }))
        .unwrap();

        let record = TypedRecord::parse(RecordKind::Registration, &fields).unwrap();
        let TypedRecord::Registration(reg) = record else {
            panic!("expected a registration");
        };
        let dealer = reg.dealer_info.unwrap();
        assert_eq!(dealer.owner_name.as_deref(), Some("Kamal Perera"));
        assert_eq!(dealer.contact_no.as_deref(), Some("771234567"));
        assert_eq!(dealer.event, None);
        assert_eq!(reg.golden_pass.as_deref(), Some("GP-001"));
    }

    #[test]
    fn test_registration_with_wrong_shape_is_rejected() {
        let fields = into_object(json!({ "dealerInfo": "not an object" })).unwrap();
        let err = validate(RecordKind::Registration, &fields).unwrap_err();
        assert!(matches!(err, KioskDbError::Validation(_)));

        let fields = into_object(json!({ "goldenPass": { "nested": true } })).unwrap();
        assert!(validate(RecordKind::Registration, &fields).is_err());

        let fields = into_object(json!({ "dealerInfo": ["nope"] })).unwrap();
        let err = validate(RecordKind::Registration, &fields).unwrap_err();
        assert!(matches!(err, KioskDbError::Validation(_)));

        let fields = into_object(json!({ "eventuserdata": ["Sunil", "901234567V"] })).unwrap();
        assert!(validate(RecordKind::KioskSubmission, &fields).is_err());

        let fields = into_object(json!({ "dealerInfo": null })).unwrap();
        assert!(validate(RecordKind::Registration, &fields).is_ok());
    }

    #[test]
    fn test_parse_kiosk_submission() {
        let fields = into_object(json!({
            "eventuserdata": { "ownerName": "Sunil", "goldenPassNumber": 42 }
        }))
        .unwrap();
        let TypedRecord::KioskSubmission(sub) =
            TypedRecord::parse(RecordKind::KioskSubmission, &fields).unwrap()
        else {
            panic!("expected a kiosk submission");
        };
        let data = sub.eventuserdata.unwrap();
        assert_eq!(data.golden_pass_number.as_deref(), Some("42"));
        assert_eq!(data.selected_background, None);
    }

    #[test]
    fn test_opaque_accepts_anything() {
        let fields = into_object(json!({ "dealerInfo": 5, "a": [null] })).unwrap();
        assert_eq!(
            TypedRecord::parse(RecordKind::Opaque, &fields).unwrap(),
            TypedRecord::Opaque(fields.clone())
        );
    }

    #[test]
    fn test_read_lenient_falls_back_to_empty() {
        let fields = into_object(json!({ "dealerInfo": 5 })).unwrap();
        let reg: Registration = read_lenient("x", &fields);
        assert_eq!(reg, Registration::default());
    }

    #[test]
    fn test_processed_image() {
        let fields = into_object(json!({ "nic": 199012345678i64, "imageUrl": null })).unwrap();
        let TypedRecord::ProcessedImage(img) =
            TypedRecord::parse(RecordKind::ProcessedImage, &fields).unwrap()
        else {
            panic!("expected a processed image");
        };
        assert_eq!(img.nic.as_deref(), Some("199012345678"));
        assert_eq!(img.image_url, None);
    }
}
