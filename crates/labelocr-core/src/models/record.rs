//! Structured record produced from a label's OCR text.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

/// The fixed, ordered set of fields extracted from a label.
pub struct ExtractionSchema;

impl ExtractionSchema {
    /// Field names in schema order.
    pub const FIELDS: [&'static str; 6] = [
        "product_name",
        "manufacturer_name",
        "manufacture_date",
        "expiry_date",
        "shelf_life",
        "batch_number",
    ];

    /// Schema fields absent from `object`.
    pub fn missing_keys(object: &Map<String, Value>) -> Vec<&'static str> {
        Self::FIELDS
            .iter()
            .copied()
            .filter(|field| !object.contains_key(*field))
            .collect()
    }

    /// Keys of `object` that are not schema fields.
    pub fn extra_keys(object: &Map<String, Value>) -> Vec<String> {
        object
            .keys()
            .filter(|key| !Self::FIELDS.contains(&key.as_str()))
            .cloned()
            .collect()
    }

    /// True when `object` has exactly the six schema keys, each a string or null.
    pub fn conforms(object: &Map<String, Value>) -> bool {
        object.len() == Self::FIELDS.len()
            && Self::missing_keys(object).is_empty()
            && object.values().all(|v| v.is_string() || v.is_null())
    }
}

/// The `llm_output` of a pipeline response.
///
/// Exactly one shape is produced per invocation. Serializes untagged, so the
/// caller sees the field mapping, `{"raw_output": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredRecord {
    /// The model's reply parsed as a JSON object, accepted as-is.
    Fields(Map<String, Value>),
    /// The model's reply could not be parsed; the stripped text is kept.
    Fallback { raw_output: String },
    /// The extraction stage itself failed.
    Error { error: String },
}

impl StructuredRecord {
    pub fn error(message: impl Into<String>) -> Self {
        StructuredRecord::Error {
            error: message.into(),
        }
    }

    /// The parsed field mapping, if this is the primary shape.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        match self {
            StructuredRecord::Fields(map) => Some(map),
            _ => None,
        }
    }

    /// String value of a field; `None` for null, missing or non-string values.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields()?.get(name)?.as_str()
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StructuredRecord::Error { .. })
    }
}

/// Typed view over a primary-shape record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductLabel {
    pub product_name: Option<String>,
    pub manufacturer_name: Option<String>,
    pub manufacture_date: Option<String>,
    pub expiry_date: Option<String>,
    pub shelf_life: Option<String>,
    pub batch_number: Option<String>,
}

impl ProductLabel {
    /// Build the typed view. Returns `None` for fallback and error records.
    pub fn from_record(record: &StructuredRecord) -> Option<Self> {
        record.fields()?;
        let get = |name: &str| record.field(name).map(str::to_string);

        Some(Self {
            product_name: get("product_name"),
            manufacturer_name: get("manufacturer_name"),
            manufacture_date: get("manufacture_date"),
            expiry_date: get("expiry_date"),
            shelf_life: get("shelf_life"),
            batch_number: get("batch_number"),
        })
    }

    /// Values in schema order, for tabular output.
    pub fn values(&self) -> [Option<&str>; 6] {
        [
            self.product_name.as_deref(),
            self.manufacturer_name.as_deref(),
            self.manufacture_date.as_deref(),
            self.expiry_date.as_deref(),
            self.shelf_life.as_deref(),
            self.batch_number.as_deref(),
        ]
    }

    pub fn manufactured_on(&self) -> Option<NaiveDate> {
        self.manufacture_date.as_deref().and_then(parse_label_date)
    }

    pub fn expires_on(&self) -> Option<NaiveDate> {
        self.expiry_date.as_deref().and_then(parse_label_date)
    }
}

/// Parse a `DD-MM-YYYY` date as instructed to the model.
pub fn parse_label_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%d-%m-%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_schema_conformance() {
        let complete = object(json!({
            "product_name": "Milk",
            "manufacturer_name": null,
            "manufacture_date": null,
            "expiry_date": "19-09-2025",
            "shelf_life": null,
            "batch_number": "A1"
        }));
        assert!(ExtractionSchema::conforms(&complete));

        let mut partial = complete.clone();
        partial.remove("shelf_life");
        partial.insert("net_volume".to_string(), json!("1L"));
        assert!(!ExtractionSchema::conforms(&partial));
        assert_eq!(ExtractionSchema::missing_keys(&partial), vec!["shelf_life"]);
        assert_eq!(ExtractionSchema::extra_keys(&partial), vec!["net_volume".to_string()]);
    }

    #[test]
    fn test_record_serializes_untagged() {
        let fallback = StructuredRecord::Fallback {
            raw_output: "not json".to_string(),
        };
        assert_eq!(serde_json::to_value(&fallback).unwrap(), json!({"raw_output": "not json"}));

        let error = StructuredRecord::error("not configured");
        assert_eq!(serde_json::to_value(&error).unwrap(), json!({"error": "not configured"}));

        let fields = StructuredRecord::Fields(object(json!({"batch_number": null})));
        assert_eq!(serde_json::to_value(&fields).unwrap(), json!({"batch_number": null}));
    }

    #[test]
    fn test_product_label_view() {
        let record = StructuredRecord::Fields(object(json!({
            "product_name": "Amul Taaza",
            "manufacture_date": "12-09-2025",
            "expiry_date": "19-09-2025",
            "batch_number": 42
        })));

        let label = ProductLabel::from_record(&record).unwrap();
        assert_eq!(label.product_name.as_deref(), Some("Amul Taaza"));
        assert_eq!(label.batch_number, None);
        assert_eq!(label.manufactured_on(), NaiveDate::from_ymd_opt(2025, 9, 12));
        assert_eq!(label.expires_on(), NaiveDate::from_ymd_opt(2025, 9, 19));

        assert!(ProductLabel::from_record(&StructuredRecord::error("x")).is_none());
    }

    #[test]
    fn test_parse_label_date_rejects_other_formats() {
        assert_eq!(parse_label_date(" 01-02-2024 "), NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(parse_label_date("2024-02-01"), None);
        assert_eq!(parse_label_date("12/09/2025"), None);
    }
}
