//! Lenient JSON parser for KoboToolbox submission payloads.
//!
//! Submissions carry no enforced schema: any field may be missing, empty, a
//! number where a string was expected, or something else entirely. Every
//! field of [`RawRecord`] is therefore optional and parsing a single record
//! never fails.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// A file attached to a submission (photos, mostly).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// One survey submission as delivered by the form API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "_id", default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(rename = "Are_you_a", default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
    #[serde(rename = "School_Name", default, deserialize_with = "lenient_string")]
    pub school_name: Option<String>,
    #[serde(rename = "Name_of_the_Student", default, deserialize_with = "lenient_string")]
    pub student_name: Option<String>,
    #[serde(rename = "What_Grade_is_the_Student", default, deserialize_with = "lenient_string")]
    pub grade: Option<String>,
    #[serde(rename = "Gender_of_the_Student", default, deserialize_with = "lenient_string")]
    pub gender: Option<String>,
    #[serde(rename = "Age_of_the_Student", default, deserialize_with = "lenient_string")]
    pub age: Option<String>,
    #[serde(
        rename = "What_do_you_hope_to_be_when_you_grow_up",
        default,
        deserialize_with = "lenient_string"
    )]
    pub career_aspiration: Option<String>,
    #[serde(rename = "Photo_of_the_Student", default, deserialize_with = "lenient_string")]
    pub photo: Option<String>,
    #[serde(
        rename = "Record_the_device_serial_number",
        default,
        deserialize_with = "lenient_string"
    )]
    pub lamp_serial_number: Option<String>,
    #[serde(
        rename = "What_s_the_family_s_ain_source_of_income",
        default,
        deserialize_with = "lenient_string"
    )]
    pub income_source: Option<String>,
    #[serde(
        rename = "What_do_you_currently_use_for_lighting",
        default,
        deserialize_with = "lenient_string"
    )]
    pub lighting: Option<String>,
    #[serde(
        rename = "Do_you_or_anyone_in_your_famil",
        default,
        deserialize_with = "lenient_string"
    )]
    pub smartphone: Option<String>,
    #[serde(
        rename = "How_many_meals_do_yo_ically_have_in_a_day",
        default,
        deserialize_with = "lenient_string"
    )]
    pub meals: Option<String>,
    #[serde(rename = "GPS_Reading", default, deserialize_with = "lenient_string")]
    pub gps: Option<String>,
    #[serde(rename = "_attachments", default, deserialize_with = "lenient_attachments")]
    pub attachments: Vec<Attachment>,
}

impl RawRecord {
    /// Builds a record from any JSON value. Non-objects yield an empty record.
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        // Every field accepts any JSON value, so this only fails on a non-object.
        RawRecord::deserialize(value).unwrap_or_default()
    }

    /// True for submissions filled in on behalf of a student.
    pub fn is_student(&self) -> bool {
        self.role.as_deref() == Some("student")
    }

    /// The school name with surrounding whitespace removed, if anything is left.
    pub fn school_key(&self) -> Option<&str> {
        self.school_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Accepts strings and numbers; everything else reads as absent.
/// Empty strings are also treated as absent.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(number_text(&n)),
        _ => None,
    })
}

/// Like [`lenient_string`], but a numeric zero also reads as absent so the
/// caller falls back to a positional id.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Some(number_text(&n)),
        _ => None,
    })
}

/// Renders whole numbers without a fractional part, so `301.0` reads as `301`.
fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string())
    }
}

/// Keeps the attachment entries that carry a filename and drops the rest.
fn lenient_attachments<'de, D>(deserializer: D) -> std::result::Result<Vec<Attachment>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let filename = item.get("filename")?.as_str()?.to_string();
            let download_url = item
                .get("download_url")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(Attachment {
                filename,
                download_url,
            })
        })
        .collect())
}

/// Decodes a JSON payload from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid JSON.
pub fn parse_payload(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).context("payload is not valid JSON")
}

/// Pulls the submission list out of a payload.
///
/// Accepts a bare array or a paginated object with a `results` array.
/// Returns `None` for anything else.
pub fn extract_records(payload: &Value) -> Option<Vec<RawRecord>> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(map) => map.get("results")?.as_array()?,
        _ => return None,
    };

    debug!(records = items.len(), "Extracted raw records from payload");
    Some(items.iter().map(RawRecord::from_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_invalid_bytes() {
        assert!(parse_payload(b"{not json").is_err());
    }

    #[test]
    fn test_parse_valid_payload() {
        let value = parse_payload(br#"{"count": 0, "results": []}"#).unwrap();
        assert_eq!(value["count"], 0);
    }

    #[test]
    fn test_extract_from_bare_array() {
        let records = extract_records(&json!([{"Are_you_a": "student"}])).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_student());
    }

    #[test]
    fn test_extract_from_results_object() {
        let payload = json!({"count": 2, "results": [{"_id": 1}, {"_id": 2}]});
        let records = extract_records(&payload).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id.as_deref(), Some("2"));
    }

    #[test]
    fn test_extract_rejects_unusable_shapes() {
        assert!(extract_records(&Value::Null).is_none());
        assert!(extract_records(&json!({})).is_none());
        assert!(extract_records(&json!({"results": "nope"})).is_none());
        assert!(extract_records(&json!(42)).is_none());
    }

    #[test]
    fn test_numbers_become_strings_and_junk_is_absent() {
        let record = RawRecord::from_value(&json!({
            "Age_of_the_Student": 11,
            "School_Name": {"nested": true},
            "Gender_of_the_Student": null,
            "Name_of_the_Student": "",
            "GPS_Reading": ["-1.2", "36.8"],
        }));

        assert_eq!(record.age.as_deref(), Some("11"));
        assert!(record.school_name.is_none());
        assert!(record.gender.is_none());
        assert!(record.student_name.is_none());
        assert!(record.gps.is_none());
    }

    #[test]
    fn test_whole_float_ids_drop_fraction_and_zero_is_absent() {
        let whole = RawRecord::from_value(&json!({"_id": 301.0, "Age_of_the_Student": 14.0}));
        assert_eq!(whole.id.as_deref(), Some("301"));
        assert_eq!(whole.age.as_deref(), Some("14"));

        assert!(RawRecord::from_value(&json!({"_id": 0})).id.is_none());
        assert!(RawRecord::from_value(&json!({"_id": 0.0})).id.is_none());
        assert_eq!(RawRecord::from_value(&json!({"_id": "0"})).id.as_deref(), Some("0"));
        assert_eq!(RawRecord::from_value(&json!({"_id": 2.5})).id.as_deref(), Some("2.5"));
    }

    #[test]
    fn test_non_object_record_is_empty() {
        let record = RawRecord::from_value(&json!("student"));
        assert_eq!(record, RawRecord::default());
        assert!(!record.is_student());
    }

    #[test]
    fn test_attachments_skip_malformed_entries() {
        let record = RawRecord::from_value(&json!({
            "_attachments": [
                {"filename": "user/attachments/photo_1.jpg", "download_url": "/media/photo_1.jpg"},
                {"download_url": "/media/orphan.jpg"},
                "garbage",
                {"filename": "user/attachments/light.jpg"}
            ]
        }));

        assert_eq!(record.attachments.len(), 2);
        assert_eq!(
            record.attachments[0].download_url.as_deref(),
            Some("/media/photo_1.jpg")
        );
        assert!(record.attachments[1].download_url.is_none());
    }

    #[test]
    fn test_school_key_trims_and_drops_blank_names() {
        let named = RawRecord::from_value(&json!({"School_Name": "  green_valley "}));
        assert_eq!(named.school_key(), Some("green_valley"));

        let blank = RawRecord::from_value(&json!({"School_Name": "   "}));
        assert_eq!(blank.school_key(), None);
    }
}
