//! Survey transformation pipeline.
//!
//! Turns raw submissions into [`Student`] and [`School`] entities and a
//! dashboard [`Summary`]. One call is one complete, stateless aggregation
//! pass:
//!
//! 1. [`schools::aggregate_schools`] groups student records by school name,
//! 2. [`students::map_students`] maps each student record and links its school,
//! 3. [`summary::calculate_summary`] derives the statistics.
//!
//! The pass is total. Bad fields fall back to defaults and an unusable
//! payload yields an empty result.

pub mod mappers;
pub mod schools;
pub mod students;
pub mod summary;
pub mod types;
pub mod utility;

pub use types::{
    CareerAspiration, CareerByGender, Coordinates, Gender, GenderCount, HouseholdInfo,
    PovertyIndicators, School, Student, Summary, TransformOutput,
};

use crate::parser::{RawRecord, extract_records};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_MEDIA_BASE_URL: &str = "https://kf.kobotoolbox.org";
pub const DEFAULT_PLACEHOLDER_PHOTO: &str = "/placeholder-profile.jpg";

/// Presentation details the pipeline needs when building student records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    /// Prefix for attachment download paths that are not already absolute.
    pub media_base_url: String,
    /// Photo used when a student has no resolvable attachment.
    pub placeholder_photo: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            media_base_url: DEFAULT_MEDIA_BASE_URL.to_string(),
            placeholder_photo: DEFAULT_PLACEHOLDER_PHOTO.to_string(),
        }
    }
}

/// Transforms a raw payload with the default [`TransformConfig`].
pub fn transform(payload: &Value) -> TransformOutput {
    transform_with(payload, &TransformConfig::default())
}

/// Transforms a raw payload: a bare array of submissions or an object with a
/// `results` array. Any other shape gives [`TransformOutput::empty`].
pub fn transform_with(payload: &Value, config: &TransformConfig) -> TransformOutput {
    match extract_records(payload) {
        Some(records) => transform_records(&records, config),
        None => {
            warn!(
                payload_kind = value_kind(payload),
                "Expected an array or an object with a results array, returning empty summary"
            );
            TransformOutput::empty()
        }
    }
}

/// Runs the pipeline over already-parsed records.
pub fn transform_records(records: &[RawRecord], config: &TransformConfig) -> TransformOutput {
    let student_records = records.iter().filter(|r| r.is_student()).count();
    debug!(
        total = records.len(),
        students = student_records,
        "Starting aggregation pass"
    );

    let school_index = schools::aggregate_schools(records);
    let schools = school_index.schools();
    let students = students::map_students(records, &school_index, config);
    let summary = summary::calculate_summary(&students, &schools);

    debug!(
        schools = schools.len(),
        students = students.len(),
        "Aggregation pass complete"
    );

    TransformOutput { students, summary }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_unusable_payloads_give_empty_output() {
        for payload in [Value::Null, json!({}), json!([]), json!({"results": null}), json!("x")] {
            let output = transform(&payload);
            assert!(output.students.is_empty());
            assert_eq!(output.summary, Summary::empty());
        }
    }

    #[test]
    fn test_results_wrapper_and_bare_array_agree() {
        let records = json!([
            {"_id": 1, "Are_you_a": "student", "School_Name": "green_valley"},
            {"_id": 2, "Are_you_a": "student", "School_Name": "hill_top"}
        ]);
        let wrapped = json!({"count": 2, "results": records.clone()});

        assert_eq!(transform(&records), transform(&wrapped));
    }

    #[test]
    fn test_two_schools_example() {
        let output = transform(&json!([
            {"Are_you_a": "student", "School_Name": "green_valley"},
            {"Are_you_a": "student", "School_Name": "green_valley"},
            {"Are_you_a": "student", "School_Name": "hill_top"}
        ]));

        let schools = &output.summary.schools;
        assert_eq!(schools.len(), 2);
        assert_eq!(schools[0].id, "s1");
        assert_eq!(schools[0].name, "Green Valley");
        assert_eq!(schools[0].total_students, 2);
        assert_eq!(schools[1].id, "s2");
        assert_eq!(schools[1].name, "Hill Top");
        assert_eq!(schools[1].total_students, 1);
    }

    #[test]
    fn test_student_schools_point_into_summary() {
        let output = transform(&json!([
            {"Are_you_a": "student", "School_Name": "a"},
            {"Are_you_a": "student", "School_Name": "b"}
        ]));

        for (student, school) in output.students.iter().zip(&output.summary.schools) {
            assert!(Arc::ptr_eq(&student.school, school));
        }
    }

    #[test]
    fn test_idempotent() {
        let payload = json!([
            {"_id": 7, "Are_you_a": "student", "School_Name": "a", "Gender_of_the_Student": "boy"},
            {"Are_you_a": "student", "School_Name": "b", "Age_of_the_Student": "x"},
            {"Are_you_a": "teacher", "School_Name": "c"}
        ]);

        assert_eq!(transform(&payload), transform(&payload));
    }

    #[test]
    fn test_custom_media_base_url() {
        let config = TransformConfig {
            media_base_url: "https://kobo.example.org/".to_string(),
            ..TransformConfig::default()
        };
        let output = transform_with(
            &json!([{
                "Are_you_a": "student",
                "Photo_of_the_Student": "p.jpg",
                "_attachments": [{"filename": "x/p.jpg", "download_url": "/media/p.jpg"}]
            }]),
            &config,
        );

        assert_eq!(output.students[0].photo, "https://kobo.example.org/media/p.jpg");
    }
}
