use crate::parser::RawRecord;
use crate::transform::TransformConfig;
use crate::transform::mappers::{
    electricity_source_category, has_smartphone, map_gender, meals_to_number, parse_age,
    parse_gps,
};
use crate::transform::schools::SchoolIndex;
use crate::transform::types::{HouseholdInfo, School, Student};
use std::sync::Arc;
use tracing::debug;

const LAMP_SERIAL_YEAR: u32 = 2023;
const LAMP_SERIAL_BASE: usize = 1000;

/// Maps every student submission to a [`Student`], keeping input order.
///
/// `index` in the fallbacks below is the position among student records, not
/// among all records.
pub fn map_students(
    records: &[RawRecord],
    schools: &SchoolIndex,
    config: &TransformConfig,
) -> Vec<Student> {
    let unknown = Arc::new(School::unknown());

    let students: Vec<Student> = records
        .iter()
        .filter(|r| r.is_student())
        .enumerate()
        .map(|(index, record)| {
            let school = record
                .school_key()
                .and_then(|key| schools.get(key))
                .unwrap_or(&unknown);
            map_student(index, record, Arc::clone(school), config)
        })
        .collect();

    let unresolved = students.iter().filter(|s| s.school.is_unknown()).count();
    debug!(students = students.len(), unresolved, "Student mapping complete");

    students
}

fn map_student(
    index: usize,
    record: &RawRecord,
    school: Arc<School>,
    config: &TransformConfig,
) -> Student {
    let id = match record.id.as_deref() {
        Some(id) => format!("st{id}"),
        None => format!("st{}", index + 1),
    };

    let name = record
        .student_name
        .clone()
        .unwrap_or_else(|| format!("Student {}", index + 1));

    let grade = format!("Grade {}", record.grade.as_deref().unwrap_or("Unknown"));

    let lamp_serial_number = record.lamp_serial_number.clone().unwrap_or_else(|| {
        format!("SL-{LAMP_SERIAL_YEAR}-{}", LAMP_SERIAL_BASE + index)
    });

    Student {
        id,
        name,
        photo: photo_url(record, config),
        age: parse_age(record.age.as_deref()),
        gender: map_gender(record.gender.as_deref()),
        grade,
        school,
        career_aspiration: record
            .career_aspiration
            .clone()
            .unwrap_or_else(|| "Undecided".to_string()),
        lamp_serial_number,
        household_info: HouseholdInfo {
            meals_per_day: meals_to_number(record.meals.as_deref()),
            electricity_source: electricity_source_category(record.lighting.as_deref()),
            has_smartphone: has_smartphone(record.smartphone.as_deref()),
            parent_income_source: record
                .income_source
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
        },
        location: parse_gps(record.gps.as_deref()),
    }
}

/// Resolves the student photo to a download URL via the attachment list.
///
/// The photo field holds a bare file name; the attachment whose stored
/// filename contains it supplies the URL. Falls back to the placeholder when
/// there is no photo or no attachment with a download URL matches.
fn photo_url(record: &RawRecord, config: &TransformConfig) -> String {
    let download_url = record.photo.as_deref().and_then(|photo| {
        record
            .attachments
            .iter()
            .find(|a| a.filename.contains(photo))
            .and_then(|a| a.download_url.as_deref())
    });

    match download_url {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => url.to_string(),
        Some(path) => format!("{}{}", config.media_base_url.trim_end_matches('/'), path),
        None => config.placeholder_photo.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::schools::aggregate_schools;
    use crate::transform::types::Gender;
    use serde_json::json;

    fn records(values: serde_json::Value) -> Vec<RawRecord> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(RawRecord::from_value)
            .collect()
    }

    fn map(values: serde_json::Value) -> Vec<Student> {
        let records = records(values);
        let schools = aggregate_schools(&records);
        map_students(&records, &schools, &TransformConfig::default())
    }

    #[test]
    fn test_maps_fields() {
        let students = map(json!([{
            "_id": 4411,
            "Are_you_a": "student",
            "School_Name": "green_valley",
            "Name_of_the_Student": "Amina Njeri",
            "What_Grade_is_the_Student": "5",
            "Gender_of_the_Student": "girl",
            "Age_of_the_Student": "11",
            "What_do_you_hope_to_be_when_you_grow_up": "Doctor",
            "Record_the_device_serial_number": "SL-9000",
            "What_s_the_family_s_ain_source_of_income": "Farming",
            "What_do_you_currently_use_for_lighting": "kerosene",
            "Do_you_or_anyone_in_your_famil": "yes",
            "How_many_meals_do_yo_ically_have_in_a_day": "two",
            "GPS_Reading": "-1.29 36.82 0 0"
        }]));

        let s = &students[0];
        assert_eq!(s.id, "st4411");
        assert_eq!(s.name, "Amina Njeri");
        assert_eq!(s.grade, "Grade 5");
        assert_eq!(s.gender, Gender::Female);
        assert_eq!(s.age, 11);
        assert_eq!(s.career_aspiration, "Doctor");
        assert_eq!(s.lamp_serial_number, "SL-9000");
        assert_eq!(s.school.id, "s1");
        assert_eq!(s.household_info.meals_per_day, 2);
        assert_eq!(s.household_info.electricity_source, "Kerosene Lamp");
        assert!(s.household_info.has_smartphone);
        assert_eq!(s.household_info.parent_income_source, "Farming");
        assert_eq!(s.location.lat, -1.29);
        assert_eq!(s.photo, "/placeholder-profile.jpg");
    }

    #[test]
    fn test_fallbacks_use_student_index() {
        let students = map(json!([
            {"Are_you_a": "parent"},
            {"Are_you_a": "student", "School_Name": "a"},
            {"Are_you_a": "student", "School_Name": "a", "Age_of_the_Student": "n/a"}
        ]));

        assert_eq!(students.len(), 2);
        let second = &students[1];
        assert_eq!(second.id, "st2");
        assert_eq!(second.name, "Student 2");
        assert_eq!(second.grade, "Grade Unknown");
        assert_eq!(second.age, 12);
        assert_eq!(second.gender, Gender::Other);
        assert_eq!(second.career_aspiration, "Undecided");
        assert_eq!(second.lamp_serial_number, "SL-2023-1001");
        assert_eq!(second.household_info.parent_income_source, "Unknown");
        assert_eq!(second.household_info.electricity_source, "None");
        assert_eq!(students[0].lamp_serial_number, "SL-2023-1000");
    }

    #[test]
    fn test_numeric_ids_render_like_integers() {
        let students = map(json!([
            {"_id": 0, "Are_you_a": "student"},
            {"_id": 301.0, "Are_you_a": "student"}
        ]));

        let ids: Vec<&str> = students.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["st1", "st301"]);
    }

    #[test]
    fn test_students_share_school_instance() {
        let students = map(json!([
            {"Are_you_a": "student", "School_Name": "a"},
            {"Are_you_a": "student", "School_Name": "a"}
        ]));

        assert!(Arc::ptr_eq(&students[0].school, &students[1].school));
    }

    #[test]
    fn test_unmatched_school_uses_unknown_sentinel() {
        let students = map(json!([
            {"Are_you_a": "student", "School_Name": "a"},
            {"Are_you_a": "student", "School_Name": "  "}
        ]));

        assert_eq!(students[0].school.id, "s1");
        assert_eq!(students[1].school.id, "s0");
        assert_eq!(students[1].school.name, "Unknown School");
    }

    #[test]
    fn test_photo_resolves_from_attachments() {
        let students = map(json!([
            {
                "Are_you_a": "student",
                "Photo_of_the_Student": "amina.jpg",
                "_attachments": [
                    {"filename": "kobo/attachments/light.jpg", "download_url": "/media/light.jpg"},
                    {"filename": "kobo/attachments/amina.jpg", "download_url": "/media/amina.jpg"}
                ]
            },
            {
                "Are_you_a": "student",
                "Photo_of_the_Student": "baraka.jpg",
                "_attachments": [
                    {"filename": "kobo/attachments/baraka.jpg", "download_url": "https://cdn.example.org/baraka.jpg"}
                ]
            },
            {
                "Are_you_a": "student",
                "Photo_of_the_Student": "missing.jpg",
                "_attachments": []
            }
        ]));

        assert_eq!(students[0].photo, "https://kf.kobotoolbox.org/media/amina.jpg");
        assert_eq!(students[1].photo, "https://cdn.example.org/baraka.jpg");
        assert_eq!(students[2].photo, "/placeholder-profile.jpg");
    }
}
