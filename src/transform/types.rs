//! Entities produced by the transformation pipeline.
//!
//! Field names serialize in camelCase so the JSON matches what the dashboard
//! front end reads.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A latitude/longitude pair. `{0, 0}` stands in for "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const ORIGIN: Coordinates = Coordinates { lat: 0.0, lng: 0.0 };

    /// A reading counts towards a school's average only when both axes are non-zero.
    pub fn is_valid(&self) -> bool {
        self.lat != 0.0 && self.lng != 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInfo {
    pub meals_per_day: u32,
    pub electricity_source: String,
    pub has_smartphone: bool,
    pub parent_income_source: String,
}

/// Per-school welfare metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PovertyIndicators {
    pub average_meals_per_day: f64,
    pub percent_without_electricity: f64,
    pub percent_with_smartphones: f64,
}

impl Default for PovertyIndicators {
    /// Values reported for a school that contributed no samples.
    fn default() -> Self {
        Self {
            average_meals_per_day: 2.0,
            percent_without_electricity: 60.0,
            percent_with_smartphones: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: String,
    pub name: String,
    pub location: String,
    pub total_students: usize,
    pub coordinates: Coordinates,
    pub poverty_indicators: PovertyIndicators,
}

impl School {
    pub const UNKNOWN_ID: &'static str = "s0";

    /// Sentinel attached to students whose school could not be resolved.
    ///
    /// It is never part of `Summary::schools`, so it cannot skew any real
    /// school's statistics.
    pub fn unknown() -> Self {
        Self {
            id: Self::UNKNOWN_ID.to_string(),
            name: "Unknown School".to_string(),
            location: "Unknown".to_string(),
            total_students: 0,
            coordinates: Coordinates::ORIGIN,
            poverty_indicators: PovertyIndicators::default(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.id == Self::UNKNOWN_ID
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub photo: String,
    pub age: u32,
    pub gender: Gender,
    pub grade: String,
    /// Shared with every other student of the same school.
    pub school: Arc<School>,
    pub career_aspiration: String,
    pub lamp_serial_number: String,
    pub household_info: HouseholdInfo,
    pub location: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenderCount {
    pub gender: Gender,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerAspiration {
    pub name: String,
    pub count: usize,
}

/// Male/Female tally for one aspiration, shaped for a grouped bar chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerByGender {
    pub name: String,
    #[serde(rename = "Male")]
    pub male: usize,
    #[serde(rename = "Female")]
    pub female: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub schools: Vec<Arc<School>>,
    pub total_students: usize,
    pub total_lamps: usize,
    pub average_age: f64,
    pub gender_distribution: Vec<GenderCount>,
    pub career_aspirations: Vec<CareerAspiration>,
    pub percent_with_smartphones: f64,
    pub percent_without_electricity: f64,
    pub average_meals_per_day: f64,
    #[serde(rename = "mostCommonCareerAspirations")]
    pub career_aspirations_by_gender: Vec<CareerByGender>,
}

impl Summary {
    /// The all-zero summary returned for empty or unusable input.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Everything one aggregation pass produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformOutput {
    pub students: Vec<Student>,
    pub summary: Summary,
}

impl TransformOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn student_by_id(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn school_by_id(&self, id: &str) -> Option<&Arc<School>> {
        self.summary.schools.iter().find(|s| s.id == id)
    }

    pub fn students_by_school<'a>(&'a self, school_id: &'a str) -> impl Iterator<Item = &'a Student> {
        self.students.iter().filter(move |s| s.school.id == school_id)
    }

    /// Points every student's school back at the matching instance in
    /// `summary.schools`.
    ///
    /// Deserialization gives each student its own copy of the school; this
    /// restores the one-instance-per-school sharing the pipeline produces.
    /// Students whose school id is not in the list keep their own copy.
    pub fn relink_schools(&mut self) {
        for student in &mut self.students {
            if let Some(shared) = self
                .summary
                .schools
                .iter()
                .find(|s| s.id == student.school.id)
            {
                student.school = Arc::clone(shared);
            }
        }
    }
}
