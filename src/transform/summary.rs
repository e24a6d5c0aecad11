use crate::transform::mappers::counts_as_without_electricity;
use crate::transform::types::{
    CareerAspiration, CareerByGender, Gender, GenderCount, School, Student, Summary,
};
use crate::transform::utility::{mean, pct, round1};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const TOP_ASPIRATIONS: usize = 5;

/// Computes dashboard statistics over the mapped students.
///
/// An empty student list yields [`Summary::empty`]; nothing here divides by
/// zero.
pub fn calculate_summary(students: &[Student], schools: &[Arc<School>]) -> Summary {
    if students.is_empty() {
        return Summary::empty();
    }

    let total = students.len();

    let without_electricity = students
        .iter()
        .filter(|s| counts_as_without_electricity(&s.household_info.electricity_source))
        .count();
    let percent_without_electricity = round1(pct(without_electricity, total));
    debug!(
        without_electricity,
        total, percent_without_electricity, "Electricity access computed"
    );

    let with_smartphones = students
        .iter()
        .filter(|s| s.household_info.has_smartphone)
        .count();

    let ages: Vec<f64> = students.iter().map(|s| s.age as f64).collect();
    let meals: Vec<f64> = students
        .iter()
        .map(|s| s.household_info.meals_per_day as f64)
        .collect();

    Summary {
        schools: schools.to_vec(),
        total_students: total,
        total_lamps: students
            .iter()
            .filter(|s| !s.lamp_serial_number.is_empty())
            .count(),
        average_age: round1(mean(&ages)),
        gender_distribution: gender_distribution(students),
        career_aspirations: top_career_aspirations(students, TOP_ASPIRATIONS),
        percent_with_smartphones: round1(pct(with_smartphones, total)),
        percent_without_electricity,
        average_meals_per_day: round1(mean(&meals)),
        career_aspirations_by_gender: career_aspirations_by_gender(students),
    }
}

/// One entry per gender actually present, in first-seen order.
pub fn gender_distribution(students: &[Student]) -> Vec<GenderCount> {
    let mut counts: Vec<GenderCount> = Vec::new();
    for student in students {
        match counts.iter_mut().find(|c| c.gender == student.gender) {
            Some(entry) => entry.count += 1,
            None => counts.push(GenderCount {
                gender: student.gender,
                count: 1,
            }),
        }
    }
    counts
}

/// Tallies aspirations in first-seen order.
fn tally_aspirations(students: &[Student]) -> Vec<CareerAspiration> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut tallies: Vec<CareerAspiration> = Vec::new();

    for student in students {
        let name = student.career_aspiration.as_str();
        if name.is_empty() {
            continue;
        }
        match positions.get(name) {
            Some(&i) => tallies[i].count += 1,
            None => {
                positions.insert(name, tallies.len());
                tallies.push(CareerAspiration {
                    name: name.to_string(),
                    count: 1,
                });
            }
        }
    }

    tallies
}

/// The `limit` most frequent aspirations. Ties keep first-seen order.
pub fn top_career_aspirations(students: &[Student], limit: usize) -> Vec<CareerAspiration> {
    let mut tallies = tally_aspirations(students);
    // sort_by is stable, which is what keeps ties in first-seen order.
    tallies.sort_by(|a, b| b.count.cmp(&a.count));
    tallies.truncate(limit);
    tallies
}

/// Male/Female counts per aspiration, in first-seen order.
///
/// Students with gender `Other` still create the aspiration row but are not
/// counted in either column.
pub fn career_aspirations_by_gender(students: &[Student]) -> Vec<CareerByGender> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut rows: Vec<CareerByGender> = Vec::new();

    for student in students {
        let name = student.career_aspiration.as_str();
        if name.is_empty() {
            continue;
        }
        let i = *positions.entry(name).or_insert_with(|| {
            rows.push(CareerByGender {
                name: name.to_string(),
                male: 0,
                female: 0,
            });
            rows.len() - 1
        });

        match student.gender {
            Gender::Male => rows[i].male += 1,
            Gender::Female => rows[i].female += 1,
            Gender::Other => {}
        }
    }

    rows
}
