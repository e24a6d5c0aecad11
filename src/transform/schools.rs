use crate::parser::RawRecord;
use crate::transform::mappers::{
    counts_as_without_electricity, electricity_source_category, format_school_name,
    has_smartphone, meals_to_number, parse_gps, school_location,
};
use crate::transform::types::{Coordinates, PovertyIndicators, School};
use crate::transform::utility::{mean, pct, round1};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Schools keyed by their raw (trimmed) survey name, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct SchoolIndex {
    entries: Vec<(String, Arc<School>)>,
    positions: HashMap<String, usize>,
}

impl SchoolIndex {
    pub fn get(&self, key: &str) -> Option<&Arc<School>> {
        self.positions.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<School>)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    /// The schools alone, in first-seen order.
    pub fn schools(&self) -> Vec<Arc<School>> {
        self.entries.iter().map(|(_, s)| Arc::clone(s)).collect()
    }

    fn push(&mut self, key: String, school: School) {
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push((key, Arc::new(school)));
    }
}

/// Samples collected for one school during the pass.
#[derive(Debug, Default)]
struct SchoolAccumulator {
    students: usize,
    coordinates: Vec<Coordinates>,
    meals: Vec<f64>,
    electricity: Vec<String>,
    smartphones: Vec<bool>,
}

impl SchoolAccumulator {
    fn add(&mut self, record: &RawRecord) {
        self.students += 1;

        let coords = parse_gps(record.gps.as_deref());
        if coords.is_valid() {
            self.coordinates.push(coords);
        }

        self.meals.push(meals_to_number(record.meals.as_deref()) as f64);
        self.electricity
            .push(electricity_source_category(record.lighting.as_deref()));
        self.smartphones
            .push(has_smartphone(record.smartphone.as_deref()));
    }

    fn finish(self, index: usize, key: &str) -> School {
        let coordinates = if self.coordinates.is_empty() {
            Coordinates::ORIGIN
        } else {
            let lats: Vec<f64> = self.coordinates.iter().map(|c| c.lat).collect();
            let lngs: Vec<f64> = self.coordinates.iter().map(|c| c.lng).collect();
            Coordinates {
                lat: mean(&lats),
                lng: mean(&lngs),
            }
        };

        let defaults = PovertyIndicators::default();

        let average_meals_per_day = if self.meals.is_empty() {
            defaults.average_meals_per_day
        } else {
            round1(mean(&self.meals))
        };

        let percent_without_electricity = if self.electricity.is_empty() {
            defaults.percent_without_electricity
        } else {
            let without = self
                .electricity
                .iter()
                .filter(|c| counts_as_without_electricity(c))
                .count();
            round1(pct(without, self.electricity.len()))
        };

        let percent_with_smartphones = if self.smartphones.is_empty() {
            defaults.percent_with_smartphones
        } else {
            let with = self.smartphones.iter().filter(|&&has| has).count();
            round1(pct(with, self.smartphones.len()))
        };

        let name = format_school_name(key);
        let location = school_location(&name);

        School {
            id: format!("s{}", index + 1),
            name,
            location,
            total_students: self.students,
            coordinates,
            poverty_indicators: PovertyIndicators {
                average_meals_per_day,
                percent_without_electricity,
                percent_with_smartphones,
            },
        }
    }
}

/// Groups student submissions by school and builds one [`School`] per group.
///
/// Only records with role `"student"` and a non-blank school name take part.
/// Ids are assigned `s1`, `s2`, … in the order school names are first seen.
pub fn aggregate_schools(records: &[RawRecord]) -> SchoolIndex {
    let (order, mut groups) = records
        .iter()
        .filter(|r| r.is_student())
        .filter_map(|r| r.school_key().map(|key| (key, r)))
        .fold(
            (Vec::<&str>::new(), HashMap::<&str, SchoolAccumulator>::new()),
            |(mut order, mut groups), (key, record)| {
                groups
                    .entry(key)
                    .or_insert_with(|| {
                        order.push(key);
                        SchoolAccumulator::default()
                    })
                    .add(record);
                (order, groups)
            },
        );

    let mut index = SchoolIndex::default();
    for (i, key) in order.into_iter().enumerate() {
        if let Some(acc) = groups.remove(key) {
            let school = acc.finish(i, key);
            debug!(key, id = %school.id, students = school.total_students, "School aggregated");
            index.push(key.to_string(), school);
        }
    }

    debug!(schools = index.len(), "School aggregation complete");
    index
}
