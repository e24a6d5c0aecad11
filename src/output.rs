//! Output formatting and persistence for transformed survey data.
//!
//! Supports pretty-printing, JSON files and flat CSV tables, each optionally
//! gzip-compressed.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::transform::{School, Student, TransformOutput};

/// One line of the schools table.
#[derive(Debug, Serialize)]
struct SchoolRow<'a> {
    id: &'a str,
    name: &'a str,
    location: &'a str,
    total_students: usize,
    lat: f64,
    lng: f64,
    average_meals_per_day: f64,
    percent_without_electricity: f64,
    percent_with_smartphones: f64,
}

impl<'a> From<&'a School> for SchoolRow<'a> {
    fn from(school: &'a School) -> Self {
        Self {
            id: &school.id,
            name: &school.name,
            location: &school.location,
            total_students: school.total_students,
            lat: school.coordinates.lat,
            lng: school.coordinates.lng,
            average_meals_per_day: school.poverty_indicators.average_meals_per_day,
            percent_without_electricity: school.poverty_indicators.percent_without_electricity,
            percent_with_smartphones: school.poverty_indicators.percent_with_smartphones,
        }
    }
}

/// One line of the students table, with the school reduced to its id and name.
#[derive(Debug, Serialize)]
struct StudentRow<'a> {
    id: &'a str,
    name: &'a str,
    age: u32,
    gender: &'static str,
    grade: &'a str,
    school_id: &'a str,
    school_name: &'a str,
    career_aspiration: &'a str,
    lamp_serial_number: &'a str,
    meals_per_day: u32,
    electricity_source: &'a str,
    has_smartphone: bool,
    parent_income_source: &'a str,
    lat: f64,
    lng: f64,
    photo: &'a str,
}

impl<'a> From<&'a Student> for StudentRow<'a> {
    fn from(s: &'a Student) -> Self {
        Self {
            id: &s.id,
            name: &s.name,
            age: s.age,
            gender: s.gender.as_str(),
            grade: &s.grade,
            school_id: &s.school.id,
            school_name: &s.school.name,
            career_aspiration: &s.career_aspiration,
            lamp_serial_number: &s.lamp_serial_number,
            meals_per_day: s.household_info.meals_per_day,
            electricity_source: &s.household_info.electricity_source,
            has_smartphone: s.household_info.has_smartphone,
            parent_income_source: &s.household_info.parent_income_source,
            lat: s.location.lat,
            lng: s.location.lng,
            photo: &s.photo,
        }
    }
}

/// Logs the summary using Rust's debug pretty-print format.
pub fn print_pretty(output: &TransformOutput) {
    debug!("{:#?}", output.summary);
}

/// Logs the summary as pretty-printed JSON.
pub fn print_json(output: &TransformOutput) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(&output.summary)?);
    Ok(())
}

/// Creates `path` and its parent directories.
fn create_file(path: &str) -> Result<File> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path).with_context(|| format!("creating {path}"))
}

/// Runs `body` against `sink`, through a gzip encoder when asked.
///
/// The gzip encoder is finished before returning, so trailer write errors
/// propagate.
fn encode_into<W: Write>(
    mut sink: W,
    gzip: bool,
    body: impl FnOnce(&mut dyn Write) -> Result<()>,
) -> Result<()> {
    if gzip {
        let mut encoder = GzEncoder::new(sink, Compression::default());
        body(&mut encoder)?;
        encoder.finish()?.flush()?;
    } else {
        body(&mut sink)?;
        sink.flush()?;
    }
    Ok(())
}

/// Appends `.gz` when compressing, so the file name says what it holds.
pub fn output_path(path: &str, gzip: bool) -> String {
    if gzip && !path.ends_with(".gz") {
        format!("{path}.gz")
    } else {
        path.to_string()
    }
}

/// Writes any serializable value as pretty JSON. Returns the path written.
pub fn write_json(path: &str, value: &impl Serialize, gzip: bool) -> Result<String> {
    let path = output_path(path, gzip);
    encode_into(create_file(&path)?, gzip, |writer| {
        serde_json::to_writer_pretty(writer, value)?;
        Ok(())
    })?;
    info!(path = %path, gzip, "JSON written");
    Ok(path)
}

fn write_rows<T: Serialize>(path: &str, rows: impl Iterator<Item = T>, gzip: bool) -> Result<String> {
    let path = output_path(path, gzip);
    let mut count = 0usize;
    encode_into(create_file(&path)?, gzip, |sink| {
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(sink);
        for row in rows {
            writer.serialize(row)?;
            count += 1;
        }
        writer.flush()?;
        Ok(())
    })?;
    info!(path = %path, rows = count, gzip, "CSV written");
    Ok(path)
}

/// Writes the schools table as CSV. Returns the path written.
pub fn write_schools_csv(path: &str, schools: &[Arc<School>], gzip: bool) -> Result<String> {
    write_rows(path, schools.iter().map(|s| SchoolRow::from(s.as_ref())), gzip)
}

/// Writes the students table as CSV. Returns the path written.
pub fn write_students_csv(path: &str, students: &[Student], gzip: bool) -> Result<String> {
    write_rows(path, students.iter().map(StudentRow::from), gzip)
}

/// Reads a dashboard JSON file written by [`write_json`], gzip or not.
pub fn read_output(path: &str) -> Result<TransformOutput> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    let bytes = if path.ends_with(".gz") {
        let mut decoded = Vec::new();
        std::io::Read::read_to_end(&mut flate2::read::GzDecoder::new(&bytes[..]), &mut decoded)?;
        decoded
    } else {
        bytes
    };
    let mut output: TransformOutput =
        serde_json::from_slice(&bytes).with_context(|| format!("{path} is not a dashboard JSON file"))?;
    output.relink_schools();
    Ok(output)
}
