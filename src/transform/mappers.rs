//! Field mappers: total functions from raw survey strings to typed values.
//!
//! None of these fail. Each has a fallback for absent or malformed input.

use crate::transform::types::{Coordinates, Gender};

pub const DEFAULT_AGE: u32 = 12;
pub const DEFAULT_MEALS: u32 = 1;

pub const NO_ELECTRICITY: &str = "None";
pub const SOLAR: &str = "Solar (small)";
pub const KEROSENE: &str = "Kerosene Lamp";
pub const GRID: &str = "Grid (unreliable)";
pub const GENERATOR: &str = "Generator (occasional)";

/// Lighting categories that are *not* counted towards "without electricity".
///
/// Note that `"None"` is in this list while solar and kerosene are not, so
/// households lighting with solar or kerosene are the ones reported as
/// lacking electricity.
pub const ELECTRIFIED_SOURCES: [&str; 3] = [GRID, GENERATOR, NO_ELECTRICITY];

/// Parses the leading run of ASCII digits, ignoring surrounding whitespace.
/// `"12 years"` reads as 12; `"abc"` and `""` read as `None`.
fn leading_integer(raw: &str) -> Option<u32> {
    let trimmed = raw.trim_start();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

/// Number of meals per day. Spelled-out `one`/`two`/`three` are recognised,
/// otherwise the leading integer is used; zero or garbage reads as 1.
pub fn meals_to_number(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else {
        return DEFAULT_MEALS;
    };

    match raw.trim().to_lowercase().as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        other => leading_integer(other)
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MEALS),
    }
}

/// Student age in years; 12 when missing, zero or not a number.
///
/// Negative values such as `"-3"` count as not a number.
pub fn parse_age(raw: Option<&str>) -> u32 {
    raw.and_then(leading_integer)
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_AGE)
}

pub fn map_gender(raw: Option<&str>) -> Gender {
    let Some(raw) = raw else {
        return Gender::Other;
    };
    let normalized = raw.to_lowercase();

    // "female" contains "male", so it has to be checked first.
    if normalized.contains("girl") || normalized.contains("female") {
        Gender::Female
    } else if normalized.contains("boy") || normalized.contains("male") {
        Gender::Male
    } else {
        Gender::Other
    }
}

/// Parses a Kobo geopoint (`"<lat> <lng> [alt] [accuracy]"`).
///
/// Each axis falls back to 0 on its own, so `"-1.29 abc"` gives `{-1.29, 0}`.
pub fn parse_gps(raw: Option<&str>) -> Coordinates {
    let Some(raw) = raw else {
        return Coordinates::ORIGIN;
    };

    let mut parts = raw.split_whitespace();
    let mut axis = || {
        parts
            .next()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    };

    let lat = axis();
    let lng = axis();
    Coordinates { lat, lng }
}

/// Normalizes the lighting answer into one of the dashboard's categories.
/// Unrecognised answers pass through unchanged.
pub fn electricity_source_category(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return NO_ELECTRICITY.to_string();
    };
    let normalized = raw.to_lowercase();

    match normalized.as_str() {
        "none" | "candle" | "firewood" | "firewood flashlight" => NO_ELECTRICITY.to_string(),
        s if s.contains("solar") => SOLAR.to_string(),
        s if s.contains("kerosene") => KEROSENE.to_string(),
        s if s.contains("grid") => GRID.to_string(),
        s if s.contains("generator") => GENERATOR.to_string(),
        _ => raw.to_string(),
    }
}

/// Whether a lighting category counts as "without electricity".
pub fn counts_as_without_electricity(category: &str) -> bool {
    !ELECTRIFIED_SOURCES.contains(&category)
}

pub fn has_smartphone(raw: Option<&str>) -> bool {
    raw == Some("yes")
}

/// `"green_valley"` becomes `"Green Valley"`.
pub fn format_school_name(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rough location label: the first word of the display name plus "Village".
pub fn school_location(display_name: &str) -> String {
    let first = display_name.split(' ').next().unwrap_or_default();
    format!("{first} Village")
}
