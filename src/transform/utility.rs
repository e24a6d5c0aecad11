/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Share of `part` in `total` as a percentage. Returns 0.0 when `total` is zero.
pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Rounds to one decimal place, the precision every reported figure uses.
///
/// Rounds the exact binary value, so `1.45` (stored as `1.4499...`) gives
/// `1.4`. Exact ties such as `0.25` round away from zero.
pub fn round1(value: f64) -> f64 {
    let scaled = value * 10.0;
    // Only odd multiples of 0.25 sit exactly halfway between two tenths.
    if (value * 4.0).fract() == 0.0 && scaled.fract() != 0.0 {
        return (scaled.abs().ceil() / 10.0).copysign(value);
    }
    format!("{value:.1}").parse().unwrap_or(value)
}
