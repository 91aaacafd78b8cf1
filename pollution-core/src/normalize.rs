//! Validation and cleanup of raw city readings.

use serde_json::Value;
use tracing::debug;

use crate::model::{NormalizedCity, RawCityRecord};

/// Turns a raw reading into a lookup candidate, or `None` when the record is
/// unusable. Rejections are logged, never raised.
pub fn normalize(raw: &RawCityRecord) -> Option<NormalizedCity> {
    let Some(name) = non_blank(raw.name.as_deref()) else {
        debug!(?raw, "Dropping record without a name");
        return None;
    };

    let Some(country) = non_blank(raw.country.as_deref()) else {
        debug!(name, "Dropping record without a country");
        return None;
    };

    let Some(pollution_value) = raw.pollution.as_ref().and_then(parse_pollution) else {
        debug!(name, pollution = ?raw.pollution, "Dropping record with invalid pollution value");
        return None;
    };

    let lookup_name = lookup_name(name);
    if !is_plausible_city_name(&lookup_name) {
        debug!(name, %lookup_name, "Dropping record that does not look like a city");
        return None;
    }

    Some(NormalizedCity {
        original_name: name.to_string(),
        lookup_name,
        country: country.to_string(),
        pollution_value,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts JSON numbers and numeric strings; the value must be finite and
/// not negative.
pub fn parse_pollution(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    (parsed.is_finite() && parsed >= 0.0).then_some(parsed)
}

/// Derives the name used for description lookups: parenthesised segments
/// removed, each word title-cased, whitespace collapsed.
pub fn lookup_name(name: &str) -> String {
    strip_parenthesized(name)
        .split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_parenthesized(name: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(name.len());

    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    out
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

// Single-letter names are rejected too.
fn is_plausible_city_name(lookup_name: &str) -> bool {
    if lookup_name.chars().count() <= 1 {
        return false;
    }

    !lookup_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .all(|c| c.is_ascii_digit())
}
