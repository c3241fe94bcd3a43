//! Physical-dimension normalization.
//!
//! Lengths end up as `"<n> Inches"` and weights as `"<n> Pounds"`, rounded to
//! two decimals. Values already in imperial units are passed through as-is.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static QUANTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9]*\.?[0-9]+)\s*([A-Za-z]+)\.?\s*$").expect("valid quantity regex")
});

const MM_PER_INCH: f64 = 25.4;
const GRAMS_PER_POUND: f64 = 453.592_37;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Millimetre,
    Centimetre,
    Metre,
    Gram,
    Kilogram,
    Imperial,
}

impl Unit {
    fn parse(unit: &str) -> Option<Self> {
        Some(match unit.to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Self::Millimetre,
            "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => Self::Centimetre,
            "m" | "meter" | "meters" | "metre" | "metres" => Self::Metre,
            "g" | "gram" | "grams" => Self::Gram,
            "kg" | "kilogram" | "kilograms" => Self::Kilogram,
            "in" | "inch" | "inches" | "lb" | "lbs" | "pound" | "pounds" | "oz" | "ounce"
            | "ounces" => Self::Imperial,
            _ => return None,
        })
    }
}

fn parse_quantity(value: &str) -> Option<(f64, Unit)> {
    let caps = QUANTITY_RE.captures(value)?;
    let magnitude = caps[1].parse::<f64>().ok()?;
    Some((magnitude, Unit::parse(&caps[2])?))
}

/// Two-decimal rendering that keeps one decimal for whole numbers: `8.0`, `7.87`.
fn format_rounded(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.1}")
    } else {
        format!("{rounded}")
    }
}

/// Normalize a length such as `"20 cm"` to `"7.87 Inches"`.
///
/// Returns `None` for values that are not a number followed by a length unit.
pub fn normalize_length(value: &str) -> Option<String> {
    let (magnitude, unit) = parse_quantity(value)?;
    let mm = match unit {
        Unit::Millimetre => magnitude,
        Unit::Centimetre => magnitude * 10.0,
        Unit::Metre => magnitude * 1000.0,
        Unit::Imperial => return Some(value.trim().to_string()),
        Unit::Gram | Unit::Kilogram => return None,
    };
    Some(format!("{} Inches", format_rounded(mm / MM_PER_INCH)))
}

/// Normalize a weight such as `"500 g"` to `"1.1 Pounds"`.
pub fn normalize_weight(value: &str) -> Option<String> {
    let (magnitude, unit) = parse_quantity(value)?;
    let grams = match unit {
        Unit::Gram => magnitude,
        Unit::Kilogram => magnitude * 1000.0,
        Unit::Imperial => return Some(value.trim().to_string()),
        Unit::Millimetre | Unit::Centimetre | Unit::Metre => return None,
    };
    Some(format!("{} Pounds", format_rounded(grams / GRAMS_PER_POUND)))
}

/// Convert every entry of a metric dimensions map to inches.
///
/// Entries that cannot be read as a length are dropped with a warning.
pub fn metric_to_inches<'a, I>(dimensions: I) -> IndexMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    dimensions
        .into_iter()
        .filter_map(|(key, value)| match normalize_length(value) {
            Some(inches) => Some((key.to_string(), inches)),
            None => {
                tracing::warn!(key, value, "unreadable dimension, dropped");
                None
            }
        })
        .collect()
}

/// Split `"Height: 9.21 Inches, Length: 6.14 Inches, Weight: 1.2 Pounds"`
/// into its labelled parts.
pub fn parse_dimension_list(raw: &str) -> IndexMap<String, String> {
    raw.split(", ")
        .filter_map(|part| {
            let (key, value) = part.split_once(": ")?;
            let (key, value) = (key.trim(), value.trim());
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}
