//! Lenient form-field decoding.
//!
//! Forms post numbers either as JSON numbers or as the raw text the rider
//! typed. A value that does not parse becomes `None` so the service can fall
//! back to its default instead of failing the whole submission.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a number from a JSON number or numeric text (`,` accepted as decimal
/// separator).
#[must_use]
pub fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// `deserialize_with` helper for optional lenient floats.
pub fn loose_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

/// `deserialize_with` helper for optional lenient integers. Fractions truncate.
pub fn loose_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    #[allow(clippy::cast_possible_truncation)]
    let parsed = value
        .as_ref()
        .and_then(number_from_value)
        .filter(|n| *n >= f64::from(i32::MIN) && *n <= f64::from(i32::MAX))
        .map(|n| n.trunc() as i32);
    Ok(parsed)
}

/// Trimmed text, or `None` when blank.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "form_test.rs"]
mod tests;
