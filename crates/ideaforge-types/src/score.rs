//! Lenient deserializers for 0-100 scores.
//!
//! Models emit scores as integers, floats, or numeric strings ("85", "85%").
//! These helpers accept all three, round, and clamp into `0..=100`.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

fn to_score(raw: RawScore) -> Option<u8> {
    let value = match raw {
        RawScore::Number(n) => n,
        RawScore::Text(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
    };
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, 100.0) as u8)
}

/// Deserialize a required score.
pub fn deserialize<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawScore::deserialize(deserializer)?;
    to_score(raw).ok_or_else(|| serde::de::Error::custom("score is not a number"))
}

/// Deserialize an optional score; unparseable values become `None`.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawScore>::deserialize(deserializer)?;
    Ok(raw.and_then(to_score))
}
