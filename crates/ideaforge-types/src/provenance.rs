//! Provenance tracking for agent output sections.
//!
//! Every section of a build result is either produced by the remote model or
//! substituted from a static fallback document after retries were exhausted.
//! `Sourced<T>` carries that distinction alongside the value so consumers can
//! warn the end user that part of the output is a generic default.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Where a section's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Parsed and validated from a model response.
    Generated,
    /// Static fallback document substituted after all attempts failed.
    Fallback,
}

impl Provenance {
    pub fn is_fallback(self) -> bool {
        matches!(self, Provenance::Fallback)
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Generated => write!(f, "generated"),
            Provenance::Fallback => write!(f, "fallback"),
        }
    }
}

/// A value tagged with its provenance and the number of attempts it took.
///
/// Serializes flat: the value's own fields plus `provenance` and `attempts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    #[serde(flatten)]
    pub value: T,
    pub provenance: Provenance,
    /// Transport calls made for this section (0 for deterministic sections).
    #[serde(default)]
    pub attempts: u32,
}

impl<T> Sourced<T> {
    pub fn generated(value: T, attempts: u32) -> Self {
        Self {
            value,
            provenance: Provenance::Generated,
            attempts,
        }
    }

    pub fn fallback(value: T, attempts: u32) -> Self {
        Self {
            value,
            provenance: Provenance::Fallback,
            attempts,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance.is_fallback()
    }

    /// Transform the inner value, keeping provenance and attempt count.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            value: f(self.value),
            provenance: self.provenance,
            attempts: self.attempts,
        }
    }
}

impl<T> Deref for Sourced<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Section {
        title: String,
    }

    #[test]
    fn sourced_serializes_flat() {
        let sourced = Sourced::fallback(
            Section {
                title: "defaults".to_string(),
            },
            3,
        );
        let json = serde_json::to_value(&sourced).unwrap();
        assert_eq!(json["title"], "defaults");
        assert_eq!(json["provenance"], "fallback");
        assert_eq!(json["attempts"], 3);
    }

    #[test]
    fn sourced_deserializes_flat() {
        let json = r#"{"title":"x","provenance":"generated"}"#;
        let sourced: Sourced<Section> = serde_json::from_str(json).unwrap();
        assert_eq!(sourced.title, "x");
        assert_eq!(sourced.provenance, Provenance::Generated);
        assert_eq!(sourced.attempts, 0);
    }

    #[test]
    fn map_keeps_provenance() {
        let sourced = Sourced::fallback(2u32, 3).map(|n| n * 10);
        assert_eq!(sourced.value, 20);
        assert!(sourced.is_fallback());
        assert_eq!(sourced.attempts, 3);
    }

    #[test]
    fn provenance_display() {
        assert_eq!(Provenance::Fallback.to_string(), "fallback");
        assert_eq!(Provenance::Generated.to_string(), "generated");
    }
}
