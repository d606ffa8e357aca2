//! Conditions a rule places on individual facts.

use serde::{Deserialize, Serialize};

use crate::schema::fact_store::FactStore;
use crate::schema::value::Value;

/// How a numeric clause compares against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareMode {
    /// `fact <= threshold`
    AtMost,
    /// `fact >= threshold`
    AtLeast,
    /// `fact == threshold`, within `f32::EPSILON`
    EqualTo,
}

/// A predicate over one named fact.
///
/// A fact of the wrong type never satisfies a clause; it is a plain
/// non-match, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Any value is present under `key`.
    Exists { key: String },
    StringEquals { key: String, value: String },
    BoolEquals { key: String, value: bool },
    /// Inclusive float range, widened by `f32::EPSILON` on both ends.
    NumericRange { key: String, min: f32, max: f32 },
}

impl Clause {
    pub fn exists(key: &str) -> Self {
        Self::Exists {
            key: key.to_string(),
        }
    }

    pub fn string_equals(key: &str, value: &str) -> Self {
        Self::StringEquals {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn bool_equals(key: &str, value: bool) -> Self {
        Self::BoolEquals {
            key: key.to_string(),
            value,
        }
    }

    /// Build a numeric clause. The bound the mode leaves open stays at the
    /// extreme of `f32`.
    pub fn numeric(key: &str, mode: CompareMode, threshold: f32) -> Self {
        let (min, max) = match mode {
            CompareMode::AtMost => (f32::MIN, threshold),
            CompareMode::AtLeast => (threshold, f32::MAX),
            CompareMode::EqualTo => (threshold, threshold),
        };
        Self::NumericRange {
            key: key.to_string(),
            min,
            max,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Exists { key }
            | Self::StringEquals { key, .. }
            | Self::BoolEquals { key, .. }
            | Self::NumericRange { key, .. } => key,
        }
    }

    /// Test a value already known to be stored under [`Clause::key`].
    pub fn check(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Exists { .. }, _) => true,
            (Self::StringEquals { value: expected, .. }, Value::String(s)) => s == expected,
            (Self::BoolEquals { value: expected, .. }, Value::Bool(b)) => b == expected,
            (Self::NumericRange { min, max, .. }, Value::Float(v)) => {
                *v >= *min - f32::EPSILON && *v <= *max + f32::EPSILON
            }
            _ => false,
        }
    }

    /// Look the key up in `store` and test it. An absent key is a non-match.
    pub fn evaluate(&self, store: &dyn FactStore) -> bool {
        store.value(self.key()).is_some_and(|v| self.check(v))
    }
}
