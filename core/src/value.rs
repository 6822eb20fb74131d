//! Typed parameter values.

use serde::{Deserialize, Serialize};

/// A typed value held by a definition.
///
/// Paths, keys, and choice selections are all carried as `String`; the
/// declared type (and its handler in the registry) governs how raw words
/// become values and how values render back to words.
///
/// # Examples
///
/// ```
/// use phil_core::PhilValue;
///
/// // Diff comparisons are value-level, not textual: 1.0 == 1.
/// assert!(PhilValue::Float(1.0).value_eq(&PhilValue::Int(1)));
/// assert!(!PhilValue::Float(1.5).value_eq(&PhilValue::Int(1)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PhilValue {
    /// Boolean value (`True`/`False`, `yes`/`no`, `on`/`off`, `1`/`0`).
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value (also used for `path`, `key`, `words`, and `choice`
    /// selections).
    String(String),
}

impl PhilValue {
    /// Compares two values at the value level rather than textually.
    ///
    /// Numeric values compare across `Int`/`Float` so that `1.0` equals
    /// `1`; everything else requires matching variants.
    pub fn value_eq(&self, other: &PhilValue) -> bool {
        match (self, other) {
            (PhilValue::Int(a), PhilValue::Float(b)) | (PhilValue::Float(b), PhilValue::Int(a)) => {
                (*a as f64) == *b
            }
            (a, b) => a == b,
        }
    }

    /// Renders the value as phil source text (unquoted).
    pub fn as_word_text(&self) -> String {
        match self {
            PhilValue::Bool(true) => "True".to_string(),
            PhilValue::Bool(false) => "False".to_string(),
            PhilValue::Int(v) => v.to_string(),
            PhilValue::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
                    format!("{v:.0}")
                } else {
                    v.to_string()
                }
            }
            PhilValue::String(v) => v.clone(),
        }
    }
}

/// Compares two value sequences element-wise with [`PhilValue::value_eq`].
pub fn values_eq(a: &[PhilValue], b: &[PhilValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.value_eq(y))
}
