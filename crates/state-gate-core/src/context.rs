// crates/state-gate-core/src/context.rs
// ============================================================================
// Module: Run Context Values
// Description: Scalar values used by guard predicates, and the run-wide
//              context map they are drawn from.
// Purpose: Keep guard comparison restricted to the primitive subset of JSON
//          while letting `RunMetadata.context` carry arbitrary JSON.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! A run's context map may hold arbitrary JSON (objects and arrays included),
//! but context *predicates* in a guard only ever compare against the
//! primitive subset: string, number, boolean, or null. [`PrimitiveValue`] is
//! that subset, with a fallible conversion from [`serde_json::Value`] so a
//! guard referencing a non-scalar variable fails closed rather than panics.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A scalar context value: string, number, boolean, or null.
///
/// # Invariants
/// - Equality and `PartialEq` follow JSON value equality for the same
///   primitive kind; values of different kinds are never equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimitiveValue {
    /// A UTF-8 string value.
    String(String),
    /// A numeric value, stored as `f64` regardless of source representation.
    Number(f64),
    /// A boolean value.
    Bool(bool),
    /// The JSON `null` value.
    Null,
}

impl PrimitiveValue {
    /// Attempts to narrow a [`serde_json::Value`] into a [`PrimitiveValue`].
    ///
    /// Returns `None` for arrays and objects, which are not comparable
    /// primitives.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Null => Some(Self::Null),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// A run's mutable context map: arbitrary JSON values keyed by variable name.
pub type ContextMap = serde_json::Map<String, Value>;

/// Looks up a context variable, distinguishing "absent" from "present but
/// non-scalar" and "present and scalar".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextLookup {
    /// The key is not present in the context map.
    Missing,
    /// The key is present but its value is not a scalar primitive.
    NonScalar,
    /// The key is present and holds a scalar primitive value.
    Scalar(PrimitiveValue),
}

/// Looks up `var` in `context`, classifying the result for guard evaluation.
#[must_use]
pub fn lookup(context: &ContextMap, var: &str) -> ContextLookup {
    match context.get(var) {
        None => ContextLookup::Missing,
        Some(value) => match PrimitiveValue::from_json(value) {
            Some(primitive) => ContextLookup::Scalar(primitive),
            None => ContextLookup::NonScalar,
        },
    }
}

/// Checks whether `var` is present in `context` at all (any value, including
/// `null`, counts as present).
#[must_use]
pub fn contains_key(context: &ContextMap, var: &str) -> bool {
    context.contains_key(var)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_narrows_scalars_and_rejects_compounds() {
        assert_eq!(
            PrimitiveValue::from_json(&json!("x")),
            Some(PrimitiveValue::String("x".to_owned()))
        );
        assert_eq!(
            PrimitiveValue::from_json(&json!(1)),
            Some(PrimitiveValue::Number(1.0))
        );
        assert_eq!(PrimitiveValue::from_json(&json!(null)), Some(PrimitiveValue::Null));
        assert_eq!(PrimitiveValue::from_json(&json!([1, 2])), None);
        assert_eq!(PrimitiveValue::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn lookup_distinguishes_missing_present_and_non_scalar() {
        let mut context = ContextMap::new();
        context.insert("present".to_owned(), json!("value"));
        context.insert("compound".to_owned(), json!([1]));

        assert_eq!(lookup(&context, "missing"), ContextLookup::Missing);
        assert_eq!(
            lookup(&context, "present"),
            ContextLookup::Scalar(PrimitiveValue::String("value".to_owned()))
        );
        assert_eq!(lookup(&context, "compound"), ContextLookup::NonScalar);
    }
}
