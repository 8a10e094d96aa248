// crates/state-gate-core/src/identifiers.rs
// ============================================================================
// Module: State Gate Identifiers
// Description: Newtype identifiers used throughout the process model and engine.
// Purpose: Give every name in the system a distinct type so that a state name
//          can never be passed where an event name is expected.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are thin, serde-transparent wrappers around `String`. None of
//! them perform interning; equality and hashing are by value. `RunId` is the
//! one identifier with a fixed external grammar (§6 of the governing
//! specification) and carries its own parser and generator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Macro for freeform name identifiers
// ============================================================================

macro_rules! name_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Builds a new identifier from any string-like value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

name_identifier!(
    /// Identifies a process definition, stable across versions.
    ProcessId
);

name_identifier!(
    /// Identifies a named state within a process.
    StateName
);

name_identifier!(
    /// Identifies a named event within a process.
    EventName
);

name_identifier!(
    /// Identifies a role presented by a caller.
    ///
    /// The literal value `"*"` is the reserved wildcard role and is never a
    /// concrete role name inside a non-wildcard `allowed_roles` list; the
    /// validator enforces this at load time.
    RoleName
);

name_identifier!(
    /// Identifies a named guard within a process's guard table.
    GuardName
);

name_identifier!(
    /// Identifies an artifact type, matched against artifact path basenames.
    ArtifactTypeName
);

name_identifier!(
    /// A context variable name inside a run's mutable context map.
    ContextVarName
);

/// The reserved role name permitting every caller.
pub const WILDCARD_ROLE: &str = "*";

/// The synthetic event name written as the first row of every run's log.
pub const INIT_EVENT: &str = "__init__";

// ============================================================================
// SECTION: RunId
// ============================================================================

/// Opaque, time-orderable identifier for a single run of a process.
///
/// # Invariants
/// - Always matches [`RunId::GRAMMAR_DESCRIPTION`]: `run-` followed by a
///   UUIDv7 in canonical hyphenated form.
/// - Construction other than [`RunId::generate`] and [`RunId::parse`] is not
///   exposed, so a `RunId` in hand is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

/// Error returned when a candidate string does not match the run-id grammar.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("run id {0:?} does not match the expected run-<uuidv7> grammar")]
pub struct RunIdParseError(pub String);

impl RunId {
    /// Human-readable description of the run-id grammar, used in error
    /// messages and documentation; matches
    /// `^run-[0-9a-f]{8}-[0-9a-f]{4}-7[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$`
    /// case-insensitively.
    pub const GRAMMAR_DESCRIPTION: &'static str = "run-<uuidv7>";

    /// Allocates a fresh run id from a newly generated UUIDv7.
    #[must_use]
    pub fn generate() -> Self {
        let uuid = Uuid::now_v7();
        Self(format!("run-{uuid}"))
    }

    /// Parses and validates a candidate run id string.
    ///
    /// # Errors
    ///
    /// Returns [`RunIdParseError`] when `value` does not match the run-id
    /// grammar.
    pub fn parse(value: impl Into<String>) -> Result<Self, RunIdParseError> {
        let value = value.into();
        if is_valid_run_id(&value) {
            Ok(Self(value))
        } else {
            Err(RunIdParseError(value))
        }
    }

    /// Returns the run id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Checks a candidate string against the run-id grammar without allocating a
/// [`RunId`].
#[must_use]
pub fn is_valid_run_id(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("run-").or_else(|| {
        value
            .len()
            .ge(&4)
            .then(|| &value[4..])
            .filter(|_| value[..4].eq_ignore_ascii_case("run-"))
    }) else {
        return false;
    };
    is_valid_uuid_v7(rest)
}

fn is_valid_uuid_v7(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    // 8-4-4-4-12 hyphenated layout, 36 characters total.
    if bytes.len() != 36 {
        return false;
    }
    let groups: [(usize, usize); 5] = [(0, 8), (9, 13), (14, 18), (19, 23), (24, 36)];
    for &(start, end) in &groups {
        if !bytes[start..end].iter().all(u8::is_ascii_hexdigit) {
            return false;
        }
    }
    if bytes[8] != b'-' || bytes[13] != b'-' || bytes[18] != b'-' || bytes[23] != b'-' {
        return false;
    }
    let version_nibble = bytes[14].to_ascii_lowercase();
    let variant_nibble = bytes[19].to_ascii_lowercase();
    version_nibble == b'7' && matches!(variant_nibble, b'8' | b'9' | b'a' | b'b')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_run_ids_round_trip_through_parse() {
        let run_id = RunId::generate();
        let parsed = RunId::parse(run_id.as_str().to_owned()).expect("generated id must parse");
        assert_eq!(run_id, parsed);
    }

    #[test]
    fn parse_accepts_mixed_case() {
        let run_id = RunId::generate();
        let upper = run_id.as_str().to_uppercase();
        assert!(RunId::parse(upper).is_ok());
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        assert!(RunId::parse("not-a-run-id").is_err());
        assert!(RunId::parse("run-00000000-0000-4000-8000-000000000000").is_err());
        assert!(RunId::parse("run-00000000-0000-7000-c000-000000000000").is_err());
    }

    #[test]
    fn name_identifiers_round_trip_display_and_as_str() {
        let role = RoleName::from("agent");
        assert_eq!(role.as_str(), "agent");
        assert_eq!(role.to_string(), "agent");
    }
}
