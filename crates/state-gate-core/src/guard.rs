// crates/state-gate-core/src/guard.rs
// ============================================================================
// Module: Guard Model and Evaluator
// Description: The guard sum type and the predicate evaluator that decides
//              whether a transition may fire.
// Purpose: Evaluate artifact-presence and context-value predicates against a
//          run's artifact set and context map.
// Dependencies: crate::artifact, crate::context, crate::identifiers
// ============================================================================

//! ## Overview
//! A [`Guard`] is a tagged sum type, never a class hierarchy: adding a new
//! guard kind means adding a variant and a match arm, and the compiler
//! enforces exhaustiveness. Evaluation never touches the filesystem directly;
//! it asks an [`ArtifactProbe`](crate::artifact::ArtifactProbe) for presence
//! so that evaluation stays unit-testable without a real directory tree.
//!
//! Security posture: guard input (context values, artifact paths) originates
//! from request payloads and must be treated as untrusted; see
//! [`crate::artifact`] for the path-safety checks applied before any guard
//! ever sees a path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::artifact::ArtifactProbe;
use crate::artifact::filter_by_artifact_type;
use crate::context::ContextLookup;
use crate::context::ContextMap;
use crate::context::PrimitiveValue;
use crate::context::lookup;
use crate::identifiers::ArtifactTypeName;
use crate::identifiers::ContextVarName;
use crate::identifiers::GuardName;

// ============================================================================
// SECTION: Guard sum type
// ============================================================================

/// A data-dependent predicate that must hold for a transition to fire.
///
/// # Invariants
/// - Exactly one variant matches any serialized guard; `kind` is the serde
///   tag and is part of the on-disk process format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guard {
    /// Satisfied when at least one present artifact matches `artifact_type`.
    ArtifactExists {
        /// The artifact type name to match.
        artifact_type: ArtifactTypeName,
    },
    /// Satisfied when the count of present artifacts matching
    /// `artifact_type` is at least `min`.
    ArtifactCount {
        /// The artifact type name to match.
        artifact_type: ArtifactTypeName,
        /// The minimum required count; zero is vacuously satisfied.
        min: u32,
    },
    /// Satisfied when `context[var] == value`.
    ContextEquals {
        /// The context variable name.
        var: ContextVarName,
        /// The value the variable must equal.
        value: PrimitiveValue,
    },
    /// Satisfied when `context[var]` is defined and `!= value`.
    ContextNotEquals {
        /// The context variable name.
        var: ContextVarName,
        /// The value the variable must differ from.
        value: PrimitiveValue,
    },
    /// Satisfied when `context[var]` is one of `values`.
    ContextIn {
        /// The context variable name.
        var: ContextVarName,
        /// The permitted set of values.
        values: Vec<PrimitiveValue>,
    },
    /// Satisfied when `context[var]` is defined and not one of `values`.
    ContextNotIn {
        /// The context variable name.
        var: ContextVarName,
        /// The excluded set of values.
        values: Vec<PrimitiveValue>,
    },
    /// Satisfied when `var` is present in the context map, `null` included.
    ContextExists {
        /// The context variable name.
        var: ContextVarName,
    },
    /// Satisfied when `var` is absent from the context map.
    ContextNotExists {
        /// The context variable name.
        var: ContextVarName,
    },
}

// ============================================================================
// SECTION: Evaluation context and outcome
// ============================================================================

/// The inputs a guard is evaluated against.
pub struct GuardContext<'a> {
    /// The run's cumulative, order-preserving, deduplicated artifact path
    /// set (see §3 "Cumulative artifacts").
    pub artifact_paths: &'a [String],
    /// The run's context map at the time of evaluation.
    pub context: &'a ContextMap,
    /// The base directory artifact paths are resolved under, if any.
    pub artifact_base_path: Option<&'a str>,
}

/// The result of evaluating a single guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    /// Whether the guard's predicate holds.
    pub satisfied: bool,
    /// Human-readable reasons, populated when `satisfied` is `false`.
    pub reasons: Vec<String>,
}

impl GuardOutcome {
    fn satisfied() -> Self {
        Self {
            satisfied: true,
            reasons: Vec::new(),
        }
    }

    fn unsatisfied(reason: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            reasons: vec![reason.into()],
        }
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Evaluates guards against a [`GuardContext`], probing artifact presence
/// through an [`ArtifactProbe`].
pub struct GuardEvaluator<'p, P: ArtifactProbe> {
    probe: &'p P,
}

impl<'p, P: ArtifactProbe> GuardEvaluator<'p, P> {
    /// Builds an evaluator backed by the given artifact probe.
    #[must_use]
    pub const fn new(probe: &'p P) -> Self {
        Self { probe }
    }

    /// Evaluates a single guard against `ctx`.
    #[must_use]
    pub fn evaluate(&self, guard: &Guard, ctx: &GuardContext<'_>) -> GuardOutcome {
        match guard {
            Guard::ArtifactExists { artifact_type } => self.artifact_exists(artifact_type, ctx),
            Guard::ArtifactCount { artifact_type, min } => {
                self.artifact_count(artifact_type, *min, ctx)
            }
            Guard::ContextEquals { var, value } => context_equals(ctx.context, var, value),
            Guard::ContextNotEquals { var, value } => context_not_equals(ctx.context, var, value),
            Guard::ContextIn { var, values } => context_in(ctx.context, var, values),
            Guard::ContextNotIn { var, values } => context_not_in(ctx.context, var, values),
            Guard::ContextExists { var } => context_exists(ctx.context, var),
            Guard::ContextNotExists { var } => context_not_exists(ctx.context, var),
        }
    }

    fn present_count(&self, artifact_type: &ArtifactTypeName, ctx: &GuardContext<'_>) -> usize {
        filter_by_artifact_type(ctx.artifact_paths, artifact_type)
            .into_iter()
            .filter(|path| self.probe.is_present(path, ctx.artifact_base_path))
            .count()
    }

    fn artifact_exists(
        &self,
        artifact_type: &ArtifactTypeName,
        ctx: &GuardContext<'_>,
    ) -> GuardOutcome {
        if self.present_count(artifact_type, ctx) > 0 {
            GuardOutcome::satisfied()
        } else {
            GuardOutcome::unsatisfied(format!(
                "no present artifact matches type '{artifact_type}'"
            ))
        }
    }

    fn artifact_count(
        &self,
        artifact_type: &ArtifactTypeName,
        min: u32,
        ctx: &GuardContext<'_>,
    ) -> GuardOutcome {
        let count = self.present_count(artifact_type, ctx);
        if u64::from(min) <= count as u64 {
            GuardOutcome::satisfied()
        } else {
            GuardOutcome::unsatisfied(format!(
                "only {count} present artifact(s) match type '{artifact_type}', need {min}"
            ))
        }
    }
}

fn context_equals(context: &ContextMap, var: &ContextVarName, value: &PrimitiveValue) -> GuardOutcome {
    match lookup(context, var.as_str()) {
        ContextLookup::Scalar(actual) if &actual == value => GuardOutcome::satisfied(),
        ContextLookup::Scalar(_) | ContextLookup::NonScalar => {
            GuardOutcome::unsatisfied(format!("context variable '{var}' does not equal expected value"))
        }
        ContextLookup::Missing => {
            GuardOutcome::unsatisfied(format!("context variable '{var}' is not defined"))
        }
    }
}

fn context_not_equals(
    context: &ContextMap,
    var: &ContextVarName,
    value: &PrimitiveValue,
) -> GuardOutcome {
    // Law L3: the variable must be *defined* for a negative comparison to
    // hold; a missing variable is unsatisfied, not vacuously true.
    match lookup(context, var.as_str()) {
        ContextLookup::Missing => {
            GuardOutcome::unsatisfied(format!("context variable '{var}' is not defined"))
        }
        ContextLookup::Scalar(actual) if &actual == value => {
            GuardOutcome::unsatisfied(format!("context variable '{var}' equals the excluded value"))
        }
        ContextLookup::Scalar(_) | ContextLookup::NonScalar => GuardOutcome::satisfied(),
    }
}

fn context_in(context: &ContextMap, var: &ContextVarName, values: &[PrimitiveValue]) -> GuardOutcome {
    match lookup(context, var.as_str()) {
        ContextLookup::Scalar(actual) if values.contains(&actual) => GuardOutcome::satisfied(),
        ContextLookup::Scalar(_) | ContextLookup::NonScalar => {
            GuardOutcome::unsatisfied(format!("context variable '{var}' is not in the allowed set"))
        }
        ContextLookup::Missing => {
            GuardOutcome::unsatisfied(format!("context variable '{var}' is not defined"))
        }
    }
}

fn context_not_in(
    context: &ContextMap,
    var: &ContextVarName,
    values: &[PrimitiveValue],
) -> GuardOutcome {
    match lookup(context, var.as_str()) {
        ContextLookup::Missing => {
            GuardOutcome::unsatisfied(format!("context variable '{var}' is not defined"))
        }
        ContextLookup::Scalar(actual) if values.contains(&actual) => {
            GuardOutcome::unsatisfied(format!("context variable '{var}' is in the excluded set"))
        }
        ContextLookup::Scalar(_) | ContextLookup::NonScalar => GuardOutcome::satisfied(),
    }
}

fn context_exists(context: &ContextMap, var: &ContextVarName) -> GuardOutcome {
    if crate::context::contains_key(context, var.as_str()) {
        GuardOutcome::satisfied()
    } else {
        GuardOutcome::unsatisfied(format!("context variable '{var}' is not defined"))
    }
}

fn context_not_exists(context: &ContextMap, var: &ContextVarName) -> GuardOutcome {
    if crate::context::contains_key(context, var.as_str()) {
        GuardOutcome::unsatisfied(format!("context variable '{var}' is defined"))
    } else {
        GuardOutcome::satisfied()
    }
}

// ============================================================================
// SECTION: Transition guard lookup
// ============================================================================

/// Evaluates an optional named guard, treating an absent name as vacuously
/// satisfied and an unknown name as a (non-panicking) unsatisfied result.
#[must_use]
pub fn evaluate_named_guard<P: ArtifactProbe>(
    evaluator: &GuardEvaluator<'_, P>,
    guards: &std::collections::BTreeMap<GuardName, Guard>,
    guard_name: Option<&GuardName>,
    ctx: &GuardContext<'_>,
) -> GuardOutcome {
    let Some(name) = guard_name else {
        return GuardOutcome::satisfied();
    };
    match guards.get(name) {
        Some(guard) => evaluator.evaluate(guard, ctx),
        None => GuardOutcome::unsatisfied("guard not defined"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::FsArtifactProbe;
    use serde_json::json;

    fn ctx<'a>(paths: &'a [String], context: &'a ContextMap) -> GuardContext<'a> {
        GuardContext {
            artifact_paths: paths,
            context,
            artifact_base_path: None,
        }
    }

    #[test]
    fn artifact_exists_guard_is_satisfied_once_a_matching_file_is_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let probe = FsArtifactProbe;
        let evaluator = GuardEvaluator::new(&probe);
        let context = ContextMap::new();
        let guard = Guard::ArtifactExists {
            artifact_type: ArtifactTypeName::from("document"),
        };
        let paths = vec!["document_v1.md".to_owned()];
        let base = dir.path().to_str().expect("utf-8 tempdir path");

        let before = evaluator.evaluate(
            &guard,
            &GuardContext {
                artifact_paths: &paths,
                context: &context,
                artifact_base_path: Some(base),
            },
        );
        assert!(!before.satisfied, "the guard must fail before the file exists");

        std::fs::write(dir.path().join("document_v1.md"), "draft").expect("write artifact");

        let after = evaluator.evaluate(
            &guard,
            &GuardContext {
                artifact_paths: &paths,
                context: &context,
                artifact_base_path: Some(base),
            },
        );
        assert!(after.satisfied, "the guard must pass once the file is present");
    }

    #[test]
    fn artifact_count_zero_is_vacuously_satisfied() {
        let probe = FsArtifactProbe;
        let evaluator = GuardEvaluator::new(&probe);
        let paths: Vec<String> = vec![];
        let context = ContextMap::new();
        let guard = Guard::ArtifactCount {
            artifact_type: ArtifactTypeName::from("document"),
            min: 0,
        };
        let outcome = evaluator.evaluate(&guard, &ctx(&paths, &context));
        assert!(outcome.satisfied);
    }

    #[test]
    fn missing_variable_fails_every_positive_predicate_except_not_exists() {
        let probe = FsArtifactProbe;
        let evaluator = GuardEvaluator::new(&probe);
        let paths: Vec<String> = vec![];
        let context = ContextMap::new();
        let var = ContextVarName::from("missing_var");

        let equals = Guard::ContextEquals {
            var: var.clone(),
            value: PrimitiveValue::String("x".to_owned()),
        };
        let not_equals = Guard::ContextNotEquals {
            var: var.clone(),
            value: PrimitiveValue::String("x".to_owned()),
        };
        let exists = Guard::ContextExists { var: var.clone() };
        let not_exists = Guard::ContextNotExists { var };

        assert!(!evaluator.evaluate(&equals, &ctx(&paths, &context)).satisfied);
        assert!(!evaluator.evaluate(&not_equals, &ctx(&paths, &context)).satisfied);
        assert!(!evaluator.evaluate(&exists, &ctx(&paths, &context)).satisfied);
        assert!(evaluator.evaluate(&not_exists, &ctx(&paths, &context)).satisfied);
    }

    #[test]
    fn context_exists_treats_null_as_present() {
        let probe = FsArtifactProbe;
        let evaluator = GuardEvaluator::new(&probe);
        let paths: Vec<String> = vec![];
        let mut context = ContextMap::new();
        context.insert("v".to_owned(), json!(null));
        let guard = Guard::ContextExists {
            var: ContextVarName::from("v"),
        };
        assert!(evaluator.evaluate(&guard, &ctx(&paths, &context)).satisfied);
    }

    #[test]
    fn unknown_named_guard_is_unsatisfied_not_a_panic() {
        let probe = FsArtifactProbe;
        let evaluator = GuardEvaluator::new(&probe);
        let paths: Vec<String> = vec![];
        let context = ContextMap::new();
        let guards = std::collections::BTreeMap::new();
        let outcome = evaluate_named_guard(
            &evaluator,
            &guards,
            Some(&GuardName::from("nonexistent")),
            &ctx(&paths, &context),
        );
        assert!(!outcome.satisfied);
    }

    #[test]
    fn absent_guard_name_is_vacuously_satisfied() {
        let probe = FsArtifactProbe;
        let evaluator = GuardEvaluator::new(&probe);
        let paths: Vec<String> = vec![];
        let context = ContextMap::new();
        let guards = std::collections::BTreeMap::new();
        let outcome = evaluate_named_guard(&evaluator, &guards, None, &ctx(&paths, &context));
        assert!(outcome.satisfied);
    }
}
