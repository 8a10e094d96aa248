// crates/state-gate-core/src/artifact.rs
// ============================================================================
// Module: Artifact Checker
// Description: Path-safety validation, artifact-type filtering, and presence
//              probing for artifact paths attached to a run.
// Purpose: Keep filesystem access behind a narrow, testable surface so guard
//          evaluation never has to reason about raw paths.
// Dependencies: std::fs, std::path
// ============================================================================

//! ## Overview
//! Every artifact path that enters the engine is validated before any I/O is
//! attempted: traversal (`..`), absolute paths, and Windows drive prefixes
//! are rejected up front. Presence probing and type-name filtering are kept
//! as free functions plus a small [`ArtifactProbe`] trait so that guard
//! evaluation (see [`crate::guard`]) can be exercised in tests without a real
//! directory tree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use crate::identifiers::ArtifactTypeName;

// ============================================================================
// SECTION: Path safety
// ============================================================================

/// A path failed the path-safety check before any filesystem access was
/// attempted.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("artifact path {path:?} is not safe: {reason}")]
pub struct PathInvalid {
    /// The offending path, verbatim as supplied by the caller.
    pub path: String,
    /// A human-readable reason, suitable for surfacing in validation errors.
    pub reason: &'static str,
}

/// Validates `path` against the artifact path-safety rules.
///
/// A path is rejected, before any I/O, if it is empty, contains a `..`
/// segment, starts with `/`, or begins with a single-letter drive prefix
/// (e.g. `C:`).
///
/// # Errors
///
/// Returns [`PathInvalid`] describing the first rule violated.
pub fn check_path_safety(path: &str) -> Result<(), PathInvalid> {
    if path.is_empty() {
        return Err(PathInvalid {
            path: path.to_owned(),
            reason: "path is empty",
        });
    }
    if path.starts_with('/') {
        return Err(PathInvalid {
            path: path.to_owned(),
            reason: "path is absolute",
        });
    }
    if has_drive_prefix(path) {
        return Err(PathInvalid {
            path: path.to_owned(),
            reason: "path begins with a drive prefix",
        });
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathInvalid {
            path: path.to_owned(),
            reason: "path contains a '..' segment",
        });
    }
    Ok(())
}

fn has_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) => letter.is_ascii_alphabetic(),
        _ => false,
    }
}

// ============================================================================
// SECTION: Artifact-type filtering
// ============================================================================

/// Returns the subset of `paths` whose basename (minus its final extension)
/// matches `artifact_type` per the matching rule in §4.2: an exact
/// case-insensitive match, or a `_`/`-`-delimited prefix or suffix match.
#[must_use]
pub fn filter_by_artifact_type(paths: &[String], artifact_type: &ArtifactTypeName) -> Vec<String> {
    paths
        .iter()
        .filter(|path| matches_artifact_type(path, artifact_type.as_str()))
        .cloned()
        .collect()
}

/// Checks whether a single path's basename matches `artifact_type`.
#[must_use]
pub fn matches_artifact_type(path: &str, artifact_type: &str) -> bool {
    let stem = basename_without_extension(path);
    let stem_lower = stem.to_lowercase();
    let type_lower = artifact_type.to_lowercase();

    if stem_lower == type_lower {
        return true;
    }
    for delimiter in ['_', '-'] {
        let prefix = format!("{type_lower}{delimiter}");
        let suffix = format!("{delimiter}{type_lower}");
        if stem_lower.starts_with(&prefix) || stem_lower.ends_with(&suffix) {
            return true;
        }
    }
    false
}

fn basename_without_extension(path: &str) -> &str {
    let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match basename.rfind('.') {
        Some(0) | None => basename,
        Some(index) => &basename[..index],
    }
}

// ============================================================================
// SECTION: Presence probing
// ============================================================================

/// Resolves an artifact-relative path under an optional base directory.
#[must_use]
pub fn resolve_artifact_path(path: &str, base: Option<&str>) -> PathBuf {
    match base {
        Some(base) => Path::new(base).join(path),
        None => PathBuf::from(path),
    }
}

/// Abstracts artifact presence probing so that guard evaluation can be
/// exercised against fixtures instead of a real filesystem.
pub trait ArtifactProbe {
    /// Returns whether `path` (resolved under `base`, if given) currently
    /// exists on disk.
    fn is_present(&self, path: &str, base: Option<&str>) -> bool;
}

/// The production [`ArtifactProbe`], backed by a single `std::fs` metadata
/// probe per path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactProbe;

impl ArtifactProbe for FsArtifactProbe {
    fn is_present(&self, path: &str, base: Option<&str>) -> bool {
        resolve_artifact_path(path, base).is_file()
    }
}

/// Counts how many of `paths` are present according to `probe`.
#[must_use]
pub fn count_present<P: ArtifactProbe>(probe: &P, paths: &[String], base: Option<&str>) -> usize {
    paths.iter().filter(|path| probe.is_present(path, base)).count()
}

/// Returns whether any of `paths` are present according to `probe`.
#[must_use]
pub fn any_present<P: ArtifactProbe>(probe: &P, paths: &[String], base: Option<&str>) -> bool {
    paths.iter().any(|path| probe.is_present(path, base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_absolute_and_drive_prefixed_paths() {
        assert!(check_path_safety("../secret.txt").is_err());
        assert!(check_path_safety("a/../b").is_err());
        assert!(check_path_safety("/etc/passwd").is_err());
        assert!(check_path_safety("C:\\windows").is_err());
        assert!(check_path_safety("").is_err());
        assert!(check_path_safety("docs/report.md").is_ok());
    }

    #[test]
    fn matches_type_prefix_suffix_and_rejects_substrings() {
        assert!(matches_artifact_type("document.md", "document"));
        assert!(matches_artifact_type("document_v1.md", "document"));
        assert!(matches_artifact_type("draft-document.md", "document"));
        assert!(matches_artifact_type("DOCUMENT.MD", "document"));
        assert!(!matches_artifact_type("documents.md", "document"));
        assert!(!matches_artifact_type("mydocument.md", "document"));
    }

    #[test]
    fn fs_probe_reports_presence_for_real_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_path = dir.path().join("document_v1.md");
        std::fs::write(&file_path, b"content").expect("write fixture");

        let probe = FsArtifactProbe;
        let base = dir.path().to_str().expect("utf8 path").to_owned();
        assert!(probe.is_present("document_v1.md", Some(&base)));
        assert!(!probe.is_present("missing.md", Some(&base)));
    }
}
