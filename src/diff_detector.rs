//! Decides whether a module's own files changed since its previous releases.

use crate::domain::AnnotatedReleaseTag;
use crate::error::{ReleaseError, Result};
use crate::git::Repository;

/// Whether any commit reachable from HEAD touches the module's files and is
/// not already captured by one of the previous release tags.
///
/// Content under each child module path is excluded: a parent module is not
/// "changed" merely because a nested module changed. The target commit of
/// every previous tag is a walk boundary, wherever it sits in history.
///
/// Returns `Ok(false)` immediately when there are no previous tags; the
/// caller treats that case as "must release" before ever calling this.
pub fn has_changed_since(
    repo: &dyn Repository,
    module_path: &str,
    child_modules: &[String],
    previous_tags: &[AnnotatedReleaseTag],
) -> Result<bool> {
    if previous_tags.is_empty() {
        return Ok(false);
    }

    let scope = normalize_module_path(module_path);
    let excluded: Vec<String> = child_modules
        .iter()
        .map(|child| {
            if scope == "." {
                child.clone()
            } else {
                format!("{}/{}", scope, child)
            }
        })
        .collect();

    let boundaries: Vec<git2::Oid> = previous_tags.iter().filter_map(|t| t.target()).collect();

    repo.has_commits_affecting(&scope, &excluded, &boundaries)
        .map_err(|e| {
            ReleaseError::detection(format!(
                "error walking history for module path '{}': {}",
                scope, e
            ))
        })
}

/// Module paths may arrive with `../` prefixes when the module sits next to
/// the release root; the walk wants them relative to the repository root.
fn normalize_module_path(module_path: &str) -> String {
    let stripped = module_path.trim_start_matches("../");
    if stripped.is_empty() || stripped == "." {
        ".".to_string()
    } else {
        stripped.trim_end_matches('/').to_string()
    }
}
