//! Finds previously created release tags for a module and parses build
//! numbers out of their names.

use crate::domain::AnnotatedReleaseTag;
use crate::error::Result;
use crate::git::Repository;

/// Strip the `refs/tags/` prefix from a full ref name, if present
pub fn strip_ref_prefix(ref_name: &str) -> &str {
    ref_name.strip_prefix("refs/tags/").unwrap_or(ref_name)
}

/// All local release tags for one business version of a module, newest first.
///
/// A tag belongs to the family iff its name is
/// `<module>-<businessVersion>.<integer>`; anything else is silently skipped,
/// as are refs that do not point at real tag objects.
pub fn tags_for_version(
    repo: &dyn Repository,
    module_name: &str,
    business_version: &str,
) -> Result<Vec<AnnotatedReleaseTag>> {
    let mut names = repo.list_tags()?;
    // Listing order is oldest-first; "most recently created wins" is the only
    // precision callers may assume after this reverse.
    names.reverse();

    let prefix = format!("{}-{}", module_name, business_version);
    let mut results = Vec::new();
    for name in names {
        if build_number_of(&prefix, &name).is_none() {
            continue;
        }
        if let Some(info) = repo.find_annotated_tag(&name)? {
            results.push(AnnotatedReleaseTag::from_existing(&info));
        }
    }
    Ok(results)
}

/// The single newest tag belonging to a module, regardless of version.
///
/// Used when build numbers are disabled and "has this version been released"
/// is decided by plain name collision.
pub fn latest_tag_for_module(
    repo: &dyn Repository,
    module_name: &str,
) -> Result<Option<AnnotatedReleaseTag>> {
    let mut names = repo.list_tags()?;
    names.reverse();

    // Anchor the whole name so everything after `<module>-` must be a dotted
    // numeric version; a bare prefix check would also accept sibling modules
    // such as `app-web-1.0` when looking for `app`.
    let pattern = format!("^{}-\\d+(?:\\.\\d+)*$", regex::escape(module_name));
    let re = regex::Regex::new(&pattern).map_err(|e| {
        crate::error::ReleaseError::detection(format!("invalid tag pattern: {}", e))
    })?;
    for name in names {
        if !re.is_match(strip_ref_prefix(&name)) {
            continue;
        }
        if let Some(info) = repo.find_annotated_tag(&name)? {
            return Ok(Some(AnnotatedReleaseTag::from_existing(&info)));
        }
    }
    Ok(None)
}

/// Parse the build number out of a tag name of the form
/// `<prefix>.<integer>`, where the prefix is `<module>-<businessVersion>`.
///
/// Returns `None` for names outside the family or with non-numeric suffixes.
pub fn build_number_of(prefix: &str, ref_name: &str) -> Option<u64> {
    let tag_name = strip_ref_prefix(ref_name);
    let pattern = format!("^{}\\.(\\d+)$", regex::escape(prefix));
    let re = regex::Regex::new(&pattern).ok()?;
    re.captures(tag_name)?.get(1)?.as_str().parse().ok()
}
