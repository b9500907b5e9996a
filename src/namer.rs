//! Allocates release and post-release development versions for a module.

use crate::domain::VersionName;
use crate::error::{ReleaseError, Result};

/// Manifest version suffix marking a not-yet-released, mutable version
pub const SNAPSHOT: &str = "-SNAPSHOT";

/// Allocate the next version for a module whose releases carry build numbers.
///
/// The business version is the current manifest version with the snapshot
/// marker stripped; a version with no marker has its final numeric segment
/// incremented instead. The build number is the explicit one if supplied,
/// otherwise one more than the highest previously observed build number
/// (local or remote), otherwise `0`.
pub fn name(
    current_version: &str,
    explicit_build_number: Option<u64>,
    previous_build_numbers: &[u64],
) -> Result<VersionName> {
    let business = next_release_version(current_version)?;
    let build_number = match explicit_build_number {
        Some(n) => n,
        None => previous_build_numbers
            .iter()
            .max()
            .map(|max| max + 1)
            .unwrap_or(0),
    };
    let development = format!("{}{}", increment_last_segment(&business)?, SNAPSHOT);
    let version = VersionName::new(development, business, build_number);
    validate_release_version(&version.release_version())?;
    Ok(version)
}

/// Allocate the next version without a build number suffix.
///
/// The business version itself becomes the release version; whether it has
/// already been used is decided by tag-name collision at release time, not
/// here.
pub fn name_without_build_number(current_version: &str) -> Result<VersionName> {
    let business = next_release_version(current_version)?;
    let development = format!("{}{}", increment_last_segment(&business)?, SNAPSHOT);
    let version = VersionName::without_build_number(development, business);
    validate_release_version(&version.release_version())?;
    Ok(version)
}

fn next_release_version(current_version: &str) -> Result<String> {
    match current_version.strip_suffix(SNAPSHOT) {
        Some(stripped) => Ok(stripped.to_string()),
        None => increment_last_segment(current_version),
    }
}

fn increment_last_segment(version: &str) -> Result<String> {
    let mut segments: Vec<&str> = version.split('.').collect();
    let last = segments.pop().unwrap_or_default();
    let next: u64 = last.parse().map_err(|_| {
        let summary = format!(
            "Sorry, '{}' is not a valid version as it does not end with a number.",
            version
        );
        ReleaseError::validation(
            summary.clone(),
            vec![
                summary,
                "The next version is derived by incrementing the final segment of the current version.".to_string(),
                format!("Either use a {} version or end the version with a numeric segment.", SNAPSHOT),
            ],
        )
    })?;
    let mut result = segments.join(".");
    if !result.is_empty() {
        result.push('.');
    }
    result.push_str(&(next + 1).to_string());
    Ok(result)
}

fn validate_release_version(release_version: &str) -> Result<()> {
    if git2::Reference::is_valid_name(&format!("refs/tags/{}", release_version)) {
        return Ok(());
    }
    let summary = format!("Sorry, '{}' is not a valid version.", release_version);
    Err(ReleaseError::validation(
        summary.clone(),
        vec![
            summary,
            "Version numbers are used in the Git tag, and so can only contain characters that are valid in git tags.".to_string(),
            "Please see https://www.kernel.org/pub/software/scm/git/docs/git-check-ref-format.html for tag naming rules.".to_string(),
        ],
    ))
}
