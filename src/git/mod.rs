//! Git operations abstraction layer
//!
//! This module provides a trait-based abstraction over the git operations the
//! release engine needs, allowing for multiple implementations including real
//! repositories and a mock implementation for testing.
//!
//! The primary abstraction is the [Repository] trait. The concrete
//! implementations are:
//!
//! - [repository::Git2Repository]: a real implementation using the `git2` crate
//! - [mock::MockRepository]: an in-memory implementation for testing
//!
//! Most code should depend on the [Repository] trait rather than concrete
//! implementations to enable easy testing and flexibility.

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::Result;
use git2::Oid;

/// An existing annotated tag: its short name, the commit it points at and its
/// raw message body.
#[derive(Debug, Clone, PartialEq)]
pub struct TagInfo {
    pub name: String,
    pub target: Oid,
    pub message: String,
}

/// Common git operation trait for abstraction
///
/// All methods are synchronous, blocking calls and implementors must be
/// `Send + Sync`. Implementations map underlying errors (like `git2::Error`)
/// to [crate::error::ReleaseError] variants.
pub trait Repository: Send + Sync {
    /// All local tag names, in listing order (oldest refs first)
    fn list_tags(&self) -> Result<Vec<String>>;

    /// Whether a local tag of any kind (annotated or lightweight) exists
    fn has_local_tag(&self, tag_name: &str) -> Result<bool>;

    /// Look up an annotated tag by short name.
    ///
    /// Returns `Ok(None)` for missing refs and for refs that do not point at
    /// a tag object (lightweight or corrupt refs are skipped, not fatal).
    fn find_annotated_tag(&self, tag_name: &str) -> Result<Option<TagInfo>>;

    /// Full ref names of all tags on the given remote
    fn list_remote_tags(&self, remote: &str) -> Result<Vec<String>>;

    /// Create an annotated tag at the current HEAD and return the tag oid
    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<Oid>;

    /// Push a single tag to the given remote
    fn push_tag(&self, remote: &str, tag_name: &str) -> Result<()>;

    /// Whether any commit reachable from HEAD, and not reachable from one of
    /// the boundary commits, touches a path inside `scope` (`"."` for the
    /// whole tree) that is not under one of the `excluded` paths.
    fn has_commits_affecting(
        &self,
        scope: &str,
        excluded: &[String],
        boundaries: &[Oid],
    ) -> Result<bool>;

    /// Whether the working tree has no uncommitted changes to tracked files
    fn is_clean(&self) -> Result<bool>;

    /// Stage all changes and commit them at HEAD
    fn commit_all(&self, message: &str) -> Result<()>;
}

/// Whether a repository-relative file path counts as part of a module's scope
/// after excluding its nested child modules.
pub(crate) fn path_in_scope(file: &str, scope: &str, excluded: &[String]) -> bool {
    fn under(file: &str, dir: &str) -> bool {
        file == dir || file.starts_with(&format!("{}/", dir))
    }
    if excluded.iter().any(|dir| under(file, dir)) {
        return false;
    }
    scope == "." || under(file, scope)
}
