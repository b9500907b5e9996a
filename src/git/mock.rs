use crate::error::Result;
use crate::git::{path_in_scope, Repository, TagInfo};
use git2::Oid;
use std::sync::Mutex;

/// A single commit in the mock repository's linear history
#[derive(Debug, Clone)]
struct MockCommit {
    oid: Oid,
    /// Repository-relative paths touched by this commit
    touched: Vec<String>,
}

/// Stored tag: name, target and message body for annotated tags
#[derive(Debug, Clone)]
struct MockTag {
    name: String,
    target: Oid,
    message: Option<String>,
}

/// Mock repository for testing without actual git operations.
///
/// History is a single linear chain of commits, oldest first; tags are kept
/// in insertion order so that "reverse the listing" means newest-first, the
/// same assumption the tag finder makes about real listings.
pub struct MockRepository {
    commits: Vec<MockCommit>,
    tags: Vec<MockTag>,
    remote_tags: Vec<String>,
    clean: bool,
    created_tags: Mutex<Vec<(String, String)>>,
    pushed_tags: Mutex<Vec<String>>,
}

impl MockRepository {
    /// Create a new empty mock repository
    pub fn new() -> Self {
        MockRepository {
            commits: Vec::new(),
            tags: Vec::new(),
            remote_tags: Vec::new(),
            clean: true,
            created_tags: Mutex::new(Vec::new()),
            pushed_tags: Mutex::new(Vec::new()),
        }
    }

    /// Append a commit touching the given paths; returns its oid
    pub fn add_commit(&mut self, touched: &[&str]) -> Oid {
        let n = self.commits.len() as u8 + 1;
        let oid = Oid::from_bytes(&[n; 20]).expect("valid oid bytes");
        self.commits.push(MockCommit {
            oid,
            touched: touched.iter().map(|s| s.to_string()).collect(),
        });
        oid
    }

    /// Add an annotated tag with a structured or free-text message body
    pub fn add_annotated_tag(&mut self, name: impl Into<String>, target: Oid, message: &str) {
        self.tags.push(MockTag {
            name: name.into(),
            target,
            message: Some(message.to_string()),
        });
    }

    /// Add a lightweight tag, which the finder must skip
    pub fn add_lightweight_tag(&mut self, name: impl Into<String>, target: Oid) {
        self.tags.push(MockTag {
            name: name.into(),
            target,
            message: None,
        });
    }

    /// Add a tag name visible on the remote (full ref name or short name)
    pub fn add_remote_tag(&mut self, name: impl Into<String>) {
        self.remote_tags.push(name.into());
    }

    pub fn set_clean(&mut self, clean: bool) {
        self.clean = clean;
    }

    /// Names and messages of tags created through the trait
    pub fn created_tags(&self) -> Vec<(String, String)> {
        self.created_tags.lock().expect("mock lock").clone()
    }

    /// Names of tags pushed through the trait
    pub fn pushed_tags(&self) -> Vec<String> {
        self.pushed_tags.lock().expect("mock lock").clone()
    }

    fn head(&self) -> Oid {
        self.commits
            .last()
            .map(|c| c.oid)
            .unwrap_or_else(Oid::zero)
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MockRepository {
    fn list_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.iter().map(|t| t.name.clone()).collect())
    }

    fn has_local_tag(&self, tag_name: &str) -> Result<bool> {
        Ok(self.tags.iter().any(|t| t.name == tag_name))
    }

    fn find_annotated_tag(&self, tag_name: &str) -> Result<Option<TagInfo>> {
        Ok(self
            .tags
            .iter()
            .find(|t| t.name == tag_name)
            .and_then(|t| {
                t.message.as_ref().map(|message| TagInfo {
                    name: t.name.clone(),
                    target: t.target,
                    message: message.clone(),
                })
            }))
    }

    fn list_remote_tags(&self, _remote: &str) -> Result<Vec<String>> {
        Ok(self.remote_tags.clone())
    }

    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<Oid> {
        self.created_tags
            .lock()
            .expect("mock lock")
            .push((name.to_string(), message.to_string()));
        Ok(self.head())
    }

    fn push_tag(&self, _remote: &str, tag_name: &str) -> Result<()> {
        self.pushed_tags
            .lock()
            .expect("mock lock")
            .push(tag_name.to_string());
        Ok(())
    }

    fn has_commits_affecting(
        &self,
        scope: &str,
        excluded: &[String],
        boundaries: &[Oid],
    ) -> Result<bool> {
        // Linear history: everything at or before a boundary is dominated
        for commit in self.commits.iter().rev() {
            if boundaries.contains(&commit.oid) {
                break;
            }
            if commit
                .touched
                .iter()
                .any(|path| path_in_scope(path, scope, excluded))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.clean)
    }

    fn commit_all(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}
