use crate::error::Result;
use crate::git::{path_in_scope, TagInfo};
use git2::{Commit, Diff, Oid, Repository as Git2Repo};
use std::path::{Path, PathBuf};

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }

    /// The root of the working tree, if the repository is not bare
    pub fn workdir(&self) -> Option<PathBuf> {
        self.repo.workdir().map(Path::to_path_buf)
    }

    fn commit_touches(&self, commit: &Commit, scope: &str, excluded: &[String]) -> Result<bool> {
        let tree = commit.tree()?;

        if commit.parent_count() == 0 {
            let diff = self.repo.diff_tree_to_tree(None, Some(&tree), None)?;
            return Ok(diff_matches(&diff, scope, excluded));
        }

        // A commit counts only if its scoped tree differs from every parent;
        // a merge that carries one side's tree unchanged is not a change here.
        for parent in commit.parents() {
            let parent_tree = parent.tree()?;
            let diff = self
                .repo
                .diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)?;
            if !diff_matches(&diff, scope, excluded) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn diff_matches(diff: &Diff, scope: &str, excluded: &[String]) -> bool {
    diff.deltas().any(|delta| {
        [delta.old_file().path(), delta.new_file().path()]
            .into_iter()
            .flatten()
            .any(|path| path_in_scope(&path.to_string_lossy(), scope, excluded))
    })
}

impl super::Repository for Git2Repository {
    fn list_tags(&self) -> Result<Vec<String>> {
        let tags = self.repo.tag_names(None)?;

        Ok(tags.iter().flatten().map(|s| s.to_string()).collect())
    }

    fn has_local_tag(&self, tag_name: &str) -> Result<bool> {
        match self.repo.find_reference(&format!("refs/tags/{}", tag_name)) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn find_annotated_tag(&self, tag_name: &str) -> Result<Option<TagInfo>> {
        let reference = match self.repo.find_reference(&format!("refs/tags/{}", tag_name)) {
            Ok(reference) => reference,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Lightweight refs masquerading as tags are skipped, not fatal
        let tag = match reference.peel_to_tag() {
            Ok(tag) => tag,
            Err(_) => return Ok(None),
        };

        let target = tag.target()?.peel(git2::ObjectType::Commit)?.id();

        Ok(Some(TagInfo {
            name: tag_name.to_string(),
            target,
            message: tag.message().unwrap_or("").to_string(),
        }))
    }

    fn list_remote_tags(&self, remote: &str) -> Result<Vec<String>> {
        // No configured remote means there are no remote tags to collide
        // with; an unreachable remote is still an error.
        let mut remote = match self.repo.find_remote(remote) {
            Ok(remote) => remote,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        remote.connect(git2::Direction::Fetch)?;
        let names: Vec<String> = remote
            .list()?
            .iter()
            .map(|head| head.name().to_string())
            .filter(|name| name.starts_with("refs/tags/") && !name.ends_with("^{}"))
            .collect();
        remote.disconnect()?;

        Ok(names)
    }

    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<Oid> {
        let head = self.repo.head()?.peel_to_commit()?;
        let signature = self.repo.signature()?;

        let oid = self
            .repo
            .tag(name, head.as_object(), &signature, message, false)?;

        Ok(oid)
    }

    fn push_tag(&self, remote: &str, tag_name: &str) -> Result<()> {
        let mut remote = self.repo.find_remote(remote)?;

        let refspec = format!("refs/tags/{}:refs/tags/{}", tag_name, tag_name);

        remote.push(&[refspec.as_str()], None)?;

        Ok(())
    }

    fn has_commits_affecting(
        &self,
        scope: &str,
        excluded: &[String],
        boundaries: &[Oid],
    ) -> Result<bool> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        for boundary in boundaries {
            revwalk.hide(*boundary)?;
        }

        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            if self.commit_touches(&commit, scope, excluded)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_clean(&self) -> Result<bool> {
        let mut options = git2::StatusOptions::new();
        options.include_untracked(false);

        let statuses = self.repo.statuses(Some(&mut options))?;

        Ok(statuses.is_empty())
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let signature = self.repo.signature()?;
        let parent = self.repo.head()?.peel_to_commit()?;

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?;

        Ok(())
    }
}

// SAFETY: Git2Repository wraps git2::Repository which is Send.
// git2 is thread-safe for read operations via libgit2's thread-safe design,
// and this crate never shares a repository across threads anyway.
unsafe impl Sync for Git2Repository {}
