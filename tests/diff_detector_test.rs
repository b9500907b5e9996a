// tests/diff_detector_test.rs
//
// Change detection against real git repositories, plus the git2-backed
// repository operations the detector relies on.

use std::fs;
use std::path::Path;

use git2::Repository as GitRepo;
use tempfile::TempDir;

use multi_release::diff_detector::has_changed_since;
use multi_release::domain::AnnotatedReleaseTag;
use multi_release::git::{Git2Repository, Repository, TagInfo};

fn setup_test_repo() -> (TempDir, GitRepo) {
    let temp_dir = TempDir::new().expect("Could not create temp dir");
    let repo = GitRepo::init(temp_dir.path()).expect("Could not init git repo");
    {
        let mut config = repo.config().expect("Could not get config");
        config
            .set_str("user.name", "Test User")
            .expect("Could not set user.name");
        config
            .set_str("user.email", "test@example.com")
            .expect("Could not set user.email");
    }
    (temp_dir, repo)
}

fn commit_files(repo: &GitRepo, base: &Path, files: &[(&str, &str)], message: &str) -> git2::Oid {
    for (relative, content) in files {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Could not create dirs");
        }
        fs::write(&path, content).expect("Could not write file");
    }

    let mut index = repo.index().expect("Could not get index");
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .expect("Could not add files");
    index.write().expect("Could not write index");

    let tree_id = index.write_tree().expect("Could not write tree");
    let tree = repo.find_tree(tree_id).expect("Could not find tree");
    let signature = repo.signature().expect("Could not get signature");

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .expect("Could not commit")
}

fn tag_commit(repo: &GitRepo, name: &str, target: git2::Oid, message: &str) -> AnnotatedReleaseTag {
    let object = repo.find_object(target, None).expect("Could not find commit");
    let signature = repo.signature().expect("Could not get signature");
    repo.tag(name, &object, &signature, message, false)
        .expect("Could not tag");

    AnnotatedReleaseTag::from_existing(&TagInfo {
        name: name.to_string(),
        target,
        message: message.to_string(),
    })
}

#[test]
fn test_module_unchanged_when_only_other_modules_move() {
    let (tmp, git) = setup_test_repo();
    let c1 = commit_files(&git, tmp.path(), &[("moduleA/x", "a1")], "first");
    let tag = tag_commit(&git, "moduleA-1.0.0", c1, "version = \"1.0\"\nbuildNumber = 0\n");
    commit_files(&git, tmp.path(), &[("moduleB/y", "b1")], "second");

    let repo = Git2Repository::open(tmp.path()).unwrap();
    assert!(!has_changed_since(&repo, "moduleA", &[], &[tag.clone()]).unwrap());
    // moduleB has no tags covering its commit, so it reads as changed
    let tag_b = tag_commit(&git, "moduleB-1.0.0", c1, "version = \"1.0\"\nbuildNumber = 0\n");
    assert!(has_changed_since(&repo, "moduleB", &[], &[tag_b]).unwrap());
}

#[test]
fn test_module_changed_after_new_commit() {
    let (tmp, git) = setup_test_repo();
    let c1 = commit_files(&git, tmp.path(), &[("moduleA/x", "a1")], "first");
    let tag = tag_commit(&git, "moduleA-1.0.0", c1, "version = \"1.0\"\nbuildNumber = 0\n");
    commit_files(&git, tmp.path(), &[("moduleB/y", "b1")], "second");
    commit_files(&git, tmp.path(), &[("moduleA/x", "a2")], "third");

    let repo = Git2Repository::open(tmp.path()).unwrap();
    assert!(has_changed_since(&repo, "moduleA", &[], &[tag]).unwrap());
}

#[test]
fn test_any_of_multiple_tags_acts_as_boundary() {
    let (tmp, git) = setup_test_repo();
    let c1 = commit_files(&git, tmp.path(), &[("moduleA/x", "a1")], "first");
    let old = tag_commit(&git, "moduleA-1.0.0", c1, "version = \"1.0\"\nbuildNumber = 0\n");
    let c2 = commit_files(&git, tmp.path(), &[("moduleA/x", "a2")], "second");
    let new = tag_commit(&git, "moduleA-1.0.1", c2, "version = \"1.0\"\nbuildNumber = 1\n");

    let repo = Git2Repository::open(tmp.path()).unwrap();
    // the newer tag covers everything even though the older one does not
    assert!(!has_changed_since(&repo, "moduleA", &[], &[new, old]).unwrap());
}

#[test]
fn test_child_module_commits_do_not_count_for_parent() {
    let (tmp, git) = setup_test_repo();
    let c1 = commit_files(&git, tmp.path(), &[("parent.txt", "p1")], "first");
    let tag = tag_commit(&git, "root-1.0.0", c1, "version = \"1.0\"\nbuildNumber = 0\n");
    commit_files(&git, tmp.path(), &[("childA/z", "z1")], "child change");

    let repo = Git2Repository::open(tmp.path()).unwrap();
    let children = vec!["childA".to_string()];
    assert!(!has_changed_since(&repo, ".", &children, &[tag.clone()]).unwrap());

    // a change outside the child still counts for the root
    commit_files(&git, tmp.path(), &[("parent.txt", "p2")], "root change");
    assert!(has_changed_since(&repo, ".", &children, &[tag]).unwrap());
}

#[test]
fn test_find_annotated_tag_resolves_commit_target() {
    let (tmp, git) = setup_test_repo();
    let c1 = commit_files(&git, tmp.path(), &[("a.txt", "1")], "first");
    tag_commit(&git, "core-1.0.0.0", c1, "version = \"1.0.0\"\nbuildNumber = 0\n");

    let repo = Git2Repository::open(tmp.path()).unwrap();
    assert!(repo.has_local_tag("core-1.0.0.0").unwrap());
    assert!(!repo.has_local_tag("core-9.9.9.9").unwrap());

    let info = repo.find_annotated_tag("core-1.0.0.0").unwrap().unwrap();
    assert_eq!(info.target, c1);
    assert!(info.message.contains("buildNumber = 0"));

    let tag = AnnotatedReleaseTag::from_existing(&info);
    assert_eq!(tag.version(), "1.0.0");
    assert_eq!(tag.build_number(), 0);
}

#[test]
fn test_lightweight_tag_is_skipped_by_find() {
    let (tmp, git) = setup_test_repo();
    let c1 = commit_files(&git, tmp.path(), &[("a.txt", "1")], "first");
    let object = git.find_object(c1, None).unwrap();
    git.tag_lightweight("just-a-pointer", &object, false).unwrap();

    let repo = Git2Repository::open(tmp.path()).unwrap();
    assert!(repo.has_local_tag("just-a-pointer").unwrap());
    assert!(repo.find_annotated_tag("just-a-pointer").unwrap().is_none());
}

#[test]
fn test_create_annotated_tag_round_trips() {
    let (tmp, git) = setup_test_repo();
    let head = commit_files(&git, tmp.path(), &[("a.txt", "1")], "first");

    let repo = Git2Repository::open(tmp.path()).unwrap();
    let mut tag = AnnotatedReleaseTag::create("core-1.2.3", "1.2", 3, true);
    tag.save_at_head(&repo).unwrap();

    let found = repo.find_annotated_tag("core-1.2.3").unwrap().unwrap();
    assert_eq!(found.target, head);
    let parsed = AnnotatedReleaseTag::from_existing(&found);
    assert_eq!(parsed.version(), "1.2");
    assert_eq!(parsed.build_number(), 3);
}

#[test]
fn test_is_clean_tracks_modified_files() {
    let (tmp, git) = setup_test_repo();
    commit_files(&git, tmp.path(), &[("a.txt", "1")], "first");

    let repo = Git2Repository::open(tmp.path()).unwrap();
    assert!(repo.is_clean().unwrap());

    fs::write(tmp.path().join("a.txt"), "2").unwrap();
    assert!(!repo.is_clean().unwrap());
}
