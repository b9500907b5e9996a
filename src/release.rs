//! Whole-run orchestration: gather modules, decide releases, rewrite
//! manifests, tag, build, and put everything back.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::config::Config;
use crate::domain::AnnotatedReleaseTag;
use crate::error::{ReleaseError, Result};
use crate::git::{Git2Repository, Repository};
use crate::manifest::{self, ManifestUpdater, Phase, MANIFEST_FILE};
use crate::reactor::{ModuleInfo, Reactor, ReactorOptions, ReleasableModule};
use crate::ui;

/// Runs the downstream build once the release versions are in place
pub trait BuildInvoker {
    fn run(&self, released: &[&ReleasableModule]) -> Result<()>;
}

/// Spawns the configured build command, exporting one
/// `RELEASE_VERSION_<NAME>` variable per released module.
pub struct ProcessBuildInvoker {
    command: String,
    goals: Vec<String>,
    working_dir: PathBuf,
}

impl ProcessBuildInvoker {
    pub fn new(command: impl Into<String>, goals: Vec<String>, working_dir: PathBuf) -> Self {
        ProcessBuildInvoker {
            command: command.into(),
            goals,
            working_dir,
        }
    }
}

impl BuildInvoker for ProcessBuildInvoker {
    fn run(&self, released: &[&ReleasableModule]) -> Result<()> {
        if self.goals.is_empty() {
            return Ok(());
        }

        let mut command = Command::new(&self.command);
        command.args(&self.goals).current_dir(&self.working_dir);
        for module in released {
            let key = format!(
                "RELEASE_VERSION_{}",
                module.name().to_uppercase().replace('-', "_")
            );
            command.env(key, module.new_version());
        }

        let status = command
            .status()
            .map_err(|e| ReleaseError::build(format!("could not start {}: {}", self.command, e)))?;
        if !status.success() {
            return Err(ReleaseError::build(format!(
                "{} {} exited with {}",
                self.command,
                self.goals.join(" "),
                status
            )));
        }
        Ok(())
    }
}

/// Build invoker that does nothing, for runs with no build step
pub struct NoopBuildInvoker;

impl BuildInvoker for NoopBuildInvoker {
    fn run(&self, _released: &[&ReleasableModule]) -> Result<()> {
        Ok(())
    }
}

/// Options for one release run
pub struct ReleaseOptions {
    pub reactor: ReactorOptions,
    pub push_tags: bool,
    pub commit_changes: bool,
    pub base_dir: PathBuf,
    /// When non-empty, only these modules are tagged and handed to the
    /// downstream build; other modules still take part in the decision pass
    /// and manifest rewrite so version references stay consistent.
    pub modules_to_release: Vec<String>,
}

impl ReleaseOptions {
    fn includes(&self, module_name: &str) -> bool {
        self.modules_to_release.is_empty()
            || self.modules_to_release.iter().any(|m| m == module_name)
    }
}

/// What a release run produced
#[derive(Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Nothing changed; no tags created
    NoChanges,
    /// Names of the tags created, in build order
    Released { tags: Vec<String> },
}

/// Load each configured module's manifest and open its repository.
///
/// A dirty working tree anywhere blocks the whole run up front, before any
/// repository is touched.
pub fn gather_modules(config: &Config, base_dir: &Path) -> Result<Vec<ModuleInfo>> {
    let mut infos = Vec::new();
    for relative in &config.modules {
        let module = manifest::load_module(base_dir, relative)?;
        let module_dir = base_dir.join(relative);
        let repo = Git2Repository::open(&module_dir)?;

        if !repo.is_clean()? {
            return Err(ReleaseError::validation(
                format!("Cannot release with uncommitted changes in {}", relative),
                vec![
                    format!(
                        "The repository of module {} has uncommitted changes.",
                        module.id.name
                    ),
                    "Commit or stash them and run the release again.".to_string(),
                ],
            ));
        }

        let scope = module_scope(&module_dir, &repo)?;
        infos.push(ModuleInfo::new(module, Arc::new(repo), scope));
    }
    Ok(infos)
}

/// The module directory relative to its repository's working tree, as the
/// history walk wants it. Modules sharing one repository get distinct scopes;
/// a module that is its repository's root gets `"."`.
fn module_scope(module_dir: &Path, repo: &Git2Repository) -> Result<String> {
    let workdir = match repo.workdir() {
        Some(dir) => dir,
        None => return Ok(".".to_string()),
    };
    let module_dir = module_dir.canonicalize()?;
    let workdir = workdir.canonicalize()?;
    Ok(match module_dir.strip_prefix(&workdir) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => ".".to_string(),
    })
}

/// Decide tag names for every released module and fail if any of them already
/// exists, locally or on the remote. All collisions are reported together.
fn figure_out_tags(
    reactor: &Reactor,
    infos: &mut [ModuleInfo],
    opts: &ReleaseOptions,
) -> Result<()> {
    let mut problems = Vec::new();

    for info in infos.iter_mut() {
        let decision = match reactor.find(&info.module.id.group, &info.module.id.name) {
            Some(decision) if decision.will_be_released() => decision,
            _ => continue,
        };
        if !opts.includes(&info.module.id.name) {
            continue;
        }
        let tag_name = decision.tag_name();

        if info.repo.has_local_tag(tag_name)? {
            problems.push(format!(
                "There is already a tag named {} in this repository.",
                tag_name
            ));
            problems.push("It is likely that this version has been released before.".to_string());
            problems.push("Please try incrementing the build number and trying again.".to_string());
            continue;
        }

        let remote_ref = format!("refs/tags/{}", tag_name);
        if info
            .repo
            .list_remote_tags(&opts.reactor.remote)?
            .iter()
            .any(|name| name == &remote_ref || name == tag_name)
        {
            problems.push(
                "Cannot release because there is already a tag with the same build number on the remote Git repo."
                    .to_string(),
            );
            problems.push(format!("The tag {} already exists on the remote.", tag_name));
            continue;
        }

        info.proposed_tag = Some(AnnotatedReleaseTag::create(
            tag_name,
            decision.business_version(),
            decision.build_number(),
            opts.reactor.use_build_number,
        ));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ReleaseError::validation(
            "Tag name collision detected",
            problems,
        ))
    }
}

/// Run a complete release.
///
/// Tags are created before the downstream build on purpose: if the build
/// fails, the tags still mark exactly what was attempted and the next run can
/// pick a fresh build number.
pub fn perform_release(
    infos: &mut [ModuleInfo],
    opts: &ReleaseOptions,
    invoker: &dyn BuildInvoker,
) -> Result<ReleaseOutcome> {
    let reactor = match Reactor::from_modules(infos, &opts.reactor)? {
        Some(reactor) => reactor,
        None => {
            ui::display_status("No module changes detected; nothing to release.");
            return Ok(ReleaseOutcome::NoChanges);
        }
    };
    ui::display_decisions(&reactor);

    figure_out_tags(&reactor, infos, opts)?;

    let mut updater = ManifestUpdater::new(opts.commit_changes);
    let result = updater.update_versions(&reactor, &opts.base_dir, Phase::Release);
    for path in &result.changed {
        mark_changed(infos, &opts.base_dir, path);
    }
    if !result.success() {
        let error = match result.fatal {
            Some(fatal) => fatal,
            None => {
                let mut messages =
                    vec!["Cannot release with references to snapshot dependencies".to_string()];
                messages.extend(result.dependency_errors);
                ReleaseError::validation(
                    "Cannot release with references to snapshot dependencies",
                    messages,
                )
            }
        };
        revert_or_warn(&mut updater, infos);
        return Err(error);
    }

    let run = tag_and_build(&reactor, infos, opts, invoker, &mut updater);

    match run {
        Ok(tags) => {
            if !opts.commit_changes {
                // The build succeeded; failing to restore the manifests now
                // is a real error, the working tree must not stay mangled.
                updater.rollback()?;
                for info in infos.iter_mut() {
                    info.has_reverted = true;
                }
            }
            for tag in &tags {
                ui::display_success(&format!("Released {}", tag));
            }
            Ok(ReleaseOutcome::Released { tags })
        }
        Err(error) => {
            revert_or_warn(&mut updater, infos);
            Err(error)
        }
    }
}

fn tag_and_build(
    reactor: &Reactor,
    infos: &mut [ModuleInfo],
    opts: &ReleaseOptions,
    invoker: &dyn BuildInvoker,
    updater: &mut ManifestUpdater,
) -> Result<Vec<String>> {
    let mut tags = Vec::new();
    for info in infos.iter_mut() {
        let repo = info.repo.clone();
        if let Some(tag) = info.proposed_tag.as_mut() {
            tag.save_at_head(repo.as_ref())?;
            if opts.push_tags {
                // A push failure keeps the local tag; the operator can push
                // it by hand once the remote is reachable again.
                if let Err(e) = repo.push_tag(&opts.reactor.remote, tag.name()) {
                    ui::display_warning(&format!(
                        "Could not push tag {}: {}. The tag exists locally; push it manually.",
                        tag.name(),
                        e
                    ));
                }
            }
            tags.push(tag.name().to_string());
        }
    }

    let development = updater.update_versions(reactor, &opts.base_dir, Phase::Development);
    for path in &development.changed {
        mark_changed(infos, &opts.base_dir, path);
    }
    if let Some(fatal) = development.fatal {
        return Err(fatal);
    }

    let released: Vec<&ReleasableModule> = reactor
        .modules_in_build_order()
        .iter()
        .filter(|m| m.will_be_released() && opts.includes(m.name()))
        .collect();
    invoker.run(&released)?;

    Ok(tags)
}

// The updater builds every changed path as base_dir/relative_path/manifest,
// so exact equality against the same construction is the right match; a
// suffix comparison would confuse modules like `core` and `lib/core`.
fn mark_changed(infos: &mut [ModuleInfo], base_dir: &Path, path: &Path) {
    for info in infos.iter_mut() {
        let manifest = base_dir
            .join(&info.module.relative_path)
            .join(MANIFEST_FILE);
        if manifest == path {
            info.changed_manifest = Some(path.to_path_buf());
        }
    }
}

/// Roll back on the failure path, where the revert outcome must not mask the
/// error that got us here.
fn revert_or_warn(updater: &mut ManifestUpdater, infos: &mut [ModuleInfo]) {
    match updater.rollback() {
        Ok(()) => {
            for info in infos.iter_mut() {
                info.has_reverted = true;
            }
        }
        Err(revert_error) => {
            ui::display_warning(&revert_error.to_string());
            ui::display_warning(
                "Some manifests may still contain release versions; restore them with git checkout.",
            );
        }
    }
}
