//! Decides, in build order, which modules need a release and which can keep
//! pointing at a previously released version.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diff_detector;
use crate::domain::{AnnotatedReleaseTag, Module, VersionName};
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::namer;
use crate::tag_finder;

/// What to do when no module has changed since the last release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoChangesAction {
    /// Skip the release entirely
    #[default]
    ReleaseNone,
    /// Fail the run with an error
    FailBuild,
    /// Re-release every module with a fresh version
    ReleaseAll,
}

/// Why a module ended up in (or out of) the release set
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseReason {
    Forced,
    DependencyChanged(String),
    FirstRelease,
    ContentChanged,
    Unchanged,
    NoChangesPolicy,
}

impl fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseReason::Forced => write!(f, "forced release was requested"),
            ReleaseReason::DependencyChanged(name) => write!(f, "{} has changed", name),
            ReleaseReason::FirstRelease => write!(f, "it has not been released before"),
            ReleaseReason::ContentChanged => write!(f, "it has changed since the last release"),
            ReleaseReason::Unchanged => write!(f, "it has not changed since that release"),
            ReleaseReason::NoChangesPolicy => {
                write!(f, "nothing changed and the policy is to re-release everything")
            }
        }
    }
}

/// Per-module working metadata for one release run.
///
/// The reactor consumes the module and repository read-only; the release
/// orchestration mutates the rest as phases complete.
pub struct ModuleInfo {
    pub module: Module,
    pub repo: Arc<dyn Repository>,
    /// The module's path relative to its repository's working tree root
    /// (`"."` when the module is the repository root)
    pub scope: String,
    pub proposed_tag: Option<AnnotatedReleaseTag>,
    pub changed_manifest: Option<PathBuf>,
    pub has_reverted: bool,
}

impl fmt::Debug for ModuleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInfo")
            .field("module", &self.module)
            .field("scope", &self.scope)
            .field("proposed_tag", &self.proposed_tag)
            .field("changed_manifest", &self.changed_manifest)
            .field("has_reverted", &self.has_reverted)
            .finish_non_exhaustive()
    }
}

impl ModuleInfo {
    pub fn new(module: Module, repo: Arc<dyn Repository>, scope: impl Into<String>) -> Self {
        ModuleInfo {
            module,
            repo,
            scope: scope.into(),
            proposed_tag: None,
            changed_manifest: None,
            has_reverted: false,
        }
    }
}

/// Inputs that shape one reactor run
#[derive(Debug, Clone)]
pub struct ReactorOptions {
    /// Explicit build number to use instead of allocating the next one
    pub build_number: Option<u64>,
    /// Module names released unconditionally
    pub force_release: Vec<String>,
    pub no_changes_action: NoChangesAction,
    pub use_build_number: bool,
    /// Remote whose tag namespace also feeds the known build numbers
    pub remote: String,
}

impl Default for ReactorOptions {
    fn default() -> Self {
        ReactorOptions {
            build_number: None,
            force_release: Vec::new(),
            no_changes_action: NoChangesAction::default(),
            use_build_number: true,
            remote: "origin".to_string(),
        }
    }
}

/// A per-module release decision.
///
/// Immutable once created; the only derived transform is
/// [forced_release_clone](ReleasableModule::forced_release_clone), used when
/// the no-changes policy forces a full re-release.
#[derive(Clone)]
pub struct ReleasableModule {
    module: Module,
    repo: Arc<dyn Repository>,
    version: VersionName,
    equivalent_version: Option<String>,
    tag_name: String,
    reason: ReleaseReason,
}

impl fmt::Debug for ReleasableModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleasableModule")
            .field("module", &self.module)
            .field("version", &self.version)
            .field("equivalent_version", &self.equivalent_version)
            .field("tag_name", &self.tag_name)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl ReleasableModule {
    fn new(
        module: Module,
        repo: Arc<dyn Repository>,
        version: VersionName,
        equivalent_version: Option<String>,
        reason: ReleaseReason,
    ) -> Self {
        let tag_name = format!("{}-{}", module.id.name, version.release_version());
        ReleasableModule {
            module,
            repo,
            version,
            equivalent_version,
            tag_name,
            reason,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn repo(&self) -> &dyn Repository {
        self.repo.as_ref()
    }

    pub fn group(&self) -> &str {
        &self.module.id.group
    }

    pub fn name(&self) -> &str {
        &self.module.id.name
    }

    pub fn will_be_released(&self) -> bool {
        self.equivalent_version.is_none()
    }

    /// The freshly allocated release version
    pub fn new_version(&self) -> String {
        self.version.release_version()
    }

    pub fn business_version(&self) -> &str {
        self.version.business_version()
    }

    pub fn development_version(&self) -> &str {
        self.version.development_version()
    }

    pub fn build_number(&self) -> u64 {
        self.version.build_number()
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn reason(&self) -> &ReleaseReason {
        &self.reason
    }

    pub fn equivalent_version(&self) -> Option<&str> {
        self.equivalent_version.as_deref()
    }

    /// The version other modules should reference: the new release version if
    /// this module is released, otherwise the equivalent previous version.
    pub fn version_to_depend_on(&self) -> String {
        match &self.equivalent_version {
            Some(equivalent) => equivalent.clone(),
            None => self.version.release_version(),
        }
    }

    /// A copy of this decision with the equivalent version shed, turning an
    /// unchanged module into a fresh release
    pub fn forced_release_clone(&self) -> Self {
        ReleasableModule {
            module: self.module.clone(),
            repo: self.repo.clone(),
            version: self.version.clone(),
            equivalent_version: None,
            tag_name: self.tag_name.clone(),
            reason: ReleaseReason::NoChangesPolicy,
        }
    }
}

/// The ordered outcome of the release decision pass.
///
/// Decisions live in build order, so every module's dependencies appear
/// before it; the propagation rule relies on that.
#[derive(Debug)]
pub struct Reactor {
    modules: Vec<ReleasableModule>,
}

impl Reactor {
    /// Evaluate every module once, in build order.
    ///
    /// Returns `Ok(None)` when nothing changed and the policy is
    /// [NoChangesAction::ReleaseNone].
    pub fn from_modules(infos: &[ModuleInfo], opts: &ReactorOptions) -> Result<Option<Reactor>> {
        let mut modules: Vec<ReleasableModule> = Vec::new();

        for info in infos {
            let module = &info.module;
            let name = module.id.name.as_str();
            let business = module.business_version();

            let previous_tags = if opts.use_build_number {
                tag_finder::tags_for_version(info.repo.as_ref(), name, business)?
            } else {
                tag_finder::latest_tag_for_module(info.repo.as_ref(), name)?
                    .into_iter()
                    .collect()
            };

            let version = if opts.use_build_number {
                // Local and remote tag sets can disagree; the union keeps a
                // fresh build number from colliding with either side.
                let mut known: Vec<u64> =
                    previous_tags.iter().map(|tag| tag.build_number()).collect();
                known.extend(remote_build_numbers(
                    info.repo.as_ref(),
                    &opts.remote,
                    name,
                    business,
                )?);
                namer::name(&module.version, opts.build_number, &known)?
            } else {
                namer::name_without_build_number(&module.version)?
            };

            let changed_dependency = first_released_dependency(&modules, module);

            let (equivalent_version, reason) = if opts.force_release.iter().any(|m| m.as_str() == name) {
                (None, ReleaseReason::Forced)
            } else if let Some(dependency) = changed_dependency {
                (None, ReleaseReason::DependencyChanged(dependency))
            } else if previous_tags.is_empty() {
                (None, ReleaseReason::FirstRelease)
            } else {
                let changed = diff_detector::has_changed_since(
                    info.repo.as_ref(),
                    &info.scope,
                    &module.children,
                    &previous_tags,
                )
                .map_err(|e| {
                    ReleaseError::detection(format!(
                        "error while detecting whether {} has changed since the last release: {}",
                        name, e
                    ))
                })?;
                if changed {
                    (None, ReleaseReason::ContentChanged)
                } else {
                    let previous = tag_with_highest_build_number(&previous_tags);
                    let equivalent = if opts.use_build_number {
                        format!("{}.{}", previous.version(), previous.build_number())
                    } else {
                        previous.version().to_string()
                    };
                    (Some(equivalent), ReleaseReason::Unchanged)
                }
            };

            modules.push(ReleasableModule::new(
                module.clone(),
                info.repo.clone(),
                version,
                equivalent_version,
                reason,
            ));
        }

        if !modules.iter().any(ReleasableModule::will_be_released) {
            match opts.no_changes_action {
                NoChangesAction::ReleaseNone => return Ok(None),
                NoChangesAction::FailBuild => {
                    return Err(ReleaseError::validation(
                        "No module changes have been detected",
                        vec![
                            "No module changes have been detected".to_string(),
                            "Commit a change, force a module release, or configure the no-changes action to release_all.".to_string(),
                        ],
                    ));
                }
                NoChangesAction::ReleaseAll => {
                    modules = modules
                        .iter()
                        .map(ReleasableModule::forced_release_clone)
                        .collect();
                }
            }
        }

        Ok(Some(Reactor { modules }))
    }

    /// Decisions in build order
    pub fn modules_in_build_order(&self) -> &[ReleasableModule] {
        &self.modules
    }

    /// Look up a decision by module identity
    pub fn find(&self, group: &str, name: &str) -> Option<&ReleasableModule> {
        self.modules
            .iter()
            .find(|m| m.group() == group && m.name() == name)
    }
}

/// The first already-decided released module that the given module depends on
/// (directly or as its parent). First match wins; build order makes the rule
/// transitive without any graph traversal.
fn first_released_dependency(decided: &[ReleasableModule], module: &Module) -> Option<String> {
    for candidate in decided {
        if !candidate.will_be_released() {
            continue;
        }
        let hit = module
            .dependencies
            .iter()
            .any(|dep| dep.group == candidate.group() && dep.name == candidate.name())
            || module.parent.as_ref().is_some_and(|parent| {
                parent.group == candidate.group() && parent.name == candidate.name()
            });
        if hit {
            return Some(candidate.name().to_string());
        }
    }
    None
}

/// Build numbers already used by tags pushed to the remote for this module's
/// business version
fn remote_build_numbers(
    repo: &dyn Repository,
    remote: &str,
    module_name: &str,
    business_version: &str,
) -> Result<Vec<u64>> {
    let prefix = format!("{}-{}", module_name, business_version);
    Ok(repo
        .list_remote_tags(remote)?
        .iter()
        .filter_map(|ref_name| tag_finder::build_number_of(&prefix, ref_name))
        .collect())
}

/// Highest build number wins; on a tie the earliest in input order is kept,
/// which makes the choice deterministic for any given listing.
fn tag_with_highest_build_number(tags: &[AnnotatedReleaseTag]) -> &AnnotatedReleaseTag {
    let mut best = &tags[0];
    for tag in &tags[1..] {
        if tag.build_number() > best.build_number() {
            best = tag;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencyRef, ModuleId};
    use crate::git::MockRepository;
    use std::collections::HashMap;

    fn module(name: &str, version: &str) -> Module {
        Module {
            id: ModuleId::new("com.acme", name),
            version: version.to_string(),
            dependencies: vec![],
            plugins: vec![],
            parent: None,
            children: vec![],
            properties: HashMap::new(),
            relative_path: name.to_string(),
        }
    }

    fn depends_on(mut module: Module, group: &str, name: &str) -> Module {
        module.dependencies.push(DependencyRef {
            group: group.to_string(),
            name: name.to_string(),
            version: Some("${ignored}".to_string()),
        });
        module
    }

    fn info(module: Module, repo: MockRepository) -> ModuleInfo {
        ModuleInfo::new(module, Arc::new(repo), ".")
    }

    #[test]
    fn test_first_release_when_no_previous_tags() {
        let mut repo = MockRepository::new();
        repo.add_commit(&["src/lib.rs"]);

        let infos = vec![info(module("core", "1.0.0-SNAPSHOT"), repo)];
        let reactor = Reactor::from_modules(&infos, &ReactorOptions::default())
            .unwrap()
            .unwrap();

        let core = &reactor.modules_in_build_order()[0];
        assert!(core.will_be_released());
        assert_eq!(core.new_version(), "1.0.0.0");
        assert_eq!(core.tag_name(), "core-1.0.0.0");
        assert_eq!(*core.reason(), ReleaseReason::FirstRelease);
    }

    #[test]
    fn test_unchanged_module_keeps_equivalent_version() {
        let mut repo = MockRepository::new();
        let c1 = repo.add_commit(&["src/lib.rs"]);
        repo.add_annotated_tag("core-1.0.0.0", c1, "version = \"1.0.0\"\nbuildNumber = 0\n");

        let infos = vec![info(module("core", "1.0.0-SNAPSHOT"), repo)];
        let result = Reactor::from_modules(&infos, &ReactorOptions::default()).unwrap();

        // the only module is unchanged, so the default policy skips the run
        assert!(result.is_none());
    }

    #[test]
    fn test_unchanged_module_equivalent_version_format() {
        let mut repo = MockRepository::new();
        let c1 = repo.add_commit(&["core/src/lib.rs"]);
        repo.add_annotated_tag("core-1.0.0.2", c1, "version = \"1.0.0\"\nbuildNumber = 2\n");
        let mut app_repo = MockRepository::new();
        app_repo.add_commit(&["src/main.rs"]);

        let infos = vec![
            info(module("core", "1.0.0-SNAPSHOT"), repo),
            info(module("app", "1.0.0-SNAPSHOT"), app_repo),
        ];
        let reactor = Reactor::from_modules(&infos, &ReactorOptions::default())
            .unwrap()
            .unwrap();

        let core = reactor.find("com.acme", "core").unwrap();
        assert!(!core.will_be_released());
        assert_eq!(core.equivalent_version(), Some("1.0.0.2"));
        assert_eq!(core.version_to_depend_on(), "1.0.0.2");
        assert_eq!(*core.reason(), ReleaseReason::Unchanged);

        // app had no tags, so it is released regardless
        assert!(reactor.find("com.acme", "app").unwrap().will_be_released());
    }

    #[test]
    fn test_highest_build_number_wins_for_equivalent_version() {
        let mut repo = MockRepository::new();
        let c1 = repo.add_commit(&["src/lib.rs"]);
        repo.add_annotated_tag("core-1.0.0.5", c1, "version = \"1.0.0\"\nbuildNumber = 5\n");
        repo.add_annotated_tag("core-1.0.0.1", c1, "version = \"1.0.0\"\nbuildNumber = 1\n");

        let mut other = MockRepository::new();
        other.add_commit(&["x"]);

        let infos = vec![
            info(module("core", "1.0.0-SNAPSHOT"), repo),
            info(module("fresh", "1.0.0-SNAPSHOT"), other),
        ];
        let reactor = Reactor::from_modules(&infos, &ReactorOptions::default())
            .unwrap()
            .unwrap();

        let core = reactor.find("com.acme", "core").unwrap();
        assert_eq!(core.equivalent_version(), Some("1.0.0.5"));
        // next build number is past every known one
        assert_eq!(core.build_number(), 6);
    }

    #[test]
    fn test_dependency_propagation_forces_release() {
        let mut core_repo = MockRepository::new();
        core_repo.add_commit(&["src/lib.rs"]);

        let mut app_repo = MockRepository::new();
        let c1 = app_repo.add_commit(&["src/main.rs"]);
        app_repo.add_annotated_tag("app-1.0.0.0", c1, "version = \"1.0.0\"\nbuildNumber = 0\n");

        let app = depends_on(module("app", "1.0.0-SNAPSHOT"), "com.acme", "core");
        let infos = vec![
            info(module("core", "1.0.0-SNAPSHOT"), core_repo),
            info(app, app_repo),
        ];
        let opts = ReactorOptions {
            force_release: vec!["core".to_string()],
            ..ReactorOptions::default()
        };
        let reactor = Reactor::from_modules(&infos, &opts).unwrap().unwrap();

        let core = reactor.find("com.acme", "core").unwrap();
        assert_eq!(*core.reason(), ReleaseReason::Forced);

        let app = reactor.find("com.acme", "app").unwrap();
        assert!(app.will_be_released());
        assert_eq!(
            *app.reason(),
            ReleaseReason::DependencyChanged("core".to_string())
        );
    }

    #[test]
    fn test_parent_propagation_is_treated_like_a_dependency() {
        let mut parent_repo = MockRepository::new();
        parent_repo.add_commit(&["module.toml"]);

        let mut child_repo = MockRepository::new();
        let c1 = child_repo.add_commit(&["src/lib.rs"]);
        child_repo.add_annotated_tag("child-1.0.0.0", c1, "version = \"1.0.0\"\nbuildNumber = 0\n");

        let mut child = module("child", "1.0.0-SNAPSHOT");
        child.parent = Some(DependencyRef {
            group: "com.acme".to_string(),
            name: "parent".to_string(),
            version: Some("1.0.0-SNAPSHOT".to_string()),
        });

        let infos = vec![
            info(module("parent", "1.0.0-SNAPSHOT"), parent_repo),
            info(child, child_repo),
        ];
        let reactor = Reactor::from_modules(&infos, &ReactorOptions::default())
            .unwrap()
            .unwrap();

        let child = reactor.find("com.acme", "child").unwrap();
        assert!(child.will_be_released());
        assert_eq!(
            *child.reason(),
            ReleaseReason::DependencyChanged("parent".to_string())
        );
    }

    #[test]
    fn test_unreleased_dependency_does_not_propagate() {
        let mut core_repo = MockRepository::new();
        let c1 = core_repo.add_commit(&["src/lib.rs"]);
        core_repo.add_annotated_tag("core-1.0.0.0", c1, "version = \"1.0.0\"\nbuildNumber = 0\n");

        let mut app_repo = MockRepository::new();
        let c1 = app_repo.add_commit(&["src/main.rs"]);
        app_repo.add_annotated_tag("app-1.0.0.0", c1, "version = \"1.0.0\"\nbuildNumber = 0\n");

        let app = depends_on(module("app", "1.0.0-SNAPSHOT"), "com.acme", "core");
        let infos = vec![
            info(module("core", "1.0.0-SNAPSHOT"), core_repo),
            info(app, app_repo),
        ];
        let opts = ReactorOptions {
            no_changes_action: NoChangesAction::FailBuild,
            ..ReactorOptions::default()
        };

        // neither module changed: propagation never fires and the run fails
        let err = Reactor::from_modules(&infos, &opts).unwrap_err();
        assert!(err.to_string().contains("No module changes"));
    }

    #[test]
    fn test_release_all_policy_sheds_equivalent_versions() {
        let mut repo = MockRepository::new();
        let c1 = repo.add_commit(&["src/lib.rs"]);
        repo.add_annotated_tag("core-1.0.0.0", c1, "version = \"1.0.0\"\nbuildNumber = 0\n");

        let infos = vec![info(module("core", "1.0.0-SNAPSHOT"), repo)];
        let opts = ReactorOptions {
            no_changes_action: NoChangesAction::ReleaseAll,
            ..ReactorOptions::default()
        };
        let reactor = Reactor::from_modules(&infos, &opts).unwrap().unwrap();

        for module in reactor.modules_in_build_order() {
            assert!(module.will_be_released());
            assert_eq!(module.equivalent_version(), None);
            assert_eq!(*module.reason(), ReleaseReason::NoChangesPolicy);
        }
    }

    #[test]
    fn test_remote_build_numbers_are_unioned() {
        let mut repo = MockRepository::new();
        repo.add_commit(&["src/lib.rs"]);
        // no local tags, but the remote already has build numbers 0..=4
        repo.add_remote_tag("refs/tags/core-1.0.0.4");
        repo.add_remote_tag("refs/tags/core-1.0.0.2");
        repo.add_remote_tag("refs/tags/unrelated-9.9.9.9");

        let infos = vec![info(module("core", "1.0.0-SNAPSHOT"), repo)];
        let reactor = Reactor::from_modules(&infos, &ReactorOptions::default())
            .unwrap()
            .unwrap();

        let core = &reactor.modules_in_build_order()[0];
        assert_eq!(core.build_number(), 5);
        assert_eq!(core.new_version(), "1.0.0.5");
    }

    #[test]
    fn test_without_build_number_mode() {
        let mut repo = MockRepository::new();
        repo.add_commit(&["src/lib.rs"]);

        let infos = vec![info(module("core", "1.0.0-SNAPSHOT"), repo)];
        let opts = ReactorOptions {
            use_build_number: false,
            ..ReactorOptions::default()
        };
        let reactor = Reactor::from_modules(&infos, &opts).unwrap().unwrap();

        let core = &reactor.modules_in_build_order()[0];
        assert_eq!(core.new_version(), "1.0.0");
        assert_eq!(core.tag_name(), "core-1.0.0");
    }

    #[test]
    fn test_find_by_identity() {
        let mut repo = MockRepository::new();
        repo.add_commit(&["src/lib.rs"]);

        let infos = vec![info(module("core", "1.0.0-SNAPSHOT"), repo)];
        let reactor = Reactor::from_modules(&infos, &ReactorOptions::default())
            .unwrap()
            .unwrap();

        assert!(reactor.find("com.acme", "core").is_some());
        assert!(reactor.find("com.acme", "nope").is_none());
        assert!(reactor.find("org.other", "core").is_none());
    }
}
