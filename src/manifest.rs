//! Loads `module.toml` manifests and rewrites versions in them around a
//! release, with a compensating log so every change can be undone.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml_edit::{value, DocumentMut, Item, Table};

use crate::domain::{is_snapshot, DependencyRef, Module, ModuleId};
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::reactor::{Reactor, ReleasableModule};

pub const MANIFEST_FILE: &str = "module.toml";

/// Identity of this tool; a snapshot plugin reference to it is allowed while
/// any other snapshot plugin blocks the release.
const TOOL_GROUP: &str = "io.multirelease";
const TOOL_NAME: &str = "multi-release";

#[derive(Debug, Deserialize)]
struct ManifestFile {
    module: ModuleSection,
    parent: Option<RefSection>,
    #[serde(default)]
    dependencies: Vec<RefSection>,
    #[serde(default)]
    plugins: Vec<RefSection>,
    #[serde(default)]
    properties: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ModuleSection {
    group: String,
    name: String,
    version: String,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RefSection {
    group: String,
    name: String,
    version: Option<String>,
}

impl RefSection {
    fn into_ref(self) -> DependencyRef {
        DependencyRef {
            group: self.group,
            name: self.name,
            version: self.version,
        }
    }
}

/// Read and parse the `module.toml` under `base_dir/relative_path`
pub fn load_module(base_dir: &Path, relative_path: &str) -> Result<Module> {
    let path = base_dir.join(relative_path).join(MANIFEST_FILE);
    let raw = fs::read_to_string(&path)?;
    let parsed: ManifestFile = toml::from_str(&raw)
        .map_err(|e| ReleaseError::manifest(format!("{}: {}", path.display(), e)))?;

    Ok(Module {
        id: ModuleId::new(parsed.module.group, parsed.module.name),
        version: parsed.module.version,
        dependencies: parsed
            .dependencies
            .into_iter()
            .map(RefSection::into_ref)
            .collect(),
        plugins: parsed.plugins.into_iter().map(RefSection::into_ref).collect(),
        parent: parsed.parent.map(RefSection::into_ref),
        children: parsed.module.children,
        properties: parsed.properties,
        relative_path: relative_path.to_string(),
    })
}

/// Which version the rewrite targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fixed release versions, snapshot references pinned
    Release,
    /// Next development versions
    Development,
}

/// One applied manifest mutation, remembered so it can be undone
struct ChangedManifest {
    path: PathBuf,
    original: String,
}

/// Outcome of one rewrite pass.
///
/// Dependency errors are aggregated across all modules so the operator sees
/// every offending reference at once; a fatal error stops the pass early.
pub struct UpdateResult {
    pub changed: Vec<PathBuf>,
    pub dependency_errors: Vec<String>,
    pub fatal: Option<ReleaseError>,
}

impl UpdateResult {
    pub fn success(&self) -> bool {
        self.dependency_errors.is_empty() && self.fatal.is_none()
    }
}

/// Rewrites manifests for the released modules and keeps the compensating
/// log needed to restore them afterwards.
pub struct ManifestUpdater {
    changes: Vec<ChangedManifest>,
    commit_changes: bool,
}

impl ManifestUpdater {
    pub fn new(commit_changes: bool) -> Self {
        ManifestUpdater {
            changes: Vec::new(),
            commit_changes,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Rewrite the manifest of every module that will be released.
    ///
    /// Snapshot dependency and parent references are pinned to the version
    /// decided by the reactor; references to modules outside the reactor are
    /// collected as dependency errors rather than failing fast.
    pub fn update_versions(
        &mut self,
        reactor: &Reactor,
        base_dir: &Path,
        phase: Phase,
    ) -> UpdateResult {
        let mut result = UpdateResult {
            changed: Vec::new(),
            dependency_errors: Vec::new(),
            fatal: None,
        };

        for released in reactor.modules_in_build_order() {
            if !released.will_be_released() {
                continue;
            }
            if let Err(e) = self.update_one(released, reactor, base_dir, phase, &mut result) {
                result.fatal = Some(e);
                break;
            }
        }
        result
    }

    fn update_one(
        &mut self,
        released: &ReleasableModule,
        reactor: &Reactor,
        base_dir: &Path,
        phase: Phase,
        result: &mut UpdateResult,
    ) -> Result<()> {
        let module = released.module();
        let path = base_dir.join(&module.relative_path).join(MANIFEST_FILE);
        let original = fs::read_to_string(&path)?;
        let mut doc: DocumentMut = original
            .parse()
            .map_err(|e| ReleaseError::manifest(format!("{}: {}", path.display(), e)))?;

        let target_version = match phase {
            Phase::Release => released.new_version(),
            Phase::Development => released.development_version().to_string(),
        };
        doc["module"]["version"] = value(target_version.as_str());

        if let Some(parent) = doc.get_mut("parent").and_then(Item::as_table_mut) {
            pin_reference(parent, module, reactor, &mut result.dependency_errors, |m, g, n, v| {
                format!("The parent of {} is {}:{} {}", m, g, n, v)
            });
        }

        if let Some(deps) = doc
            .get_mut("dependencies")
            .and_then(Item::as_array_of_tables_mut)
        {
            for dep in deps.iter_mut() {
                pin_reference(dep, module, reactor, &mut result.dependency_errors, |m, g, n, v| {
                    format!("{} references dependency {}:{} {}", m, g, n, v)
                });
            }
        }

        if let Some(plugins) = doc
            .get_mut("plugins")
            .and_then(Item::as_array_of_tables_mut)
        {
            for plugin in plugins.iter_mut() {
                flag_snapshot_plugin(plugin, module, &mut result.dependency_errors);
            }
        }

        let rewritten = doc.to_string();
        if rewritten != original {
            // Original content goes into the log before the file is touched,
            // so a half-applied pass is always fully reversible.
            self.changes.push(ChangedManifest {
                path: path.clone(),
                original,
            });
            fs::write(&path, rewritten)?;
            result.changed.push(path);

            if phase == Phase::Release && self.commit_changes {
                released.repo().commit_all(&format!(
                    "Releasing {} {}",
                    module.id.name,
                    released.new_version()
                ))?;
            }
        }
        Ok(())
    }

    /// Undo every applied change, newest first.
    ///
    /// Failures are collected and reported together as a revert error; the
    /// log is cleared either way, there is nothing more this process can do
    /// with entries whose files refuse to be written.
    pub fn rollback(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for change in self.changes.iter().rev() {
            if let Err(e) = fs::write(&change.path, &change.original) {
                failures.push(format!("{}: {}", change.path.display(), e));
            }
        }
        self.changes.clear();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ReleaseError::revert(failures.join("; ")))
        }
    }
}

/// Pin one snapshot reference table (parent or dependency entry) to the
/// version the reactor decided for the referenced module. Non-snapshot
/// references are left untouched.
fn pin_reference(
    table: &mut Table,
    module: &Module,
    reactor: &Reactor,
    errors: &mut Vec<String>,
    describe: impl Fn(&str, &str, &str, &str) -> String,
) {
    let group = match table.get("group").and_then(Item::as_str) {
        Some(g) => g.to_string(),
        None => return,
    };
    let name = match table.get("name").and_then(Item::as_str) {
        Some(n) => n.to_string(),
        None => return,
    };
    let raw = match table.get("version").and_then(Item::as_str) {
        Some(v) => v.to_string(),
        None => return,
    };

    let resolved = module.resolve_version(&raw).to_string();
    if !is_snapshot(&resolved) {
        return;
    }

    match reactor.find(&group, &name) {
        Some(referenced) => {
            table["version"] = value(referenced.version_to_depend_on());
        }
        None => errors.push(describe(&module.id.name, &group, &name, &resolved)),
    }
}

fn flag_snapshot_plugin(table: &Table, module: &Module, errors: &mut Vec<String>) {
    let group = table.get("group").and_then(Item::as_str).unwrap_or_default();
    let name = table.get("name").and_then(Item::as_str).unwrap_or_default();
    let raw = match table.get("version").and_then(Item::as_str) {
        Some(v) => v.to_string(),
        None => return,
    };

    let resolved = module.resolve_version(&raw);
    if is_snapshot(resolved) && !(group == TOOL_GROUP && name == TOOL_NAME) {
        errors.push(format!(
            "{} references plugin {}:{} {}",
            module.id.name, group, name, resolved
        ));
    }
}
