use std::collections::HashMap;
use std::fmt;

use crate::namer::SNAPSHOT;

/// Identity of a module: group plus name, e.g. `com.acme:core`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId {
    pub group: String,
    pub name: String,
}

impl ModuleId {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        ModuleId {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// A reference from one module's manifest to another module or plugin.
///
/// The version may be absent (inherited) or a property-style indirection like
/// `${core.version}` that must be resolved against the module's properties
/// before it can be classified as snapshot or fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRef {
    pub group: String,
    pub name: String,
    pub version: Option<String>,
}

/// An in-memory module record read from a `module.toml` manifest.
///
/// Consumed read-only by the reactor; the manifest updater rewrites the
/// on-disk file, never this struct.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    /// Current manifest version, typically a `-SNAPSHOT` string before release
    pub version: String,
    pub dependencies: Vec<DependencyRef>,
    pub plugins: Vec<DependencyRef>,
    pub parent: Option<DependencyRef>,
    /// Names of nested child module directories, excluded from this module's
    /// change detection because they release independently
    pub children: Vec<String>,
    pub properties: HashMap<String, String>,
    /// Filesystem path of the module relative to the release root
    pub relative_path: String,
}

impl Module {
    /// Resolve a possibly property-style version reference (`${prop}`)
    /// against this module's properties. Unknown properties resolve to the
    /// reference itself, matching how an unresolvable value is later reported.
    pub fn resolve_version<'a>(&'a self, version: &'a str) -> &'a str {
        if let Some(key) = version.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
            return self.properties.get(key).map(String::as_str).unwrap_or(version);
        }
        version
    }

    /// The version string with the snapshot marker stripped
    pub fn business_version(&self) -> &str {
        self.version.strip_suffix(SNAPSHOT).unwrap_or(&self.version)
    }
}

/// Whether a version string carries the mutable "not yet released" marker
pub fn is_snapshot(version: &str) -> bool {
    version.ends_with(SNAPSHOT)
}
