//! Domain types - release bookkeeping shared by the reactor, tag finder and
//! manifest updater

pub mod module;
pub mod tag;
pub mod version_name;

pub use module::{is_snapshot, DependencyRef, Module, ModuleId};
pub use tag::{AnnotatedReleaseTag, TagMessage};
pub use version_name::VersionName;
