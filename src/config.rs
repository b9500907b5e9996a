use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ReleaseError, Result};
use crate::reactor::NoChangesAction;

/// Represents the complete configuration for multi-release.
///
/// Lists the modules taking part in the release and controls tagging, pushing
/// and downstream-build behavior.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Module directories relative to the release root, in build order
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_true")]
    pub push_tags: bool,

    /// Commit manifest rewrites instead of reverting them after the release
    #[serde(default)]
    pub commit_changes: bool,

    #[serde(default = "default_true")]
    pub use_build_number: bool,

    #[serde(default)]
    pub no_changes_action: NoChangesAction,

    /// Command spawned after tagging; skipped when `goals` is empty
    #[serde(default = "default_build_command")]
    pub build_command: String,

    #[serde(default)]
    pub goals: Vec<String>,
}

fn default_modules() -> Vec<String> {
    vec![".".to_string()]
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_build_command() -> String {
    "make".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            modules: default_modules(),
            remote: default_remote(),
            push_tags: true,
            commit_changes: false,
            use_build_number: true,
            no_changes_action: NoChangesAction::default(),
            build_command: default_build_command(),
            goals: Vec::new(),
        }
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `multirelease.toml` in current directory
/// 3. `.multirelease.toml` in user config directory
/// 4. Default configuration if no file found
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path)?
    } else if Path::new("./multirelease.toml").exists() {
        fs::read_to_string("./multirelease.toml")?
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join(".multirelease.toml");
        if config_path.exists() {
            fs::read_to_string(config_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    toml::from_str(&config_str).map_err(|e| ReleaseError::config(e.to_string()))
}
