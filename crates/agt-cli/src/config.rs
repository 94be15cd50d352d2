//! Optional per-repository configuration (`agt.yml`).
//!
//! ```yaml
//! base_branch: main
//! remote: origin
//! ```
//!
//! Every key is optional. Command-line arguments override the file, and the
//! file overrides the built-in defaults.

use std::io;
use std::path::{Path, PathBuf};

use agt_core::LifecycleSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File name looked up at the repository root.
pub const CONFIG_FILE_NAME: &str = "agt.yml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgtConfig {
    /// Base branch for `ws new` and `ws merge`.
    pub base_branch: Option<String>,

    /// Remote for `ws push` and `ws merge`.
    pub remote: Option<String>,
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AgtConfig {
    /// Loads the config for a repository.
    ///
    /// An `explicit` path must exist. Without one, `<repo_root>/agt.yml` is
    /// read when present and defaults are used otherwise.
    pub fn load(repo_root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = repo_root.join(CONFIG_FILE_NAME);
                if path.is_file() {
                    Self::from_file(&path)
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_yaml(&content)
    }

    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes to unit, not to an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        debug!(
            base_branch = ?config.base_branch,
            remote = ?config.remote,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Lifecycle defaults, with unset keys falling back to built-ins.
    pub fn settings(&self) -> LifecycleSettings {
        let defaults = LifecycleSettings::default();
        LifecycleSettings {
            base_branch: self.base_branch.clone().unwrap_or(defaults.base_branch),
            remote: self.remote.clone().unwrap_or(defaults.remote),
        }
    }
}
