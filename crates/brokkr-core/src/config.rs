//! Installer configuration loading (brokkr.yaml)
//!
//! ```yaml
//! modules_dir: /opt/app/modules
//! repository_dir: /var/lib/brokkr/repository
//! journal_path: /var/lib/brokkr/journal.jsonl
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the module installer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Root directory holding per-module script trees from the code base
    pub modules_dir: PathBuf,

    /// Private repository root for archived uninstall scripts
    pub repository_dir: PathBuf,

    /// Optional append-only installation journal; disabled when absent
    pub journal_path: Option<PathBuf>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            modules_dir: PathBuf::from("modules"),
            repository_dir: PathBuf::from("module-repository"),
            journal_path: None,
        }
    }
}

impl InstallerConfig {
    /// Build a config rooted under a single base directory
    pub fn rooted(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            modules_dir: base.join("modules"),
            repository_dir: base.join("module-repository"),
            journal_path: Some(base.join("journal.jsonl")),
        }
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config_not_found(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml_ng::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.modules_dir.as_os_str().is_empty() {
            return Err(Error::invalid_config("modules_dir must not be empty"));
        }
        if self.repository_dir.as_os_str().is_empty() {
            return Err(Error::invalid_config("repository_dir must not be empty"));
        }
        Ok(())
    }
}
