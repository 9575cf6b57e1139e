//! Deterministic file layout for module lifecycle scripts
//!
//! Original scripts live under the code base at
//! `<modules>/<name>/<version>/scripts/<kind>.sql`. The private repository
//! keeps durable copies of the uninstall scripts under
//! `<repository>/<name>-<version>/`, for use once the original package may
//! be gone.

use brokkr_core::{InstallerConfig, ModuleVersionId};
use std::path::{Path, PathBuf};

/// Lifecycle script kinds, one file per kind in a module's scripts folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    BeforeInstall,
    AfterInstall,
    BeforeUpdate,
    AfterUpdate,
    BeforeUninstall,
    AfterUninstall,
}

impl ScriptKind {
    /// The two kinds archived to the repository folder on finish-install
    pub const UNINSTALL_KINDS: [ScriptKind; 2] = [Self::BeforeUninstall, Self::AfterUninstall];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::BeforeInstall => "before-install.sql",
            Self::AfterInstall => "after-install.sql",
            Self::BeforeUpdate => "before-update.sql",
            Self::AfterUpdate => "after-update.sql",
            Self::BeforeUninstall => "before-uninstall.sql",
            Self::AfterUninstall => "after-uninstall.sql",
        }
    }
}

/// Path resolver for original scripts and the private repository
#[derive(Debug, Clone)]
pub struct ModuleFileLayout {
    modules_dir: PathBuf,
    repository_dir: PathBuf,
}

impl ModuleFileLayout {
    pub fn new(modules_dir: impl Into<PathBuf>, repository_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
            repository_dir: repository_dir.into(),
        }
    }

    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(&config.modules_dir, &config.repository_dir)
    }

    /// Original script path inside the code base
    pub fn script_path(&self, module: &ModuleVersionId, kind: ScriptKind) -> PathBuf {
        self.modules_dir
            .join(&module.name)
            .join(module.version.to_string())
            .join("scripts")
            .join(kind.file_name())
    }

    /// Per module-version repository folder holding archived uninstall scripts
    pub fn repository_folder(&self, module: &ModuleVersionId) -> PathBuf {
        self.repository_dir.join(module.slug())
    }

    /// Archived copy of an uninstall script inside the repository folder
    pub fn archived_script_path(&self, module: &ModuleVersionId, kind: ScriptKind) -> PathBuf {
        self.repository_folder(module).join(kind.file_name())
    }

    pub fn repository_dir(&self) -> &Path {
        &self.repository_dir
    }
}
