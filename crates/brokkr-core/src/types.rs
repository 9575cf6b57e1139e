//! Type definitions for module lifecycle reconciliation
//!
//! A module is a pluggable unit of functionality identified by name+version,
//! shipped with lifecycle scripts and a data-export package. The registry
//! answers "what differs between the code base and the store" as a five-way
//! diff (`ReconcileWork`), which the installer walks in a fixed order.

use crate::error::{Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable identifier of one installable unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleVersionId {
    pub name: String,
    pub version: Version,
}

impl ModuleVersionId {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse an identity from a name and a semver string
    pub fn parse(name: impl Into<String>, version: &str) -> Result<Self> {
        let version = Version::parse(version).map_err(|_| Error::invalid_version(version))?;
        Ok(Self::new(name, version))
    }

    /// Filesystem-safe `name-version` form, used for repository folders
    pub fn slug(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Display for ModuleVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A module the registry wants installed, with its restart-need signal
///
/// A module needs a process restart iff it carries loadable code; pure
/// data/content modules never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingModule {
    pub id: ModuleVersionId,
    pub carries_code: bool,
}

impl PendingModule {
    pub fn new(id: ModuleVersionId, carries_code: bool) -> Self {
        Self { id, carries_code }
    }
}

/// A version pair flagged for update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleUpdate {
    /// The version currently recorded as installed
    pub installed: ModuleVersionId,
    /// The version present in the code base that should replace it
    pub replacement: PendingModule,
}

/// Five-way desired-vs-installed diff computed by the module registry
#[derive(Debug, Clone, Default)]
pub struct ReconcileWork {
    /// Installed modules missing their uninstallation token
    pub missing_tokens: Vec<ModuleVersionId>,
    /// Modules present in the code base but not in the store
    pub to_install: Vec<PendingModule>,
    /// Version pairs where the code base carries a newer version
    pub to_update: Vec<ModuleUpdate>,
    /// Modules gone from the code base but still holding a token
    pub orphaned_tokens: Vec<ModuleVersionId>,
    /// Modules flagged for removal from the store
    pub to_uninstall: Vec<ModuleVersionId>,
}

impl ReconcileWork {
    /// True when a reconciliation pass would perform no operations
    pub fn is_empty(&self) -> bool {
        self.missing_tokens.is_empty()
            && self.to_install.is_empty()
            && self.to_update.is_empty()
            && self.orphaned_tokens.is_empty()
            && self.to_uninstall.is_empty()
    }
}

/// Lifecycle operation names carried by the typed error surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleOperation {
    Install,
    Update,
    Uninstall,
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Install => "INSTALL",
            Self::Update => "UPDATE",
            Self::Uninstall => "UNINSTALL",
        };
        f.write_str(s)
    }
}

/// Module state derived from {registry installed-flag, token presence}
///
/// These are the only four states a module can be observed in; the finish
/// actions exist precisely to move modules out of the two pending states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulePhase {
    /// Store commit succeeded, token not yet written; repaired next run
    PendingFinishInstall,
    /// Installed and tokened
    Installed,
    /// Token removed, repository folder may linger; repaired next run
    PendingFinishUninstall,
    /// Neither installed nor tokened
    Uninstalled,
}

impl ModulePhase {
    pub fn derive(installed: bool, has_token: bool) -> Self {
        match (installed, has_token) {
            (true, false) => Self::PendingFinishInstall,
            (true, true) => Self::Installed,
            (false, true) => Self::PendingFinishUninstall,
            (false, false) => Self::Uninstalled,
        }
    }
}
