//! Script execution against the persistent store
//!
//! Lifecycle scripts run inside the transaction opened by the installer for
//! the surrounding operation, so a failing script rolls the whole operation
//! back. A missing script file is always a no-op: most modules ship only a
//! subset of the six lifecycle scripts.

use anyhow::{Context, Result};
use brokkr_core::ModuleVersionId;
use rusqlite::Transaction;
use semver::Version;
use std::path::Path;
use tracing::debug;

/// Parameters made available to lifecycle scripts
#[derive(Debug, Clone)]
pub struct ScriptParams {
    pub module: ModuleVersionId,
    /// Set during updates so before/after-update scripts can branch on it
    pub previous_version: Option<Version>,
    /// The user on whose behalf the installation runs
    pub user: Option<String>,
}

impl ScriptParams {
    pub fn new(module: &ModuleVersionId) -> Self {
        Self {
            module: module.clone(),
            previous_version: None,
            user: None,
        }
    }

    pub fn with_previous_version(mut self, version: Version) -> Self {
        self.previous_version = Some(version);
        self
    }

    pub fn with_user(mut self, user: Option<&str>) -> Self {
        self.user = user.map(|u| u.to_string());
        self
    }
}

/// Executes a script file against the store inside the caller's transaction
pub trait ScriptRunner: Send + Sync {
    /// Run the script at `script`, substituting `params`
    ///
    /// Must succeed as a no-op when the file is absent.
    fn run(&self, tx: &Transaction<'_>, script: &Path, params: &ScriptParams) -> Result<()>;
}

/// Built-in SQL runner: placeholder substitution plus batched execution
///
/// Placeholders: `{module_name}`, `{module_version}`, `{previous_version}`,
/// `{user}`. Anything richer belongs to an external `ScriptRunner`.
pub struct SqlScriptRunner;

impl ScriptRunner for SqlScriptRunner {
    fn run(&self, tx: &Transaction<'_>, script: &Path, params: &ScriptParams) -> Result<()> {
        if !script.exists() {
            debug!("No script at {:?}, skipping", script);
            return Ok(());
        }

        let sql = std::fs::read_to_string(script)
            .with_context(|| format!("Failed to read script: {}", script.display()))?;
        let sql = substitute(&sql, params);

        tx.execute_batch(&sql)
            .with_context(|| format!("Script failed: {}", script.display()))?;

        debug!("Executed script {:?} for module {}", script, params.module);
        Ok(())
    }
}

fn substitute(sql: &str, params: &ScriptParams) -> String {
    let mut out = sql
        .replace("{module_name}", &params.module.name)
        .replace("{module_version}", &params.module.version.to_string());
    if let Some(prev) = &params.previous_version {
        out = out.replace("{previous_version}", &prev.to_string());
    }
    if let Some(user) = &params.user {
        out = out.replace("{user}", user);
    }
    out
}
