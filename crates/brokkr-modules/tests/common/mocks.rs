//! Fake collaborators for installer tests
//!
//! `FakeRegistry` keeps installed records, tokens, and the desired module
//! set in memory and derives the five-way diff from them, so tests can
//! construct any crash state directly. `RecordingImporter` writes real rows
//! through the installer's transaction and records every invocation.

use anyhow::{bail, Result};
use brokkr_core::{ModuleUpdate, ModuleVersionId, PendingModule, ReconcileWork};
use brokkr_modules::{ModuleRegistry, PackageImporter};
use rusqlite::{Connection, Transaction};
use semver::Version;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct InstalledRecord {
    version: Version,
    needs_restart: bool,
}

#[derive(Default)]
struct RegistryState {
    /// Installed records keyed by module name
    installed: HashMap<String, InstalledRecord>,
    tokens: HashSet<ModuleVersionId>,
    /// Modules present in the "code base"
    desired: Vec<PendingModule>,
    restart_notifications: u32,
    purged: Vec<ModuleVersionId>,
    fail_token_creation: bool,
}

/// In-memory registry deriving the diff from its own state
#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<RegistryState>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -- test state setup --------------------------------------------------

    pub fn add_desired(&self, module: PendingModule) {
        self.state.lock().unwrap().desired.push(module);
    }

    pub fn remove_desired(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .desired
            .retain(|p| p.id.name != name);
    }

    pub fn clear_desired(&self) {
        self.state.lock().unwrap().desired.clear();
    }

    pub fn set_installed(&self, module: &ModuleVersionId, needs_restart: bool) {
        self.state.lock().unwrap().installed.insert(
            module.name.clone(),
            InstalledRecord {
                version: module.version.clone(),
                needs_restart,
            },
        );
    }

    pub fn add_token(&self, module: &ModuleVersionId) {
        self.state.lock().unwrap().tokens.insert(module.clone());
    }

    pub fn set_fail_token_creation(&self, fail: bool) {
        self.state.lock().unwrap().fail_token_creation = fail;
    }

    // -- test assertions ---------------------------------------------------

    pub fn installed_version(&self, name: &str) -> Option<Version> {
        self.state
            .lock()
            .unwrap()
            .installed
            .get(name)
            .map(|r| r.version.clone())
    }

    pub fn restart_notifications(&self) -> u32 {
        self.state.lock().unwrap().restart_notifications
    }

    pub fn purged(&self) -> Vec<ModuleVersionId> {
        self.state.lock().unwrap().purged.clone()
    }

    pub fn token_count(&self) -> usize {
        self.state.lock().unwrap().tokens.len()
    }
}

impl ModuleRegistry for FakeRegistry {
    fn pending_work(&self, _conn: &Connection) -> Result<ReconcileWork> {
        let state = self.state.lock().unwrap();
        let mut work = ReconcileWork::default();

        // 1. Installed modules missing their token
        for (name, rec) in &state.installed {
            let id = ModuleVersionId::new(name.clone(), rec.version.clone());
            if !state.tokens.contains(&id) {
                work.missing_tokens.push(id);
            }
        }
        work.missing_tokens.sort_by(|a, b| a.name.cmp(&b.name));

        // 2 & 3. New modules and version pairs to update
        for pending in &state.desired {
            match state.installed.get(&pending.id.name) {
                None => work.to_install.push(pending.clone()),
                Some(rec) if rec.version != pending.id.version => {
                    work.to_update.push(ModuleUpdate {
                        installed: ModuleVersionId::new(pending.id.name.clone(), rec.version.clone()),
                        replacement: pending.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        // 4. Tokens whose exact version is neither installed nor desired
        for token in &state.tokens {
            let still_installed = state
                .installed
                .get(&token.name)
                .map(|r| r.version == token.version)
                .unwrap_or(false);
            let still_desired = state.desired.iter().any(|p| p.id == *token);
            if !still_installed && !still_desired {
                work.orphaned_tokens.push(token.clone());
            }
        }
        work.orphaned_tokens.sort_by(|a, b| a.name.cmp(&b.name));

        // 5. Installed modules gone from the code base
        for (name, rec) in &state.installed {
            if !state.desired.iter().any(|p| p.id.name == *name) {
                work.to_uninstall
                    .push(ModuleVersionId::new(name.clone(), rec.version.clone()));
            }
        }
        work.to_uninstall.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(work)
    }

    fn mark_installed(
        &self,
        _tx: &Transaction<'_>,
        module: &ModuleVersionId,
        needs_restart: bool,
    ) -> Result<()> {
        self.set_installed(module, needs_restart);
        Ok(())
    }

    fn purge_module(&self, tx: &Transaction<'_>, module: &ModuleVersionId) -> Result<()> {
        // Delete the module's data through the installer's transaction so
        // a rollback takes the purge with it
        tx.execute(
            "DELETE FROM module_data WHERE module = ?1",
            [&module.name],
        )?;

        let mut state = self.state.lock().unwrap();
        state.installed.remove(&module.name);
        state.purged.push(module.clone());
        Ok(())
    }

    fn is_installed(&self, _conn: &Connection, module: &ModuleVersionId) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .installed
            .get(&module.name)
            .map(|r| r.version == module.version)
            .unwrap_or(false))
    }

    fn create_token(&self, module: &ModuleVersionId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_token_creation {
            bail!("token store unavailable");
        }
        state.tokens.insert(module.clone());
        Ok(())
    }

    fn remove_token(&self, module: &ModuleVersionId) -> Result<()> {
        self.state.lock().unwrap().tokens.remove(module);
        Ok(())
    }

    fn has_token(&self, module: &ModuleVersionId) -> Result<bool> {
        Ok(self.state.lock().unwrap().tokens.contains(module))
    }

    fn tokens(&self) -> Result<Vec<ModuleVersionId>> {
        let mut tokens: Vec<_> = self.state.lock().unwrap().tokens.iter().cloned().collect();
        tokens.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tokens)
    }

    fn notify_restarted(&self) -> Result<()> {
        self.state.lock().unwrap().restart_notifications += 1;
        Ok(())
    }
}

/// Importer that inserts one row per import through the caller's transaction
#[derive(Default)]
pub struct RecordingImporter {
    imports: Mutex<Vec<ModuleVersionId>>,
}

impl RecordingImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import_count(&self, name: &str) -> usize {
        self.imports
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.name == name)
            .count()
    }

    pub fn total_imports(&self) -> usize {
        self.imports.lock().unwrap().len()
    }
}

impl PackageImporter for RecordingImporter {
    fn import(&self, tx: &Transaction<'_>, module: &ModuleVersionId) -> Result<()> {
        tx.execute(
            "INSERT INTO module_data (module, payload) VALUES (?1, ?2)",
            rusqlite::params![module.name, format!("export-{}", module.version)],
        )?;
        self.imports.lock().unwrap().push(module.clone());
        Ok(())
    }
}
