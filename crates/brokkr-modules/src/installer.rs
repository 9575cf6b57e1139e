//! Module installation orchestration
//!
//! `ModuleInstaller` is the service that reconciles code-base modules
//! against the persistent store. One reconciliation pass walks the
//! registry's five-way diff in fixed order:
//!
//! 1. finish-install retry (installed modules missing their token)
//! 2. install
//! 3. update
//! 4. finish-uninstall retry (tokens for modules already gone)
//! 5. uninstall
//!
//! Each install/update/uninstall runs its store work inside exactly one
//! transaction; the finish actions run after commit and are best-effort,
//! retried on the next pass. The mutex around the store connection is also
//! the single global run lock: runs are serialized, never parallel.

use crate::events::{EventEnvelope, InstallationJournal, ModuleEvent};
use crate::finish;
use crate::layout::{ModuleFileLayout, ScriptKind};
use crate::package::PackageImporter;
use crate::registry::ModuleRegistry;
use crate::script::{ScriptParams, ScriptRunner};
use anyhow::Context;
use brokkr_core::{
    Error, LifecycleOperation, ModulePhase, ModuleUpdate, ModuleVersionId, PendingModule,
};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Consecutive finish-action failures for one module before the retry
/// warning escalates to an error
const FINISH_RETRY_ALERT_THRESHOLD: u32 = 3;

/// Drives module install / update / uninstall lifecycles
///
/// Construct one instance per process. `process_installation` blocks on the
/// run lock, so concurrent callers queue up rather than erroring.
pub struct ModuleInstaller {
    /// Store connection; its mutex doubles as the single global run lock
    store: Mutex<Connection>,
    registry: Arc<dyn ModuleRegistry>,
    scripts: Arc<dyn ScriptRunner>,
    importer: Arc<dyn PackageImporter>,
    layout: ModuleFileLayout,
    journal: Option<InstallationJournal>,
    /// Process-wide restart latch; set, never cleared
    restart_pending: AtomicBool,
    /// Whether the registry has been told this process (re)started
    restart_notified: AtomicBool,
    /// Consecutive finish-action failures per module, for alerting only
    finish_failures: Mutex<HashMap<ModuleVersionId, u32>>,
}

impl ModuleInstaller {
    pub fn new(
        store: Connection,
        registry: Arc<dyn ModuleRegistry>,
        scripts: Arc<dyn ScriptRunner>,
        importer: Arc<dyn PackageImporter>,
        layout: ModuleFileLayout,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            registry,
            scripts,
            importer,
            layout,
            journal: None,
            restart_pending: AtomicBool::new(false),
            restart_notified: AtomicBool::new(false),
            finish_failures: Mutex::new(HashMap::new()),
        }
    }

    /// Attach the append-only installation journal
    pub fn with_journal(mut self, journal: InstallationJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// One reconciliation pass
    ///
    /// Returns true only if every step completed. The first fatal error
    /// aborts the pass and is logged; the next call retries against a
    /// freshly computed diff, so completed work is not repeated.
    pub fn process_installation(&self, user: Option<&str>) -> bool {
        let mut guard = self.lock_store();
        let conn = &mut *guard;

        // First run of this process lifetime: let the registry clear its
        // pending-restart markers before the diff is computed
        if !self.restart_notified.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.registry.notify_restarted() {
                error!("Failed to notify registry of process restart: {:#}", e);
                self.restart_notified.store(false, Ordering::SeqCst);
                return false;
            }
        }

        match self.reconcile(conn, user) {
            Ok(()) => true,
            Err(e) => {
                error!("Reconciliation pass aborted: {:#}", e);
                false
            }
        }
    }

    fn reconcile(&self, conn: &mut Connection, user: Option<&str>) -> anyhow::Result<()> {
        let work = self
            .registry
            .pending_work(conn)
            .context("Failed to compute reconciliation diff")?;

        if work.is_empty() {
            debug!("No module work pending");
            return Ok(());
        }

        debug!(
            "Reconciling: {} token repairs, {} installs, {} updates, {} token cleanups, {} uninstalls",
            work.missing_tokens.len(),
            work.to_install.len(),
            work.to_update.len(),
            work.orphaned_tokens.len(),
            work.to_uninstall.len()
        );

        // 1. Repair a crash between install commit and token write
        for module in &work.missing_tokens {
            self.try_finish_install(module);
        }

        // 2. Install new modules
        for module in &work.to_install {
            self.install(conn, module, user)?;
        }

        // 3. Update version pairs
        for update in &work.to_update {
            self.update(conn, update, user)?;
        }

        // 4. Repair a crash between uninstall commit and cleanup
        for module in &work.orphaned_tokens {
            self.try_finish_uninstall(module);
        }

        // 5. Uninstall removed modules
        for module in &work.to_uninstall {
            self.uninstall(conn, module)?;
        }

        Ok(())
    }

    /// Destructive half of finish-uninstall for every token the registry
    /// holds, without checking the code base
    ///
    /// Used to force full re-installation after the store has been
    /// recreated. Still-present modules look uninstalled until the next
    /// reconciliation pass reinstalls them.
    pub fn reset_uninstallation_tokens(&self) -> anyhow::Result<()> {
        let _guard = self.lock_store();

        let tokens = self
            .registry
            .tokens()
            .context("Failed to enumerate uninstallation tokens")?;
        info!("Resetting {} uninstallation tokens", tokens.len());

        for module in tokens {
            finish::finish_uninstall(&self.layout, self.registry.as_ref(), &module)
                .with_context(|| format!("Failed to reset token for module {}", module))?;
            self.record_event(&module, ModuleEvent::TokenReset);
        }

        Ok(())
    }

    /// Derive a module's phase from the registry installed-flag and token
    pub fn module_phase(&self, module: &ModuleVersionId) -> anyhow::Result<ModulePhase> {
        let guard = self.lock_store();
        let installed = self.registry.is_installed(&guard, module)?;
        let has_token = self.registry.has_token(module)?;
        Ok(ModulePhase::derive(installed, has_token))
    }

    /// True once any module processed in this process lifetime needed a
    /// code reload; never resets
    pub fn restart_pending(&self) -> bool {
        self.restart_pending.load(Ordering::SeqCst)
    }

    fn install(
        &self,
        conn: &mut Connection,
        module: &PendingModule,
        user: Option<&str>,
    ) -> brokkr_core::Result<()> {
        let params = ScriptParams::new(&module.id).with_user(user);

        let result: anyhow::Result<()> = (|| {
            let tx = conn.transaction()?;
            self.scripts.run(
                &tx,
                &self.layout.script_path(&module.id, ScriptKind::BeforeInstall),
                &params,
            )?;
            self.importer.import(&tx, &module.id)?;
            self.scripts.run(
                &tx,
                &self.layout.script_path(&module.id, ScriptKind::AfterInstall),
                &params,
            )?;
            self.registry
                .mark_installed(&tx, &module.id, module.carries_code)?;
            tx.commit()?;
            Ok(())
        })();

        if let Err(source) = result {
            self.record_event(
                &module.id,
                ModuleEvent::InstallFailed {
                    error: format!("{:#}", source),
                },
            );
            return Err(Error::operation(
                &module.id,
                LifecycleOperation::Install,
                source,
            ));
        }

        // The store work is durable from here on; everything below is
        // repairable on a later pass
        self.try_finish_install(&module.id);
        if module.carries_code {
            self.restart_pending.store(true, Ordering::SeqCst);
        }

        info!(
            "Installed module {} (restart required: {})",
            module.id, module.carries_code
        );
        self.record_event(
            &module.id,
            ModuleEvent::InstallCompleted {
                restart_required: module.carries_code,
            },
        );
        Ok(())
    }

    fn update(
        &self,
        conn: &mut Connection,
        update: &ModuleUpdate,
        user: Option<&str>,
    ) -> brokkr_core::Result<()> {
        let new = &update.replacement;
        let params = ScriptParams::new(&new.id)
            .with_previous_version(update.installed.version.clone())
            .with_user(user);

        let result: anyhow::Result<()> = (|| {
            let tx = conn.transaction()?;
            self.scripts.run(
                &tx,
                &self.layout.script_path(&new.id, ScriptKind::BeforeUpdate),
                &params,
            )?;
            self.importer.import(&tx, &new.id)?;
            self.scripts.run(
                &tx,
                &self.layout.script_path(&new.id, ScriptKind::AfterUpdate),
                &params,
            )?;
            self.registry.mark_installed(&tx, &new.id, new.carries_code)?;
            tx.commit()?;
            Ok(())
        })();

        if let Err(source) = result {
            self.record_event(
                &new.id,
                ModuleEvent::UpdateFailed {
                    previous_version: update.installed.version.to_string(),
                    error: format!("{:#}", source),
                },
            );
            return Err(Error::operation(&new.id, LifecycleOperation::Update, source));
        }

        // The old version's artifacts are stale: retire them, then archive
        // the new version's
        self.try_finish_uninstall(&update.installed);
        self.try_finish_install(&new.id);
        if new.carries_code {
            self.restart_pending.store(true, Ordering::SeqCst);
        }

        info!(
            "Updated module {} from {} (restart required: {})",
            new.id, update.installed.version, new.carries_code
        );
        self.record_event(
            &new.id,
            ModuleEvent::UpdateCompleted {
                previous_version: update.installed.version.to_string(),
                restart_required: new.carries_code,
            },
        );
        Ok(())
    }

    fn uninstall(&self, conn: &mut Connection, module: &ModuleVersionId) -> brokkr_core::Result<()> {
        let params = ScriptParams::new(module);

        let result: anyhow::Result<()> = (|| {
            let tx = conn.transaction()?;
            // The original package may be gone; uninstall scripts run from
            // the repository copy
            self.scripts.run(
                &tx,
                &self
                    .layout
                    .archived_script_path(module, ScriptKind::BeforeUninstall),
                &params,
            )?;
            self.registry.purge_module(&tx, module)?;
            self.scripts.run(
                &tx,
                &self
                    .layout
                    .archived_script_path(module, ScriptKind::AfterUninstall),
                &params,
            )?;
            tx.commit()?;
            Ok(())
        })();

        if let Err(source) = result {
            self.record_event(
                module,
                ModuleEvent::UninstallFailed {
                    error: format!("{:#}", source),
                },
            );
            return Err(Error::operation(
                module,
                LifecycleOperation::Uninstall,
                source,
            ));
        }

        self.try_finish_uninstall(module);

        info!("Uninstalled module {}", module);
        self.record_event(module, ModuleEvent::UninstallCompleted);
        Ok(())
    }

    /// Best-effort finish-install: a failure must never fail the install
    /// itself, only defer to the next pass
    fn try_finish_install(&self, module: &ModuleVersionId) {
        match finish::finish_install(&self.layout, self.registry.as_ref(), module) {
            Ok(()) => self.clear_finish_failures(module),
            Err(e) => self.note_finish_failure(module, "finish-install", &e),
        }
    }

    /// Best-effort finish-uninstall, same warn-and-retry policy
    fn try_finish_uninstall(&self, module: &ModuleVersionId) {
        match finish::finish_uninstall(&self.layout, self.registry.as_ref(), module) {
            Ok(()) => self.clear_finish_failures(module),
            Err(e) => self.note_finish_failure(module, "finish-uninstall", &e),
        }
    }

    fn note_finish_failure(&self, module: &ModuleVersionId, action: &str, cause: &anyhow::Error) {
        let count = {
            let mut failures = self
                .finish_failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let count = failures.entry(module.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if count >= FINISH_RETRY_ALERT_THRESHOLD {
            error!(
                "{} for module {} has failed {} consecutive times, still retrying: {:#}",
                action, module, count, cause
            );
        } else {
            warn!(
                "{} for module {} failed, will retry on the next pass: {:#}",
                action, module, cause
            );
        }

        self.record_event(
            module,
            ModuleEvent::FinishActionDeferred {
                action: action.to_string(),
                error: format!("{:#}", cause),
            },
        );
    }

    fn clear_finish_failures(&self, module: &ModuleVersionId) {
        self.finish_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(module);
    }

    fn record_event(&self, module: &ModuleVersionId, event: ModuleEvent) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record(EventEnvelope::new(module, event)) {
                warn!("Failed to record journal event for module {}: {:#}", module, e);
            }
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock means an earlier pass panicked mid-run; the next
        // pass recomputes from a fresh diff, so the connection is reusable
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
