//! Module registry seam
//!
//! The registry owns module discovery, the desired-vs-installed diff, the
//! durable per-module flags (installed, needs-restart, token-present) and
//! the uninstallation token ledger. Only its contract lives here; its
//! persisted representation is the registry implementation's business.

use anyhow::Result;
use brokkr_core::{ModuleVersionId, ReconcileWork};
use rusqlite::{Connection, Transaction};

/// Injected registry interface the installer depends on
pub trait ModuleRegistry: Send + Sync {
    /// Compute the current five-way desired-vs-installed diff
    fn pending_work(&self, conn: &Connection) -> Result<ReconcileWork>;

    /// Record `module` as installed with its restart-need flag
    ///
    /// Runs inside the installer's transaction. Replaces any prior version
    /// record for the same module name, so updates need no separate
    /// unregister call.
    fn mark_installed(
        &self,
        tx: &Transaction<'_>,
        module: &ModuleVersionId,
        needs_restart: bool,
    ) -> Result<()>;

    /// Delete all of the module's persisted data inside the transaction:
    /// its owned schema/class definitions, every object of every
    /// object-type it registered, then its own registry record
    fn purge_module(&self, tx: &Transaction<'_>, module: &ModuleVersionId) -> Result<()>;

    /// Whether exactly this name+version is recorded as installed
    fn is_installed(&self, conn: &Connection, module: &ModuleVersionId) -> Result<bool>;

    /// Create the uninstallation token for `module`
    ///
    /// The token is the durable proof that the module's rollback artifacts
    /// were archived; it is written last during finish-install.
    fn create_token(&self, module: &ModuleVersionId) -> Result<()>;

    /// Remove the uninstallation token; first step of finish-uninstall
    fn remove_token(&self, module: &ModuleVersionId) -> Result<()>;

    fn has_token(&self, module: &ModuleVersionId) -> Result<bool>;

    /// Enumerate every token currently held
    fn tokens(&self) -> Result<Vec<ModuleVersionId>>;

    /// Called once per process lifetime, on the first reconciliation run,
    /// so the registry can clear pending-restart markers
    fn notify_restarted(&self) -> Result<()>;
}
