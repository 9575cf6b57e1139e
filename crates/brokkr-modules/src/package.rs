//! Export-package import seam
//!
//! The binary format carrying a module's exported data is outside this
//! crate; the installer only requires that the import happens inside the
//! transaction it opened, so a failed import rolls back with everything
//! else.

use anyhow::Result;
use brokkr_core::ModuleVersionId;
use rusqlite::Transaction;

/// Applies a module's exported-data package to the store
pub trait PackageImporter: Send + Sync {
    /// Import the package for `module` inside the caller's transaction
    fn import(&self, tx: &Transaction<'_>, module: &ModuleVersionId) -> Result<()>;
}
