//! Finish actions: token and script-archive bookkeeping
//!
//! Finish actions run outside the store transaction because filesystem
//! changes cannot roll back with it. Both are idempotent and safe to re-run
//! after a crash at any point, which is what makes the warn-and-retry
//! policy in the installer sound.
//!
//! Token ordering is the crux. On install the token is written last: a
//! crash mid-archive leaves "no token", re-triggering repair. On uninstall
//! the token is removed first: a crash mid-delete leaves "no token, folder
//! maybe partially deleted", which also re-triggers repair.

use crate::layout::{ModuleFileLayout, ScriptKind};
use crate::registry::ModuleRegistry;
use anyhow::{Context, Result};
use brokkr_core::ModuleVersionId;
use std::fs;
use tracing::debug;

/// Archive the uninstall scripts to the repository folder, then write the token
pub fn finish_install(
    layout: &ModuleFileLayout,
    registry: &dyn ModuleRegistry,
    module: &ModuleVersionId,
) -> Result<()> {
    let folder = layout.repository_folder(module);
    fs::create_dir_all(&folder)
        .with_context(|| format!("Failed to create repository folder {:?}", folder))?;

    for kind in ScriptKind::UNINSTALL_KINDS {
        let original = layout.script_path(module, kind);
        if original.exists() {
            let archived = layout.archived_script_path(module, kind);
            fs::copy(&original, &archived).with_context(|| {
                format!("Failed to archive {} for module {}", kind.file_name(), module)
            })?;
        }
    }

    registry.create_token(module)?;
    debug!("Finish-install complete for module {}", module);
    Ok(())
}

/// Remove the token, then delete the repository folder
pub fn finish_uninstall(
    layout: &ModuleFileLayout,
    registry: &dyn ModuleRegistry,
    module: &ModuleVersionId,
) -> Result<()> {
    registry.remove_token(module)?;

    let folder = layout.repository_folder(module);
    if folder.exists() {
        fs::remove_dir_all(&folder)
            .with_context(|| format!("Failed to delete repository folder {:?}", folder))?;
    }

    debug!("Finish-uninstall complete for module {}", module);
    Ok(())
}
