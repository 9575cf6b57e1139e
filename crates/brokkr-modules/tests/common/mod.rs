//! Shared test utilities
//!
//! Fakes and fixtures for exercising the installer without a real module
//! registry or export packages.

#![allow(dead_code)]

pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

use brokkr_modules::{ModuleInstaller, SqlScriptRunner};
use std::sync::Arc;

/// Installer wired to the fixture store, the fake registry, and the
/// recording importer, with the built-in SQL script runner
pub fn build_installer(
    fixture: &ModuleFixture,
    registry: &Arc<FakeRegistry>,
    importer: &Arc<RecordingImporter>,
) -> ModuleInstaller {
    ModuleInstaller::new(
        fixture.open_store(),
        registry.clone(),
        Arc::new(SqlScriptRunner),
        importer.clone(),
        fixture.layout.clone(),
    )
}
