//! Module lifecycle orchestration for Brokkr
//!
//! This crate handles:
//! - Reconciling code-base modules against the persistent store
//! - Install / update / uninstall lifecycles, one store transaction each
//! - Idempotent finish actions (uninstallation tokens and script archives)
//! - Deterministic script/repository file layout
//! - The append-only installation journal

pub mod events;
pub mod finish;
pub mod installer;
pub mod layout;
pub mod package;
pub mod registry;
pub mod script;

pub use events::{EventEnvelope, InstallationJournal, ModuleEvent};
pub use installer::ModuleInstaller;
pub use layout::{ModuleFileLayout, ScriptKind};
pub use package::PackageImporter;
pub use registry::ModuleRegistry;
pub use script::{ScriptParams, ScriptRunner, SqlScriptRunner};
