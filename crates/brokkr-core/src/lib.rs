//! # brokkr-core
//!
//! Core library for the Brokkr module reconciler providing:
//! - Module version identities and the five-way reconciliation diff
//! - The typed lifecycle error surface
//! - Installer configuration loading (brokkr.yaml)

pub mod config;
pub mod error;
pub mod types;

pub use config::InstallerConfig;
pub use error::{Error, Result};
pub use types::{
    LifecycleOperation, ModulePhase, ModuleUpdate, ModuleVersionId, PendingModule, ReconcileWork,
};
