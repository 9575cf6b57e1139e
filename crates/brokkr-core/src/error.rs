//! Error types for brokkr-core

use crate::types::{LifecycleOperation, ModuleVersionId};
use thiserror::Error;

/// Result type alias using brokkr-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Brokkr
///
/// Lifecycle failures carry the module identity and the operation that was
/// in flight; everything under a failed operation is wrapped as its cause.
#[derive(Error, Debug)]
pub enum Error {
    /// A module lifecycle operation failed and its transaction rolled back
    #[error("{operation} of module {name}@{version} failed")]
    Operation {
        name: String,
        version: String,
        operation: LifecycleOperation,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// Persistent store error
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid semver version
    #[error("Invalid version format: {version}")]
    InvalidVersion { version: String },
}

impl Error {
    /// Wrap a failure in the typed per-operation error
    pub fn operation(
        module: &ModuleVersionId,
        operation: LifecycleOperation,
        source: anyhow::Error,
    ) -> Self {
        Self::Operation {
            name: module.name.clone(),
            version: module.version.to_string(),
            operation,
            source,
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid version error
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }
}
