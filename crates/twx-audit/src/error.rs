//! Error types for the audit crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting or loading artifacts.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Reading or writing an artifact file failed.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact could not be serialized, or a stored one could not be parsed.
    #[error("serialization error on {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AuditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AuditError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        AuditError::Serialization {
            path: path.into(),
            source,
        }
    }
}
