//! Error types for the build state engine.

use crate::types::ResourceId;
use std::path::PathBuf;
use thiserror::Error;

/// Snapshot persistence errors. Always fatal to the build that hits them.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read build state from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write build state to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode build state: {0}")]
    Encode(String),

    #[error("Failed to decode build state from {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Unsupported build state version: {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Errors surfaced by [`crate::context::BuildContext`] operations.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid resource {path:?}: {reason}")]
    InvalidResource { path: PathBuf, reason: String },

    #[error("Resource is not registered with this build: {0}")]
    UnknownResource(ResourceId),

    #[error("Input must be processed before it can be changed: {0}")]
    NotProcessed(ResourceId),

    #[error("Build context is not open (state: {0})")]
    NotOpen(&'static str),

    #[error("Attribute '{key}' on {resource}: {reason}")]
    Attribute {
        resource: ResourceId,
        key: String,
        reason: String,
    },

    #[error("Output I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),
}

impl BuildError {
    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BuildError::InvalidResource {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for BuildError {
    fn from(err: config::ConfigError) -> Self {
        BuildError::Config(err.to_string())
    }
}
