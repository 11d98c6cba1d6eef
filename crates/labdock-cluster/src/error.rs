//! Error types for cluster backends.

use thiserror::Error;

/// Cluster backend errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The referenced resource does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The resource already exists and could not be adopted.
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    /// The orchestrator API failed.
    #[error("backend error: {0}")]
    Backend(String),
}

impl ClusterError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Returns true for absent-resource errors, which idempotent paths
    /// (DELETE, BOOP) treat as success.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, ClusterError>;
