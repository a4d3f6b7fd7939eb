//! Error types for the core crate.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A DID string did not have the `did:method:id` shape.
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    /// Canonical encoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The local node rejected or failed an operation.
    #[error("node error: {0}")]
    Node(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
