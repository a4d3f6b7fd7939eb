//! Error types for the sync engine.

use std::time::Duration;

use thiserror::Error;

use pdn_agent_core::{CoreError, Did};
use pdn_agent_perms::PermsError;
use pdn_agent_store::StoreError;

use crate::transport::TransportError;

/// Errors that can occur during sync operations.
///
/// Per-job and per-peer failures (unreachable endpoints, missing grants,
/// rejected messages) are expected outcomes and never surface here; they
/// are reported through job outcomes instead. These variants cover the
/// failures that abort or refuse a pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Durable store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The local node failed an operation.
    #[error("node error: {0}")]
    Node(#[from] CoreError),

    /// Grant resolution failed where it cannot be isolated.
    #[error("permission error: {0}")]
    Perms(#[from] PermsError),

    /// Transport failed where it cannot be isolated.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A persisted queue key could not be decoded.
    #[error("malformed job key: {0}")]
    MalformedKey(String),

    /// A persisted JSON value could not be decoded.
    #[error("invalid persisted state: {0}")]
    Serialization(String),

    /// A sync pass was requested while one is in flight.
    #[error("a sync pass is already running")]
    AlreadyRunning,

    /// The in-flight pass did not finish within the stop budget.
    #[error("sync did not stop within {timeout:?}")]
    ShutdownTimeout {
        /// The budget that elapsed.
        timeout: Duration,
    },

    /// An operation referenced an identity that is not registered.
    #[error("identity not registered: {0}")]
    UnknownIdentity(Did),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
