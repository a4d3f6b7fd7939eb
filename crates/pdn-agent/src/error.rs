//! Error types for the agent.

use thiserror::Error;

use pdn_agent_core::CoreError;
use pdn_agent_perms::PermsError;
use pdn_agent_store::StoreError;
use pdn_agent_sync::SyncError;

/// Errors that can occur during agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Sync engine error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Core primitive error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Permission error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
