//! Error types for the perms module.

use thiserror::Error;

/// Errors that can occur during grant resolution.
#[derive(Debug, Error)]
pub enum PermsError {
    /// No grant authorizes the requested scope.
    #[error("no grant found for {0}")]
    GrantNotFound(String),

    /// A matching grant exists but is no longer valid.
    #[error("grant expired: {0}")]
    GrantExpired(String),

    /// The resolver backend failed.
    #[error("resolver error: {0}")]
    Resolver(String),
}

/// Result type for perms operations.
pub type Result<T> = std::result::Result<T, PermsError>;
