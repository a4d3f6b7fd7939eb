//! Grant types for delegated sync.
//!
//! A grant authorizes a delegate identity to perform one kind of node
//! operation on behalf of another identity, optionally scoped to a single
//! protocol. Grants are minted and stored by the permission subsystem;
//! this crate only models enough of them to attach grant IDs to requests.

use serde::{Deserialize, Serialize};
use std::fmt;

use pdn_agent_core::{Did, MessageKind};

/// Identifier of a permission-grant record, attached to delegated requests.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantId(String);

impl GrantId {
    /// Wrap a grant record identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrantId({})", self.0)
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a delegated request is asking to do, and for whom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantScope {
    /// The identity the operation targets.
    pub connected_did: Did,
    /// The identity acting on its behalf.
    pub delegate_did: Did,
    /// The node operation being authorized.
    pub message_kind: MessageKind,
    /// Protocol restriction, if the grant is protocol-scoped.
    pub protocol: Option<String>,
}

impl fmt::Display for GrantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} on {} as {} (protocol: {})",
            self.message_kind,
            self.connected_did,
            self.delegate_did,
            self.protocol.as_deref().unwrap_or("any"),
        )
    }
}

/// A resolved grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Grant record identifier.
    pub id: GrantId,
    /// The scope this grant covers.
    pub scope: GrantScope,
    /// When the grant expires (Unix ms), if it does.
    pub expires_at: Option<i64>,
}

impl Grant {
    /// Check whether the grant is still valid at `now` (Unix ms).
    pub fn is_valid(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires) => now <= expires,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> GrantScope {
        GrantScope {
            connected_did: Did::parse("did:dht:alice").unwrap(),
            delegate_did: Did::parse("did:dht:agent").unwrap(),
            message_kind: MessageKind::MessagesRead,
            protocol: Some("https://example.org/chat".into()),
        }
    }

    #[test]
    fn test_grant_without_expiry_always_valid() {
        let grant = Grant {
            id: GrantId::new("grant-1"),
            scope: scope(),
            expires_at: None,
        };
        assert!(grant.is_valid(i64::MAX));
    }

    #[test]
    fn test_grant_expiry() {
        let grant = Grant {
            id: GrantId::new("grant-1"),
            scope: scope(),
            expires_at: Some(1000),
        };
        assert!(grant.is_valid(999));
        assert!(grant.is_valid(1000));
        assert!(!grant.is_valid(1001));
    }
}
