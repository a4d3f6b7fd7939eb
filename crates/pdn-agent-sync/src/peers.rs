//! Peer discovery.
//!
//! Each pass recomputes the set of sync targets from scratch: registered
//! identities × resolved service endpoints × protocol scopes, each paired
//! with its persisted cursor. Nothing here is persisted.

use pdn_agent_core::{Cursor, Did, SyncDirection};

use crate::error::Result;
use crate::state::{CursorStore, IdentityStore};
use crate::transport::EndpointResolver;

/// One sync target for the current pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPeerState {
    /// The identity being synchronized.
    pub did: Did,
    /// Delegate acting on its behalf, if configured.
    pub delegate_did: Option<Did>,
    /// Remote node endpoint.
    pub dwn_url: String,
    /// Protocol scope, if the identity is protocol-scoped.
    pub protocol: Option<String>,
    /// Continuation cursor from the previous pass, if any.
    pub cursor: Option<Cursor>,
}

/// Derive the sync targets for one pass.
///
/// Identities whose DID document publishes no node endpoint are silently
/// skipped: they are not remotely syncable yet, which is not an error.
/// Resolution failures likewise skip only the affected identity.
pub(crate) async fn discover_peers(
    identities: &IdentityStore,
    cursors: &CursorStore,
    resolver: &dyn EndpointResolver,
    direction: SyncDirection,
) -> Result<Vec<SyncPeerState>> {
    let mut peers = Vec::new();

    for (did, options) in identities.list().await? {
        let urls = match resolver.resolve_service_endpoints(&did).await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!(did = %did, error = %e, "DID resolution failed, skipping identity this pass");
                continue;
            }
        };
        if urls.is_empty() {
            tracing::debug!(did = %did, "no published node endpoint, skipping identity");
            continue;
        }

        let scopes: Vec<Option<String>> = if options.protocols.is_empty() {
            vec![None]
        } else {
            options.protocols.iter().cloned().map(Some).collect()
        };

        for url in &urls {
            for protocol in &scopes {
                let cursor = cursors
                    .get(&did, url, direction, protocol.as_deref())
                    .await?;
                peers.push(SyncPeerState {
                    did: did.clone(),
                    delegate_did: options.delegate_did.clone(),
                    dwn_url: url.clone(),
                    protocol: protocol.clone(),
                    cursor,
                });
            }
        }
    }

    Ok(peers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::IdentityOptions;
    use crate::transport::memory::StaticEndpointResolver;
    use pdn_agent_store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn did(s: &str) -> Did {
        Did::parse(s).unwrap()
    }

    async fn setup() -> (IdentityStore, CursorStore, StaticEndpointResolver) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        (
            IdentityStore::new(Arc::clone(&store)),
            CursorStore::new(store),
            StaticEndpointResolver::new(),
        )
    }

    #[tokio::test]
    async fn test_unscoped_identity_yields_one_peer_per_url() {
        let (identities, cursors, resolver) = setup().await;
        let alice = did("did:dht:alice");

        identities
            .register(&alice, &IdentityOptions::default())
            .await
            .unwrap();
        resolver.publish(
            alice.clone(),
            vec!["https://a.example".into(), "https://b.example".into()],
        );

        let peers = discover_peers(&identities, &cursors, &resolver, SyncDirection::Pull)
            .await
            .unwrap();
        assert_eq!(peers.len(), 2);
        assert!(peers.iter().all(|p| p.protocol.is_none() && p.cursor.is_none()));
    }

    #[tokio::test]
    async fn test_protocol_scoping_multiplies_peers() {
        let (identities, cursors, resolver) = setup().await;
        let alice = did("did:dht:alice");

        identities
            .register(
                &alice,
                &IdentityOptions {
                    protocols: vec!["proto-a".into(), "proto-b".into()],
                    delegate_did: None,
                },
            )
            .await
            .unwrap();
        resolver.publish(alice.clone(), vec!["https://a.example".into()]);

        let peers = discover_peers(&identities, &cursors, &resolver, SyncDirection::Pull)
            .await
            .unwrap();
        let protocols: Vec<Option<&str>> = peers.iter().map(|p| p.protocol.as_deref()).collect();
        assert_eq!(protocols, vec![Some("proto-a"), Some("proto-b")]);
    }

    #[tokio::test]
    async fn test_identity_without_endpoints_is_skipped() {
        let (identities, cursors, resolver) = setup().await;
        let alice = did("did:dht:alice");

        identities
            .register(&alice, &IdentityOptions::default())
            .await
            .unwrap();

        let peers = discover_peers(&identities, &cursors, &resolver, SyncDirection::Push)
            .await
            .unwrap();
        assert!(peers.is_empty());
    }

    #[tokio::test]
    async fn test_persisted_cursor_is_attached() {
        let (identities, cursors, resolver) = setup().await;
        let alice = did("did:dht:alice");

        identities
            .register(&alice, &IdentityOptions::default())
            .await
            .unwrap();
        resolver.publish(alice.clone(), vec!["https://a.example".into()]);
        cursors
            .set(&alice, "https://a.example", SyncDirection::Pull, None, &Cursor::new("c1"))
            .await
            .unwrap();

        let peers = discover_peers(&identities, &cursors, &resolver, SyncDirection::Pull)
            .await
            .unwrap();
        assert_eq!(peers[0].cursor, Some(Cursor::new("c1")));

        // The push cursor is tracked separately and stays empty.
        let peers = discover_peers(&identities, &cursors, &resolver, SyncDirection::Push)
            .await
            .unwrap();
        assert_eq!(peers[0].cursor, None);
    }
}
