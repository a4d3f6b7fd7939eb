//! Remote collaborator seams: the RPC client to remote nodes and the DID
//! service-endpoint resolver.
//!
//! Implementations may use HTTP, WebSockets, or any other transport; the
//! engine only sees the three request shapes below. A transport error
//! means "endpoint unreachable this pass" and trips the per-endpoint
//! circuit breaker.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use pdn_agent_core::{Cursor, Did, EventLogPage, Message, MessageCid, NodeReply};
use pdn_agent_perms::GrantId;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be reached or timed out.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The endpoint answered with something the client could not parse.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// DID resolution failed.
    #[error("resolution error: {0}")]
    Resolution(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// RPC client to remote nodes.
#[async_trait]
pub trait RemoteNodeClient: Send + Sync {
    /// Query the remote event log for `target`, optionally protocol-scoped
    /// and continued from `cursor`. Delegated queries attach a grant ID.
    async fn query_event_log(
        &self,
        url: &str,
        target: &Did,
        protocol: Option<&str>,
        cursor: Option<&Cursor>,
        grant_id: Option<&GrantId>,
    ) -> Result<EventLogPage>;

    /// Read one message by CID from the remote node.
    async fn read_message(
        &self,
        url: &str,
        target: &Did,
        cid: &MessageCid,
        grant_id: Option<&GrantId>,
    ) -> Result<NodeReply>;

    /// Send a message (with any data payload) to the remote node.
    async fn send_message(
        &self,
        url: &str,
        target: &Did,
        message: Message,
        data: Option<Bytes>,
    ) -> Result<NodeReply>;
}

/// Resolver from a DID to its published node service endpoints.
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    /// Resolve the node endpoint URLs the DID document declares.
    ///
    /// An empty list means the identity has not published an endpoint yet;
    /// it is skipped for the pass, not an error.
    async fn resolve_service_endpoints(&self, did: &Did) -> Result<Vec<String>>;
}

/// In-memory implementations for tests and local wiring.
///
/// Routes remote requests to [`DataNode`] instances registered per URL,
/// with per-URL fault injection to exercise unreachable-endpoint paths.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, RwLock};

    use pdn_agent_core::{DataNode, Status};

    /// An in-memory network of remote nodes addressed by URL.
    pub struct MemoryRemoteNetwork {
        nodes: RwLock<HashMap<String, Arc<dyn DataNode>>>,
        unreachable: RwLock<HashSet<String>>,
        reads: AtomicU64,
        sends: AtomicU64,
    }

    impl MemoryRemoteNetwork {
        /// Create an empty network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                nodes: RwLock::new(HashMap::new()),
                unreachable: RwLock::new(HashSet::new()),
                reads: AtomicU64::new(0),
                sends: AtomicU64::new(0),
            })
        }

        /// Attach a node at `url`.
        pub fn register(&self, url: impl Into<String>, node: Arc<dyn DataNode>) {
            self.nodes.write().unwrap().insert(url.into(), node);
        }

        /// Make `url` fail with a transport error until restored.
        pub fn set_unreachable(&self, url: &str, unreachable: bool) {
            let mut set = self.unreachable.write().unwrap();
            if unreachable {
                set.insert(url.to_string());
            } else {
                set.remove(url);
            }
        }

        /// Total read requests that reached a node.
        pub fn read_count(&self) -> u64 {
            self.reads.load(Ordering::SeqCst)
        }

        /// Total send requests that reached a node.
        pub fn send_count(&self) -> u64 {
            self.sends.load(Ordering::SeqCst)
        }

        fn node_for(&self, url: &str) -> Result<Arc<dyn DataNode>> {
            if self.unreachable.read().unwrap().contains(url) {
                return Err(TransportError::Unreachable(url.to_string()));
            }
            self.nodes
                .read()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| TransportError::Unreachable(url.to_string()))
        }
    }

    #[async_trait]
    impl RemoteNodeClient for MemoryRemoteNetwork {
        async fn query_event_log(
            &self,
            url: &str,
            target: &Did,
            protocol: Option<&str>,
            cursor: Option<&Cursor>,
            _grant_id: Option<&GrantId>,
        ) -> Result<EventLogPage> {
            let node = self.node_for(url)?;
            node.query_event_log(target, protocol, cursor)
                .await
                .map_err(|e| TransportError::Protocol(e.to_string()))
        }

        async fn read_message(
            &self,
            url: &str,
            target: &Did,
            cid: &MessageCid,
            _grant_id: Option<&GrantId>,
        ) -> Result<NodeReply> {
            let node = self.node_for(url)?;
            self.reads.fetch_add(1, Ordering::SeqCst);

            let entry = node
                .read_message(target, cid)
                .await
                .map_err(|e| TransportError::Protocol(e.to_string()))?;

            Ok(match entry {
                Some(entry) => NodeReply {
                    status: Status::new(200),
                    entry: Some(entry),
                },
                None => NodeReply::status_only(404),
            })
        }

        async fn send_message(
            &self,
            url: &str,
            target: &Did,
            message: Message,
            data: Option<Bytes>,
        ) -> Result<NodeReply> {
            let node = self.node_for(url)?;
            self.sends.fetch_add(1, Ordering::SeqCst);

            let status = node
                .process_message(target, message, data)
                .await
                .map_err(|e| TransportError::Protocol(e.to_string()))?;

            Ok(NodeReply {
                status,
                entry: None,
            })
        }
    }

    /// Endpoint resolver over a fixed DID → URLs table.
    pub struct StaticEndpointResolver {
        endpoints: RwLock<HashMap<Did, Vec<String>>>,
    }

    impl StaticEndpointResolver {
        /// Create an empty resolver.
        pub fn new() -> Self {
            Self {
                endpoints: RwLock::new(HashMap::new()),
            }
        }

        /// Declare the endpoints published by `did`.
        pub fn publish(&self, did: Did, urls: Vec<String>) {
            self.endpoints.write().unwrap().insert(did, urls);
        }
    }

    impl Default for StaticEndpointResolver {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl EndpointResolver for StaticEndpointResolver {
        async fn resolve_service_endpoints(&self, did: &Did) -> Result<Vec<String>> {
            Ok(self
                .endpoints
                .read()
                .unwrap()
                .get(did)
                .cloned()
                .unwrap_or_default())
        }
    }
}
