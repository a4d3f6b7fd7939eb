//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an in-memory data node and a
//! fully wired sync engine over in-memory collaborators.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;

use pdn_agent_core::{
    DataNode, Cursor, Did, EventLogPage, Message, MessageCid, MessageEntry, MessageKind, Result,
    Status,
};
use pdn_agent_perms::StaticGrantResolver;
use pdn_agent_store::MemoryStore;
use pdn_agent_sync::transport::memory::{MemoryRemoteNetwork, StaticEndpointResolver};
use pdn_agent_sync::{IdentityOptions, SyncEngine, SyncOptions};

/// In-memory data node, used as both the local node and remote nodes in
/// tests.
///
/// Keeps a per-target event log in insertion order, addresses entries by
/// CID, and answers event-log queries with index-based cursors. The status
/// returned by `process_message` is configurable to exercise rejection
/// paths.
pub struct MemoryDataNode {
    state: RwLock<NodeState>,
    process_status: RwLock<Status>,
}

#[derive(Default)]
struct NodeState {
    logs: HashMap<Did, Vec<MessageCid>>,
    entries: HashMap<(Did, MessageCid), MessageEntry>,
}

impl MemoryDataNode {
    /// Create an empty node that accepts everything with 202.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(NodeState::default()),
            process_status: RwLock::new(Status::new(202)),
        })
    }

    /// Replace the status `process_message` answers with. Non-accepted
    /// statuses also stop messages from being applied.
    pub fn set_process_status(&self, status: Status) {
        *self.process_status.write().unwrap() = status;
    }

    /// Seed a message directly, bypassing `process_message`. Returns its
    /// CID. Re-ingesting the same content is a no-op.
    pub fn ingest(&self, target: &Did, message: Message, data: Option<Bytes>) -> MessageCid {
        let cid = message.cid().expect("message serializes");
        let mut state = self.state.write().unwrap();
        let slot = (target.clone(), cid.clone());
        if !state.entries.contains_key(&slot) {
            state
                .logs
                .entry(target.clone())
                .or_default()
                .push(cid.clone());
            state.entries.insert(slot, MessageEntry { message, data });
        }
        cid
    }

    /// Drop the body of `cid` while keeping its event-log entry, as a
    /// node that pruned data after enumeration would.
    pub fn prune(&self, target: &Did, cid: &MessageCid) {
        let mut state = self.state.write().unwrap();
        state.entries.remove(&(target.clone(), cid.clone()));
    }

    /// Whether the node holds `cid` for `target`.
    pub fn contains(&self, target: &Did, cid: &MessageCid) -> bool {
        let state = self.state.read().unwrap();
        state.entries.contains_key(&(target.clone(), cid.clone()))
    }

    /// Number of event-log entries for `target`.
    pub fn log_len(&self, target: &Did) -> usize {
        let state = self.state.read().unwrap();
        state.logs.get(target).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait]
impl DataNode for MemoryDataNode {
    async fn process_message(
        &self,
        target: &Did,
        message: Message,
        data: Option<Bytes>,
    ) -> Result<Status> {
        let cid = message.cid()?;
        if self.contains(target, &cid) {
            return Ok(Status::new(409));
        }

        let status = self.process_status.read().unwrap().clone();
        if status.is_accepted_for(message.kind) {
            self.ingest(target, message, data);
        }
        Ok(status)
    }

    async fn query_event_log(
        &self,
        target: &Did,
        protocol: Option<&str>,
        cursor: Option<&Cursor>,
    ) -> Result<EventLogPage> {
        let state = self.state.read().unwrap();
        let log = state.logs.get(target).cloned().unwrap_or_default();

        let start: usize = cursor
            .map(|c| c.as_str().parse().unwrap_or(0))
            .unwrap_or(0)
            .min(log.len());

        let entries: Vec<MessageCid> = log[start..]
            .iter()
            .filter(|cid| match protocol {
                Some(p) => state
                    .entries
                    .get(&(target.clone(), (*cid).clone()))
                    .and_then(|e| e.message.protocol.as_deref())
                    == Some(p),
                None => true,
            })
            .cloned()
            .collect();

        let cursor = (!entries.is_empty()).then(|| Cursor::new(log.len().to_string()));
        Ok(EventLogPage { entries, cursor })
    }

    async fn read_message(&self, target: &Did, cid: &MessageCid) -> Result<Option<MessageEntry>> {
        let state = self.state.read().unwrap();
        Ok(state.entries.get(&(target.clone(), cid.clone())).cloned())
    }
}

/// A sync engine wired to in-memory collaborators, ready for scenarios.
pub struct SyncFixture {
    /// The local data node the engine syncs on behalf of.
    pub local: Arc<MemoryDataNode>,
    /// The in-memory remote network, with fault injection per URL.
    pub network: Arc<MemoryRemoteNetwork>,
    /// The DID → endpoint table.
    pub endpoints: Arc<StaticEndpointResolver>,
    /// The grant table for delegated scenarios.
    pub grants: Arc<StaticGrantResolver>,
    /// The engine under test.
    pub engine: Arc<SyncEngine>,
}

impl SyncFixture {
    /// Wire up a fresh engine over empty in-memory state.
    pub fn new() -> Self {
        let local = MemoryDataNode::new();
        let network = MemoryRemoteNetwork::new();
        let endpoints = Arc::new(StaticEndpointResolver::new());
        let grants = Arc::new(StaticGrantResolver::new());

        let engine = Arc::new(SyncEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::clone(&local) as Arc<dyn DataNode>,
            Arc::clone(&network) as _,
            Arc::clone(&endpoints) as _,
            Arc::clone(&grants) as _,
            SyncOptions::default(),
        ));

        Self {
            local,
            network,
            endpoints,
            grants,
            engine,
        }
    }

    /// Attach a fresh remote node at `url` and return it.
    pub fn remote_node(&self, url: &str) -> Arc<MemoryDataNode> {
        let node = MemoryDataNode::new();
        self.network.register(url, Arc::clone(&node) as Arc<dyn DataNode>);
        node
    }

    /// Register `did` for sync and publish its endpoints in one step.
    pub async fn register(
        &self,
        did: &Did,
        urls: &[&str],
        options: IdentityOptions,
    ) -> pdn_agent_sync::Result<()> {
        self.endpoints
            .publish(did.clone(), urls.iter().map(|u| u.to_string()).collect());
        self.engine.identities().register(did, &options).await
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a records-write message with the common fields defaulted.
pub fn write_message(author: &Did, protocol: Option<&str>, record_id: &str) -> Message {
    Message {
        kind: MessageKind::RecordsWrite,
        author: author.clone(),
        protocol: protocol.map(String::from),
        record_id: record_id.to_string(),
        timestamp: now_millis(),
    }
}

/// Build a records-delete tombstone for `record_id`.
pub fn delete_message(author: &Did, protocol: Option<&str>, record_id: &str) -> Message {
    Message {
        kind: MessageKind::RecordsDelete,
        author: author.clone(),
        protocol: protocol.map(String::from),
        record_id: record_id.to_string(),
        timestamp: now_millis(),
    }
}

/// A random well-formed `did:dht` identity.
pub fn random_did() -> Did {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    Did::parse(format!("did:dht:{}", id.to_lowercase())).expect("generated DID is well-formed")
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
