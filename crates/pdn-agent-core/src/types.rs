//! Strong type definitions for the PDN agent.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A decentralized identifier, e.g. `did:dht:abc123`.
///
/// Identifies one local identity or one remote peer. Only the shape is
/// validated here; resolution belongs to the DID subsystem.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Parse a DID from a string, validating the `did:method:id` shape.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("did"), Some(method), Some(id)) if !method.is_empty() && !id.is_empty() => {
                Ok(Self(s))
            }
            _ => Err(CoreError::InvalidDid(s)),
        }
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Did({})", self.0)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Content-addressed identifier of one message: hex-encoded Blake3 of the
/// message's canonical bytes.
///
/// Two messages with the same content have the same CID. Used as the job
/// and dedup key; the engine never looks inside.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCid(String);

impl MessageCid {
    /// Wrap an already-encoded CID string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MessageCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = if self.0.len() > 16 { &self.0[..16] } else { &self.0 };
        write!(f, "MessageCid({})", short)
    }
}

impl fmt::Display for MessageCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque continuation token returned by an event-log query.
///
/// Persisted per (identity, endpoint, direction, protocol) and handed back
/// on the next query to fetch only new entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Direction of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncDirection {
    /// Local node → remote node.
    Push,
    /// Remote node → local node.
    Pull,
}

impl SyncDirection {
    /// Stable string form, used in persisted cursor keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Push => "push",
            SyncDirection::Pull => "pull",
        }
    }
}

/// The kind of a node message.
///
/// The engine treats messages as opaque except for two concerns: grant
/// scoping (query vs read vs write) and the delete-tombstone special case
/// in outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Create or update a record.
    RecordsWrite,
    /// Tombstone a record.
    RecordsDelete,
    /// Install a protocol definition.
    ProtocolsConfigure,
    /// Query the event log.
    MessagesQuery,
    /// Read a message by CID.
    MessagesRead,
}

impl MessageKind {
    /// True for tombstone messages, which tolerate an absent target.
    pub fn is_delete(&self) -> bool {
        matches!(self, MessageKind::RecordsDelete)
    }
}

/// One node message, treated as an opaque transfer unit.
///
/// The node owns the message semantics; the engine only needs the kind,
/// the protocol tag for scoping, and stable content addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// What operation this message performs.
    pub kind: MessageKind,
    /// The identity that authored the message.
    pub author: Did,
    /// Protocol the record belongs to, if any.
    pub protocol: Option<String>,
    /// The record this message targets.
    pub record_id: String,
    /// Author-claimed timestamp (Unix ms).
    pub timestamp: i64,
}

/// A message together with its optional inline data payload.
///
/// `data` is absent for update records that reference unchanged prior data;
/// the node resolves those itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    /// The message itself.
    pub message: Message,
    /// Inline data carried alongside the message, if any.
    pub data: Option<Bytes>,
}

/// One page of an event-log query.
#[derive(Debug, Clone, Default)]
pub struct EventLogPage {
    /// New message CIDs since the supplied cursor, in log order.
    pub entries: Vec<MessageCid>,
    /// Continuation token for the next query, if the log returned one.
    pub cursor: Option<Cursor>,
}

/// Status of a node reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Numeric status code, HTTP-shaped.
    pub code: u16,
    /// Human-readable detail, if the node supplied one.
    pub detail: Option<String>,
}

impl Status {
    /// Build a status with no detail.
    pub fn new(code: u16) -> Self {
        Self { code, detail: None }
    }

    /// Build a status with a detail string.
    pub fn with_detail(code: u16, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }
}

/// Reply from a node to a message-read or message-send request.
#[derive(Debug, Clone)]
pub struct NodeReply {
    /// Outcome status.
    pub status: Status,
    /// The entry, present on successful reads.
    pub entry: Option<MessageEntry>,
}

impl NodeReply {
    /// A reply with a status and no entry.
    pub fn status_only(code: u16) -> Self {
        Self {
            status: Status::new(code),
            entry: None,
        }
    }
}
