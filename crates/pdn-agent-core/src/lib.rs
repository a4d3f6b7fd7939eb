//! # PDN Agent Core
//!
//! Core primitives for the PDN agent: strong-typed identifiers, node
//! message types, outcome classification, watermarks, and canonical
//! content addressing.
//!
//! ## Key Concepts
//!
//! - **Message**: an opaque transfer unit owned by the node, identified by
//!   a content-addressed [`MessageCid`].
//! - **Watermark**: a monotonic, lexicographically sortable ordering token
//!   assigned when a sync job is enqueued.
//! - **Cursor**: an opaque continuation token for incremental event-log
//!   queries.
//! - **DataNode**: the local node collaborator that validates and applies
//!   messages; the agent never interprets message semantics itself.

pub mod canonical;
pub mod error;
pub mod node;
pub mod status;
pub mod types;
pub mod watermark;

pub use canonical::{canonical_bytes, message_cid};
pub use error::{CoreError, Result};
pub use node::DataNode;
pub use status::is_accepted_outcome;
pub use types::{
    Cursor, Did, EventLogPage, Message, MessageCid, MessageEntry, MessageKind, NodeReply, Status,
    SyncDirection,
};
pub use watermark::{Watermark, WatermarkGenerator};
