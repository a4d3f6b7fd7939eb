//! The local node collaborator seam.
//!
//! The node owns message validation and application; the sync engine only
//! drives it. Implementations wrap the message-processing engine of the
//! local data store.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::types::{Cursor, Did, EventLogPage, Message, MessageCid, MessageEntry, Status};

/// Async interface to the local data node.
#[async_trait]
pub trait DataNode: Send + Sync {
    /// Validate and apply a message to the node, with an optional data
    /// stream for messages that carry one.
    ///
    /// Application is idempotent; re-applying a known message yields a
    /// conflict status rather than an error.
    async fn process_message(
        &self,
        target: &Did,
        message: Message,
        data: Option<Bytes>,
    ) -> Result<Status>;

    /// Fetch event-log entries for `target` since `cursor`, optionally
    /// scoped to one protocol.
    async fn query_event_log(
        &self,
        target: &Did,
        protocol: Option<&str>,
        cursor: Option<&Cursor>,
    ) -> Result<EventLogPage>;

    /// Read a message (and its inline data, if any) by CID.
    ///
    /// Returns `None` when the node no longer has the message, e.g. a
    /// write superseded by a later one and pruned.
    async fn read_message(&self, target: &Did, cid: &MessageCid)
        -> Result<Option<MessageEntry>>;
}
