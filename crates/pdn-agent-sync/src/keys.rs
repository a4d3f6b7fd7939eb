//! Composite key encoding for persisted sync state.
//!
//! Queue entries carry their whole job identity in the key; the value is
//! an empty marker. The encode/decode pair here is total and pure, and the
//! derived ordering on [`SyncJobKey`] follows field precedence (did,
//! delegate, endpoint, protocol, watermark, cid). Within one job group
//! (same did, delegate, endpoint, and protocol) the encoded keys sort the
//! same way, so queue iteration yields a group's jobs in watermark order.
//! Across groups the two orderings can disagree (`~` compares above most
//! key characters in the encoded form); nothing relies on cross-group
//! order.

use pdn_agent_core::{Did, MessageCid, SyncDirection, Watermark};

use crate::error::SyncError;

/// Segment separator for composite keys.
///
/// None of the fields we persist may contain it: DIDs and watermarks never
/// do, and node endpoint URLs and protocol URIs do not in practice.
pub const SEPARATOR: char = '~';

/// Store partitions used by the sync engine.
pub mod partitions {
    /// Registered identity options, keyed by DID.
    pub const REGISTERED_IDENTITIES: &str = "registered_identities";
    /// Event-log cursors, keyed by [`super::cursor_key`].
    pub const CURSORS: &str = "cursors";
    /// Dedup markers for confirmed-synchronized messages.
    pub const HISTORY: &str = "history";
    /// Pending push jobs.
    pub const PUSH_QUEUE: &str = "push_queue";
    /// Pending pull jobs.
    pub const PULL_QUEUE: &str = "pull_queue";
}

/// Identity of one queued transfer job.
///
/// Field order matters: the watermark sorts immediately before the message
/// CID, so within a job group the derived `Ord` and the encoded form agree
/// and queue drains see jobs in watermark order. Cross-group order is
/// unspecified.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncJobKey {
    /// The identity being synchronized.
    pub did: Did,
    /// Delegate acting on its behalf, if delegation is configured.
    pub delegate_did: Option<Did>,
    /// Remote node endpoint the job transfers against.
    pub dwn_url: String,
    /// Protocol scope, if the identity is protocol-scoped.
    pub protocol: Option<String>,
    /// Ordering token minted at enqueue time.
    pub watermark: Watermark,
    /// The message being transferred.
    pub message_cid: MessageCid,
}

impl SyncJobKey {
    /// Encode to the persisted key form. Absent optionals serialize to an
    /// empty segment.
    pub fn encode(&self) -> String {
        format!(
            "{did}{s}{delegate}{s}{url}{s}{protocol}{s}{watermark}{s}{cid}",
            did = self.did,
            delegate = self.delegate_did.as_ref().map(Did::as_str).unwrap_or(""),
            url = self.dwn_url,
            protocol = self.protocol.as_deref().unwrap_or(""),
            watermark = self.watermark,
            cid = self.message_cid,
            s = SEPARATOR,
        )
    }

    /// Decode a persisted key.
    pub fn decode(key: &str) -> Result<Self, SyncError> {
        let segments: Vec<&str> = key.split(SEPARATOR).collect();
        let [did, delegate, url, protocol, watermark, cid] = segments[..] else {
            return Err(SyncError::MalformedKey(key.to_string()));
        };

        let did = Did::parse(did).map_err(|_| SyncError::MalformedKey(key.to_string()))?;
        let delegate_did = if delegate.is_empty() {
            None
        } else {
            Some(Did::parse(delegate).map_err(|_| SyncError::MalformedKey(key.to_string()))?)
        };

        if url.is_empty() || watermark.is_empty() || cid.is_empty() {
            return Err(SyncError::MalformedKey(key.to_string()));
        }

        Ok(Self {
            did,
            delegate_did,
            dwn_url: url.to_string(),
            protocol: (!protocol.is_empty()).then(|| protocol.to_string()),
            watermark: Watermark::from_string(watermark),
            message_cid: MessageCid::from_string(cid),
        })
    }
}

/// Encode the persisted cursor key for one (identity, endpoint, direction)
/// and optional protocol scope.
pub fn cursor_key(
    did: &Did,
    dwn_url: &str,
    direction: SyncDirection,
    protocol: Option<&str>,
) -> String {
    match protocol {
        Some(protocol) => format!(
            "{did}{s}{dwn_url}{s}{dir}-{protocol}",
            dir = direction.as_str(),
            s = SEPARATOR
        ),
        None => format!(
            "{did}{s}{dwn_url}{s}{dir}",
            dir = direction.as_str(),
            s = SEPARATOR
        ),
    }
}

/// Encode the dedup-history key for one (identity, message) pair.
pub fn history_key(did: &Did, cid: &MessageCid) -> String {
    format!("{}/messages/{}", did, cid)
}
