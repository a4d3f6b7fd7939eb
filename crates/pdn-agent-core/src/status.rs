//! Outcome classification for node replies.
//!
//! A reachable endpoint that returns anything outside the accepted set is
//! "not yet synced": the job stays queued and is retried on a later pass.

use crate::types::{MessageKind, Status};

/// Accepted without further processing.
pub const ACCEPTED: u16 = 202;
/// Applied with no content to return.
pub const NO_CONTENT: u16 = 204;
/// Already present on the receiving side.
pub const CONFLICT: u16 = 409;
/// Target not found.
pub const NOT_FOUND: u16 = 404;

/// Classify a reply code for a transferred message.
///
/// Codes 202, 204 and 409 are always accepted. 404 is accepted only for
/// delete-type messages: the tombstone's target is already absent on both
/// sides, so there is nothing left to transfer.
pub fn is_accepted_outcome(code: u16, kind: MessageKind) -> bool {
    match code {
        ACCEPTED | NO_CONTENT | CONFLICT => true,
        NOT_FOUND => kind.is_delete(),
        _ => false,
    }
}

impl Status {
    /// Whether this status completes a sync job for a message of `kind`.
    pub fn is_accepted_for(&self, kind: MessageKind) -> bool {
        is_accepted_outcome(self.code, kind)
    }
}
