//! Canonical encoding and content addressing for messages.
//!
//! A message CID is the hex-encoded Blake3 hash of the message's canonical
//! CBOR bytes. CBOR maps here are struct-keyed with a fixed field order, so
//! encoding the same message twice yields identical bytes.

use crate::error::{CoreError, Result};
use crate::types::{Message, MessageCid};

/// Encode a message to its canonical CBOR bytes.
pub fn canonical_bytes(message: &Message) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)
        .map_err(|e| CoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Compute the content address of a message.
pub fn message_cid(message: &Message) -> Result<MessageCid> {
    let bytes = canonical_bytes(message)?;
    let hash = blake3::hash(&bytes);
    Ok(MessageCid::from_string(hex::encode(hash.as_bytes())))
}

impl Message {
    /// Compute this message's content address.
    pub fn cid(&self) -> Result<MessageCid> {
        message_cid(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Did, MessageKind};

    fn make_message(record_id: &str) -> Message {
        Message {
            kind: MessageKind::RecordsWrite,
            author: Did::parse("did:dht:alice").unwrap(),
            protocol: Some("https://example.org/chat".into()),
            record_id: record_id.into(),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_cid_deterministic() {
        let m1 = make_message("rec-1");
        let m2 = make_message("rec-1");
        assert_eq!(m1.cid().unwrap(), m2.cid().unwrap());
    }

    #[test]
    fn test_cid_distinguishes_content() {
        let m1 = make_message("rec-1");
        let m2 = make_message("rec-2");
        assert_ne!(m1.cid().unwrap(), m2.cid().unwrap());
    }

    #[test]
    fn test_cid_is_hex() {
        let cid = make_message("rec-1").cid().unwrap();
        assert_eq!(cid.as_str().len(), 64);
        assert!(cid.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
