//! Proptest generators for property-based testing.

use proptest::prelude::*;

use pdn_agent_core::{Cursor, Did, Message, MessageCid, MessageKind, Watermark};
use pdn_agent_sync::SyncJobKey;

/// Generate a well-formed `did:dht` DID.
pub fn did() -> impl Strategy<Value = Did> {
    "[a-z0-9]{8,24}".prop_map(|id| Did::parse(format!("did:dht:{id}")).unwrap())
}

/// Generate a hex CID of full Blake3 width.
pub fn message_cid() -> impl Strategy<Value = MessageCid> {
    "[0-9a-f]{64}".prop_map(MessageCid::from_string)
}

/// Generate a record-level message kind.
pub fn message_kind() -> impl Strategy<Value = MessageKind> {
    prop_oneof![
        Just(MessageKind::RecordsWrite),
        Just(MessageKind::RecordsDelete),
        Just(MessageKind::ProtocolsConfigure),
    ]
}

/// Generate an optional protocol URI.
pub fn protocol() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("https://[a-z0-9]{4,12}\\.example/[a-z]{2,12}".prop_map(String::from))
}

/// Generate a record identifier.
pub fn record_id() -> impl Strategy<Value = String> {
    "[a-z0-9-]{8,24}".prop_map(String::from)
}

/// Generate a reasonable Unix-millisecond timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=1_900_000_000_000i64
}

/// Generate a node endpoint URL.
pub fn dwn_url() -> impl Strategy<Value = String> {
    "https://[a-z0-9]{4,12}\\.example".prop_map(String::from)
}

/// Generate an opaque continuation token.
pub fn cursor() -> impl Strategy<Value = Cursor> {
    "[0-9]{1,6}".prop_map(Cursor::new)
}

/// Generate a whole message.
pub fn message() -> impl Strategy<Value = Message> {
    (did(), message_kind(), protocol(), record_id(), timestamp()).prop_map(
        |(author, kind, protocol, record_id, timestamp)| Message {
            kind,
            author,
            protocol,
            record_id,
            timestamp,
        },
    )
}

/// Generate a watermark-shaped ordering token.
pub fn watermark() -> impl Strategy<Value = Watermark> {
    "[0-9a-f]{24}".prop_map(Watermark::from_string)
}

/// Generate a whole sync job key.
pub fn sync_job_key() -> impl Strategy<Value = SyncJobKey> {
    (
        did(),
        proptest::option::of(did()),
        dwn_url(),
        protocol(),
        watermark(),
        message_cid(),
    )
        .prop_map(
            |(did, delegate_did, dwn_url, protocol, watermark, message_cid)| SyncJobKey {
                did,
                delegate_did,
                dwn_url,
                protocol,
                watermark,
                message_cid,
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_generated_messages_have_stable_cids(message in message()) {
            prop_assert_eq!(message.cid().unwrap(), message.cid().unwrap());
        }

        #[test]
        fn prop_generated_job_keys_roundtrip(key in sync_job_key()) {
            prop_assert_eq!(SyncJobKey::decode(&key.encode()).unwrap(), key);
        }

        #[test]
        fn prop_generated_dids_reparse(did in did()) {
            prop_assert!(Did::parse(did.as_str()).is_ok());
        }
    }
}
