//! Typed views over the durable store: registered identities, cursors,
//! and the dedup history.
//!
//! All three are thin wrappers around one shared [`KeyValueStore`], each
//! owning a partition. Values are JSON; queue and history entries are
//! keyed markers with no payload.

use std::sync::Arc;

use pdn_agent_core::{Cursor, Did, MessageCid, SyncDirection};
use pdn_agent_store::KeyValueStore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::keys::{cursor_key, history_key, partitions};

/// Per-identity sync scoping options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityOptions {
    /// Protocol allow-list. Empty means unscoped: sync everything.
    #[serde(default)]
    pub protocols: Vec<String>,
    /// Identity authorized to act on this one's behalf during sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate_did: Option<Did>,
}

/// Which local identities participate in sync.
#[derive(Clone)]
pub struct IdentityStore {
    store: Arc<dyn KeyValueStore>,
}

impl IdentityStore {
    /// Create a view over the shared store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Register an identity for sync, overwriting any previous options.
    pub async fn register(&self, did: &Did, options: &IdentityOptions) -> Result<()> {
        let value = serde_json::to_vec(options)?;
        self.store
            .put(partitions::REGISTERED_IDENTITIES, did.as_str(), &value)
            .await?;
        Ok(())
    }

    /// Remove an identity from sync. Unregistering an unknown identity is
    /// a no-op.
    pub async fn unregister(&self, did: &Did) -> Result<()> {
        self.store
            .delete(partitions::REGISTERED_IDENTITIES, did.as_str())
            .await?;
        Ok(())
    }

    /// Fetch the options for one identity.
    pub async fn options(&self, did: &Did) -> Result<Option<IdentityOptions>> {
        let value = self
            .store
            .get(partitions::REGISTERED_IDENTITIES, did.as_str())
            .await?;
        match value {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Replace the options of an already-registered identity.
    pub async fn update(&self, did: &Did, options: &IdentityOptions) -> Result<()> {
        if self.options(did).await?.is_none() {
            return Err(SyncError::UnknownIdentity(did.clone()));
        }
        self.register(did, options).await
    }

    /// List every registered identity with its options.
    pub async fn list(&self) -> Result<Vec<(Did, IdentityOptions)>> {
        let entries = self
            .store
            .list(partitions::REGISTERED_IDENTITIES, "")
            .await?;

        let mut identities = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let did =
                Did::parse(&key).map_err(|_| SyncError::Serialization(format!("bad DID key: {key}")))?;
            identities.push((did, serde_json::from_slice(&value)?));
        }
        Ok(identities)
    }
}

/// Persisted event-log continuation tokens.
#[derive(Clone)]
pub struct CursorStore {
    store: Arc<dyn KeyValueStore>,
}

impl CursorStore {
    /// Create a view over the shared store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Fetch the cursor for one (identity, endpoint, direction, protocol).
    pub async fn get(
        &self,
        did: &Did,
        dwn_url: &str,
        direction: SyncDirection,
        protocol: Option<&str>,
    ) -> Result<Option<Cursor>> {
        let key = cursor_key(did, dwn_url, direction, protocol);
        let value = self.store.get(partitions::CURSORS, &key).await?;
        match value {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist (overwrite) a cursor.
    pub async fn set(
        &self,
        did: &Did,
        dwn_url: &str,
        direction: SyncDirection,
        protocol: Option<&str>,
        cursor: &Cursor,
    ) -> Result<()> {
        let key = cursor_key(did, dwn_url, direction, protocol);
        let value = serde_json::to_vec(cursor)?;
        self.store.put(partitions::CURSORS, &key, &value).await?;
        Ok(())
    }
}

/// Dedup markers for messages confirmed synchronized.
///
/// Used to suppress echoes: a pull job for a message the local side
/// already confirmed completes without a network call.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    /// Create a view over the shared store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Whether (did, cid) is already confirmed synchronized.
    pub async fn contains(&self, did: &Did, cid: &MessageCid) -> Result<bool> {
        let key = history_key(did, cid);
        Ok(self.store.get(partitions::HISTORY, &key).await?.is_some())
    }

    /// Record (did, cid) as confirmed synchronized.
    pub async fn record(&self, did: &Did, cid: &MessageCid) -> Result<()> {
        let key = history_key(did, cid);
        self.store.put(partitions::HISTORY, &key, &[]).await?;
        Ok(())
    }
}
