//! In-memory implementation of the store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::{BatchOp, KeyValueStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
/// Key order within a partition comes from the BTreeMap.
pub struct MemoryStore {
    inner: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, partition: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.get(&(partition.to_string(), key.to_string())).cloned())
    }

    async fn put(&self, partition: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.insert((partition.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.remove(&(partition.to_string(), key.to_string()));
        Ok(())
    }

    async fn list(&self, partition: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let inner = self.inner.read().unwrap();
        let entries = inner
            .range((partition.to_string(), prefix.to_string())..)
            .take_while(|((p, k), _)| p == partition && k.starts_with(prefix))
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect();
        Ok(entries)
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for op in ops {
            match op {
                BatchOp::Put {
                    partition,
                    key,
                    value,
                } => {
                    inner.insert((partition, key), value);
                }
                BatchOp::Delete { partition, key } => {
                    inner.remove(&(partition, key));
                }
            }
        }
        Ok(())
    }

    async fn clear_partition(&self, partition: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.retain(|(p, _), _| p != partition);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
