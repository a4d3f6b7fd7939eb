//! Store trait: the abstract interface for durable sync state.
//!
//! This trait allows the sync engine to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;

use crate::error::Result;

/// One operation inside a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Write a value under (partition, key).
    Put {
        /// Target partition.
        partition: String,
        /// Key within the partition.
        key: String,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove (partition, key) if present.
    Delete {
        /// Target partition.
        partition: String,
        /// Key within the partition.
        key: String,
    },
}

impl BatchOp {
    /// Build a put op.
    pub fn put(partition: impl Into<String>, key: impl Into<String>, value: Vec<u8>) -> Self {
        BatchOp::Put {
            partition: partition.into(),
            key: key.into(),
            value,
        }
    }

    /// Build a delete op.
    pub fn delete(partition: impl Into<String>, key: impl Into<String>) -> Self {
        BatchOp::Delete {
            partition: partition.into(),
            key: key.into(),
        }
    }
}

/// Ordered, partitioned key-value store.
///
/// Keys within a partition are sorted bytewise; [`KeyValueStore::list`]
/// yields them in ascending order, which is what gives queue iteration its
/// watermark ordering.
///
/// # Design Notes
///
/// - A single engine instance owns the store; cross-process contention is
///   out of scope.
/// - Batches are applied atomically by the SQLite backend and under one
///   lock by the memory backend.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, partition: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, overwriting any previous one.
    async fn put(&self, partition: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, partition: &str, key: &str) -> Result<()>;

    /// List `(key, value)` pairs in a partition whose keys start with
    /// `prefix`, in ascending key order. An empty prefix lists the whole
    /// partition.
    async fn list(&self, partition: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Apply a batch of writes.
    async fn batch(&self, ops: Vec<BatchOp>) -> Result<()>;

    /// Remove every key in a partition.
    async fn clear_partition(&self, partition: &str) -> Result<()>;

    /// Remove everything in the store.
    async fn clear_all(&self) -> Result<()>;

    /// Release underlying resources. Further calls may fail.
    async fn close(&self) -> Result<()>;
}
