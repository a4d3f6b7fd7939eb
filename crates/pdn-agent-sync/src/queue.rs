//! Durable job queues.
//!
//! One queue per direction, shared across all identities and peers. Jobs
//! are keyed markers: the composite key carries the whole job identity and
//! the store's key ordering yields watermark order within each job group.

use std::sync::Arc;

use pdn_agent_core::SyncDirection;
use pdn_agent_store::{BatchOp, KeyValueStore};

use crate::error::Result;
use crate::keys::{partitions, SyncJobKey};

/// A durable queue of pending transfer jobs for one direction.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn KeyValueStore>,
    partition: &'static str,
}

impl JobQueue {
    /// Create the queue for `direction` over the shared store.
    pub fn new(store: Arc<dyn KeyValueStore>, direction: SyncDirection) -> Self {
        let partition = match direction {
            SyncDirection::Push => partitions::PUSH_QUEUE,
            SyncDirection::Pull => partitions::PULL_QUEUE,
        };
        Self { store, partition }
    }

    /// Enqueue a batch of jobs in one write. Empty batches are no-ops.
    pub async fn enqueue(&self, jobs: &[SyncJobKey]) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let ops = jobs
            .iter()
            .map(|job| BatchOp::put(self.partition, job.encode(), Vec::new()))
            .collect();
        self.store.batch(ops).await?;
        Ok(())
    }

    /// List all pending jobs in key order.
    pub async fn jobs(&self) -> Result<Vec<SyncJobKey>> {
        let entries = self.store.list(self.partition, "").await?;
        entries
            .into_iter()
            .map(|(key, _)| SyncJobKey::decode(&key))
            .collect()
    }

    /// Delete a batch of completed jobs in one write.
    pub async fn remove(&self, jobs: &[SyncJobKey]) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let ops = jobs
            .iter()
            .map(|job| BatchOp::delete(self.partition, job.encode()))
            .collect();
        self.store.batch(ops).await?;
        Ok(())
    }
}
