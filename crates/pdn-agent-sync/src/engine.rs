//! The sync engine: enqueue and drain passes over durable job queues.
//!
//! A full pass runs push then pull. Each direction first enumerates peers
//! and turns new event-log entries into durable queue jobs, then drains
//! its queue in key order. Job failures never abort a pass; a failed job
//! stays queued and is retried on a later pass.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use pdn_agent_core::{DataNode, MessageKind, SyncDirection, WatermarkGenerator};
use pdn_agent_perms::{GrantId, GrantResolver, GrantScope};
use pdn_agent_store::KeyValueStore;

use crate::error::Result;
use crate::keys::{partitions, SyncJobKey};
use crate::peers::{discover_peers, SyncPeerState};
use crate::queue::JobQueue;
use crate::scheduler::PassLock;
use crate::state::{CursorStore, HistoryStore, IdentityStore};
use crate::transport::{EndpointResolver, RemoteNodeClient};

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// How often a stop request re-checks the pass lock.
    pub stop_poll_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            stop_poll_interval: Duration::from_millis(100),
        }
    }
}

/// How one queued job ended within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job completed (transferred, or confirmed moot) and is removed
    /// from its queue.
    Synced,
    /// The job was not attempted because its endpoint already failed
    /// earlier in the pass. It stays queued.
    Skipped(&'static str),
    /// The job was attempted and did not complete. It stays queued.
    Deferred(&'static str),
}

/// Tally of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Jobs newly enqueued from event-log enumeration.
    pub enqueued: usize,
    /// Push jobs completed.
    pub pushed: usize,
    /// Pull jobs completed.
    pub pulled: usize,
    /// Jobs skipped by the per-endpoint circuit breaker.
    pub skipped: usize,
    /// Jobs attempted but left queued for a later pass.
    pub deferred: usize,
}

/// Bidirectional sync between the local node and each registered
/// identity's remote nodes.
pub struct SyncEngine {
    store: Arc<dyn KeyValueStore>,
    node: Arc<dyn DataNode>,
    remote: Arc<dyn RemoteNodeClient>,
    endpoints: Arc<dyn EndpointResolver>,
    grants: Arc<dyn GrantResolver>,
    identities: IdentityStore,
    cursors: CursorStore,
    history: HistoryStore,
    push_queue: JobQueue,
    pull_queue: JobQueue,
    watermarks: WatermarkGenerator,
    lock: Arc<PassLock>,
    options: SyncOptions,
}

impl SyncEngine {
    /// Assemble an engine over its collaborators.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        node: Arc<dyn DataNode>,
        remote: Arc<dyn RemoteNodeClient>,
        endpoints: Arc<dyn EndpointResolver>,
        grants: Arc<dyn GrantResolver>,
        options: SyncOptions,
    ) -> Self {
        Self {
            identities: IdentityStore::new(Arc::clone(&store)),
            cursors: CursorStore::new(Arc::clone(&store)),
            history: HistoryStore::new(Arc::clone(&store)),
            push_queue: JobQueue::new(Arc::clone(&store), SyncDirection::Push),
            pull_queue: JobQueue::new(Arc::clone(&store), SyncDirection::Pull),
            store,
            node,
            remote,
            endpoints,
            grants,
            watermarks: WatermarkGenerator::new(),
            lock: Arc::new(PassLock::new()),
            options,
        }
    }

    /// The registered-identity view, for registration APIs layered above.
    pub fn identities(&self) -> &IdentityStore {
        &self.identities
    }

    /// The engine tunables.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Whether a pass is in flight right now.
    pub fn is_running(&self) -> bool {
        self.lock.is_locked()
    }

    /// Run one pass: both directions by default, or a single direction.
    ///
    /// Fails fast with [`SyncError::AlreadyRunning`](crate::SyncError) if a
    /// pass is already in flight.
    pub async fn sync(&self, direction: Option<SyncDirection>) -> Result<SyncReport> {
        let _guard = self.lock.try_acquire()?;
        let mut report = SyncReport::default();

        if direction != Some(SyncDirection::Pull) {
            self.run_direction(SyncDirection::Push, &mut report).await?;
        }
        if direction != Some(SyncDirection::Push) {
            self.run_direction(SyncDirection::Pull, &mut report).await?;
        }

        tracing::info!(
            enqueued = report.enqueued,
            pushed = report.pushed,
            pulled = report.pulled,
            skipped = report.skipped,
            deferred = report.deferred,
            "sync pass finished"
        );
        Ok(report)
    }

    /// Delete all persisted sync state: identities, cursors, history and
    /// both queues.
    pub async fn clear(&self) -> Result<()> {
        for partition in [
            partitions::REGISTERED_IDENTITIES,
            partitions::CURSORS,
            partitions::HISTORY,
            partitions::PUSH_QUEUE,
            partitions::PULL_QUEUE,
        ] {
            self.store.clear_partition(partition).await?;
        }
        Ok(())
    }

    /// Close the underlying store. Further operations fail.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await?;
        Ok(())
    }

    fn queue(&self, direction: SyncDirection) -> &JobQueue {
        match direction {
            SyncDirection::Push => &self.push_queue,
            SyncDirection::Pull => &self.pull_queue,
        }
    }

    async fn run_direction(
        &self,
        direction: SyncDirection,
        report: &mut SyncReport,
    ) -> Result<()> {
        let peers =
            discover_peers(&self.identities, &self.cursors, self.endpoints.as_ref(), direction)
                .await?;
        for peer in &peers {
            self.enqueue_peer(direction, peer, report).await?;
        }
        self.drain_queue(direction, report).await
    }

    /// Enumerate one peer's new event-log entries into durable jobs.
    ///
    /// The cursor is persisted only after the jobs are, so a crash between
    /// the two re-enumerates rather than losing entries. Grant and
    /// transport failures skip this peer for the pass; store failures
    /// propagate.
    async fn enqueue_peer(
        &self,
        direction: SyncDirection,
        peer: &SyncPeerState,
        report: &mut SyncReport,
    ) -> Result<()> {
        let grant_id = match &peer.delegate_did {
            Some(delegate) => {
                let scope = GrantScope {
                    connected_did: peer.did.clone(),
                    delegate_did: delegate.clone(),
                    message_kind: MessageKind::MessagesQuery,
                    protocol: peer.protocol.clone(),
                };
                match self.grants.grant_for_request(&scope, true).await {
                    Ok(id) => Some(id),
                    Err(e) => {
                        tracing::warn!(
                            did = %peer.did,
                            error = %e,
                            "no query grant for delegated identity, skipping peer"
                        );
                        return Ok(());
                    }
                }
            }
            None => None,
        };

        let page = match direction {
            SyncDirection::Pull => {
                match self
                    .remote
                    .query_event_log(
                        &peer.dwn_url,
                        &peer.did,
                        peer.protocol.as_deref(),
                        peer.cursor.as_ref(),
                        grant_id.as_ref(),
                    )
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        tracing::warn!(
                            url = %peer.dwn_url,
                            error = %e,
                            "event-log query failed, skipping peer this pass"
                        );
                        return Ok(());
                    }
                }
            }
            SyncDirection::Push => {
                self.node
                    .query_event_log(&peer.did, peer.protocol.as_deref(), peer.cursor.as_ref())
                    .await?
            }
        };

        if !page.entries.is_empty() {
            let jobs: Vec<SyncJobKey> = page
                .entries
                .iter()
                .map(|cid| SyncJobKey {
                    did: peer.did.clone(),
                    delegate_did: peer.delegate_did.clone(),
                    dwn_url: peer.dwn_url.clone(),
                    protocol: peer.protocol.clone(),
                    watermark: self.watermarks.next(),
                    message_cid: cid.clone(),
                })
                .collect();
            self.queue(direction).enqueue(&jobs).await?;
            report.enqueued += jobs.len();
        }

        if let Some(cursor) = &page.cursor {
            self.cursors
                .set(&peer.did, &peer.dwn_url, direction, peer.protocol.as_deref(), cursor)
                .await?;
        }
        Ok(())
    }

    /// Drain one queue in key order, deleting completed jobs in one batch
    /// at the end.
    async fn drain_queue(
        &self,
        direction: SyncDirection,
        report: &mut SyncReport,
    ) -> Result<()> {
        let queue = self.queue(direction);
        let jobs = queue.jobs().await?;
        if jobs.is_empty() {
            return Ok(());
        }

        // Endpoints that already failed this pass. Their remaining jobs
        // are skipped without a network attempt and retried next pass.
        let mut errored: HashSet<String> = HashSet::new();
        let mut completed = Vec::new();

        for job in &jobs {
            let outcome = match direction {
                SyncDirection::Push => self.process_push_job(job, &mut errored).await?,
                SyncDirection::Pull => self.process_pull_job(job, &mut errored).await?,
            };
            match outcome {
                JobOutcome::Synced => {
                    completed.push(job.clone());
                    match direction {
                        SyncDirection::Push => report.pushed += 1,
                        SyncDirection::Pull => report.pulled += 1,
                    }
                }
                JobOutcome::Skipped(reason) => {
                    tracing::trace!(cid = %job.message_cid, reason, "job skipped");
                    report.skipped += 1;
                }
                JobOutcome::Deferred(reason) => {
                    tracing::debug!(cid = %job.message_cid, reason, "job deferred");
                    report.deferred += 1;
                }
            }
        }

        queue.remove(&completed).await?;
        Ok(())
    }

    /// Resolve the grant authorizing a delegated job, or the outcome that
    /// defers it. Non-delegated jobs need no grant.
    async fn job_grant(
        &self,
        job: &SyncJobKey,
        kind: MessageKind,
    ) -> std::result::Result<Option<GrantId>, JobOutcome> {
        let Some(delegate) = &job.delegate_did else {
            return Ok(None);
        };
        let scope = GrantScope {
            connected_did: job.did.clone(),
            delegate_did: delegate.clone(),
            message_kind: kind,
            protocol: job.protocol.clone(),
        };
        match self.grants.grant_for_request(&scope, true).await {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                tracing::warn!(did = %job.did, error = %e, "grant unavailable for delegated job");
                Err(JobOutcome::Deferred("grant unavailable"))
            }
        }
    }

    async fn process_pull_job(
        &self,
        job: &SyncJobKey,
        errored: &mut HashSet<String>,
    ) -> Result<JobOutcome> {
        if errored.contains(&job.dwn_url) {
            return Ok(JobOutcome::Skipped("endpoint failed earlier this pass"));
        }

        // Echo of a message this side already confirmed synchronized;
        // completes without touching the network.
        if self.history.contains(&job.did, &job.message_cid).await? {
            return Ok(JobOutcome::Synced);
        }

        let grant_id = match self.job_grant(job, MessageKind::MessagesRead).await {
            Ok(id) => id,
            Err(outcome) => return Ok(outcome),
        };

        let reply = match self
            .remote
            .read_message(&job.dwn_url, &job.did, &job.message_cid, grant_id.as_ref())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(url = %job.dwn_url, error = %e, "remote read failed");
                errored.insert(job.dwn_url.clone());
                return Ok(JobOutcome::Deferred("endpoint unreachable"));
            }
        };

        let Some(entry) = reply.entry else {
            // Gone remotely since enumeration (pruned, or the read was
            // refused). Nothing left to transfer; mark it so later echoes
            // complete immediately.
            self.history.record(&job.did, &job.message_cid).await?;
            return Ok(JobOutcome::Synced);
        };

        let kind = entry.message.kind;
        let status = self
            .node
            .process_message(&job.did, entry.message, entry.data)
            .await?;
        if status.is_accepted_for(kind) {
            self.history.record(&job.did, &job.message_cid).await?;
            Ok(JobOutcome::Synced)
        } else {
            tracing::debug!(
                code = status.code,
                cid = %job.message_cid,
                "local node did not accept pulled message"
            );
            Ok(JobOutcome::Deferred("local node did not accept"))
        }
    }

    async fn process_push_job(
        &self,
        job: &SyncJobKey,
        errored: &mut HashSet<String>,
    ) -> Result<JobOutcome> {
        if errored.contains(&job.dwn_url) {
            return Ok(JobOutcome::Skipped("endpoint failed earlier this pass"));
        }

        // Delegates confirm they still hold a read grant before acting on
        // the identity's behalf.
        let _grant_id = match self.job_grant(job, MessageKind::MessagesRead).await {
            Ok(id) => id,
            Err(outcome) => return Ok(outcome),
        };

        let entry = match self.node.read_message(&job.did, &job.message_cid).await? {
            Some(entry) => entry,
            None => {
                // Pruned locally since enqueue; the push is moot.
                self.history.record(&job.did, &job.message_cid).await?;
                return Ok(JobOutcome::Synced);
            }
        };

        let kind = entry.message.kind;
        let reply = match self
            .remote
            .send_message(&job.dwn_url, &job.did, entry.message, entry.data)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(url = %job.dwn_url, error = %e, "send failed");
                errored.insert(job.dwn_url.clone());
                return Ok(JobOutcome::Deferred("endpoint unreachable"));
            }
        };

        if reply.status.is_accepted_for(kind) {
            self.history.record(&job.did, &job.message_cid).await?;
            Ok(JobOutcome::Synced)
        } else {
            tracing::debug!(
                code = reply.status.code,
                cid = %job.message_cid,
                "remote node did not accept pushed message"
            );
            Ok(JobOutcome::Deferred("remote node did not accept"))
        }
    }
}
