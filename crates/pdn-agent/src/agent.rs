//! The agent: unified API over the sync engine and its scheduler.
//!
//! The agent owns one engine and one scheduler and exposes the operations
//! applications call: identity registration, manual passes, interval
//! scheduling, and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use pdn_agent_core::{DataNode, Did, SyncDirection};
use pdn_agent_perms::GrantResolver;
use pdn_agent_store::KeyValueStore;
use pdn_agent_sync::{
    EndpointResolver, IdentityOptions, RemoteNodeClient, SyncEngine, SyncOptions, SyncReport,
    SyncScheduler,
};

use crate::error::Result;

/// Configuration for the agent.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// Engine tunables.
    pub sync: SyncOptions,
}

/// The main agent struct.
///
/// Provides a unified API for:
/// - Registering identities for sync
/// - Running manual sync passes
/// - Scheduling passes on an interval
/// - Clearing and closing persisted state
pub struct SyncAgent {
    engine: Arc<SyncEngine>,
    scheduler: SyncScheduler,
}

impl SyncAgent {
    /// Assemble an agent over its collaborators.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        node: Arc<dyn DataNode>,
        remote: Arc<dyn RemoteNodeClient>,
        endpoints: Arc<dyn EndpointResolver>,
        grants: Arc<dyn GrantResolver>,
        config: AgentConfig,
    ) -> Self {
        let engine = Arc::new(SyncEngine::new(
            store,
            node,
            remote,
            endpoints,
            grants,
            config.sync,
        ));
        let scheduler = SyncScheduler::new(Arc::clone(&engine));
        Self { engine, scheduler }
    }

    /// The underlying engine, for callers that need lower-level access.
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an identity for sync, overwriting any previous options.
    ///
    /// Registered identities participate in every subsequent pass. Nothing
    /// transfers until a pass runs.
    pub async fn register_identity(&self, did: &Did, options: &IdentityOptions) -> Result<()> {
        self.engine.identities().register(did, options).await?;
        tracing::info!(did = %did, "identity registered for sync");
        Ok(())
    }

    /// Remove an identity from sync. Its queued jobs and history are kept;
    /// unregistering an unknown identity is a no-op.
    pub async fn unregister_identity(&self, did: &Did) -> Result<()> {
        self.engine.identities().unregister(did).await?;
        tracing::info!(did = %did, "identity unregistered from sync");
        Ok(())
    }

    /// Fetch the sync options of one registered identity.
    pub async fn identity_options(&self, did: &Did) -> Result<Option<IdentityOptions>> {
        Ok(self.engine.identities().options(did).await?)
    }

    /// Replace the options of an already-registered identity. Fails with
    /// [`SyncError::UnknownIdentity`](pdn_agent_sync::SyncError) if the
    /// identity is not registered.
    pub async fn update_identity_options(
        &self,
        did: &Did,
        options: &IdentityOptions,
    ) -> Result<()> {
        self.engine.identities().update(did, options).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Passes
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one pass now: both directions by default, or a single one.
    ///
    /// Fails fast if a pass is already in flight, including one started by
    /// the scheduler.
    pub async fn sync(&self, direction: Option<SyncDirection>) -> Result<SyncReport> {
        Ok(self.engine.sync(direction).await?)
    }

    /// Whether a pass is in flight right now.
    pub fn is_syncing(&self) -> bool {
        self.engine.is_running()
    }

    /// Start running full passes every `interval`. Replaces any existing
    /// schedule.
    pub fn start_sync(&self, interval: Duration) {
        self.scheduler.start_sync(interval);
    }

    /// Whether an interval schedule is armed.
    pub fn is_sync_scheduled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    /// Disarm the schedule once any in-flight pass has finished, waiting
    /// up to `timeout`. On timeout the schedule stays armed.
    pub async fn stop_sync(&self, timeout: Duration) -> Result<()> {
        self.scheduler.stop_sync(timeout).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete all persisted sync state: identities, cursors, history and
    /// both queues.
    pub async fn clear(&self) -> Result<()> {
        self.engine.clear().await?;
        Ok(())
    }

    /// Close the underlying store. Stop the schedule first; a scheduled
    /// pass against a closed store fails and is logged every tick.
    pub async fn close(&self) -> Result<()> {
        self.engine.close().await?;
        Ok(())
    }
}
