//! # PDN Agent Sync
//!
//! Bidirectional synchronization between a local data node and the remote
//! nodes of each registered identity.
//!
//! ## Architecture
//!
//! A pass has two phases per direction:
//!
//! 1. **Enqueue**: enumerate each peer's event log from its persisted
//!    cursor and write one durable job per new message CID into the
//!    direction's queue. Jobs survive restarts.
//! 2. **Drain**: walk the queue in key order (watermark order within each
//!    peer group) and transfer each message. Completed jobs are deleted in
//!    one batch; failed jobs stay queued for the next pass.
//!
//! Failure isolation is per job and per peer: an unreachable endpoint
//! trips a pass-local circuit breaker that skips its remaining jobs, a
//! missing delegation grant defers only the affected jobs, and none of
//! these abort the pass.
//!
//! At most one pass runs per engine; competing callers fail fast. The
//! [`SyncScheduler`] runs passes on an interval and skips ticks that land
//! while a pass is still in flight.

pub mod engine;
pub mod error;
pub mod keys;
pub mod peers;
pub mod queue;
pub mod scheduler;
pub mod state;
pub mod transport;

pub use engine::{JobOutcome, SyncEngine, SyncOptions, SyncReport};
pub use error::{Result, SyncError};
pub use keys::{cursor_key, history_key, partitions, SyncJobKey, SEPARATOR};
pub use peers::SyncPeerState;
pub use queue::JobQueue;
pub use scheduler::SyncScheduler;
pub use state::{CursorStore, HistoryStore, IdentityOptions, IdentityStore};
pub use transport::{EndpointResolver, RemoteNodeClient, TransportError};
