//! # PDN Agent
//!
//! The unified API for a personal-data-node agent: keeping a local node
//! and each identity's remote nodes convergent through watermark-ordered,
//! durable sync passes.
//!
//! ## Overview
//!
//! The agent provides an offline-first library for:
//!
//! - **Identity registration**: which local identities participate in sync,
//!   optionally scoped to protocols and delegated to another identity
//! - **Passes**: push then pull, enumerating each peer's event log into
//!   durable job queues and draining them in watermark order
//! - **Scheduling**: full passes on an interval, with busy ticks skipped
//! - **Failure isolation**: unreachable endpoints, missing grants, and
//!   rejected messages defer jobs instead of aborting a pass
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pdn_agent::{AgentConfig, SyncAgent};
//! use pdn_agent::core::Did;
//! use pdn_agent::store::SqliteStore;
//! use pdn_agent::sync::IdentityOptions;
//!
//! # async fn example(
//! #     node: Arc<dyn pdn_agent::core::DataNode>,
//! #     remote: Arc<dyn pdn_agent::sync::RemoteNodeClient>,
//! #     endpoints: Arc<dyn pdn_agent::sync::EndpointResolver>,
//! #     grants: Arc<dyn pdn_agent::perms::GrantResolver>,
//! # ) {
//! // Open durable storage
//! let store = Arc::new(SqliteStore::open("agent.db").unwrap());
//!
//! // Create the agent over its collaborators
//! let agent = SyncAgent::new(store, node, remote, endpoints, grants, AgentConfig::default());
//!
//! // Register an identity and sync it on an interval
//! let alice = Did::parse("did:dht:alice").unwrap();
//! agent
//!     .register_identity(&alice, &IdentityOptions::default())
//!     .await
//!     .unwrap();
//! agent.start_sync(Duration::from_secs(30));
//! # }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `pdn_agent::core` - Core primitives (Did, Message, Watermark, etc.)
//! - `pdn_agent::store` - Storage abstraction, SQLite and memory backends
//! - `pdn_agent::sync` - The sync engine and scheduler
//! - `pdn_agent::perms` - Delegated access grants

pub mod agent;
pub mod error;

// Re-export component crates
pub use pdn_agent_core as core;
pub use pdn_agent_perms as perms;
pub use pdn_agent_store as store;
pub use pdn_agent_sync as sync;

// Re-export main types for convenience
pub use agent::{AgentConfig, SyncAgent};
pub use error::{AgentError, Result};

// Re-export commonly used types
pub use pdn_agent_core::{Did, Message, MessageCid, MessageKind, SyncDirection};
pub use pdn_agent_sync::{IdentityOptions, JobOutcome, SyncOptions, SyncReport};
