//! # PDN Agent Testkit
//!
//! Testing utilities for the PDN agent.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-memory [`DataNode`](pdn_agent_core::DataNode)
//!   implementation and a fully wired [`SyncFixture`] for scenario tests
//! - **Generators**: proptest strategies for the core message types
//!
//! ## Test Fixtures
//!
//! Quickly set up a sync scenario:
//!
//! ```rust
//! use pdn_agent_sync::IdentityOptions;
//! use pdn_agent_testkit::fixtures::{random_did, write_message, SyncFixture};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let fixture = SyncFixture::new();
//! let alice = random_did();
//! let remote = fixture.remote_node("https://node.example");
//!
//! remote.ingest(&alice, write_message(&alice, None, "r1"), None);
//! fixture
//!     .register(&alice, &["https://node.example"], IdentityOptions::default())
//!     .await
//!     .unwrap();
//!
//! let report = fixture.engine.sync(None).await.unwrap();
//! assert_eq!(report.pulled, 1);
//! # }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{delete_message, random_did, write_message, MemoryDataNode, SyncFixture};
