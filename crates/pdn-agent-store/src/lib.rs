//! # PDN Agent Store
//!
//! Storage abstraction for the PDN agent's sync state. Provides a
//! trait-based ordered key-value interface with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! Sync state (registered identities, cursors, dedup history, job queues)
//! lives in named partitions of one [`KeyValueStore`]. Keys within a
//! partition are sorted bytewise, which is what gives job-queue iteration
//! its watermark ordering.
//!
//! ## Key Types
//!
//! - [`KeyValueStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`BatchOp`] - One entry of an atomic write batch
//!
//! ## Design Notes
//!
//! - A single engine instance owns a store; this crate does not arbitrate
//!   cross-process access to the same database.
//! - Batches are atomic in the SQLite backend (one transaction).

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{BatchOp, KeyValueStore};
