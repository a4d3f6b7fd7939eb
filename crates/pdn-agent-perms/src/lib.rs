//! # PDN Agent Perms
//!
//! Delegated-access grants for the PDN agent.
//!
//! ## Overview
//!
//! When a registered identity configures a delegate DID, every sync
//! operation performed on its behalf must carry the ID of a permission
//! grant covering that operation. This crate models grant scopes, grant
//! validity, and the [`GrantResolver`] seam the sync engine calls right
//! before each delegated request.
//!
//! Grant *issuance* lives in the credential subsystem and is out of scope
//! here; the engine only consumes grant IDs.

pub mod error;
pub mod grant;
pub mod resolver;

pub use error::{PermsError, Result};
pub use grant::{Grant, GrantId, GrantScope};
pub use resolver::{GrantResolver, StaticGrantResolver};
