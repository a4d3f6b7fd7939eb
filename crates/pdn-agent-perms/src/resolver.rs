//! Grant resolution.
//!
//! The sync engine asks the resolver for a grant ID right before each
//! delegated operation. Lookups are cache-first: a scope resolved once in
//! a process is answered from the cache until the resolver is told not to.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{PermsError, Result};
use crate::grant::{Grant, GrantId, GrantScope};

/// Async interface to the permission subsystem.
#[async_trait]
pub trait GrantResolver: Send + Sync {
    /// Resolve the grant ID authorizing `scope`.
    ///
    /// When `cached` is true, a previously resolved grant for the same
    /// scope may be returned without consulting the backend. Fails when no
    /// valid grant covers the scope.
    async fn grant_for_request(&self, scope: &GrantScope, cached: bool) -> Result<GrantId>;
}

/// In-memory resolver over a fixed set of grants.
///
/// Backs agents that hold their delegation grants locally, and tests.
pub struct StaticGrantResolver {
    grants: RwLock<HashMap<GrantScope, Grant>>,
    cache: RwLock<HashMap<GrantScope, GrantId>>,
}

impl StaticGrantResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self {
            grants: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Add a grant. Replaces any previous grant for the same scope.
    pub fn insert(&self, grant: Grant) {
        let mut grants = self.grants.write().unwrap();
        grants.insert(grant.scope.clone(), grant);
    }

    /// Remove the grant for a scope, if any.
    pub fn revoke(&self, scope: &GrantScope) {
        self.grants.write().unwrap().remove(scope);
        self.cache.write().unwrap().remove(scope);
    }
}

impl Default for StaticGrantResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantResolver for StaticGrantResolver {
    async fn grant_for_request(&self, scope: &GrantScope, cached: bool) -> Result<GrantId> {
        if cached {
            if let Some(id) = self.cache.read().unwrap().get(scope) {
                return Ok(id.clone());
            }
        }

        let grants = self.grants.read().unwrap();
        let grant = grants
            .get(scope)
            .ok_or_else(|| PermsError::GrantNotFound(scope.to_string()))?;

        if !grant.is_valid(now_millis()) {
            return Err(PermsError::GrantExpired(grant.id.to_string()));
        }

        let id = grant.id.clone();
        drop(grants);

        tracing::debug!(scope = %scope, grant = %id, "grant resolved");
        self.cache
            .write()
            .unwrap()
            .insert(scope.clone(), id.clone());
        Ok(id)
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
