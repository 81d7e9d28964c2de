use std::collections::HashMap;

use async_trait::async_trait;
use buildcache_proto::{ActionResult, ContentDigest};
use tokio::sync::RwLock;

use super::error::StoreError;
use super::traits::ActionCacheStore;
use crate::util::digest::storage_key;

/// Action result store held entirely in memory. No persistence, no
/// expiration.
pub struct MemoryActionCacheStore {
    values: RwLock<HashMap<String, ActionResult>>,
}

impl MemoryActionCacheStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryActionCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionCacheStore for MemoryActionCacheStore {
    async fn get(&self, action_digest: &ContentDigest) -> Result<ActionResult, StoreError> {
        let key = storage_key(action_digest);
        self.values.read().await.get(&key).cloned().ok_or_else(|| {
            StoreError::NotFound(format!(
                "no cached result for action {}",
                action_digest.hash
            ))
        })
    }

    async fn put(
        &self,
        action_digest: &ContentDigest,
        result: &ActionResult,
    ) -> Result<(), StoreError> {
        let key = storage_key(action_digest);
        self.values.write().await.insert(key, result.clone());
        Ok(())
    }
}
