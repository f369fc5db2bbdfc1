//! Optional persistent secondary cache.
//!
//! Consulted before the pipe pool for cacheable resources and filled after
//! a successful fetch. Its errors are never fatal to a load.

pub mod disk;
pub mod eviction;

use std::{fmt, sync::Arc, time::Duration, time::SystemTime};

use async_trait::async_trait;
use lazyload_model::ResourceKey;

use crate::error::Result;

pub use disk::DiskResourceCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPayload {
    pub payload: Arc<str>,
    pub stored_at: SystemTime,
    pub expires_at: SystemTime,
}

#[async_trait]
pub trait PersistentCache: Send + Sync + fmt::Debug {
    /// Returns the stored payload unless absent or expired.
    async fn get(&self, key: &ResourceKey) -> Result<Option<StoredPayload>>;

    async fn put(
        &self,
        key: &ResourceKey,
        payload: &str,
        ttl: Duration,
    ) -> Result<()>;

    /// Drops the entry written longest ago and returns its key.
    async fn evict_oldest(&self) -> Result<Option<ResourceKey>>;
}
