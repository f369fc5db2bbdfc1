use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use lazyload_config::PersistentCacheConfig;
use lazyload_model::ResourceKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::eviction::{CacheEntryInfo, EvictionPlan, plan_evictions};
use super::{PersistentCache, StoredPayload};
use crate::error::{LoadError, Result};

const INDEX_PREFIX: &str = "resources/v1/";

/// Metadata stored alongside each payload in the cacache index.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    expires_ms: u64,
}

/// Resource payload store on top of `cacache`.
///
/// Entries live under a versioned, digest-derived index key. Expiry is kept
/// in the entry metadata; expired entries read as absent and are removed on
/// sight. With a byte quota, the oldest writes are evicted after each put
/// until the store fits.
#[derive(Clone, Debug)]
pub struct DiskResourceCache {
    root: PathBuf,
    max_bytes: Option<u64>,
}

impl DiskResourceCache {
    pub fn new(root: impl Into<PathBuf>, max_bytes: Option<u64>) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn from_config(config: &PersistentCacheConfig) -> Self {
        Self::new(config.root.clone(), config.max_bytes)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable index key for a resource. Versioned so the layout can change
    /// without reading stale entries.
    pub fn index_key_for(key: &ResourceKey) -> String {
        let digest = Sha256::digest(key.as_str().as_bytes());
        let mut out = String::with_capacity(INDEX_PREFIX.len() + 64);
        out.push_str(INDEX_PREFIX);
        out.push_str(&hex::encode(digest));
        out
    }

    async fn list(&self) -> Result<Vec<cacache::Metadata>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            for entry in cacache::index::ls(&root) {
                match entry {
                    Ok(m) if m.key.starts_with(INDEX_PREFIX) => out.push(m),
                    Ok(_) => {}
                    Err(e) => warn!("resource cache index ls entry error: {e}"),
                }
            }
            out
        })
        .await
        .map_err(|e| LoadError::Cache(format!("index listing join error: {e}")))
    }

    async fn remove_index_key(&self, index_key: &str) -> Result<()> {
        cacache::index::RemoveOpts::new()
            .remove_fully(true)
            .remove(&self.root, index_key)
            .await
            .map_err(|e| LoadError::Cache(format!("cacache remove failed: {e}")))
    }

    /// Removes expired entries and, with a quota, the oldest writes until
    /// the store fits.
    pub async fn enforce_quota(&self) -> Result<EvictionPlan> {
        let now_ms = unix_ms_now();
        let infos = self
            .list()
            .await?
            .into_iter()
            .map(|m| CacheEntryInfo {
                expires_ms: entry_meta(&m).map(|meta| meta.expires_ms).unwrap_or(0),
                written_ms: u128_to_u64(m.time),
                size_bytes: m.size as u64,
                index_key: m.key,
            })
            .collect();

        let plan = plan_evictions(infos, now_ms, self.max_bytes.unwrap_or(0));
        for evicted in &plan.planned {
            if let Err(err) = self.remove_index_key(&evicted.index_key).await {
                warn!(
                    index_key = %evicted.index_key,
                    %err,
                    "resource cache eviction failed"
                );
            }
        }
        if !plan.planned.is_empty() {
            debug!(
                removed_expired = plan.removed_expired,
                removed_quota = plan.removed_quota,
                bytes_after = plan.total_bytes_after,
                "resource cache evicted entries"
            );
        }
        Ok(plan)
    }
}

#[async_trait]
impl PersistentCache for DiskResourceCache {
    async fn get(&self, key: &ResourceKey) -> Result<Option<StoredPayload>> {
        let index_key = Self::index_key_for(key);
        let Some(meta) = cacache::metadata(&self.root, &index_key)
            .await
            .map_err(map_cacache_error)?
        else {
            return Ok(None);
        };

        let stored_ms = u128_to_u64(meta.time);
        let expires_ms = entry_meta(&meta).map(|m| m.expires_ms).unwrap_or(0);
        if expires_ms <= unix_ms_now() {
            self.remove_index_key(&index_key).await?;
            return Ok(None);
        }

        let bytes = match cacache::read(&self.root, &index_key).await {
            Ok(bytes) => bytes,
            Err(cacache::Error::EntryNotFound(_, _)) => return Ok(None),
            Err(err) => return Err(map_cacache_error(err)),
        };
        let payload = String::from_utf8(bytes).map_err(|e| {
            LoadError::Cache(format!("cached payload for {key} is not utf-8: {e}"))
        })?;

        Ok(Some(StoredPayload {
            payload: Arc::from(payload),
            stored_at: UNIX_EPOCH + Duration::from_millis(stored_ms),
            expires_at: UNIX_EPOCH + Duration::from_millis(expires_ms),
        }))
    }

    async fn put(
        &self,
        key: &ResourceKey,
        payload: &str,
        ttl: Duration,
    ) -> Result<()> {
        let index_key = Self::index_key_for(key);

        if let Ok(Some(_)) = cacache::metadata(&self.root, &index_key).await {
            self.remove_index_key(&index_key).await?;
        }

        let ttl_ms = u128_to_u64(ttl.as_millis());
        let meta = serde_json::to_value(EntryMeta {
            key: key.as_str().to_string(),
            expires_ms: unix_ms_now().saturating_add(ttl_ms),
        })
        .map_err(|e| LoadError::Cache(format!("entry metadata: {e}")))?;

        let root = self.root.clone();
        let bytes = payload.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || {
            let mut writer = cacache::WriteOpts::new()
                .size(bytes.len())
                .metadata(meta)
                .open_sync(&root, &index_key)
                .map_err(map_cacache_error)?;
            writer.write_all(&bytes).map_err(|e| {
                LoadError::Cache(format!("cacache write failed: {e}"))
            })?;
            writer.commit().map_err(map_cacache_error)?;
            Ok::<_, LoadError>(())
        })
        .await
        .map_err(|e| LoadError::Cache(format!("cache write join error: {e}")))??;

        if self.max_bytes.is_some() {
            self.enforce_quota().await?;
        }
        Ok(())
    }

    async fn evict_oldest(&self) -> Result<Option<ResourceKey>> {
        let Some(oldest) = self.list().await?.into_iter().min_by_key(|m| m.time)
        else {
            return Ok(None);
        };

        self.remove_index_key(&oldest.key).await?;
        Ok(entry_meta(&oldest).and_then(|meta| ResourceKey::new(meta.key).ok()))
    }
}

fn entry_meta(meta: &cacache::Metadata) -> Option<EntryMeta> {
    serde_json::from_value(meta.metadata.clone()).ok()
}

fn map_cacache_error(e: cacache::Error) -> LoadError {
    match e {
        cacache::Error::EntryNotFound(_, key) => {
            LoadError::Cache(format!("cache entry not found: {key}"))
        }
        cacache::Error::IntegrityError(err) => {
            LoadError::Cache(format!("cache entry failed integrity check: {err}"))
        }
        cacache::Error::SizeMismatch(wanted, actual) => LoadError::Cache(
            format!("cache entry size mismatch: wanted={wanted}, actual={actual}"),
        ),
        cacache::Error::IoError(_, msg) => {
            LoadError::Cache(format!("cacache I/O error: {msg}"))
        }
        cacache::Error::SerdeError(_, msg) => {
            LoadError::Cache(format!("cacache serde error: {msg}"))
        }
    }
}

fn u128_to_u64(v: u128) -> u64 {
    v.min(u128::from(u64::MAX)) as u64
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u128_to_u64(d.as_millis()))
        .unwrap_or_default()
}
