use std::{collections::HashMap, sync::Arc};

use lazyload_model::ResourceKey;

/// Payloads fetched during this loader's lifetime.
///
/// Every successful fetch lands here regardless of the cacheable flag, so a
/// resource requested twice within one chain is never fetched twice.
/// Non-cacheable entries are dropped when their descriptor is placed.
#[derive(Debug, Default)]
pub struct SessionCache {
    payloads: HashMap<ResourceKey, Arc<str>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ResourceKey) -> Option<Arc<str>> {
        self.payloads.get(key).cloned()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.payloads.contains_key(key)
    }

    pub fn put(&mut self, key: ResourceKey, payload: Arc<str>) {
        self.payloads.insert(key, payload);
    }

    pub fn remove(&mut self, key: &ResourceKey) -> Option<Arc<str>> {
        self.payloads.remove(key)
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}
