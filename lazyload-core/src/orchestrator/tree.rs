use std::collections::{BTreeMap, HashMap};

use lazyload_model::ResourceKey;

/// Loaded-but-unplaced resources grouped by discovery depth.
///
/// A key sits at one depth only; inserting it again at a deeper level moves
/// it there so it is still placed before everything that depends on it.
#[derive(Debug, Default)]
pub struct PlacementTree {
    levels: BTreeMap<usize, Vec<ResourceKey>>,
    depths: HashMap<ResourceKey, usize>,
}

impl PlacementTree {
    /// Adds `key` at `depth`, keeping the deeper depth if already present.
    pub fn insert(&mut self, key: ResourceKey, depth: usize) {
        if let Some(&current) = self.depths.get(&key) {
            if current >= depth {
                return;
            }
            if let Some(level) = self.levels.get_mut(&current) {
                level.retain(|k| k != &key);
                if level.is_empty() {
                    self.levels.remove(&current);
                }
            }
        }
        self.depths.insert(key.clone(), depth);
        self.levels.entry(depth).or_default().push(key);
    }

    pub fn depth_of(&self, key: &ResourceKey) -> Option<usize> {
        self.depths.get(key).copied()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.depths.contains_key(key)
    }

    /// Empties the tree, deepest level first, arrival order within a level.
    pub fn drain_deepest_first(&mut self) -> Vec<ResourceKey> {
        self.depths.clear();
        std::mem::take(&mut self.levels)
            .into_values()
            .rev()
            .flatten()
            .collect()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.depths.clear();
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}
