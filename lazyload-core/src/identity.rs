//! Resource identity.
//!
//! Identity is name-based and collision-free: the key of a resource is its
//! requested name, unless the caller pins an explicit key through the `key`
//! property.

use lazyload_model::{DescriptorOverrides, ResourceKey};

use crate::error::Result;

/// Derives the key for `name`, honouring an explicit key override.
pub fn identify(
    name: &str,
    overrides: &DescriptorOverrides,
) -> Result<ResourceKey> {
    match &overrides.key {
        Some(key) => Ok(key.clone()),
        None => Ok(ResourceKey::new(name.trim())?),
    }
}
