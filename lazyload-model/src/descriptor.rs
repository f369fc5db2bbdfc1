use std::sync::Arc;

use crate::key::ResourceKey;
use crate::kind::{PlacementTarget, ResourceKind};

/// Resolved view of one resource: its translated location, flags, and the
/// payload once fetched.
///
/// Descriptors are produced by the registry from an immutable base
/// translation with the accumulated [`DescriptorOverrides`] for the key
/// applied on top. Holders get a snapshot; the registry owns identity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceDescriptor {
    pub key: ResourceKey,
    /// Name exactly as requested.
    pub name: String,
    pub kind: ResourceKind,
    /// Package path with a trailing `/`, empty for top-level names.
    pub path: String,
    pub file: String,
    pub uri: String,
    pub payload: Option<Arc<str>>,
    /// Resource whose content declared this one, if any.
    pub parent: Option<ResourceKey>,
    pub discovered: bool,
    pub cacheable: bool,
    pub target: PlacementTarget,
}

impl ResourceDescriptor {
    pub fn payload_str(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Whether the annotation scanner should look at this resource.
    pub fn wants_scan(&self) -> bool {
        !self.discovered && self.kind.is_parseable()
    }
}

/// Per-call property overrides. Every field is optional; set fields win.
///
/// Overrides for the same key accumulate across calls: merging a later set
/// over an earlier one keeps earlier fields the later set leaves unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DescriptorOverrides {
    pub key: Option<ResourceKey>,
    pub kind: Option<ResourceKind>,
    pub target: Option<PlacementTarget>,
    pub cacheable: Option<bool>,
    pub parent: Option<ResourceKey>,
}

impl DescriptorOverrides {
    pub fn is_empty(&self) -> bool {
        self.key.is_none()
            && self.kind.is_none()
            && self.target.is_none()
            && self.cacheable.is_none()
            && self.parent.is_none()
    }

    pub fn with_parent(mut self, parent: ResourceKey) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Layers `later` over `self`, field by field.
    pub fn merge(&mut self, later: &DescriptorOverrides) {
        if later.key.is_some() {
            self.key.clone_from(&later.key);
        }
        if later.kind.is_some() {
            self.kind = later.kind;
        }
        if later.target.is_some() {
            self.target = later.target;
        }
        if later.cacheable.is_some() {
            self.cacheable = later.cacheable;
        }
        if later.parent.is_some() {
            self.parent.clone_from(&later.parent);
        }
    }

    /// Writes the set fields onto a resolved descriptor. Identity is left
    /// alone; re-keying is the registry's job.
    pub fn apply_to(&self, descriptor: &mut ResourceDescriptor) {
        if let Some(kind) = self.kind {
            descriptor.kind = kind;
        }
        if let Some(target) = self.target {
            descriptor.target = target;
        }
        if let Some(cacheable) = self.cacheable {
            descriptor.cacheable = cacheable;
        }
        if let Some(parent) = &self.parent {
            descriptor.parent = Some(parent.clone());
        }
    }
}
