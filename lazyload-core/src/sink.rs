//! Placement sinks: where finished descriptors are handed, in dependency
//! order, to be applied to the host environment.

use std::{fmt, sync::Arc};

use lazyload_model::ResourceDescriptor;
use parking_lot::Mutex;
use tracing::info;

/// Applies placed descriptors to the host.
///
/// The loader never places a descriptor twice within one flush; placements
/// across chains are not deduplicated.
pub trait PlacementSink: Send + Sync + fmt::Debug {
    fn place(&self, descriptor: &ResourceDescriptor);
}

/// Keeps every placement in order for later application or inspection.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    placed: Arc<Mutex<Vec<ResourceDescriptor>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placed(&self) -> Vec<ResourceDescriptor> {
        self.placed.lock().clone()
    }

    /// Names in placement order.
    pub fn names(&self) -> Vec<String> {
        self.placed.lock().iter().map(|d| d.name.clone()).collect()
    }
}

impl PlacementSink for RecordingSink {
    fn place(&self, descriptor: &ResourceDescriptor) {
        self.placed.lock().push(descriptor.clone());
    }
}

/// Logs placements. Used by the default loader until a host installs its
/// own sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl PlacementSink for TracingSink {
    fn place(&self, descriptor: &ResourceDescriptor) {
        info!(
            key = %descriptor.key,
            uri = %descriptor.uri,
            kind = %descriptor.kind,
            target = %descriptor.target,
            bytes = descriptor.payload.as_ref().map(|p| p.len()).unwrap_or(0),
            "placing resource"
        );
    }
}
