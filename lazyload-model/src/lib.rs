//! Core data model definitions shared across lazyload crates.
#![allow(missing_docs)]

pub mod descriptor;
pub mod error;
pub mod key;
pub mod kind;

pub use descriptor::{DescriptorOverrides, ResourceDescriptor};
pub use error::{ModelError, Result as ModelResult};
pub use key::ResourceKey;
pub use kind::{PlacementTarget, ResourceKind};
