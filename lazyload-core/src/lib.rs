//! # Lazyload Core
//!
//! Demand-driven resource loading with dependency discovery.
//!
//! ## Overview
//!
//! A caller asks for resources by name. The loader translates each name
//! into a descriptor, fetches its payload through a bounded pipe pool,
//! scans the payload for `@directive` annotations that declare further
//! dependencies, and loads those too. When a chain has drained, every
//! finished descriptor is handed to a [`PlacementSink`] deepest dependency
//! first, and exactly one success or failure callback fires.
//!
//! - **Identity**: names map to stable [`ResourceKey`]s; explicit keys that
//!   collide fail the chain instead of overwriting another resource
//! - **Caching**: a per-loader session cache plus an optional on-disk
//!   persistent cache with expiry and a byte quota
//! - **Transports**: HTTP via `reqwest`, local files via `tokio::fs`, or
//!   any [`Transport`] implementation
//!
//! ## Feature Flags
//!
//! - `http` (default): enables [`fetch::HttpTransport`]
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lazyload_core::{FileTransport, Loader, RecordingSink};
//!
//! async fn load_app() -> Result<(), Box<dyn std::error::Error>> {
//!     let sink = RecordingSink::new();
//!     let loader = Loader::builder(Arc::new(FileTransport::new("static")))
//!         .sink(Arc::new(sink.clone()))
//!         .build()?;
//!
//!     let loaded = loader.require("app.js,theme.css").wait().await?;
//!     println!("loaded {loaded:?}, placed {:?}", sink.names());
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]

/// Caching of fetched payloads across loader instances
pub mod cache;
/// Directive payloads turned into dependencies, config and properties
pub mod declarations;
/// Process-wide default loader
pub mod default;
pub mod error;
/// Transports and the pipe pool
pub mod fetch;
pub mod identity;
/// Async driver and the chain API
pub mod loader;
/// Load state machine
pub mod orchestrator;
pub mod registry;
pub mod scanner;
pub mod session_cache;
pub mod sink;

pub use cache::{DiskResourceCache, PersistentCache, StoredPayload};
pub use default::{configure, default_loader, install_default, require};
pub use error::{LoadError, Result};
pub use fetch::{
    FetchRequest, FetchResponse, FileTransport, PipePool, RoutingTransport,
    Transport, TransportError,
};
#[cfg(feature = "http")]
pub use fetch::HttpTransport;
pub use loader::{LoadChain, Loader, LoaderBuilder};
pub use orchestrator::LoaderStats;
pub use orchestrator::completion::LoadFailure;
pub use sink::{PlacementSink, RecordingSink, TracingSink};

pub use lazyload_config::{ConfigPatch, LoaderConfig};
pub use lazyload_model::{
    DescriptorOverrides, PlacementTarget, ResourceDescriptor, ResourceKey,
    ResourceKind,
};
