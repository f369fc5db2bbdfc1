//! Configuration library for the lazyload engine.
//!
//! Holds the loader's full configuration surface, the partial patches that
//! callers and `@configuration` directives merge into it, environment and
//! file loading, and the guard rails applied before a config is used.
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigSource, error::ConfigLoadError};
pub use models::{
    ConfigFieldError, ConfigPatch, DebugConfig, LoaderConfig,
    PersistentCacheConfig,
};
pub use validation::{
    ConfigGuardRailError, ConfigWarning, ConfigWarnings, apply_guard_rails,
};
