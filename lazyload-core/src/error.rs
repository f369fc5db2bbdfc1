use std::time::Duration;

use lazyload_model::{ModelError, ResourceKey};
use thiserror::Error;

/// Errors surfaced by the loading engine.
///
/// Every variant carries owned strings so one failure can be delivered to
/// any number of registered failure callbacks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("failed to fetch {name}: {reason}")]
    FetchFailure { name: String, reason: String },

    #[error("fetch of {name} timed out after {after:?}")]
    Timeout { name: String, after: Duration },

    #[error(
        "resource key {key} already belongs to '{existing}', cannot reuse it for '{incoming}'"
    )]
    DuplicateKeyCollision {
        key: ResourceKey,
        existing: String,
        incoming: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid resource: {0}")]
    Model(#[from] ModelError),

    #[error("no Tokio runtime available to drive the loader")]
    NoRuntime,

    #[error("loader is shut down")]
    Closed,
}

impl LoadError {
    /// Failures caused by one resource's fetch, as opposed to loader state.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailure { .. } | Self::Timeout { .. })
    }
}

impl From<lazyload_config::ConfigLoadError> for LoadError {
    fn from(err: lazyload_config::ConfigLoadError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
