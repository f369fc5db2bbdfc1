use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ConfigGuardRailError;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to load loader configuration from {path}")]
    File {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to parse LAZYLOAD_CONFIG_JSON: {0}")]
    Inline(#[source] anyhow::Error),
    #[error("invalid value '{value}' for {var}")]
    InvalidEnvValue { var: &'static str, value: String },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
}
