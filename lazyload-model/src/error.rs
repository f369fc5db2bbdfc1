use thiserror::Error;

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("resource key cannot be empty")]
    EmptyKey,
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),
    #[error("unknown placement target '{0}'")]
    UnknownTarget(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
