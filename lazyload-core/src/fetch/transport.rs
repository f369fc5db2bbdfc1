use std::{fmt, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

/// One fetch as handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// Enforced by the pipe pool; transports may also use it as a hint.
    pub timeout: Option<Duration>,
    /// Ask intermediaries for a fresh copy.
    pub bypass_cache: bool,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
            bypass_cache: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("unsupported url: {0}")]
    Unsupported(String),
    #[error("request to {0} timed out")]
    TimedOut(String),
}

/// Byte-fetch collaborator.
///
/// Implementations report transport-level problems as errors and every
/// completed exchange, successful or not, as a [`FetchResponse`].
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn fetch(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, TransportError>;
}
