use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tracing::trace;

use super::transport::{
    FetchRequest, FetchResponse, Transport, TransportError,
};

/// Reads resources from a directory on the local filesystem.
///
/// Missing files answer with status 404 so they fail the same way a remote
/// miss does.
#[derive(Debug, Clone)]
pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, TransportError> {
        let trimmed = url.strip_prefix("file://").unwrap_or(url);
        let relative = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or(trimmed)
            .trim_start_matches('/');

        if Path::new(relative)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(TransportError::Unsupported(url.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn fetch(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, TransportError> {
        let path = self.resolve(&request.url)?;
        trace!(path = %path.display(), "reading local resource");

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(FetchResponse::ok(body)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Ok(FetchResponse::status(404))
            }
            Err(err) => Err(TransportError::Io {
                path: path.display().to_string(),
                reason: err.to_string(),
            }),
        }
    }
}
