use std::sync::Arc;

use async_trait::async_trait;

use super::transport::{
    FetchRequest, FetchResponse, Transport, TransportError,
};

/// Sends `http`/`https` urls to the remote transport and everything else
/// to the local one.
#[derive(Debug, Clone)]
pub struct RoutingTransport {
    remote: Arc<dyn Transport>,
    local: Arc<dyn Transport>,
}

impl RoutingTransport {
    pub fn new(remote: Arc<dyn Transport>, local: Arc<dyn Transport>) -> Self {
        Self { remote, local }
    }

    pub fn is_remote(url: &str) -> bool {
        let Some((scheme, _)) = url.split_once("://") else {
            return false;
        };
        scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
    }
}

#[async_trait]
impl Transport for RoutingTransport {
    async fn fetch(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, TransportError> {
        if Self::is_remote(&request.url) {
            self.remote.fetch(request).await
        } else {
            self.local.fetch(request).await
        }
    }
}
