use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client, header};
use tracing::trace;
use url::Url;

use super::transport::{
    FetchRequest, FetchResponse, Transport, TransportError,
};

/// Query parameter appended when a request must bypass caches.
pub const CACHE_BUSTER_PARAM: &str = "_ac";

/// Fetches resources over HTTP(S).
///
/// Relative urls are joined onto `base` when one is configured.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Option<Url>,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client, base: None }
    }

    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    fn target(&self, request: &FetchRequest) -> Result<Url, TransportError> {
        let parsed = match &self.base {
            Some(base) => base.join(&request.url),
            None => Url::parse(&request.url),
        };
        let mut url = parsed.map_err(|err| TransportError::Request {
            url: request.url.clone(),
            reason: err.to_string(),
        })?;

        if request.bypass_cache {
            url.query_pairs_mut()
                .append_pair(CACHE_BUSTER_PARAM, &unix_ms_now().to_string());
        }
        Ok(url)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, TransportError> {
        let url = self.target(request)?;
        trace!(%url, bypass_cache = request.bypass_cache, "http fetch");

        let mut builder = self.client.get(url.clone());
        if request.bypass_cache {
            builder = builder.header(header::CACHE_CONTROL, "no-cache");
        }
        // The pipe pool enforces `request.timeout`; only timeouts configured
        // on the client itself surface here.
        let request_error = |err: reqwest::Error| {
            if err.is_timeout() {
                TransportError::TimedOut(url.to_string())
            } else {
                TransportError::Request {
                    url: url.to_string(),
                    reason: err.to_string(),
                }
            }
        };
        let response = builder.send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(request_error)?;

        Ok(FetchResponse { status, body })
    }
}

fn unix_ms_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
