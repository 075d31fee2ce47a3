// src/core/scanner/transport.rs

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::{debug, error};
use url::Url;

use crate::config::ScannerConfig;
use crate::core::models::{Headers, ProbeError};

/// Status and headers returned by the header-only request.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub status: u16,
    pub headers: Headers,
}

/// The network seam used by the fetch worker. Each call is a single request:
/// redirects come back as plain 3xx responses and the caller decides whether
/// to follow them. Timeouts are enforced by the caller, so implementations may
/// block freely.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn head(&self, url: &Url) -> Result<HeadResponse, ProbeError>;

    /// Reads at most `cap` bytes of the response body.
    async fn sample(&self, url: &Url, cap: usize) -> Result<Vec<u8>, ProbeError>;
}

/// `reqwest`-backed transport sharing one connection pool across all domains.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ScannerConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(Policy::none())
            .pool_max_idle_per_host(config.per_host_limit)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to build HTTP client.");
                e
            })?;
        Ok(Self { client })
    }
}

fn connection_error(e: reqwest::Error) -> ProbeError {
    ProbeError::Connection(e.to_string())
}

/// Lower-cases header names; repeated headers are joined with ", ".
/// Values that are not valid UTF-8 are decoded lossily.
fn collect_headers(map: &reqwest::header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    headers
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn head(&self, url: &Url) -> Result<HeadResponse, ProbeError> {
        let response = self.client.head(url.clone()).send().await.map_err(connection_error)?;
        debug!(url = %url, status = %response.status(), "HEAD response received.");
        Ok(HeadResponse {
            status: response.status().as_u16(),
            headers: collect_headers(response.headers()),
        })
    }

    async fn sample(&self, url: &Url, cap: usize) -> Result<Vec<u8>, ProbeError> {
        let mut response = self.client.get(url.clone()).send().await.map_err(connection_error)?;
        let mut buf = Vec::with_capacity(cap);
        while buf.len() < cap {
            match response.chunk().await.map_err(connection_error)? {
                Some(chunk) => {
                    let take = (cap - buf.len()).min(chunk.len());
                    buf.extend_from_slice(&chunk[..take]);
                }
                None => break,
            }
        }
        debug!(url = %url, bytes = buf.len(), "Body sample read.");
        Ok(buf)
    }
}
