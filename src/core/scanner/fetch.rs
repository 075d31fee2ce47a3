// src/core/scanner/fetch.rs

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::transport::{HeadResponse, Transport};
use crate::config::ScannerConfig;
use crate::core::models::{Domain, Phase, ProbeError, ScanAttempt, Scheme};

/// Caps simultaneous connections to a single host.
///
/// Semaphores are created on first use and dropped again once no caller holds
/// or waits on one, so the map stays proportional to the hosts in flight.
pub struct HostLimiter {
    per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimiter {
    pub fn new(per_host: usize) -> Self {
        Self { per_host: per_host.max(1), hosts: Mutex::new(HashMap::new()) }
    }

    async fn acquire(&self, host: &str) -> HostPermit<'_> {
        let semaphore = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
                .clone()
        };
        // The semaphore is never closed, so acquisition cannot fail.
        let permit = semaphore.acquire_owned().await.ok();
        HostPermit { limiter: self, host: host.to_string(), permit }
    }

    fn release(&self, host: &str) {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        if hosts.get(host).is_some_and(|s| Arc::strong_count(s) == 1) {
            hosts.remove(host);
        }
    }

    #[cfg(test)]
    fn tracked_hosts(&self) -> usize {
        self.hosts.lock().unwrap().len()
    }
}

struct HostPermit<'a> {
    limiter: &'a HostLimiter,
    host: String,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for HostPermit<'_> {
    fn drop(&mut self) {
        // Return the permit (and its Arc) before checking whether the entry is idle.
        self.permit.take();
        self.limiter.release(&self.host);
    }
}

/// Redirect hops followed in the headers phase before the attempt fails.
pub const MAX_REDIRECTS: usize = 10;

/// Performs the two-phase probe of one domain under one scheme.
pub struct FetchWorker {
    transport: Arc<dyn Transport>,
    hosts: HostLimiter,
    head_timeout: Duration,
    body_timeout: Duration,
    sample_bytes: usize,
}

impl FetchWorker {
    pub fn new(transport: Arc<dyn Transport>, config: &ScannerConfig) -> Self {
        Self {
            transport,
            hosts: HostLimiter::new(config.per_host_limit),
            head_timeout: config.head_timeout,
            body_timeout: config.body_timeout,
            sample_bytes: config.sample_bytes,
        }
    }

    /// Headers first, then a capped body sample from wherever the redirects
    /// led. Either phase failing aborts the attempt; nothing partial is returned.
    pub async fn probe(&self, domain: &Domain, scheme: Scheme) -> Result<ScanAttempt, ProbeError> {
        let url = Url::parse(&format!("{}://{}/", scheme, domain))
            .map_err(|e| ProbeError::Connection(format!("invalid url: {}", e)))?;

        let started_at = Utc::now();
        let start = Instant::now();

        let (url, head) = self.follow_redirects(url).await?;
        debug!(%domain, %scheme, %url, status = head.status, "Headers phase complete.");

        let bytes = {
            let _permit = self.hosts.acquire(host_of(&url)).await;
            timeout(self.body_timeout, self.transport.sample(&url, self.sample_bytes))
                .await
                .map_err(|_| ProbeError::Timeout { phase: Phase::Body })??
        };
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(ScanAttempt {
            scheme,
            started_at,
            status: head.status,
            headers: head.headers,
            body_sample: decode_sample(&bytes, self.sample_bytes),
            latency_ms,
        })
    }

    /// Issues header requests until a non-redirect answer. Every hop holds a
    /// permit for the host it actually contacts and runs under the headers
    /// timeout.
    async fn follow_redirects(&self, mut url: Url) -> Result<(Url, HeadResponse), ProbeError> {
        for _ in 0..=MAX_REDIRECTS {
            let head = {
                let _permit = self.hosts.acquire(host_of(&url)).await;
                timeout(self.head_timeout, self.transport.head(&url))
                    .await
                    .map_err(|_| ProbeError::Timeout { phase: Phase::Headers })??
            };
            match redirect_target(&url, &head)? {
                Some(next) => {
                    debug!(from = %url, to = %next, status = head.status, "Following redirect.");
                    url = next;
                }
                None => return Ok((url, head)),
            }
        }
        Err(ProbeError::Connection(format!("more than {} redirects", MAX_REDIRECTS)))
    }
}

fn host_of(url: &Url) -> &str {
    url.host_str().unwrap_or_default()
}

/// Where a 3xx answer points, resolved against the requesting URL.
fn redirect_target(from: &Url, head: &HeadResponse) -> Result<Option<Url>, ProbeError> {
    if !matches!(head.status, 301 | 302 | 303 | 307 | 308) {
        return Ok(None);
    }
    let Some(location) = head.headers.get("location") else {
        return Ok(None);
    };
    let next = from
        .join(location.trim())
        .map_err(|e| ProbeError::Connection(format!("invalid redirect to {:?}: {}", location, e)))?;
    match next.scheme() {
        "http" | "https" if next.host_str().is_some() => Ok(Some(next)),
        _ => Err(ProbeError::Connection(format!("unsupported redirect to {}", next))),
    }
}

/// Decodes at most `cap` bytes as UTF-8, replacing invalid sequences.
fn decode_sample(bytes: &[u8], cap: usize) -> String {
    let end = bytes.len().min(cap);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
