// src/core/scanner/testing.rs

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use super::transport::{HeadResponse, Transport};
use crate::core::models::{Headers, ProbeError};

/// Scripted behaviour of one URL.
#[derive(Debug, Clone)]
pub struct Script {
    pub head: Result<HeadResponse, ProbeError>,
    pub head_delay: Duration,
    pub body: Vec<u8>,
    pub body_delay: Duration,
}

impl Script {
    pub fn ok(status: u16, headers: &[(&str, &str)], body: &str) -> Self {
        let headers: Headers =
            headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Self {
            head: Ok(HeadResponse { status, headers }),
            head_delay: Duration::ZERO,
            body: body.as_bytes().to_vec(),
            body_delay: Duration::ZERO,
        }
    }

    pub fn refused() -> Self {
        Self {
            head: Err(ProbeError::Connection("connection refused".into())),
            ..Self::ok(200, &[], "")
        }
    }

    /// A 301 pointing at `location`, which may be relative.
    pub fn redirect(location: &str) -> Self {
        Self::ok(301, &[("location", location)], "")
    }

    pub fn hanging() -> Self {
        Self { head_delay: Duration::from_secs(60), ..Self::ok(200, &[], "") }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.head_delay = delay;
        self.body_delay = delay;
        self
    }
}

/// Instrumented in-memory transport. Unknown URLs use the fallback script.
pub struct FakeTransport {
    scripts: HashMap<String, Script>,
    fallback: Script,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Current and peak in-flight calls per host.
    per_host: Mutex<HashMap<String, (usize, usize)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new(fallback: Script) -> Self {
        Self {
            scripts: HashMap::new(),
            fallback,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            per_host: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Registers a script for `url`, e.g. `https://example.ch/`.
    pub fn script(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Peak number of simultaneous calls to `host`.
    pub fn max_in_flight_to(&self, host: &str) -> usize {
        self.per_host.lock().unwrap().get(host).map_or(0, |(_, peak)| *peak)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, url: &Url, kind: &str) -> Script {
        self.calls.lock().unwrap().push(format!("{} {}", kind, url));
        self.scripts.get(url.as_str()).cloned().unwrap_or_else(|| self.fallback.clone())
    }

    async fn tracked(&self, url: &Url, delay: Duration) {
        let host = url.host_str().unwrap_or_default().to_string();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        {
            let mut per_host = self.per_host.lock().unwrap();
            let (current, peak) = per_host.entry(host.clone()).or_default();
            *current += 1;
            *peak = (*peak).max(*current);
        }
        let _guard = InFlight { transport: self, host };
        tokio::time::sleep(delay).await;
    }
}

/// Decrements the in-flight counters even when the call is cancelled by a timeout.
struct InFlight<'a> {
    transport: &'a FakeTransport,
    host: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.transport.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some((current, _)) = self.transport.per_host.lock().unwrap().get_mut(&self.host) {
            *current -= 1;
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn head(&self, url: &Url) -> Result<HeadResponse, ProbeError> {
        let script = self.lookup(url, "HEAD");
        self.tracked(url, script.head_delay).await;
        script.head
    }

    async fn sample(&self, url: &Url, cap: usize) -> Result<Vec<u8>, ProbeError> {
        let script = self.lookup(url, "GET");
        self.tracked(url, script.body_delay).await;
        let mut body = script.body;
        body.truncate(cap);
        Ok(body)
    }
}
