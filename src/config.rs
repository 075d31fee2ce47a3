// src/config.rs

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "ChAuditBot/1.0 (+mailto:you@yourdomain.ch)";
pub const DEFAULT_DOMAINS_FILE: &str = "domains_ch.txt";

/// Settings consumed by the scan orchestrator and fetch worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Domains probed in parallel.
    pub concurrency: usize,
    /// Simultaneous connections allowed to one host.
    pub per_host_limit: usize,
    pub head_timeout: Duration,
    pub body_timeout: Duration,
    /// Upper bound on the body sample, in bytes.
    pub sample_bytes: usize,
    /// Minimum score for a result to be persisted.
    pub score_threshold: i32,
    pub user_agent: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            concurrency: 30,
            per_host_limit: 2,
            head_timeout: Duration::from_secs(3),
            body_timeout: Duration::from_secs(5),
            sample_bytes: 2048,
            score_threshold: 40,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(eyre!("concurrency must be at least 1"));
        }
        if self.per_host_limit == 0 {
            return Err(eyre!("per-host connection limit must be at least 1"));
        }
        if self.sample_bytes == 0 {
            return Err(eyre!("sample size must be at least 1 byte"));
        }
        if self.head_timeout.is_zero() || self.body_timeout.is_zero() {
            return Err(eyre!("timeouts must be greater than zero"));
        }
        Ok(())
    }
}

/// Scanner for outdated websites.
#[derive(Debug, Parser)]
#[command(name = "oldsite-scanner", version, about)]
pub struct Cli {
    /// File containing the domains to scan, one per line.
    #[arg(long, env = "OLDSITES_DOMAINS_FILE", default_value = DEFAULT_DOMAINS_FILE)]
    pub domains_file: PathBuf,

    /// Scan only the first N domains.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Write an example domain list to --domains-file and exit.
    #[arg(long)]
    pub generate_sample: bool,

    /// JSON-lines file receiving qualifying scans [default: <data dir>/scans.jsonl].
    #[arg(long, env = "OLDSITES_OUTPUT")]
    pub output: Option<PathBuf>,

    #[arg(long, env = "OLDSITES_CONCURRENCY", default_value_t = 30)]
    pub concurrency: usize,

    #[arg(long, env = "OLDSITES_PER_HOST", default_value_t = 2)]
    pub per_host: usize,

    /// Headers-phase timeout in seconds.
    #[arg(
        long,
        env = "OLDSITES_HEAD_TIMEOUT",
        default_value_t = 3.0,
        allow_negative_numbers = true
    )]
    pub head_timeout: f64,

    /// Body-phase timeout in seconds.
    #[arg(
        long,
        env = "OLDSITES_BODY_TIMEOUT",
        default_value_t = 5.0,
        allow_negative_numbers = true
    )]
    pub body_timeout: f64,

    #[arg(long, env = "OLDSITES_SAMPLE_BYTES", default_value_t = 2048)]
    pub sample_bytes: usize,

    #[arg(long, env = "OLDSITES_THRESHOLD", default_value_t = 40, allow_negative_numbers = true)]
    pub threshold: i32,

    #[arg(long, env = "OLDSITES_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl Cli {
    pub fn scanner_config(&self) -> Result<ScannerConfig> {
        let config = ScannerConfig {
            concurrency: self.concurrency,
            per_host_limit: self.per_host,
            head_timeout: seconds(self.head_timeout, "head timeout")?,
            body_timeout: seconds(self.body_timeout, "body timeout")?,
            sample_bytes: self.sample_bytes,
            score_threshold: self.threshold,
            user_agent: self.user_agent.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn seconds(value: f64, name: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| eyre!("invalid {}: {}", name, e))
}
