// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumIter};
use thiserror::Error;

use crate::core::knowledge_base::{HTTP_PENALTY, HTTP_PENALTY_PREFIX, NO_REASON};

// --- Domain Model ---

/// A host name read from the domain list. Identity is the lower-cased text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Domain(String);

impl Domain {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol prefix used for a probe. Declaration order is the fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Https,
    Http,
}

/// Response headers keyed by lower-cased name.
pub type Headers = BTreeMap<String, String>;

/// Renders headers as newline-delimited `key: value` text for storage.
pub fn headers_text(headers: &Headers) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

// --- Probe Models ---

/// The two network calls of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Headers,
    Body,
}

/// Non-fatal failure of a single scheme attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("{phase} phase timed out")]
    Timeout { phase: Phase },
    #[error("connection failed: {0}")]
    Connection(String),
}

/// One successful scheme attempt against a domain.
#[derive(Debug, Clone)]
pub struct ScanAttempt {
    pub scheme: Scheme,
    pub started_at: DateTime<Utc>,
    pub status: u16,
    pub headers: Headers,
    pub body_sample: String,
    pub latency_ms: u64,
}

// --- Scoring Models ---

/// Output of the scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScoreResult {
    pub score: i32,
    pub reasons: Vec<String>,
    pub https_penalty: bool,
}

impl ScoreResult {
    pub(crate) fn short_circuit(score: i32, reason: impl Into<String>) -> Self {
        Self { score, reasons: vec![reason.into()], https_penalty: false }
    }

    pub(crate) fn add(&mut self, points: i32, reason: impl Into<String>) {
        self.score += points;
        self.reasons.push(reason.into());
    }

    /// Applies the plain-HTTP penalty. Idempotent.
    pub fn with_http_penalty(mut self) -> Self {
        if !self.https_penalty {
            self.https_penalty = true;
            self.score += HTTP_PENALTY;
        }
        self
    }

    /// Reasons joined for storage, with the placeholder when no rule fired.
    pub fn reasons_text(&self) -> String {
        let base = if self.reasons.is_empty() {
            NO_REASON.to_string()
        } else {
            self.reasons.join("; ")
        };
        if self.https_penalty {
            format!("{}{}", HTTP_PENALTY_PREFIX, base)
        } else {
            base
        }
    }
}

// --- Persistence Models ---

/// A record handed to the result sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedScan {
    pub domain: String,
    pub scan_time: DateTime<Utc>,
    pub http_code: u16,
    pub headers: String,
    pub sample_head: String,
    pub score: i32,
    pub reasons: String,
    pub latency_ms: u64,
}

// --- Run Models ---

/// Terminal state of one domain within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainOutcome {
    Persisted { score: i32 },
    BelowThreshold { score: i32 },
    SinkFailed { score: i32 },
    Inaccessible,
}

/// Counters for a complete run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub persisted: usize,
    pub below_threshold: usize,
    pub inaccessible: usize,
    pub sink_failures: usize,
    /// Domains whose task died before producing an outcome.
    pub failed: usize,
}

impl ScanSummary {
    pub fn record(&mut self, outcome: &DomainOutcome) {
        self.total += 1;
        match outcome {
            DomainOutcome::Persisted { .. } => self.persisted += 1,
            DomainOutcome::BelowThreshold { .. } => self.below_threshold += 1,
            DomainOutcome::SinkFailed { .. } => self.sink_failures += 1,
            DomainOutcome::Inaccessible => self.inaccessible += 1,
        }
    }

    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }
}
