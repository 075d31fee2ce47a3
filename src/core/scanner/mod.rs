// src/core/scanner/mod.rs

// Scan orchestration: bounded fan-out over the domain list, scheme fallback
// per domain, scoring, and hand-off of qualifying results to the sink.
pub mod fetch;
pub mod scoring;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use self::fetch::FetchWorker;
use self::scoring::score;
use self::transport::Transport;
use crate::config::ScannerConfig;
use crate::core::models::{
    headers_text, Domain, DomainOutcome, PersistedScan, ProbeError, ScanAttempt, ScanSummary,
    Scheme, ScoreResult,
};
use crate::core::sink::ResultSink;

/// Scores an accepted attempt, applying the plain-HTTP penalty when needed.
pub fn evaluate(attempt: &ScanAttempt) -> ScoreResult {
    let result = score(attempt.status, &attempt.headers, &attempt.body_sample);
    match attempt.scheme {
        Scheme::Http => result.with_http_penalty(),
        Scheme::Https => result,
    }
}

/// Drives a full scan run.
pub struct Scanner {
    worker: FetchWorker,
    sink: Arc<dyn ResultSink>,
    concurrency: usize,
    threshold: i32,
}

impl Scanner {
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ResultSink>,
        config: &ScannerConfig,
    ) -> Self {
        Self {
            worker: FetchWorker::new(transport, config),
            sink,
            concurrency: config.concurrency.max(1),
            threshold: config.score_threshold,
        }
    }

    /// Scans every domain with at most `concurrency` in flight.
    ///
    /// A permit is taken before each task is spawned, so the number of live
    /// tasks stays bounded however long the list is. Domains are independent:
    /// a failure in one never cancels another.
    pub async fn scan_all(self: &Arc<Self>, domains: Vec<Domain>) -> ScanSummary {
        info!(
            count = domains.len(),
            concurrency = self.concurrency,
            threshold = self.threshold,
            "Starting scan."
        );
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut summary = ScanSummary::default();

        for domain in domains {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let scanner = Arc::clone(self);
            tasks.spawn(async move {
                let outcome = scanner.scan_domain(&domain).await;
                drop(permit);
                outcome
            });
            // Reap finished tasks as we go to keep the set small.
            while let Some(joined) = tasks.try_join_next() {
                record(&mut summary, joined);
            }
        }
        while let Some(joined) = tasks.join_next().await {
            record(&mut summary, joined);
        }

        info!(
            total = summary.total,
            persisted = summary.persisted,
            below_threshold = summary.below_threshold,
            inaccessible = summary.inaccessible,
            sink_failures = summary.sink_failures,
            failed = summary.failed,
            "Scan finished."
        );
        summary
    }

    /// Tries https then http, stopping at the first scheme that answers.
    pub async fn scan_domain(&self, domain: &Domain) -> DomainOutcome {
        for scheme in Scheme::iter() {
            match self.worker.probe(domain, scheme).await {
                Ok(attempt) => return self.accept(domain, attempt).await,
                Err(ProbeError::Timeout { phase }) => {
                    warn!(%domain, %scheme, %phase, "Timeout.");
                }
                Err(e) => {
                    warn!(%domain, %scheme, error = %e, "Request failed.");
                }
            }
        }
        warn!(%domain, "Inaccessible.");
        DomainOutcome::Inaccessible
    }

    async fn accept(&self, domain: &Domain, attempt: ScanAttempt) -> DomainOutcome {
        let result = evaluate(&attempt);
        let reasons = result.reasons_text();

        if result.score < self.threshold {
            info!(%domain, score = result.score, "Below threshold.");
            return DomainOutcome::BelowThreshold { score: result.score };
        }

        let scan = PersistedScan {
            domain: domain.to_string(),
            scan_time: attempt.started_at,
            http_code: attempt.status,
            headers: headers_text(&attempt.headers),
            sample_head: attempt.body_sample,
            score: result.score,
            reasons,
            latency_ms: attempt.latency_ms,
        };
        let reasons_preview: String = scan.reasons.chars().take(80).collect();
        match self.sink.add_scan(scan).await {
            Ok(()) => {
                info!(
                    %domain,
                    score = result.score,
                    latency_ms = attempt.latency_ms,
                    reasons = %reasons_preview,
                    "Persisted."
                );
                DomainOutcome::Persisted { score: result.score }
            }
            Err(e) => {
                error!(%domain, error = %e, "Failed to persist scan.");
                DomainOutcome::SinkFailed { score: result.score }
            }
        }
    }
}

fn record(summary: &mut ScanSummary, joined: Result<DomainOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => summary.record(&outcome),
        Err(e) => {
            error!(error = %e, "Domain task failed.");
            summary.record_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::testing::{FakeTransport, Script};
    use crate::core::sink::{MemorySink, SinkError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;

    const OLD_PAGE: &str = "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\">\
        <html><head><title>Accueil</title></head><body><center><font face=\"Arial\">\
        Bienvenue sur le site de notre entreprise familiale.</font></center></body></html>";

    const MODERN_PAGE: &str = "<!DOCTYPE html><html><head>\
        <meta name=\"viewport\" content=\"width=device-width\"></head>\
        <body>Bienvenue sur le site de notre entreprise, \
        fondée il y a longtemps et toujours active.</body></html>";

    fn config() -> ScannerConfig {
        ScannerConfig {
            head_timeout: Duration::from_millis(30),
            body_timeout: Duration::from_millis(30),
            ..ScannerConfig::default()
        }
    }

    fn scanner(
        transport: FakeTransport,
        config: &ScannerConfig,
    ) -> (Arc<Scanner>, Arc<FakeTransport>, Arc<MemorySink>) {
        let transport = Arc::new(transport);
        let sink = Arc::new(MemorySink::default());
        let scanner = Arc::new(Scanner::new(transport.clone(), sink.clone(), config));
        (scanner, transport, sink)
    }

    fn attempt(scheme: Scheme) -> ScanAttempt {
        ScanAttempt {
            scheme,
            started_at: Utc::now(),
            status: 200,
            headers: [("server".to_string(), "Apache/2.2.15".to_string())].into_iter().collect(),
            body_sample: OLD_PAGE.to_string(),
            latency_ms: 10,
        }
    }

    #[test]
    fn http_attempt_adds_exactly_the_penalty() {
        let https = evaluate(&attempt(Scheme::Https));
        let http = evaluate(&attempt(Scheme::Http));
        assert_eq!(http.score, https.score + 25);
        assert!(http.reasons_text().starts_with("Pas de HTTPS; "));
        assert_eq!(http.reasons_text(), format!("Pas de HTTPS; {}", https.reasons_text()));
    }

    #[test]
    fn http_penalty_applies_to_short_circuits_too() {
        let mut dead = attempt(Scheme::Http);
        dead.status = 500;
        let result = evaluate(&dead);
        assert_eq!(result.score, -75);
        assert_eq!(result.reasons_text(), "Pas de HTTPS; Site non accessible (HTTP 500)");
    }

    #[tokio::test]
    async fn https_success_is_persisted_without_trying_http() {
        let fake = FakeTransport::new(Script::ok(200, &[("server", "Apache/2.2.15")], OLD_PAGE));
        let (scanner, fake, sink) = scanner(fake, &config());

        let outcome = scanner.scan_domain(&Domain::new("old.ch")).await;
        assert!(matches!(outcome, DomainOutcome::Persisted { .. }));
        assert_eq!(fake.calls(), vec!["HEAD https://old.ch/", "GET https://old.ch/"]);

        let scans = sink.scans().await;
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].domain, "old.ch");
        assert_eq!(scans[0].http_code, 200);
        assert_eq!(scans[0].headers, "server: Apache/2.2.15");
        assert!(!scans[0].reasons.starts_with("Pas de HTTPS"));
        assert!(scans[0].reasons.contains("DOCTYPE HTML 4"));
    }

    #[tokio::test]
    async fn falls_back_to_http_with_penalty() {
        let fake = FakeTransport::new(Script::ok(200, &[], MODERN_PAGE))
            .script("https://plain.ch/", Script::refused());
        let (scanner, fake, sink) = scanner(fake, &config());

        let outcome = scanner.scan_domain(&Domain::new("plain.ch")).await;
        // 5 (live) + 15 (no security headers) + 25 (no https)
        assert_eq!(outcome, DomainOutcome::Persisted { score: 45 });
        assert_eq!(
            fake.calls(),
            vec!["HEAD https://plain.ch/", "HEAD http://plain.ch/", "GET http://plain.ch/"]
        );
        let scans = sink.scans().await;
        assert_eq!(
            scans[0].reasons,
            "Pas de HTTPS; Site actif (HTTP 200); Manque 4/4 headers de sécurité"
        );
    }

    #[tokio::test]
    async fn timeouts_on_both_schemes_mark_inaccessible() {
        let (scanner, fake, sink) = scanner(FakeTransport::new(Script::hanging()), &config());

        let outcome = scanner.scan_domain(&Domain::new("slow.ch")).await;
        assert_eq!(outcome, DomainOutcome::Inaccessible);
        assert_eq!(fake.calls(), vec!["HEAD https://slow.ch/", "HEAD http://slow.ch/"]);
        assert!(sink.scans().await.is_empty());
    }

    #[tokio::test]
    async fn below_threshold_is_discarded() {
        let headers = [
            ("strict-transport-security", "max-age=1"),
            ("x-frame-options", "DENY"),
            ("x-content-type-options", "nosniff"),
            ("content-security-policy", "default-src 'self'"),
        ];
        let fake = FakeTransport::new(Script::ok(200, &headers, MODERN_PAGE));
        let (scanner, _, sink) = scanner(fake, &config());

        let outcome = scanner.scan_domain(&Domain::new("modern.ch")).await;
        assert_eq!(outcome, DomainOutcome::BelowThreshold { score: 5 });
        assert!(sink.scans().await.is_empty());
    }

    #[tokio::test]
    async fn scan_all_respects_concurrency_width() {
        let cfg = ScannerConfig { concurrency: 5, ..config() };
        let script = Script::ok(200, &[], MODERN_PAGE).with_delay(Duration::from_millis(5));
        let (scanner, fake, sink) = scanner(FakeTransport::new(script), &cfg);

        let domains: Vec<Domain> = (0..100).map(|i| Domain::new(&format!("site{i}.ch"))).collect();
        let summary = scanner.scan_all(domains).await;

        assert_eq!(summary.total, 100);
        // 100 slow domains keep the pool saturated, so the width is reached but never exceeded.
        assert_eq!(fake.max_in_flight(), 5);
        // Modern pages over https score 20: below the default threshold.
        assert_eq!(summary.below_threshold, 100);
        assert!(sink.scans().await.is_empty());
    }

    #[tokio::test]
    async fn scan_all_summarises_mixed_outcomes() {
        let fake = FakeTransport::new(Script::ok(200, &[("server", "Apache/2.2.15")], OLD_PAGE))
            .script("https://dead.ch/", Script::refused())
            .script("http://dead.ch/", Script::refused())
            .script(
                "https://modern.ch/",
                Script::ok(200, &[("x-frame-options", "DENY")], MODERN_PAGE),
            );
        let (scanner, _, sink) = scanner(fake, &config());

        let domains = ["old.ch", "dead.ch", "modern.ch"].iter().map(|d| Domain::new(d)).collect();
        let summary = scanner.scan_all(domains).await;

        assert_eq!(
            summary,
            ScanSummary {
                total: 3,
                persisted: 1,
                below_threshold: 1,
                inaccessible: 1,
                sink_failures: 0,
                failed: 0,
            }
        );
        assert_eq!(sink.scans().await[0].domain, "old.ch");
    }

    #[tokio::test]
    async fn redirects_to_a_shared_host_respect_per_host_limit() {
        let cfg = ScannerConfig { concurrency: 20, per_host_limit: 2, ..config() };
        let parked = Script::ok(200, &[], MODERN_PAGE).with_delay(Duration::from_millis(5));
        let mut fake = FakeTransport::new(parked);
        for i in 0..20 {
            fake = fake.script(
                &format!("https://site{i}.ch/"),
                Script::redirect("https://hosting.example.ch/"),
            );
        }
        let (scanner, fake, _) = scanner(fake, &cfg);

        let domains: Vec<Domain> = (0..20).map(|i| Domain::new(&format!("site{i}.ch"))).collect();
        let summary = scanner.scan_all(domains).await;

        assert_eq!(summary.total, 20);
        assert_eq!(summary.below_threshold, 20);
        assert_eq!(fake.max_in_flight_to("hosting.example.ch"), 2);
        assert!(fake.calls().contains(&"GET https://hosting.example.ch/".to_string()));
    }

    struct PanickingSink;

    #[async_trait]
    impl ResultSink for PanickingSink {
        async fn add_scan(&self, scan: PersistedScan) -> Result<(), SinkError> {
            panic!("sink exploded on {}", scan.domain);
        }
    }

    #[tokio::test]
    async fn failed_task_is_counted_in_summary() {
        let fake = FakeTransport::new(Script::ok(200, &[("server", "Apache/2.2.15")], OLD_PAGE))
            .script("https://modern.ch/", Script::ok(200, &[], MODERN_PAGE));
        let scanner =
            Arc::new(Scanner::new(Arc::new(fake), Arc::new(PanickingSink), &config()));

        let domains = ["old.ch", "modern.ch"].iter().map(|d| Domain::new(d)).collect();
        let summary = scanner.scan_all(domains).await;

        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.below_threshold, 1);
        assert_eq!(summary.persisted, 0);
    }
}
