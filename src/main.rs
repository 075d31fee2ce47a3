// src/main.rs

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::sync::Arc;
use tracing::{info, warn};

mod app;
mod config;
mod core;
mod logging;

use crate::app::ScanJob;
use crate::config::Cli;
use crate::core::domains::{read_domains, write_sample};
use crate::core::models::ScanSummary;
use crate::core::scanner::transport::ReqwestTransport;
use crate::core::scanner::Scanner;
use crate::core::sink::JsonlSink;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::initialize_logging()?;

    if cli.generate_sample {
        write_sample(&cli.domains_file).await?;
        println!("Sample domain list written to {}", cli.domains_file.display());
        return Ok(());
    }

    let config = cli.scanner_config().wrap_err("invalid configuration")?;

    let mut domains = read_domains(&cli.domains_file).await?;
    if let Some(limit) = cli.limit {
        domains.truncate(limit);
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| logging::get_data_dir().join("scans.jsonl"));
    let sink = JsonlSink::open(&output)
        .await
        .wrap_err_with(|| format!("cannot open output {}", output.display()))?;
    let transport = ReqwestTransport::new(&config).wrap_err("cannot build HTTP client")?;
    let scanner = Arc::new(Scanner::new(Arc::new(transport), Arc::new(sink), &config));

    println!(
        "Scanning {} domains (concurrency={}, threshold={})",
        domains.len(),
        config.concurrency,
        config.score_threshold
    );

    let job = ScanJob::new();
    let summary_rx = job.start(scanner, domains)?;

    tokio::select! {
        summary = summary_rx => {
            let summary = summary.wrap_err("scan task ended without a summary")?;
            print_summary(&summary, &output);
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping scan.");
            if job.is_running() {
                job.stop().await;
            }
            println!("Scan interrupted; results so far are in {}", output.display());
        }
    }

    info!("Exiting.");
    Ok(())
}

fn print_summary(summary: &ScanSummary, output: &std::path::Path) {
    println!("{}", "-".repeat(80));
    println!("Domains scanned : {}", summary.total);
    println!("Persisted       : {}", summary.persisted);
    println!("Below threshold : {}", summary.below_threshold);
    println!("Inaccessible    : {}", summary.inaccessible);
    if summary.sink_failures > 0 {
        println!("Write failures  : {}", summary.sink_failures);
    }
    if summary.failed > 0 {
        println!("Task failures   : {}", summary.failed);
    }
    println!("Results         : {}", output.display());
}
