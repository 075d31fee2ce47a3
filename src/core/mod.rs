// src/core/mod.rs

/// Data structures shared across the scanner: domains, attempts, scores and
/// the records handed to the result sink.
pub mod models;

/// Domain list ingestion.
pub mod domains;

/// Fetching, scoring and orchestration.
pub mod scanner;

/// Static signature tables behind the scoring rules.
pub mod knowledge_base;

/// Persistence contract for qualifying scans.
pub mod sink;
