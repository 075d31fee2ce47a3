// src/core/sink.rs

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::models::PersistedScan;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to serialize scan: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write scan: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for qualifying scans. Must tolerate concurrent callers; each
/// call is a new record, repeated domains included.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn add_scan(&self, scan: PersistedScan) -> Result<(), SinkError>;
}

/// Appends one JSON object per line. Writes are serialized by a mutex so
/// lines from concurrent scans never interleave.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    pub async fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(Self { path: path.to_path_buf(), file: Mutex::new(file) })
    }
}

#[async_trait]
impl ResultSink for JsonlSink {
    async fn add_scan(&self, scan: PersistedScan) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&scan)?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        debug!(domain = %scan.domain, path = %self.path.display(), "Scan appended.");
        Ok(())
    }
}

/// Keeps scans in memory.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    scans: Mutex<Vec<PersistedScan>>,
}

#[cfg(test)]
impl MemorySink {
    pub async fn scans(&self) -> Vec<PersistedScan> {
        self.scans.lock().await.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ResultSink for MemorySink {
    async fn add_scan(&self, scan: PersistedScan) -> Result<(), SinkError> {
        self.scans.lock().await.push(scan);
        Ok(())
    }
}
