// src/app.rs

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::core::models::{Domain, ScanSummary};
use crate::core::scanner::Scanner;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("a scan is already running")]
    AlreadyRunning,
}

/// Supervises one scan run at a time.
///
/// The state moves `Idle -> Running -> Idle` through a single atomic, so two
/// concurrent `start` calls cannot both win. The task resets the state itself
/// when it finishes or is aborted.
#[derive(Default)]
pub struct ScanJob {
    state: Arc<AtomicU8>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Flips the job back to idle when the task ends, aborted or not.
struct IdleOnDrop(Arc<AtomicU8>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::SeqCst);
    }
}

impl ScanJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => JobState::Running,
            _ => JobState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == JobState::Running
    }

    /// Spawns the scan. The summary arrives on the returned channel; if the
    /// job is stopped first the sender is dropped instead.
    pub fn start(
        &self,
        scanner: Arc<Scanner>,
        domains: Vec<Domain>,
    ) -> Result<oneshot::Receiver<ScanSummary>, JobError> {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| JobError::AlreadyRunning)?;

        let (tx, rx) = oneshot::channel();
        let guard = IdleOnDrop(self.state.clone());
        let handle = tokio::spawn(async move {
            let summary = scanner.scan_all(domains).await;
            drop(guard);
            let _ = tx.send(summary);
        });
        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!("Scan job started.");
        Ok(rx)
    }

    /// Aborts a running scan and waits for it to wind down. Returns whether a
    /// task was stopped.
    pub async fn stop(&self) -> bool {
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(handle) = handle else {
            return false;
        };
        if handle.is_finished() {
            return false;
        }
        handle.abort();
        let _ = handle.await;
        info!("Scan job stopped.");
        true
    }
}
