//! Periodic progress snapshots.
//!
//! A second concurrent activity races the explorer: on a fixed cadence it
//! reads the shared counters and the live coverage artifact and emits an
//! immutable [`Snapshot`] record to an external sink. One unconditional
//! final snapshot is taken the instant the explorer's run loop ends.

use crate::coverage::{page_coverage, read_artifact, CoverageReporter};
use crate::deadline::Deadline;
use crate::driver::BrowserDriver;
use crate::result::RecorrerResult;
use crate::state::Progress;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// One immutable progress record, computed at a single instant
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Position in the run's snapshot series, starting at 1
    pub sequence: u32,
    /// Total successful actions so far
    pub action_number: u64,
    /// Distinct pages visited so far
    pub pages_visited: usize,
    /// Seconds elapsed since the run started
    pub duration: f64,
    /// `pages_visited / total graph pages`, in `[0,1]`
    pub page_coverage: f64,
    /// Statement coverage in `[0,1]`, zero when no report tool produced one
    pub statement_coverage: f64,
    /// Whether this is the unconditional end-of-run record
    pub is_final: bool,
    /// Raw instrumentation artifact read from the page, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_artifact: Option<serde_json::Value>,
}

/// External persistence writer snapshots are handed to
pub trait SnapshotSink: Send + Sync {
    /// Persist one record.
    ///
    /// # Errors
    ///
    /// Sink failures are logged by the coordinator and never stop the run.
    fn record(&self, snapshot: &Snapshot) -> RecorrerResult<()>;
}

/// Sink that keeps snapshots in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: std::sync::Mutex<Vec<Snapshot>>,
}

impl MemorySink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    #[must_use]
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl SnapshotSink for MemorySink {
    fn record(&self, snapshot: &Snapshot) -> RecorrerResult<()> {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.push(snapshot.clone());
        }
        Ok(())
    }
}

/// Emits snapshots on a fixed cadence plus one final record
pub struct SnapshotCoordinator {
    driver: Arc<dyn BrowserDriver>,
    progress: Arc<Progress>,
    total_pages: usize,
    reporter: Arc<dyn CoverageReporter>,
    sink: Arc<dyn SnapshotSink>,
    interval: Duration,
    started: Instant,
    sequence: AtomicU32,
}

impl SnapshotCoordinator {
    /// Coordinator for one run; the clock starts now
    #[must_use]
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        progress: Arc<Progress>,
        total_pages: usize,
        reporter: Arc<dyn CoverageReporter>,
        sink: Arc<dyn SnapshotSink>,
        interval: Duration,
    ) -> Self {
        Self {
            driver,
            progress,
            total_pages,
            reporter,
            sink,
            interval,
            started: Instant::now(),
            sequence: AtomicU32::new(0),
        }
    }

    /// Cadence loop: one snapshot per full interval until the deadline.
    /// A budget shorter than the interval produces no periodic records at
    /// all; the final snapshot covers single-shot runs.
    pub async fn run(&self, deadline: Deadline) {
        loop {
            let Some(wait) = deadline.cap(self.interval) else {
                return;
            };
            tokio::time::sleep(wait).await;
            if wait < self.interval || deadline.expired() {
                return;
            }
            self.take(false).await;
        }
    }

    /// Assemble and emit one snapshot at this instant
    pub async fn take(&self, is_final: bool) -> Snapshot {
        let coverage_artifact = read_artifact(self.driver.as_ref()).await;
        let statement_coverage = match &coverage_artifact {
            Some(artifact) => self
                .reporter
                .statement_coverage(artifact)
                .await
                .unwrap_or(0.0),
            None => 0.0,
        };

        let pages_visited = self.progress.pages_visited();
        let snapshot = Snapshot {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            action_number: self.progress.actions(),
            pages_visited,
            duration: self.started.elapsed().as_secs_f64(),
            page_coverage: page_coverage(pages_visited, self.total_pages),
            statement_coverage,
            is_final,
            coverage_artifact,
        };

        info!(
            sequence = snapshot.sequence,
            actions = snapshot.action_number,
            pages = snapshot.pages_visited,
            page_coverage = snapshot.page_coverage,
            statement_coverage = snapshot.statement_coverage,
            is_final,
            "snapshot"
        );
        if let Err(e) = self.sink.record(&snapshot) {
            warn!(error = %e, "snapshot sink failed");
        }
        snapshot
    }
}

impl std::fmt::Debug for SnapshotCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCoordinator")
            .field("total_pages", &self.total_pages)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
