//! Status aggregation
//!
//! The aggregator owns every worker's [`MailboxReceiver`]. Each poll drains
//! whatever is new, merges it into a per-worker table and never waits on a
//! worker. Run completion is the moment every row is `finished`.

use crate::error::{ErrorKind, ErrorRecord};
use crate::status::mailbox::MailboxReceiver;
use crate::status::snapshot::{Event, StatusSnapshot, Tally};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;

/// One worker's line in the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRow {
    pub snapshot: StatusSnapshot,
    /// Worker went away without sending its final snapshot
    pub lost: bool,
}

/// Immutable picture of the run handed to a renderer
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub rows: Vec<WorkerRow>,
    /// Sum of every worker's `transcodes_done`
    pub transcodes_done: u64,
    /// Transcodable inputs found by the scan
    pub transcodes_total: u64,
    pub totals: Tally,
    pub finished_workers: usize,
    pub queue_len: usize,
    pub elapsed: Duration,
    /// Producer has handed out every batch
    pub producer_done: bool,
}

impl DashboardView {
    /// Transcode progress in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.transcodes_total == 0 {
            1.0
        } else {
            (self.transcodes_done as f64 / self.transcodes_total as f64).min(1.0)
        }
    }
}

/// Drains worker mailboxes into a state table
pub struct Aggregator {
    receivers: Vec<MailboxReceiver>,
    rows: Vec<WorkerRow>,
    transcodes_total: u64,
    started: Instant,
}

impl Aggregator {
    /// One receiver per worker, in worker-id order
    pub fn new(receivers: Vec<MailboxReceiver>, transcodes_total: u64) -> Self {
        let rows = (0..receivers.len())
            .map(|id| WorkerRow {
                snapshot: StatusSnapshot::idle(id),
                lost: false,
            })
            .collect();

        Self {
            receivers,
            rows,
            transcodes_total,
            started: Instant::now(),
        }
    }

    /// Pull the latest snapshot from every mailbox; true if anything changed
    ///
    /// Never blocks on a worker.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        for (row, rx) in self.rows.iter_mut().zip(&self.receivers) {
            if row.snapshot.finished {
                continue;
            }

            // Checked before receiving: a sender gone by now has already sent its last value
            let disconnected = rx.is_disconnected();
            if let Some(snapshot) = rx.receive() {
                row.snapshot = snapshot;
                changed = true;
            }

            if disconnected && !row.snapshot.finished {
                let id = row.snapshot.worker_id;
                warn!(worker = id, "Worker exited without reporting completion");
                row.lost = true;
                row.snapshot.finished = true;
                row.snapshot.detail = Event::ErrorBatch(vec![ErrorRecord {
                    kind: ErrorKind::UnhandledFault,
                    input: PathBuf::new(),
                    output: PathBuf::new(),
                    details: format!("worker {id} exited without reporting; its last batch may be incomplete"),
                }]);
                changed = true;
            }
        }

        changed
    }

    /// True once every worker has sent its final snapshot
    pub fn all_finished(&self) -> bool {
        self.rows.iter().all(|r| r.snapshot.finished)
    }

    pub fn finished_count(&self) -> usize {
        self.rows.iter().filter(|r| r.snapshot.finished).count()
    }

    pub fn worker_count(&self) -> usize {
        self.rows.len()
    }

    /// Combined counters over all workers
    pub fn totals(&self) -> Tally {
        let mut totals = Tally::default();
        for row in &self.rows {
            totals.add(&row.snapshot.tally);
        }
        totals
    }

    pub fn transcodes_done(&self) -> u64 {
        self.rows.iter().map(|r| r.snapshot.transcodes_done).sum()
    }

    /// Error records flushed by finished workers, in worker order
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.rows
            .iter()
            .flat_map(|r| r.snapshot.errors().iter().cloned())
            .collect()
    }

    /// Snapshots overwritten before they were read, across all mailboxes
    pub fn superseded_updates(&self) -> u64 {
        self.receivers.iter().map(|rx| rx.overwritten()).sum()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Snapshot of the current state for rendering
    pub fn view(&self, queue_len: usize, producer_done: bool) -> DashboardView {
        DashboardView {
            rows: self.rows.clone(),
            transcodes_done: self.transcodes_done(),
            transcodes_total: self.transcodes_total,
            totals: self.totals(),
            finished_workers: self.finished_count(),
            queue_len,
            elapsed: self.elapsed(),
            producer_done,
        }
    }
}
