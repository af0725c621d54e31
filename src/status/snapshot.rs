//! Worker status snapshots
//!
//! A snapshot is the latest known state of one worker. Workers publish a new
//! one after every action; the aggregator only ever keeps the newest.

use crate::error::ErrorRecord;
use std::path::PathBuf;

/// What a worker is doing (or just did)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Ensuring a batch output directory exists
    MakeDir { path: PathBuf },
    /// Deleting a temporary artifact left behind by an earlier run
    RemoveStaleFile { path: PathBuf },
    /// Copying a passthrough asset
    Copy { input: PathBuf, output: PathBuf },
    /// Running an external tool; `progress` names the stage when there is more than one
    Transcode {
        input: PathBuf,
        output: PathBuf,
        progress: Option<String>,
    },
    /// Final flush of every failure the worker recorded
    ErrorBatch(Vec<ErrorRecord>),
    /// Waiting for work
    Idle,
}

impl Event {
    /// One-line description for dashboards and logs
    pub fn describe(&self) -> String {
        match self {
            Event::MakeDir { path } => format!("mkdir {}", path.display()),
            Event::RemoveStaleFile { path } => format!("remove stale {}", path.display()),
            Event::Copy { input, .. } => format!("copy {}", input.display()),
            Event::Transcode {
                input,
                progress: Some(stage),
                ..
            } => format!("transcode {} [{}]", input.display(), stage),
            Event::Transcode { input, .. } => format!("transcode {}", input.display()),
            Event::ErrorBatch(records) if records.is_empty() => "done".to_string(),
            Event::ErrorBatch(records) => format!("done ({} errors)", records.len()),
            Event::Idle => "idle".to_string(),
        }
    }
}

/// Per-worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Batches taken off the queue
    pub batches: u64,
    /// Files encoded in this run
    pub transcoded: u64,
    /// Files copied in this run
    pub copied: u64,
    /// Files whose final output already existed
    pub already_complete: u64,
    /// Files with no handling for their extension
    pub ignored: u64,
    /// Temporary artifacts deleted
    pub stale_removed: u64,
    /// Files that ended in an error record
    pub failed: u64,
    /// Dry-run actions reported but not performed
    pub planned: u64,
}

impl Tally {
    /// Merge another tally into this one
    pub fn add(&mut self, other: &Tally) {
        self.batches += other.batches;
        self.transcoded += other.transcoded;
        self.copied += other.copied;
        self.already_complete += other.already_complete;
        self.ignored += other.ignored;
        self.stale_removed += other.stale_removed;
        self.failed += other.failed;
        self.planned += other.planned;
    }

    /// Files that reached a terminal outcome
    pub fn files_settled(&self) -> u64 {
        self.transcoded + self.copied + self.already_complete + self.ignored + self.failed + self.planned
    }
}

/// Latest state of one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub worker_id: usize,
    /// Transcodable inputs accounted for (encoded now, already present, or failed)
    pub transcodes_done: u64,
    pub tally: Tally,
    pub finished: bool,
    pub detail: Event,
}

impl StatusSnapshot {
    /// Initial snapshot for a worker that has not reported yet
    pub fn idle(worker_id: usize) -> Self {
        Self {
            worker_id,
            transcodes_done: 0,
            tally: Tally::default(),
            finished: false,
            detail: Event::Idle,
        }
    }

    /// Records carried by a final flush, if any
    pub fn errors(&self) -> &[ErrorRecord] {
        match &self.detail {
            Event::ErrorBatch(records) => records,
            _ => &[],
        }
    }
}
