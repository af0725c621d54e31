//! Worker thread logic for parallel conversion
//!
//! Each worker:
//! - Pulls batches from the work queue until it receives an end-of-work marker
//! - Ensures the batch output directory exists
//! - Runs the per-file conversion protocol for every file, in order
//! - Publishes a status snapshot after every action
//! - Flushes its error records in a final `finished` snapshot

use crate::config::RunMode;
use crate::convert::{Converter, FileOutcome, Toolchain};
use crate::error::{ErrorRecord, FileError, WorkerError};
use crate::status::{Event, MailboxSender, StatusSnapshot, Tally};
use crate::walker::queue::{FilePair, WorkBatch, WorkItem, WorkQueueReceiver};
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// A worker thread that processes batches
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        queue_rx: WorkQueueReceiver,
        mailbox: MailboxSender,
        tools: Toolchain,
        mode: RunMode,
    ) -> Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || worker_loop(id, queue_rx, mailbox, tools, mode))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|payload| WorkerError::Panicked {
                id: self.id,
                message: panic_message(payload.as_ref()),
            })
        } else {
            Ok(())
        }
    }
}

/// Counters and mailbox for one worker
struct Reporter {
    id: usize,
    mailbox: MailboxSender,
    transcodes_done: u64,
    tally: Tally,
    /// Events describe intended actions only
    dry_run: bool,
}

impl Reporter {
    fn publish(&mut self, event: Event) {
        debug!(worker = self.id, action = %event.describe(), "Worker action");
        if !self.dry_run && matches!(event, Event::RemoveStaleFile { .. }) {
            self.tally.stale_removed += 1;
        }
        self.mailbox.send(StatusSnapshot {
            worker_id: self.id,
            transcodes_done: self.transcodes_done,
            tally: self.tally,
            finished: false,
            detail: event,
        });
    }

    fn record(&mut self, pair: &FilePair, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Transcoded => self.tally.transcoded += 1,
            FileOutcome::Copied => self.tally.copied += 1,
            FileOutcome::AlreadyComplete => self.tally.already_complete += 1,
            FileOutcome::Ignored => self.tally.ignored += 1,
            FileOutcome::Planned => self.tally.planned += 1,
            FileOutcome::Cleaned => {}
            FileOutcome::Failed(_) => self.tally.failed += 1,
        }
        if pair.kind.is_transcodable() && !matches!(outcome, FileOutcome::Ignored) {
            self.transcodes_done += 1;
        }
    }

    fn finish(self, errors: Vec<ErrorRecord>) {
        self.mailbox.send(StatusSnapshot {
            worker_id: self.id,
            transcodes_done: self.transcodes_done,
            tally: self.tally,
            finished: true,
            detail: Event::ErrorBatch(errors),
        });
    }
}

/// Main worker loop
fn worker_loop(id: usize, queue_rx: WorkQueueReceiver, mailbox: MailboxSender, tools: Toolchain, mode: RunMode) {
    debug!(worker = id, "Worker starting");

    let converter = Converter::new(&tools, mode);
    let mut reporter = Reporter {
        id,
        mailbox,
        transcodes_done: 0,
        tally: Tally::default(),
        dry_run: mode == RunMode::DryRun,
    };
    let mut errors = Vec::new();

    reporter.publish(Event::Idle);

    loop {
        let batch = match queue_rx.get() {
            Some(WorkItem::Batch(batch)) => batch,
            Some(WorkItem::EndOfWork) => break,
            None => {
                warn!(worker = id, "Work queue closed without an end-of-work marker");
                break;
            }
        };

        reporter.tally.batches += 1;
        process_batch(&converter, mode, &batch, &mut reporter, &mut errors);
        reporter.publish(Event::Idle);
    }

    info!(
        worker = id,
        transcoded = reporter.tally.transcoded,
        copied = reporter.tally.copied,
        errors = errors.len(),
        "Worker shutting down"
    );

    reporter.finish(errors);
}

/// Process every file of one batch
///
/// Every pair gets exactly one terminal outcome, including when the output
/// directory cannot be created or handling a file panics.
fn process_batch(
    converter: &Converter<'_>,
    mode: RunMode,
    batch: &WorkBatch,
    reporter: &mut Reporter,
    errors: &mut Vec<ErrorRecord>,
) {
    if mode == RunMode::Convert {
        reporter.publish(Event::MakeDir {
            path: batch.output_directory.clone(),
        });
        if let Err(e) = fs::create_dir_all(&batch.output_directory) {
            let fault = FileError::io("create directory", &batch.output_directory, e);
            warn!(worker = reporter.id, error = %fault, "Batch output directory unavailable");
            for pair in &batch.pairs {
                let outcome = FileOutcome::Failed(ErrorRecord::fault(&pair.input, &pair.output, &fault));
                settle(pair, outcome, reporter, errors);
            }
            return;
        }
    }

    for pair in &batch.pairs {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            converter.convert(pair, &mut |event| reporter.publish(event))
        }));

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(fault)) => {
                warn!(worker = reporter.id, input = %pair.input.display(), error = %fault, "File failed");
                FileOutcome::Failed(ErrorRecord::fault(&pair.input, &pair.output, &fault))
            }
            Err(payload) => {
                let fault = FileError::Panicked(panic_message(payload.as_ref()));
                warn!(worker = reporter.id, input = %pair.input.display(), error = %fault, "File handler panicked");
                FileOutcome::Failed(ErrorRecord::fault(&pair.input, &pair.output, &fault))
            }
        };

        settle(pair, outcome, reporter, errors);
    }
}

fn settle(pair: &FilePair, outcome: FileOutcome, reporter: &mut Reporter, errors: &mut Vec<ErrorRecord>) {
    reporter.record(pair, &outcome);
    if let FileOutcome::Failed(record) = outcome {
        errors.push(record);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
