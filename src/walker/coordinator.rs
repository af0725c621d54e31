//! Run coordinator - orchestrates the parallel transcode
//!
//! The coordinator is responsible for:
//! - Scanning the input tree and mirroring its directories
//! - Setting up the work queue, mailboxes and workers
//! - Producing batches under backpressure, then one end-of-work marker per worker
//! - Aggregating worker status and driving the dashboard
//! - Signal handling (graceful shutdown)
//! - Final statistics and cleanup

use crate::config::{RunConfig, RunMode};
use crate::convert::{Classifier, Toolchain};
use crate::dashboard::{DashboardSink, Signal};
use crate::error::{ErrorRecord, Result, WorkerError};
use crate::status::{mailbox, Aggregator, Tally};
use crate::walker::enumerator::{ScanReport, TreeScan};
use crate::walker::queue::{PutOutcome, WorkItem, WorkQueue, WorkQueueSender};
use crate::walker::worker::Worker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a finished run
#[derive(Debug)]
pub struct RunResult {
    /// What the scan found
    pub scan: ScanReport,

    /// Output directories that were missing before the run
    pub directories_created: usize,

    /// Combined per-file counters
    pub totals: Tally,

    /// Transcodable inputs that reached a terminal outcome
    pub transcodes_done: u64,

    /// Transcodable inputs found by the scan
    pub transcodes_total: u64,

    /// Unreadable entries found by the scan, then every error reported by the workers
    pub errors: Vec<ErrorRecord>,

    /// Batches never handed out because of a shutdown request
    pub batches_skipped: usize,

    /// Times the producer found the queue full
    pub backpressure_events: u64,

    /// Time taken for the run
    pub duration: Duration,

    /// Whether the run completed (vs was interrupted)
    pub completed: bool,
}

impl RunResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Completed without interruption and without a single error
    pub fn succeeded(&self) -> bool {
        self.completed && !self.has_errors()
    }
}

/// Coordinates scanning, workers and status for one run
pub struct Coordinator {
    /// Configuration
    config: Arc<RunConfig>,

    /// Encoder and demuxer handed to every worker
    tools: Toolchain,

    /// Worker threads
    workers: Vec<Worker>,

    /// Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl Coordinator {
    /// Create a new coordinator
    pub fn new(config: RunConfig, tools: Toolchain) -> Self {
        Self {
            config: Arc::new(config),
            tools,
            workers: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Scan the input tree without converting anything
    pub fn scan(&self) -> Result<TreeScan> {
        TreeScan::scan(&self.config.input_root, &self.config.output_root, &Classifier::default())
    }

    /// Run the transcode, rendering progress into `sink`
    pub fn run(self, sink: &mut dyn DashboardSink) -> Result<RunResult> {
        let scan = self.scan()?;
        self.run_scanned(scan, sink)
    }

    /// Run a transcode over an existing scan
    pub fn run_scanned(mut self, scan: TreeScan, sink: &mut dyn DashboardSink) -> Result<RunResult> {
        let start_time = Instant::now();
        let config = Arc::clone(&self.config);

        info!(
            input = %config.input_root.display(),
            output = %config.output_root.display(),
            workers = config.worker_count,
            mode = ?config.mode,
            "Starting run"
        );

        let directories_created = scan.prepare_output_tree(config.mode != RunMode::Convert)?;
        let report = scan.report().clone();
        let transcodes_total = scan.transcodable_count() as u64;

        info!(
            files = report.files,
            transcodable = report.transcodable,
            copyable = report.copyable,
            batches = scan.batch_count(),
            directories_created,
            "Scan complete"
        );

        let queue = WorkQueue::new(config.queue_capacity);
        let stats = queue.stats();
        debug!(capacity = queue.capacity(), "Work queue created");
        let mut receivers = Vec::with_capacity(config.worker_count);
        for id in 0..config.worker_count {
            let (tx, rx) = mailbox();
            let worker = Worker::spawn(id, queue.receiver(), tx, self.tools.clone(), config.mode)?;
            self.workers.push(worker);
            receivers.push(rx);
        }
        info!(count = self.workers.len(), "Workers spawned");

        // Only workers hold receivers from here on, so a dead pool closes the queue
        let sender = queue.into_sender();
        let mut status = StatusLoop {
            aggregator: Aggregator::new(receivers, transcodes_total),
            interval: config.refresh_interval,
            last_render: None,
            shutdown: Arc::clone(&self.shutdown),
        };

        let batches_skipped = self.produce(scan, &sender, &mut status, sink)?;
        let interrupted = batches_skipped > 0 || self.shutdown.load(Ordering::Relaxed);

        // Wait for every worker's final snapshot
        loop {
            status.aggregator.poll();
            if status.aggregator.all_finished() {
                break;
            }
            status.refresh(sender.len(), true, sink, false)?;
            thread::sleep(status.interval);
        }

        for worker in std::mem::take(&mut self.workers) {
            let id = worker.id();
            if let Err(e) = worker.join() {
                warn!(worker = id, error = %e, "Worker failed to join cleanly");
            }
        }

        status.aggregator.poll();
        let view = status.aggregator.view(sender.len(), true);
        if let Err(e) = sink.finish(&view) {
            warn!(error = %e, "Failed to draw final frame");
        }

        let duration = start_time.elapsed();
        let mut errors = report.walk_errors.clone();
        errors.extend(status.aggregator.errors());
        let totals = status.aggregator.totals();

        debug!(
            batches_dequeued = stats.throughput(),
            superseded_updates = status.aggregator.superseded_updates(),
            "Pipeline statistics"
        );
        info!(
            transcoded = totals.transcoded,
            copied = totals.copied,
            errors = errors.len(),
            duration_secs = duration.as_secs(),
            "Run completed"
        );

        Ok(RunResult {
            scan: report,
            directories_created,
            totals,
            transcodes_done: status.aggregator.transcodes_done(),
            transcodes_total,
            errors,
            batches_skipped,
            backpressure_events: stats.backpressure_count(),
            duration,
            completed: !interrupted,
        })
    }

    /// Enqueue every batch, then one end-of-work marker per worker
    ///
    /// A full queue never blocks longer than one refresh interval, so status
    /// keeps flowing while workers are busy. After a shutdown request the
    /// remaining batches are skipped but the markers are still sent. Returns
    /// the number of skipped batches.
    fn produce(
        &self,
        scan: TreeScan,
        sender: &WorkQueueSender,
        status: &mut StatusLoop,
        sink: &mut dyn DashboardSink,
    ) -> Result<usize> {
        let worker_count = self.config.worker_count;
        let mut items = scan.work_items(worker_count);
        let mut pending: Option<WorkItem> = None;
        let mut markers_sent = 0;
        let mut skipped = 0;
        let mut stopping = false;

        loop {
            if !stopping && self.shutdown.load(Ordering::Relaxed) {
                stopping = true;
                if matches!(pending, Some(WorkItem::Batch(_))) {
                    pending = None;
                    skipped += 1;
                }
                info!("Shutdown requested, no further batches will be queued");
            }

            while pending.is_none() {
                match items.next() {
                    Some(WorkItem::Batch(_)) if stopping => skipped += 1,
                    Some(item) => pending = Some(item),
                    None => break,
                }
            }
            let Some(item) = pending.take() else {
                break;
            };
            let is_marker = matches!(item, WorkItem::EndOfWork);

            match sender.put(item, status.interval) {
                Ok(PutOutcome::Accepted) => {
                    if is_marker {
                        markers_sent += 1;
                    }
                }
                Ok(PutOutcome::NotAccepted(item)) => {
                    debug!(queue_len = sender.len(), "Work queue full");
                    pending = Some(item);
                }
                Err(WorkerError::QueueClosed) => return Err(WorkerError::AllWorkersDead.into()),
                Err(e) => return Err(e.into()),
            }

            status.aggregator.poll();
            status.refresh(sender.len(), markers_sent == worker_count, sink, true)?;
        }

        if skipped > 0 {
            info!(skipped_batches = skipped, "Batches skipped after shutdown request");
        }
        Ok(skipped)
    }
}

/// Aggregation plus rate-limited rendering
struct StatusLoop {
    aggregator: Aggregator,
    interval: Duration,
    last_render: Option<Instant>,
    shutdown: Arc<AtomicBool>,
}

impl StatusLoop {
    /// Render if the refresh interval has passed and handle user input
    ///
    /// Display errors are logged and otherwise ignored; they never stop the run.
    fn refresh(
        &mut self,
        queue_len: usize,
        producer_done: bool,
        sink: &mut dyn DashboardSink,
        accept_stop: bool,
    ) -> Result<()> {
        match sink.poll_input() {
            Ok(Signal::StopRequested) if accept_stop => {
                if !self.shutdown.swap(true, Ordering::SeqCst) {
                    info!("Stop requested from dashboard");
                }
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Dashboard input unavailable"),
        }

        let due = self.last_render.map_or(true, |t| t.elapsed() >= self.interval);
        if due {
            let view = self.aggregator.view(queue_len, producer_done);
            if let Err(e) = sink.render(&view) {
                debug!(error = %e, "Dashboard render failed");
            }
            self.last_render = Some(Instant::now());
        }
        Ok(())
    }
}
