//! Bounded work queue between the producer and the workers
//!
//! A single crossbeam bounded channel carries [`WorkItem`]s. The producer
//! never blocks indefinitely: [`WorkQueueSender::put`] gives up after a
//! timeout and hands the item back, so the caller can refresh the dashboard
//! and retry. Workers block in [`WorkQueueReceiver::get`].

use crate::convert::FileKind;
use crate::error::WorkerError;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One input file and where its output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub input: PathBuf,
    pub output: PathBuf,
    pub kind: FileKind,
}

/// All files destined for one output directory
///
/// Batches own disjoint output directories, which is what keeps two workers
/// from ever writing the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkBatch {
    pub output_directory: PathBuf,
    pub pairs: Vec<FilePair>,
}

/// An item on the work queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Batch(WorkBatch),
    /// Tells exactly one worker to stop
    EndOfWork,
}

/// Result of a timed put
#[derive(Debug)]
pub enum PutOutcome {
    Accepted,
    /// Queue stayed full for the whole timeout; the item comes back for a retry
    NotAccepted(WorkItem),
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total items enqueued
    pub enqueued: AtomicU64,

    /// Total items dequeued
    pub dequeued: AtomicU64,

    /// Puts that timed out on a full queue
    pub rejected_puts: AtomicU64,
}

impl QueueStats {
    /// Items handed to workers so far
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Number of times the producer found the queue full
    pub fn backpressure_count(&self) -> u64 {
        self.rejected_puts.load(Ordering::Relaxed)
    }
}

/// Work queue with backpressure support
pub struct WorkQueue {
    sender: Sender<WorkItem>,
    receiver: Receiver<WorkItem>,
    capacity: usize,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    /// Create a new work queue with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);

        Self {
            sender,
            receiver,
            capacity,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Get the producer handle
    pub fn sender(&self) -> WorkQueueSender {
        WorkQueueSender {
            sender: self.sender.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Get a receiver for this queue (one per worker)
    pub fn receiver(&self) -> WorkQueueReceiver {
        WorkQueueReceiver {
            receiver: self.receiver.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Split into the producer handle, dropping the queue's own receiver
    ///
    /// After this, [`WorkQueueSender::put`] reports `QueueClosed` once every
    /// worker's receiver is gone.
    pub fn into_sender(self) -> WorkQueueSender {
        WorkQueueSender {
            sender: self.sender,
            stats: self.stats,
        }
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Handle for putting items on the queue
#[derive(Clone)]
pub struct WorkQueueSender {
    sender: Sender<WorkItem>,
    stats: Arc<QueueStats>,
}

impl WorkQueueSender {
    /// Try to enqueue `item`, waiting at most `timeout` for space
    ///
    /// Returns `Ok(PutOutcome::NotAccepted(item))` if the queue stayed full,
    /// and `Err(WorkerError::QueueClosed)` if no receiver is left.
    pub fn put(&self, item: WorkItem, timeout: Duration) -> Result<PutOutcome, WorkerError> {
        match self.sender.send_timeout(item, timeout) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(PutOutcome::Accepted)
            }
            Err(SendTimeoutError::Timeout(item)) => {
                self.stats.rejected_puts.fetch_add(1, Ordering::Relaxed);
                Ok(PutOutcome::NotAccepted(item))
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(WorkerError::QueueClosed),
        }
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Handle for receiving items from the queue
#[derive(Clone)]
pub struct WorkQueueReceiver {
    receiver: Receiver<WorkItem>,
    stats: Arc<QueueStats>,
}

impl WorkQueueReceiver {
    /// Receive an item from the queue
    ///
    /// Blocks until an item is available. Returns `None` only once the
    /// producer is gone and the queue is drained.
    pub fn get(&self) -> Option<WorkItem> {
        match self.receiver.recv() {
            Ok(item) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(item)
            }
            Err(_) => None,
        }
    }

    /// Try to receive an item without blocking
    pub fn try_get(&self) -> Option<WorkItem> {
        match self.receiver.try_recv() {
            Ok(item) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(item)
            }
            Err(_) => None,
        }
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(dir: &str) -> WorkItem {
        WorkItem::Batch(WorkBatch {
            output_directory: PathBuf::from(dir),
            pairs: Vec::new(),
        })
    }

    const SHORT: Duration = Duration::from_millis(10);

    #[test]
    fn test_queue_fifo() {
        let queue = WorkQueue::new(10);
        let sender = queue.sender();
        let receiver = queue.receiver();

        assert!(matches!(sender.put(batch("/a"), SHORT).unwrap(), PutOutcome::Accepted));
        assert!(matches!(sender.put(batch("/b"), SHORT).unwrap(), PutOutcome::Accepted));
        assert!(matches!(sender.put(WorkItem::EndOfWork, SHORT).unwrap(), PutOutcome::Accepted));

        assert_eq!(receiver.get(), Some(batch("/a")));
        assert_eq!(receiver.get(), Some(batch("/b")));
        assert_eq!(receiver.get(), Some(WorkItem::EndOfWork));
    }

    #[test]
    fn test_queue_capacity_bound() {
        let queue = WorkQueue::new(2);
        let sender = queue.sender();

        assert!(matches!(sender.put(batch("/a"), SHORT).unwrap(), PutOutcome::Accepted));
        assert!(matches!(sender.put(batch("/b"), SHORT).unwrap(), PutOutcome::Accepted));

        // Full: the item comes back instead of blocking forever
        match sender.put(batch("/c"), SHORT).unwrap() {
            PutOutcome::NotAccepted(item) => assert_eq!(item, batch("/c")),
            PutOutcome::Accepted => panic!("queue accepted past capacity"),
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().backpressure_count(), 1);

        // Space frees up after a get
        let receiver = queue.receiver();
        receiver.get().unwrap();
        assert!(matches!(sender.put(batch("/c"), SHORT).unwrap(), PutOutcome::Accepted));
        assert!(queue.len() <= queue.capacity());
    }

    #[test]
    fn test_put_after_receivers_gone() {
        let queue = WorkQueue::new(2);
        let sender = queue.into_sender();

        assert!(matches!(
            sender.put(batch("/a"), SHORT),
            Err(WorkerError::QueueClosed)
        ));
    }

    #[test]
    fn test_exactly_once_delivery() {
        let queue = WorkQueue::new(4);
        let sender = queue.sender();
        let receivers: Vec<_> = (0..4).map(|_| queue.receiver()).collect();

        let handles: Vec<_> = receivers
            .into_iter()
            .map(|rx| {
                std::thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(WorkItem::Batch(b)) = rx.get() {
                        seen.push(b.output_directory);
                    }
                    seen
                })
            })
            .collect();

        let mut pending: Vec<WorkItem> = (0..100).map(|i| batch(&format!("/d{i}"))).collect();
        pending.extend(std::iter::repeat(WorkItem::EndOfWork).take(4));
        for mut item in pending {
            loop {
                match sender.put(item, SHORT).unwrap() {
                    PutOutcome::Accepted => break,
                    PutOutcome::NotAccepted(back) => item = back,
                }
            }
        }

        let mut all: Vec<PathBuf> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        assert_eq!(all.len(), 100);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 100);

        let stats = queue.stats();
        assert_eq!(stats.enqueued.load(Ordering::Relaxed), 104);
        assert_eq!(stats.dequeued.load(Ordering::Relaxed), 104);
    }
}
