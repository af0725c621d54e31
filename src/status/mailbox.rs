//! Single-slot, overwrite-on-send status mailbox
//!
//! Each worker owns one [`MailboxSender`]; the aggregator holds the matching
//! [`MailboxReceiver`]. The mailbox is lossy by design: a send replaces any
//! unread snapshot, so it never holds more than one value and a worker never
//! waits on a slow dashboard. Only the newest state of a worker matters for a
//! liveness display.

use crate::status::snapshot::StatusSnapshot;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Slot {
    value: Mutex<Option<StatusSnapshot>>,
    /// Snapshots replaced before anyone read them
    overwritten: AtomicU64,
}

/// Create a connected mailbox pair
pub fn mailbox() -> (MailboxSender, MailboxReceiver) {
    let slot = Arc::new(Slot::default());
    (
        MailboxSender {
            slot: Arc::clone(&slot),
        },
        MailboxReceiver { slot },
    )
}

/// Writing half, owned by a worker
#[derive(Debug)]
pub struct MailboxSender {
    slot: Arc<Slot>,
}

impl MailboxSender {
    /// Publish `snapshot`, replacing any unread one. Never blocks on the reader.
    pub fn send(&self, snapshot: StatusSnapshot) {
        let previous = self.slot.value.lock().replace(snapshot);
        if previous.is_some() {
            self.slot.overwritten.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Reading half, owned by the aggregator
#[derive(Debug)]
pub struct MailboxReceiver {
    slot: Arc<Slot>,
}

impl MailboxReceiver {
    /// Take the latest snapshot, or `None` if nothing was sent since the last call
    pub fn receive(&self) -> Option<StatusSnapshot> {
        self.slot.value.lock().take()
    }

    /// True once the sender has been dropped
    pub fn is_disconnected(&self) -> bool {
        Arc::strong_count(&self.slot) == 1
    }

    /// Number of snapshots that were replaced unread
    pub fn overwritten(&self) -> u64 {
        self.slot.overwritten.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::snapshot::Event;
    use std::thread;

    fn snapshot(done: u64) -> StatusSnapshot {
        StatusSnapshot {
            transcodes_done: done,
            ..StatusSnapshot::idle(0)
        }
    }

    #[test]
    fn test_receive_empty() {
        let (_tx, rx) = mailbox();
        assert!(rx.receive().is_none());
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let (tx, rx) = mailbox();

        tx.send(snapshot(1));
        tx.send(snapshot(2));

        let got = rx.receive().unwrap();
        assert_eq!(got.transcodes_done, 2);
        assert!(rx.receive().is_none());
        assert_eq!(rx.overwritten(), 1);
    }

    #[test]
    fn test_disconnect() {
        let (tx, rx) = mailbox();
        assert!(!rx.is_disconnected());

        tx.send(StatusSnapshot {
            finished: true,
            detail: Event::ErrorBatch(Vec::new()),
            ..StatusSnapshot::idle(0)
        });
        drop(tx);

        assert!(rx.is_disconnected());
        assert!(rx.receive().unwrap().finished);
    }

    #[test]
    fn test_concurrent_sends_never_tear() {
        let (tx, rx) = mailbox();

        let writer = thread::spawn(move || {
            for i in 0..10_000u64 {
                tx.send(StatusSnapshot {
                    transcodes_done: i,
                    tally: crate::status::snapshot::Tally {
                        transcoded: i,
                        ..Default::default()
                    },
                    ..StatusSnapshot::idle(0)
                });
            }
        });

        let mut last = None;
        loop {
            let disconnected = rx.is_disconnected();
            if let Some(s) = rx.receive() {
                assert_eq!(s.transcodes_done, s.tally.transcoded);
                assert!(last.map_or(true, |l| s.transcodes_done > l));
                last = Some(s.transcodes_done);
            }
            if disconnected {
                break;
            }
        }

        writer.join().unwrap();
        assert_eq!(last, Some(9_999));
    }
}
