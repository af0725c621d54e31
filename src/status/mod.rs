//! Worker status reporting
//!
//! Workers publish [`StatusSnapshot`]s through per-worker mailboxes; the
//! [`Aggregator`] drains them on a timer and keeps the latest per worker.

pub mod aggregator;
pub mod mailbox;
pub mod snapshot;

pub use aggregator::{Aggregator, DashboardView, WorkerRow};
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender};
pub use snapshot::{Event, StatusSnapshot, Tally};
