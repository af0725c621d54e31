//! Parallel tree transcoder
//!
//! One producer streams per-directory batches into a bounded queue; N
//! worker threads drain it and run the per-file protocol on each file.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │      Coordinator        │
//!                     │  - TreeScan (one pass)  │
//!                     │  - producer + status    │
//!                     └───────────┬─────────────┘
//!                                 │ WorkBatch ... EndOfWork x N
//!                     ┌───────────▼─────────────┐
//!                     │       WorkQueue         │
//!                     │  (crossbeam bounded)    │
//!                     └───────────┬─────────────┘
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 0 │             │  Worker 1 │             │  Worker N │
//! │  convert  │             │  convert  │             │  convert  │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       │ mailbox                 │ mailbox                 │ mailbox
//!       └─────────────────────────┼─────────────────────────┘
//!                     ┌───────────▼─────────────┐
//!                     │  Aggregator → Dashboard │
//!                     └─────────────────────────┘
//! ```

pub mod coordinator;
pub mod enumerator;
pub mod queue;
pub mod worker;

pub use coordinator::{Coordinator, RunResult};
pub use enumerator::{resolve_roots, tree_size, Collision, ScanReport, TreeScan};
pub use queue::{FilePair, PutOutcome, WorkBatch, WorkItem, WorkQueue};
pub use worker::Worker;
