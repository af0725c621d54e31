//! tree-transcode - Parallel, Resumable Media Tree Transcoder
//!
//! Mirrors a directory tree of audio files into an output tree, encoding
//! audio with an external encoder, demuxing containers first and copying
//! images and documents unchanged.
//!
//! # Features
//!
//! - **Parallel Conversion**: A pool of worker threads, each running the
//!   external tools on one file at a time.
//!
//! - **Memory Bounded**: A bounded work queue with backpressure; the
//!   producer never holds more than the queue capacity in flight.
//!
//! - **Crash Safe**: Every output is written to `<name>.partial` and renamed
//!   into place. Leftover partial files are removed on the next run, and
//!   finished outputs are never redone.
//!
//! - **Live Dashboard**: Workers post status to overwrite-on-send mailboxes
//!   that are read on a timer, so rendering never slows the pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Input Tree                               │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ walkdir (one pass)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            Producer: TreeScan → WorkBatch per directory          │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//!            ┌──────────────────────────┐
//!            │     Work Queue           │
//!            │  (crossbeam bounded)     │
//!            │  - Backpressure support  │
//!            └────────────┬─────────────┘
//!                         │
//! ┌───────────────────────▼─────────────────────────────────────────┐
//! │                      Worker Threads                              │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │Worker 0 │  │Worker 1 │  │Worker 2 │  ...    │Worker N │     │
//! │  │lame/faad│  │lame/faad│  │lame/faad│         │lame/faad│     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       │ mailbox    │            │                    │          │
//! │       └────────────┼────────────┼────────────────────┘          │
//! │                    ▼            ▼                               │
//! │            ┌──────────────────────────┐                         │
//! │            │   Aggregator + Dashboard │                         │
//! │            └──────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                    ┌──────────────────┐
//!                    │   Output Tree    │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Convert a library with 8 workers
//! tree-transcode ~/Music /mnt/player/Music -w 8
//!
//! # See what would happen first
//! tree-transcode ~/Music /mnt/player/Music --dry-run --plain
//!
//! # Remove partial outputs left by an interrupted run
//! tree-transcode ~/Music /mnt/player/Music --clean
//! ```

pub mod config;
pub mod convert;
pub mod dashboard;
pub mod error;
pub mod progress;
pub mod status;
pub mod walker;

pub use config::{CliArgs, DisplayMode, RunConfig, RunMode};
pub use convert::{CommandTool, ExternalTool, ToolOutcome, Toolchain};
pub use error::{ErrorKind, ErrorRecord, Result, TranscodeError};
pub use walker::{Coordinator, RunResult};
