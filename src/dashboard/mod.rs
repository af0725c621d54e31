//! Progress display
//!
//! The coordinator hands each [`DashboardView`] to a [`DashboardSink`] at the
//! refresh interval. Sinks only ever see finished views, so a slow terminal
//! delays the next frame but never the collection of worker status.
//!
//! - [`LiveSink`]: full-screen, scrollable, redraws only changed lines
//! - [`PlainSink`]: single progress bar with log lines printed above it

pub mod live;
pub mod plain;
pub mod viewport;

pub use live::LiveSink;
pub use plain::PlainSink;
pub use viewport::{ScrollCommand, Viewport};

use crate::status::DashboardView;
use std::io;

/// What the user asked for since the last poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    /// Stop handing out new work
    StopRequested,
}

/// Destination for dashboard frames
pub trait DashboardSink {
    /// Draw one frame
    fn render(&mut self, view: &DashboardView) -> io::Result<()>;

    /// Handle pending user input without blocking
    fn poll_input(&mut self) -> io::Result<Signal> {
        Ok(Signal::Continue)
    }

    /// Draw the final frame and release the terminal
    fn finish(&mut self, view: &DashboardView) -> io::Result<()>;
}
