//! Progress bar display for plain and quiet modes

use crate::dashboard::DashboardSink;
use crate::progress::{format_number, format_tally};
use crate::status::DashboardView;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

/// One indicatif bar tracking transcodes
pub struct PlainSink {
    bar: ProgressBar,
}

impl PlainSink {
    /// Visible bar on stderr
    pub fn new(transcodes_total: u64) -> Self {
        let bar = ProgressBar::new(transcodes_total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Bar that draws nothing
    pub fn hidden() -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        Self { bar }
    }

    /// Handle for routing log output around the bar
    pub fn bar(&self) -> ProgressBar {
        self.bar.clone()
    }
}

impl DashboardSink for PlainSink {
    fn render(&mut self, view: &DashboardView) -> io::Result<()> {
        self.bar.set_length(view.transcodes_total);
        self.bar.set_position(view.transcodes_done);
        self.bar.set_message(format!(
            "workers {}/{} | queue {} | failed {}",
            view.finished_workers,
            view.rows.len(),
            view.queue_len,
            format_number(view.totals.failed),
        ));
        Ok(())
    }

    fn finish(&mut self, view: &DashboardView) -> io::Result<()> {
        self.render(view)?;
        self.bar.finish_with_message(format_tally(&view.totals));
        Ok(())
    }
}

/// `io::Write` that suspends the bar while a log line is printed
pub struct BarWriter {
    bar: ProgressBar,
}

impl BarWriter {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Write for BarWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bar.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
