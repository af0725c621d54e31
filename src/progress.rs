//! Text formatting shared by the dashboard and the end-of-run report
//!
//! Also prints the run header and the final summary with error details.

use crate::config::RunMode;
use crate::error::ErrorRecord;
use crate::status::{DashboardView, Tally};
use crate::walker::ScanReport;
use console::style;
use humansize::{format_size, BINARY};
use std::path::Path;
use std::time::Duration;

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// `HH:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Fixed-width text progress bar
pub fn format_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    let mut bar = "=".repeat(filled);
    if filled < width {
        bar.push('>');
        bar.push_str(&" ".repeat(width - filled - 1));
    }
    format!("[{bar}]")
}

/// One-line counter summary
pub fn format_tally(tally: &Tally) -> String {
    format!(
        "transcoded {} | copied {} | present {} | ignored {} | stale {} | failed {}",
        format_number(tally.transcoded),
        format_number(tally.copied),
        format_number(tally.already_complete),
        format_number(tally.ignored),
        format_number(tally.stale_removed),
        format_number(tally.failed),
    )
}

/// Dashboard content, one entry per line
pub fn format_view(view: &DashboardView) -> Vec<String> {
    let mut lines = Vec::with_capacity(view.rows.len() + 4);

    let percent = view.fraction() * 100.0;
    lines.push(format!(
        "{} {} {}/{} transcodes ({:.0}%)  elapsed {}",
        style("tree-transcode").cyan().bold(),
        format_bar(view.fraction(), 30),
        format_number(view.transcodes_done),
        format_number(view.transcodes_total),
        percent,
        format_elapsed(view.elapsed),
    ));
    lines.push(format!(
        "workers {}/{} finished | queue {}{}",
        view.finished_workers,
        view.rows.len(),
        view.queue_len,
        if view.producer_done { " (all batches queued)" } else { "" },
    ));
    lines.push(format_tally(&view.totals));
    lines.push("─".repeat(60));

    for row in &view.rows {
        let s = &row.snapshot;
        let state = if row.lost {
            style("lost").red().to_string()
        } else if s.finished {
            style(s.detail.describe()).green().to_string()
        } else {
            s.detail.describe()
        };
        lines.push(format!(
            "w{:<3} [{:>6}] {}",
            s.worker_id,
            format_number(s.transcodes_done),
            state
        ));
    }

    lines
}

/// Print a header at the start of the run
pub fn print_header(input: &Path, output: &Path, workers: usize, mode: RunMode) {
    println!();
    println!(
        "{} {}",
        style("tree-transcode").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Input:").bold(), input.display());
    println!("  {} {}", style("Output:").bold(), output.display());
    println!("  {} {}", style("Workers:").bold(), workers);
    match mode {
        RunMode::Convert => {}
        RunMode::DryRun => println!("  {} dry run (nothing is written)", style("Mode:").bold()),
        RunMode::Clean => println!("  {} clean (stale partial outputs only)", style("Mode:").bold()),
    }
    println!();
}

/// Print a summary of the run
pub fn print_summary(
    scan: &ScanReport,
    tally: &Tally,
    duration: Duration,
    output_bytes: Option<u64>,
    completed: bool,
) {
    let duration_secs = duration.as_secs_f64();
    let settled = tally.files_settled();
    let rate = if duration_secs > 0.0 {
        settled as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    if completed {
        println!("{}", style("Run Complete").green().bold());
    } else {
        println!("{}", style("Run Stopped Early").yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Files scanned:").bold(),
        format_number(scan.files as u64)
    );
    println!("  {} {}", style("Transcoded:").bold(), format_number(tally.transcoded));
    println!("  {} {}", style("Copied:").bold(), format_number(tally.copied));
    println!(
        "  {} {}",
        style("Already done:").bold(),
        format_number(tally.already_complete)
    );
    if tally.planned > 0 {
        println!("  {} {}", style("Planned:").bold(), format_number(tally.planned));
    }
    if tally.stale_removed > 0 {
        println!(
            "  {} {}",
            style("Stale removed:").bold(),
            format_number(tally.stale_removed)
        );
    }
    if !scan.collisions.is_empty() {
        println!(
            "  {} {}",
            style("Collisions:").yellow().bold(),
            format_number(scan.collisions.len() as u64)
        );
    }
    if tally.failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").yellow().bold(),
            format_number(tally.failed)
        );
    }
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if let Some(bytes) = output_bytes {
        println!("  {} {}", style("Output size:").bold(), format_size(bytes, BINARY));
    }
    println!();
}

/// Print every recorded error once, after live progress is gone
pub fn print_errors(errors: &[ErrorRecord]) {
    if errors.is_empty() {
        return;
    }

    eprintln!("{}", style(format!("{} error(s):", errors.len())).red().bold());
    for record in errors {
        eprintln!(
            "  {} {} -> {}",
            style(format!("[{}]", record.kind)).red(),
            record.input.display(),
            record.output.display()
        );
        for line in record.details.lines() {
            eprintln!("      {}", line);
        }
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn test_format_bar() {
        assert_eq!(format_bar(0.0, 4), "[>   ]");
        assert_eq!(format_bar(0.5, 4), "[==> ]");
        assert_eq!(format_bar(1.0, 4), "[====]");
        assert_eq!(format_bar(7.0, 4), "[====]");
    }
}
