//! tree-transcode - Parallel, Resumable Media Tree Transcoder
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;
use tree_transcode::config::{CliArgs, DisplayMode, RunConfig, RunMode};
use tree_transcode::convert::Toolchain;
use tree_transcode::dashboard::plain::BarWriter;
use tree_transcode::dashboard::{DashboardSink, LiveSink, PlainSink};
use tree_transcode::progress::{print_errors, print_header, print_summary};
use tree_transcode::walker::{tree_size, Coordinator};

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run finished without error records
fn run() -> Result<bool> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Validate and create config (fails before anything is written)
    let config = RunConfig::from_args(args).context("Invalid configuration")?;

    // The bar must exist before logging so log lines can be printed around it
    let plain = match config.display {
        DisplayMode::Plain => Some(PlainSink::new(0)),
        DisplayMode::Quiet => Some(PlainSink::hidden()),
        DisplayMode::Live => None,
    };

    setup_logging(&config, plain.as_ref())?;

    if config.display == DisplayMode::Plain {
        print_header(&config.input_root, &config.output_root, config.worker_count, config.mode);
    }

    let tools = Toolchain::external(&config.encoder, &config.encoder_args, &config.demuxer);
    let coordinator = Coordinator::new(config.clone(), tools);

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let scan = coordinator.scan().context("Failed to scan input tree")?;

    let mut sink: Box<dyn DashboardSink> = match plain {
        Some(plain) => Box::new(plain),
        None => Box::new(LiveSink::new().context("Failed to initialize terminal")?),
    };

    // Run the transcode
    let result = coordinator.run_scanned(scan, sink.as_mut());
    // Restores the terminal before anything is printed
    drop(sink);
    let result = result.context("Run failed")?;

    let output_bytes = (config.mode == RunMode::Convert).then(|| tree_size(&config.output_root));
    print_summary(
        &result.scan,
        &result.totals,
        result.duration,
        output_bytes,
        result.completed,
    );
    print_errors(&result.errors);

    if !result.completed {
        warn!(
            skipped_batches = result.batches_skipped,
            "Run was interrupted before completion"
        );
    }

    if result.has_errors() {
        warn!(errors = result.errors.len(), "Run completed with errors");
    }

    Ok(result.succeeded())
}

fn setup_logging(config: &RunConfig, plain: Option<&PlainSink>) -> Result<()> {
    let filter = if config.verbose {
        EnvFilter::new("tree_transcode=debug,warn")
    } else {
        EnvFilter::new("tree_transcode=info,warn")
    };

    let (writer, ansi) = if let Some(path) = &config.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        (BoxMakeWriter::new(Arc::new(file)), false)
    } else {
        match (config.display, plain) {
            (DisplayMode::Live, _) => (BoxMakeWriter::new(io::sink), false),
            (DisplayMode::Plain, Some(sink)) => {
                let bar = sink.bar();
                (BoxMakeWriter::new(move || BarWriter::new(bar.clone())), true)
            }
            _ => (BoxMakeWriter::new(io::stderr), true),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
