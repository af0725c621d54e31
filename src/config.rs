//! Configuration types for tree-transcode
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::convert::tool::{DEFAULT_DEMUXER, DEFAULT_ENCODER, DEFAULT_ENCODER_ARGS};
use crate::error::ConfigError;
use crate::walker::enumerator::resolve_roots;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Minimum queue capacity
const MIN_QUEUE_CAPACITY: usize = 1;

/// Dashboard refresh limits (milliseconds)
const MIN_REFRESH_MS: u64 = 10;
const MAX_REFRESH_MS: u64 = 10_000;

/// Transcode a media tree into a mirrored output tree
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tree-transcode",
    version,
    about = "Transcode a directory tree of audio files into a mirrored output tree",
    long_about = "Walks INPUT, encodes audio files with an external encoder (lame by default),\n\
                  demuxes containers first (faad by default), copies images and documents,\n\
                  and writes everything into the same layout under OUTPUT.\n\n\
                  Outputs are written to '<name>.partial' and renamed into place, so an\n\
                  interrupted run can simply be started again.",
    after_help = "EXAMPLES:\n    \
        tree-transcode ~/Music /mnt/player/Music\n    \
        tree-transcode ~/Music out -w 8 --encoder-args '--preset medium'\n    \
        tree-transcode ~/Music out --dry-run --plain\n    \
        tree-transcode ~/Music out --clean"
)]
pub struct CliArgs {
    /// Directory of original files
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Directory to write the mirrored tree to
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Number of worker threads
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Work queue capacity in batches (bounds memory use)
    #[arg(long, default_value = "64", value_name = "NUM")]
    pub queue_capacity: usize,

    /// Dashboard refresh interval
    #[arg(long, default_value = "100", value_name = "MILLIS")]
    pub refresh_ms: u64,

    /// Encoder program
    #[arg(long, default_value = DEFAULT_ENCODER, value_name = "PROGRAM")]
    pub encoder: String,

    /// Extra arguments passed to the encoder (whitespace separated)
    #[arg(long, default_value = DEFAULT_ENCODER_ARGS, value_name = "ARGS", allow_hyphen_values = true)]
    pub encoder_args: String,

    /// Demuxer program for container formats
    #[arg(long, default_value = DEFAULT_DEMUXER, value_name = "PROGRAM")]
    pub demuxer: String,

    /// Report what would be done without writing anything
    #[arg(long, conflicts_with = "clean")]
    pub dry_run: bool,

    /// Only remove stale partial outputs left by an interrupted run
    #[arg(long)]
    pub clean: bool,

    /// Plain log output instead of the live dashboard
    #[arg(long)]
    pub plain: bool,

    /// Quiet mode - no dashboard or progress bar
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (log every file action)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Write logs to this file (the live dashboard otherwise discards them)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// What the run does with each file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Convert and copy
    Convert,
    /// Report intended actions only
    DryRun,
    /// Remove stale partial outputs only
    Clean,
}

/// How progress is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Scrollable full-screen dashboard
    Live,
    /// Progress bar with log lines above it
    Plain,
    /// Nothing but the final summary
    Quiet,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Canonical input root
    pub input_root: PathBuf,

    /// Resolved output root (may not exist yet)
    pub output_root: PathBuf,

    /// Number of worker threads
    pub worker_count: usize,

    /// Work queue capacity
    pub queue_capacity: usize,

    /// Dashboard refresh / producer retry interval
    pub refresh_interval: Duration,

    /// Encoder program
    pub encoder: String,

    /// Extra encoder arguments
    pub encoder_args: Vec<String>,

    /// Demuxer program
    pub demuxer: String,

    /// Convert, dry run or clean
    pub mode: RunMode,

    /// Progress display
    pub display: DisplayMode,

    /// Verbose logging
    pub verbose: bool,

    /// Optional log file
    pub log_file: Option<PathBuf>,
}

impl RunConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        // Validate queue capacity
        if args.queue_capacity < MIN_QUEUE_CAPACITY {
            return Err(ConfigError::InvalidQueueCapacity {
                size: args.queue_capacity,
                min: MIN_QUEUE_CAPACITY,
            });
        }

        // Validate refresh interval
        if !(MIN_REFRESH_MS..=MAX_REFRESH_MS).contains(&args.refresh_ms) {
            return Err(ConfigError::InvalidRefreshInterval {
                millis: args.refresh_ms,
                min: MIN_REFRESH_MS,
                max: MAX_REFRESH_MS,
            });
        }

        if args.encoder.trim().is_empty() {
            return Err(ConfigError::EmptyTool { role: "encoding" });
        }
        if args.demuxer.trim().is_empty() {
            return Err(ConfigError::EmptyTool { role: "demuxing" });
        }

        // Roots are checked before anything touches the filesystem
        let (input_root, output_root) = resolve_roots(&args.input, &args.output)?;

        let mode = if args.clean {
            RunMode::Clean
        } else if args.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Convert
        };

        let display = if args.quiet {
            DisplayMode::Quiet
        } else if args.plain || !console::Term::stdout().is_term() {
            DisplayMode::Plain
        } else {
            DisplayMode::Live
        };

        Ok(Self {
            input_root,
            output_root,
            worker_count: args.workers,
            queue_capacity: args.queue_capacity,
            refresh_interval: Duration::from_millis(args.refresh_ms),
            encoder: args.encoder,
            encoder_args: args.encoder_args.split_whitespace().map(String::from).collect(),
            demuxer: args.demuxer,
            mode,
            display,
            verbose: args.verbose,
            log_file: args.log_file,
        })
    }

    /// Configuration with defaults for the given roots (library use and tests)
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let args = CliArgs::parse_from([
            std::ffi::OsString::from("tree-transcode"),
            input.into().into_os_string(),
            output.into().into_os_string(),
            "--quiet".into(),
        ]);
        Self::from_args(args)
    }
}
