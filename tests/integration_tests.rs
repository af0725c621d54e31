//! Integration tests for tree-transcode
//!
//! Runs the whole pipeline against temp directories with in-process tools
//! standing in for the external encoder and demuxer.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tree_transcode::config::{RunConfig, RunMode};
use tree_transcode::convert::{ExternalTool, ToolOutcome, Toolchain};
use tree_transcode::dashboard::PlainSink;
use tree_transcode::error::{ConfigError, ErrorKind, FileError, FileResult};
use tree_transcode::walker::{Coordinator, RunResult};

/// Writes a marker payload and counts invocations
#[derive(Default)]
struct CountingTool {
    calls: AtomicUsize,
}

impl CountingTool {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExternalTool for CountingTool {
    fn name(&self) -> &str {
        "counting"
    }

    fn run(&self, input: &Path, output: &Path) -> FileResult<ToolOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut data = b"encoded:".to_vec();
        data.extend(fs::read(input).map_err(|e| FileError::io("read", input, e))?);
        fs::write(output, data).map_err(|e| FileError::io("write", output, e))?;
        Ok(ToolOutcome::Success)
    }
}

/// Claims success without writing anything
struct SilentTool;

impl ExternalTool for SilentTool {
    fn name(&self) -> &str {
        "silent"
    }

    fn run(&self, _input: &Path, _output: &Path) -> FileResult<ToolOutcome> {
        Ok(ToolOutcome::Success)
    }
}

/// Always exits non-zero
struct FailingTool;

impl ExternalTool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }

    fn run(&self, _input: &Path, _output: &Path) -> FileResult<ToolOutcome> {
        Ok(ToolOutcome::Failure {
            details: "exit status: 2\nstderr: unsupported sample rate".to_string(),
        })
    }
}

struct Fixture {
    _dir: TempDir,
    input: std::path::PathBuf,
    output: std::path::PathBuf,
    encoder: Arc<CountingTool>,
    demuxer: Arc<CountingTool>,
}

impl Fixture {
    fn new(files: &[&str]) -> Self {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).unwrap();
        for rel in files {
            let path = input.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, rel.as_bytes()).unwrap();
        }

        Self {
            _dir: dir,
            input,
            output,
            encoder: Arc::new(CountingTool::default()),
            demuxer: Arc::new(CountingTool::default()),
        }
    }

    fn config(&self, mode: RunMode) -> RunConfig {
        let mut config = RunConfig::new(&self.input, &self.output).unwrap();
        config.worker_count = 3;
        config.queue_capacity = 2;
        config.refresh_interval = Duration::from_millis(10);
        config.mode = mode;
        config
    }

    fn tools(&self) -> Toolchain {
        Toolchain::new(self.encoder.clone(), self.demuxer.clone())
    }

    fn run(&self, mode: RunMode) -> RunResult {
        run_with(self.config(mode), self.tools())
    }
}

fn run_with(config: RunConfig, tools: Toolchain) -> RunResult {
    Coordinator::new(config, tools)
        .run(&mut PlainSink::hidden())
        .unwrap()
}

#[test]
fn test_mirrors_tree() {
    let fx = Fixture::new(&["a/1.wav", "a/2.png", "b/3.mp3"]);
    let result = fx.run(RunMode::Convert);

    assert!(result.completed);
    assert!(!result.has_errors());
    assert_eq!(result.transcodes_total, 2);
    assert_eq!(result.transcodes_done, 2);
    assert_eq!(result.totals.transcoded, 2);
    assert_eq!(result.totals.copied, 1);

    assert_eq!(fs::read(fx.output.join("a/1.mp3")).unwrap(), b"encoded:a/1.wav");
    assert_eq!(fs::read(fx.output.join("a/2.png")).unwrap(), b"a/2.png");
    assert_eq!(fs::read(fx.output.join("b/3.mp3")).unwrap(), b"encoded:b/3.mp3");
    assert_eq!(fx.encoder.calls(), 2);
    assert_eq!(fx.demuxer.calls(), 0);
}

#[test]
fn test_rerun_is_idempotent() {
    let fx = Fixture::new(&["a/1.wav", "a/2.png", "b/3.mp3"]);
    fx.run(RunMode::Convert);

    let again = fx.run(RunMode::Convert);
    assert!(!again.has_errors());
    assert_eq!(again.totals.transcoded, 0);
    assert_eq!(again.totals.copied, 0);
    assert_eq!(again.totals.already_complete, 3);
    assert_eq!(again.transcodes_done, 2);
    assert_eq!(fx.encoder.calls(), 2);
}

#[test]
fn test_stale_partial_is_replaced() {
    let fx = Fixture::new(&["a/1.wav"]);
    fs::create_dir_all(fx.output.join("a")).unwrap();
    fs::write(fx.output.join("a/1.mp3.partial"), b"truncated").unwrap();

    let result = fx.run(RunMode::Convert);

    assert!(!result.has_errors());
    assert_eq!(result.totals.stale_removed, 1);
    assert_eq!(result.totals.transcoded, 1);
    assert_eq!(fx.encoder.calls(), 1);
    assert!(!fx.output.join("a/1.mp3.partial").exists());
    assert_eq!(fs::read(fx.output.join("a/1.mp3")).unwrap(), b"encoded:a/1.wav");
}

#[test]
fn test_container_demuxed_then_encoded() {
    let fx = Fixture::new(&["c/4.m4a"]);
    let result = fx.run(RunMode::Convert);

    assert!(!result.has_errors());
    assert_eq!(result.transcodes_done, 1);
    assert_eq!(fx.demuxer.calls(), 1);
    assert_eq!(fx.encoder.calls(), 1);
    assert_eq!(
        fs::read(fx.output.join("c/4.mp3")).unwrap(),
        b"encoded:encoded:c/4.m4a"
    );
    assert!(!fx.output.join("c/4.demux.wav").exists());
}

#[test]
fn test_ignored_files_are_not_mirrored() {
    let fx = Fixture::new(&["a/1.wav", "a/notes.txt"]);
    let result = fx.run(RunMode::Convert);

    assert_eq!(result.totals.ignored, 1);
    assert_eq!(result.transcodes_total, 1);
    assert!(!fx.output.join("a/notes.txt").exists());
}

#[test]
fn test_silent_success_is_a_failure() {
    let fx = Fixture::new(&["a/1.wav", "a/2.png"]);
    let result = run_with(
        fx.config(RunMode::Convert),
        Toolchain::new(Arc::new(SilentTool), Arc::new(SilentTool)),
    );

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::TranscodeFailure);
    assert!(result.errors[0].input.ends_with("a/1.wav"));
    assert!(!fx.output.join("a/1.mp3").exists());
    assert!(fx.output.join("a/2.png").exists());
    assert_eq!(result.transcodes_done, 1);
}

#[test]
fn test_tool_failure_recorded_and_retried_next_run() {
    let fx = Fixture::new(&["a/1.wav", "b/2.wav"]);
    let result = run_with(
        fx.config(RunMode::Convert),
        Toolchain::new(Arc::new(FailingTool), Arc::new(FailingTool)),
    );

    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().all(|r| r.details.contains("unsupported sample rate")));
    assert!(!fx.output.join("a/1.mp3.partial").exists());

    let retry = fx.run(RunMode::Convert);
    assert!(!retry.has_errors());
    assert_eq!(retry.totals.transcoded, 2);
}

#[test]
fn test_dry_run_writes_nothing() {
    let fx = Fixture::new(&["a/1.wav", "a/2.png", "b/3.mp3"]);
    let result = fx.run(RunMode::DryRun);

    assert!(!result.has_errors());
    assert_eq!(result.totals.planned, 3);
    assert_eq!(result.transcodes_done, 2);
    assert_eq!(fx.encoder.calls(), 0);
    assert!(!fx.output.exists());
}

#[test]
fn test_clean_removes_only_partials() {
    let fx = Fixture::new(&["a/1.wav", "a/2.png", "c/4.m4a"]);
    fs::create_dir_all(fx.output.join("a")).unwrap();
    fs::create_dir_all(fx.output.join("c")).unwrap();
    fs::write(fx.output.join("a/1.mp3.partial"), b"x").unwrap();
    fs::write(fx.output.join("a/2.png.partial"), b"x").unwrap();
    fs::write(fx.output.join("c/4.demux.wav.partial"), b"x").unwrap();

    let result = fx.run(RunMode::Clean);

    assert!(!result.has_errors());
    assert_eq!(result.totals.stale_removed, 3);
    assert_eq!(fx.encoder.calls(), 0);
    assert!(!fx.output.join("a/1.mp3.partial").exists());
    assert!(!fx.output.join("a/2.png.partial").exists());
    assert!(!fx.output.join("c/4.demux.wav.partial").exists());
    assert!(!fx.output.join("a/1.mp3").exists());
}

#[test]
fn test_bad_roots_fail_fast() {
    let dir = tempdir().unwrap();

    let err = RunConfig::new(dir.path().join("missing"), dir.path().join("out")).unwrap_err();
    assert!(matches!(err, ConfigError::InputNotFound { .. }));

    let err = RunConfig::new(dir.path(), dir.path().join("nested/out")).unwrap_err();
    assert!(matches!(err, ConfigError::OutputInsideInput { .. }));

    fs::create_dir_all(dir.path().join("library/in")).unwrap();
    let err = RunConfig::new(dir.path().join("library/in"), dir.path().join("library")).unwrap_err();
    assert!(matches!(err, ConfigError::InputInsideOutput { .. }));

    assert!(!dir.path().join("nested").exists());
}

#[test]
fn test_many_workers_few_batches() {
    let fx = Fixture::new(&["only/1.wav"]);
    let mut config = fx.config(RunMode::Convert);
    config.worker_count = 16;

    let result = run_with(config, fx.tools());
    assert!(result.completed);
    assert_eq!(result.transcodes_done, 1);
    assert_eq!(fx.encoder.calls(), 1);
}

#[test]
fn test_read_only_inputs_are_copied() {
    let fx = Fixture::new(&["a/1.wav", "a/cover.png"]);
    let cover = fx.input.join("a/cover.png");
    let mut perms = fs::metadata(&cover).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&cover, perms).unwrap();

    let result = fx.run(RunMode::Convert);
    assert!(result.succeeded(), "errors: {:?}", result.errors);
    assert_eq!(result.totals.copied, 1);
    assert_eq!(fs::read(fx.output.join("a/cover.png")).unwrap(), b"a/cover.png");
    assert!(!fx.output.join("a/cover.png.partial").exists());

    let again = fx.run(RunMode::Convert);
    assert!(again.succeeded());
    assert_eq!(again.totals.already_complete, 2);
}

#[cfg(unix)]
#[test]
fn test_unreadable_entry_fails_the_run() {
    let fx = Fixture::new(&["a/1.wav"]);
    std::os::unix::fs::symlink(fx.input.join("a/missing.wav"), fx.input.join("a/2.wav")).unwrap();

    let result = fx.run(RunMode::Convert);

    assert!(result.completed);
    assert!(!result.succeeded());
    assert_eq!(result.totals.transcoded, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::UnhandledFault);
    assert!(result.errors[0].input.ends_with("a/2.wav"));
    assert_eq!(result.scan.walk_errors.len(), 1);
}
