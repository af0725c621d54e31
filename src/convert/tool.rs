//! External tool invocation
//!
//! The encoder and the container demuxer are opaque collaborators with the
//! contract `run(input, output) -> success | failure`. [`CommandTool`] runs a
//! real program; tests plug in their own [`ExternalTool`] implementations.

use crate::error::{FileError, FileResult};
use std::fs::{self, File, FileTimes};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::trace;

/// Default encoder program
pub const DEFAULT_ENCODER: &str = "lame";

/// Default demuxer program
pub const DEFAULT_DEMUXER: &str = "faad";

/// Default encoder arguments
pub const DEFAULT_ENCODER_ARGS: &str = "-V 7";

/// Outcome of a single tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success,
    Failure { details: String },
}

/// An external program that turns one file into another
pub trait ExternalTool: Send + Sync {
    /// Short name for logs and the dashboard
    fn name(&self) -> &str;

    /// Produce `output` from `input`
    ///
    /// `Err` is reserved for faults such as the program not launching;
    /// a program that ran and failed returns `Ok(ToolOutcome::Failure)`.
    fn run(&self, input: &Path, output: &Path) -> FileResult<ToolOutcome>;
}

/// Where the input and output paths go on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgLayout {
    /// `<program> <args...> <input> <output>`
    InputOutput,
    /// `<program> <args...> <flag> <output> <input>`
    OutputFlag(String),
}

/// A tool backed by a subprocess
#[derive(Debug, Clone)]
pub struct CommandTool {
    program: String,
    args: Vec<String>,
    layout: ArgLayout,
}

impl CommandTool {
    pub fn new(program: impl Into<String>, args: Vec<String>, layout: ArgLayout) -> Self {
        Self {
            program: program.into(),
            args,
            layout,
        }
    }

    /// MP3 encoder in the style of `lame --quiet <args> in out`
    pub fn encoder(program: impl Into<String>, extra_args: &[String]) -> Self {
        let mut args = vec!["--quiet".to_string()];
        args.extend(extra_args.iter().cloned());
        Self::new(program, args, ArgLayout::InputOutput)
    }

    /// AAC decoder in the style of `faad --quiet -o out in`
    pub fn demuxer(program: impl Into<String>) -> Self {
        Self::new(
            program,
            vec!["--quiet".to_string()],
            ArgLayout::OutputFlag("-o".to_string()),
        )
    }

    /// Full argument vector for one invocation (program excluded)
    pub fn command_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = self.args.clone();
        let input = input.display().to_string();
        let output = output.display().to_string();
        match &self.layout {
            ArgLayout::InputOutput => {
                args.push(input);
                args.push(output);
            }
            ArgLayout::OutputFlag(flag) => {
                args.push(flag.clone());
                args.push(output);
                args.push(input);
            }
        }
        args
    }
}

impl ExternalTool for CommandTool {
    fn name(&self) -> &str {
        &self.program
    }

    fn run(&self, input: &Path, output: &Path) -> FileResult<ToolOutcome> {
        let args = self.command_args(input, output);
        trace!(program = %self.program, ?args, "Running external tool");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| FileError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if result.status.success() {
            return Ok(ToolOutcome::Success);
        }

        let mut details = format!(
            "{} failed ({}): {} {}",
            self.program,
            result.status,
            self.program,
            args.join(" ")
        );
        for (label, bytes) in [("stdout", &result.stdout), ("stderr", &result.stderr)] {
            let text = String::from_utf8_lossy(bytes);
            let text = text.trim();
            if !text.is_empty() {
                details.push_str(&format!("\n -> {label}: {text}"));
            }
        }

        Ok(ToolOutcome::Failure { details })
    }
}

/// The pair of tools the conversion protocol drives
#[derive(Clone)]
pub struct Toolchain {
    pub encoder: Arc<dyn ExternalTool>,
    pub demuxer: Arc<dyn ExternalTool>,
}

impl Toolchain {
    pub fn new(encoder: Arc<dyn ExternalTool>, demuxer: Arc<dyn ExternalTool>) -> Self {
        Self { encoder, demuxer }
    }

    /// Subprocess-backed toolchain
    pub fn external(encoder: &str, encoder_args: &[String], demuxer: &str) -> Self {
        Self::new(
            Arc::new(CommandTool::encoder(encoder, encoder_args)),
            Arc::new(CommandTool::demuxer(demuxer)),
        )
    }
}

/// Copy `input` to `output`, keeping permissions and access/modification times
pub fn copy_preserving(input: &Path, output: &Path) -> FileResult<u64> {
    let bytes = fs::copy(input, output).map_err(|e| FileError::io("copy", input, e))?;

    let meta = fs::metadata(input).map_err(|e| FileError::io("stat", input, e))?;
    let mut times = FileTimes::new();
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }

    // The copy carries the source's permissions, which may be read-only.
    // Setting times only needs ownership, so a read handle is enough.
    File::open(output)
        .and_then(|f| f.set_times(times))
        .map_err(|e| FileError::io("set times", output, e))?;

    Ok(bytes)
}
