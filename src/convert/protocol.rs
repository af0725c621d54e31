//! Crash-safe, idempotent per-file conversion
//!
//! Each file moves through:
//!
//! ```text
//! CHECK_COMPLETE -> [CLEAN_STALE_ARTIFACTS] -> [CONTAINER_DEMUX] -> TRANSCODE_OR_COPY -> FINALIZE
//! ```
//!
//! Tools only ever write to `<final>.partial`; the rename in FINALIZE is the
//! single step that makes an output visible. A killed run leaves at most a
//! `.partial` file, which the next run deletes before retrying.

use crate::config::RunMode;
use crate::convert::artifact::{self, ArtifactState, Finalized};
use crate::convert::classify::{intermediate_path, FileKind};
use crate::convert::tool::{copy_preserving, ExternalTool, ToolOutcome, Toolchain};
use crate::error::{ErrorRecord, FileError, FileResult};
use crate::status::Event;
use crate::walker::queue::FilePair;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Stage label shown while demuxing a container
pub const DEMUX_STAGE: &str = "demux";

/// Stage label shown while encoding a demuxed intermediate
pub const ENCODE_STAGE: &str = "encode";

/// Terminal outcome of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Encoded in this run
    Transcoded,
    /// Copied in this run
    Copied,
    /// Final output was already there
    AlreadyComplete,
    /// Extension has no handling
    Ignored,
    /// Dry run: the action was reported, not performed
    Planned,
    /// Clean mode: stale artifacts were checked and removed
    Cleaned,
    /// Recorded failure
    Failed(ErrorRecord),
}

/// Runs the protocol for one file at a time
pub struct Converter<'a> {
    tools: &'a Toolchain,
    mode: RunMode,
}

impl<'a> Converter<'a> {
    pub fn new(tools: &'a Toolchain, mode: RunMode) -> Self {
        Self { tools, mode }
    }

    /// Handle `pair`, reporting each action through `report`
    ///
    /// `Err` means an unexpected fault; the caller records it. Tool failures
    /// come back as `Ok(FileOutcome::Failed(..))`.
    pub fn convert(&self, pair: &FilePair, report: &mut dyn FnMut(Event)) -> FileResult<FileOutcome> {
        if pair.kind == FileKind::Ignored {
            debug!(path = %pair.input.display(), "Ignoring file");
            return Ok(FileOutcome::Ignored);
        }

        match self.mode {
            RunMode::Clean => self.clean(pair, report),
            RunMode::DryRun => Ok(self.plan(pair, report)),
            RunMode::Convert => self.run(pair, report),
        }
    }

    fn run(&self, pair: &FilePair, report: &mut dyn FnMut(Event)) -> FileResult<FileOutcome> {
        // CHECK_COMPLETE
        if artifact::inspect(&pair.output) == ArtifactState::Complete {
            debug!(path = %pair.output.display(), "Output already complete");
            return Ok(FileOutcome::AlreadyComplete);
        }

        // CLEAN_STALE_ARTIFACTS
        clean_stale(&pair.output, report)?;

        match pair.kind {
            FileKind::Copy => copy_file(pair, report),
            FileKind::Transcode => {
                report(Event::Transcode {
                    input: pair.input.clone(),
                    output: pair.output.clone(),
                    progress: None,
                });
                match run_stage(self.tools.encoder.as_ref(), &pair.input, &pair.output)? {
                    None => Ok(FileOutcome::Transcoded),
                    Some(details) => Ok(failed(pair, details)),
                }
            }
            FileKind::Container => self.demux_then_encode(pair, report),
            FileKind::Ignored => Ok(FileOutcome::Ignored),
        }
    }

    fn demux_then_encode(&self, pair: &FilePair, report: &mut dyn FnMut(Event)) -> FileResult<FileOutcome> {
        let intermediate = intermediate_path(&pair.output);

        // CONTAINER_DEMUX; a finished intermediate from an interrupted run is reused
        if artifact::inspect(&intermediate) != ArtifactState::Complete {
            clean_stale(&intermediate, report)?;
            report(Event::Transcode {
                input: pair.input.clone(),
                output: intermediate.clone(),
                progress: Some(DEMUX_STAGE.to_string()),
            });
            if let Some(details) = run_stage(self.tools.demuxer.as_ref(), &pair.input, &intermediate)? {
                return Ok(failed(pair, details));
            }
        } else {
            debug!(path = %intermediate.display(), "Reusing demuxed intermediate");
        }

        report(Event::Transcode {
            input: pair.input.clone(),
            output: pair.output.clone(),
            progress: Some(ENCODE_STAGE.to_string()),
        });
        let outcome = match run_stage(self.tools.encoder.as_ref(), &intermediate, &pair.output)? {
            None => FileOutcome::Transcoded,
            Some(details) => return Ok(failed(pair, details)),
        };

        if let Err(e) = fs::remove_file(&intermediate) {
            warn!(path = %intermediate.display(), error = %e, "Failed to remove demuxed intermediate");
        }
        Ok(outcome)
    }

    fn clean(&self, pair: &FilePair, report: &mut dyn FnMut(Event)) -> FileResult<FileOutcome> {
        clean_stale(&pair.output, report)?;
        if pair.kind == FileKind::Container {
            clean_stale(&intermediate_path(&pair.output), report)?;
        }
        Ok(FileOutcome::Cleaned)
    }

    /// Report what a real run would do, touching nothing
    fn plan(&self, pair: &FilePair, report: &mut dyn FnMut(Event)) -> FileOutcome {
        if artifact::inspect(&pair.output) == ArtifactState::Complete {
            return FileOutcome::AlreadyComplete;
        }
        if artifact::inspect(&pair.output) == ArtifactState::WorkInProgress {
            let stale = artifact::temp_path(&pair.output);
            info!(path = %stale.display(), "Would remove stale partial output");
            report(Event::RemoveStaleFile { path: stale });
        }

        let event = match pair.kind {
            FileKind::Copy => Event::Copy {
                input: pair.input.clone(),
                output: pair.output.clone(),
            },
            _ => Event::Transcode {
                input: pair.input.clone(),
                output: pair.output.clone(),
                progress: None,
            },
        };
        info!(
            action = %event.describe(),
            output = %pair.output.display(),
            "Would write"
        );
        report(event);
        FileOutcome::Planned
    }
}

/// Delete a leftover `.partial` for `final_path`, reporting it if one existed
fn clean_stale(final_path: &Path, report: &mut dyn FnMut(Event)) -> FileResult<()> {
    if let Some(removed) = artifact::remove_stale(final_path)? {
        warn!(path = %removed.display(), "Removed stale partial output");
        report(Event::RemoveStaleFile { path: removed });
    }
    Ok(())
}

/// TRANSCODE + FINALIZE for one tool run
///
/// Returns `Some(details)` for a transcode failure.
fn run_stage(tool: &dyn ExternalTool, input: &Path, final_path: &Path) -> FileResult<Option<String>> {
    let temp = artifact::temp_path(final_path);

    let outcome = match tool.run(input, &temp) {
        Ok(outcome) => outcome,
        Err(e) => {
            artifact::discard_temp(final_path);
            return Err(e);
        }
    };

    match outcome {
        ToolOutcome::Success => match artifact::finalize(final_path)? {
            Finalized::Renamed => Ok(None),
            Finalized::MissingTemp => Ok(Some(format!(
                "{} reported success but produced no output at {}",
                tool.name(),
                temp.display()
            ))),
        },
        ToolOutcome::Failure { details } => {
            artifact::discard_temp(final_path);
            Ok(Some(details))
        }
    }
}

fn copy_file(pair: &FilePair, report: &mut dyn FnMut(Event)) -> FileResult<FileOutcome> {
    report(Event::Copy {
        input: pair.input.clone(),
        output: pair.output.clone(),
    });

    let temp = artifact::temp_path(&pair.output);
    if let Err(e) = copy_preserving(&pair.input, &temp) {
        artifact::discard_temp(&pair.output);
        return Err(e);
    }

    match artifact::finalize(&pair.output)? {
        Finalized::Renamed => Ok(FileOutcome::Copied),
        Finalized::MissingTemp => Err(FileError::Malformed(format!(
            "copy of {} left no file at {}",
            pair.input.display(),
            temp.display()
        ))),
    }
}

fn failed(pair: &FilePair, details: String) -> FileOutcome {
    error!(input = %pair.input.display(), details = %details, "Transcode failed");
    FileOutcome::Failed(ErrorRecord::transcode_failure(&pair.input, &pair.output, details))
}
