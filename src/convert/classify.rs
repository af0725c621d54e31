//! File classification by extension
//!
//! Every input file falls into exactly one class. The class decides the
//! output file name and which stages of the conversion protocol run.

use std::path::{Path, PathBuf};

/// Extensions handed straight to the encoder
pub const TRANSCODE_EXTENSIONS: &[&str] = &["mp3", "wav"];

/// Container extensions that need a demux pass before encoding
pub const CONTAINER_EXTENSIONS: &[&str] = &["m4a"];

/// Extensions copied through unchanged
pub const COPY_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pdf"];

/// Extension of every encoded output
pub const ENCODED_EXTENSION: &str = "mp3";

/// Extension of demuxed intermediates
pub const INTERMEDIATE_EXTENSION: &str = "wav";

/// How a single input file is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Encoded directly by the external encoder
    Transcode,
    /// Demuxed to an intermediate, then encoded
    Container,
    /// Copied with metadata preserved
    Copy,
    /// Not part of the output tree
    Ignored,
}

impl FileKind {
    /// True for kinds that end in an encoder run
    pub fn is_transcodable(self) -> bool {
        matches!(self, FileKind::Transcode | FileKind::Container)
    }
}

/// Maps input extensions to [`FileKind`]s
#[derive(Debug, Clone)]
pub struct Classifier {
    transcode: Vec<String>,
    container: Vec<String>,
    copy: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(TRANSCODE_EXTENSIONS, CONTAINER_EXTENSIONS, COPY_EXTENSIONS)
    }
}

impl Classifier {
    pub fn new(transcode: &[&str], container: &[&str], copy: &[&str]) -> Self {
        let lower = |exts: &[&str]| exts.iter().map(|e| e.to_ascii_lowercase()).collect();
        Self {
            transcode: lower(transcode),
            container: lower(container),
            copy: lower(copy),
        }
    }

    /// Classify a path by its (case-insensitive) extension
    pub fn classify(&self, path: &Path) -> FileKind {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return FileKind::Ignored;
        };
        let ext = ext.to_ascii_lowercase();

        if self.transcode.contains(&ext) {
            FileKind::Transcode
        } else if self.container.contains(&ext) {
            FileKind::Container
        } else if self.copy.contains(&ext) {
            FileKind::Copy
        } else {
            FileKind::Ignored
        }
    }

    /// Output path for `input_rel` (relative to the input root) under `output_root`
    ///
    /// Returns `None` for ignored files.
    pub fn output_path(&self, output_root: &Path, input_rel: &Path, kind: FileKind) -> Option<PathBuf> {
        let mirrored = output_root.join(input_rel);
        match kind {
            FileKind::Transcode | FileKind::Container => {
                Some(mirrored.with_extension(ENCODED_EXTENSION))
            }
            FileKind::Copy => Some(mirrored),
            FileKind::Ignored => None,
        }
    }
}

/// Path of the demux intermediate that feeds the encoder for `final_output`
pub fn intermediate_path(final_output: &Path) -> PathBuf {
    final_output.with_extension(format!("demux.{INTERMEDIATE_EXTENSION}"))
}
