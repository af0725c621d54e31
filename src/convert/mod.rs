//! Per-file conversion
//!
//! - [`classify`]: extension to [`FileKind`] mapping and output naming
//! - [`artifact`]: `.partial` temp files and the rename that finalizes them
//! - [`tool`]: the external encoder/demuxer and the metadata-preserving copy
//! - [`protocol`]: the per-file state machine tying them together

pub mod artifact;
pub mod classify;
pub mod protocol;
pub mod tool;

pub use classify::{Classifier, FileKind};
pub use protocol::{Converter, FileOutcome};
pub use tool::{CommandTool, ExternalTool, ToolOutcome, Toolchain};
