//! Work enumerator - turns the input tree into work batches
//!
//! The tree is walked once up front. That single pass yields everything the
//! run needs before any worker starts:
//! - every subdirectory, so the output tree can be mirrored ahead of time
//! - every file, grouped by its parent directory
//! - the total number of transcodable inputs, for the progress display
//!
//! Batches are then streamed lazily, one per directory holding files,
//! followed by one end-of-work marker per worker.

use crate::convert::{Classifier, FileKind};
use crate::error::{ConfigError, ErrorRecord, FileError, Result, TranscodeError};
use crate::walker::queue::{FilePair, WorkBatch, WorkItem};
use std::collections::{btree_map, BTreeMap, HashSet};
use std::fs;
use std::iter;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Two inputs that would produce the same output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// Input that keeps the output path (first in name order)
    pub kept: PathBuf,
    /// Input that is left out of the run
    pub dropped: PathBuf,
    pub output: PathBuf,
}

/// Counts gathered while scanning
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub directories: usize,
    pub files: usize,
    pub transcodable: usize,
    pub copyable: usize,
    pub ignored: usize,
    pub collisions: Vec<Collision>,
    /// Entries the walk could not read, as unhandled faults
    pub walk_errors: Vec<ErrorRecord>,
}

/// Resolve and validate the input and output roots
///
/// The input must be an existing directory. The two roots must not overlap:
/// an output inside the input would be scanned as input, and an input inside
/// the output could be overwritten by mirrored files. The output does not
/// need to exist.
pub fn resolve_roots(input: &Path, output: &Path) -> std::result::Result<(PathBuf, PathBuf), ConfigError> {
    if !input.is_dir() {
        return Err(ConfigError::InputNotFound {
            path: input.to_path_buf(),
        });
    }

    let input = fs::canonicalize(input).map_err(|e| ConfigError::Unresolvable {
        path: input.to_path_buf(),
        reason: e.to_string(),
    })?;
    let output = resolve_maybe_missing(output)?;

    if output == input {
        return Err(ConfigError::SameRoots { path: output });
    }
    if output.starts_with(&input) {
        return Err(ConfigError::OutputInsideInput { input, output });
    }
    if input.starts_with(&output) {
        return Err(ConfigError::InputInsideOutput { input, output });
    }

    Ok((input, output))
}

/// Canonicalize the deepest existing ancestor of `path` and append the rest
fn resolve_maybe_missing(path: &Path) -> std::result::Result<PathBuf, ConfigError> {
    let unresolvable = |reason: String| ConfigError::Unresolvable {
        path: path.to_path_buf(),
        reason,
    };

    let absolute = std::path::absolute(path).map_err(|e| unresolvable(e.to_string()))?;

    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    while !existing.exists() {
        let name = existing
            .file_name()
            .ok_or_else(|| unresolvable("no existing ancestor".into()))?;
        missing.push(name.to_os_string());
        existing = existing
            .parent()
            .ok_or_else(|| unresolvable("no existing ancestor".into()))?;
    }

    let mut resolved = fs::canonicalize(existing).map_err(|e| unresolvable(e.to_string()))?;
    for name in missing.into_iter().rev() {
        match Path::new(&name).components().next() {
            Some(Component::ParentDir) => {
                resolved.pop();
            }
            Some(Component::CurDir) | None => {}
            _ => resolved.push(name),
        }
    }
    Ok(resolved)
}

/// Turn an unreadable entry into a fault against its mirrored output path
fn walk_fault(input_root: &Path, output_root: &Path, error: walkdir::Error) -> ErrorRecord {
    let input = error.path().map_or_else(|| input_root.to_path_buf(), Path::to_path_buf);
    let output = input
        .strip_prefix(input_root)
        .map_or_else(|_| output_root.to_path_buf(), |rel| output_root.join(rel));
    let fault = FileError::io("walk", &input, error.into());
    ErrorRecord::fault(input, output, &fault)
}

/// Result of walking the input tree once
#[derive(Debug)]
pub struct TreeScan {
    output_root: PathBuf,
    /// Subdirectories, relative to the input root
    directories: Vec<PathBuf>,
    /// Classified files keyed by parent directory (relative)
    groups: BTreeMap<PathBuf, Vec<FilePair>>,
    report: ScanReport,
}

impl TreeScan {
    /// Walk `input_root` and plan the mirrored tree under `output_root`
    ///
    /// Fails fast on invalid roots, before anything is created.
    pub fn scan(input_root: &Path, output_root: &Path, classifier: &Classifier) -> Result<Self> {
        let (input_root, output_root) = resolve_roots(input_root, output_root)?;

        let mut directories = Vec::new();
        let mut files: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        let mut report = ScanReport::default();

        let walk = WalkDir::new(&input_root)
            .follow_links(true)
            .min_depth(1)
            .sort_by_file_name();

        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    report.walk_errors.push(walk_fault(&input_root, &output_root, e));
                    continue;
                }
            };

            let rel = entry
                .path()
                .strip_prefix(&input_root)
                .map_err(|e| TranscodeError::Scan {
                    path: entry.path().to_path_buf(),
                    reason: e.to_string(),
                })?
                .to_path_buf();

            if entry.file_type().is_dir() {
                directories.push(rel);
            } else if entry.file_type().is_file() {
                let parent = rel.parent().map(Path::to_path_buf).unwrap_or_default();
                files.entry(parent).or_default().push(rel);
            }
        }

        report.directories = directories.len();

        let mut groups = BTreeMap::new();
        for (dir, rels) in files {
            let pairs = plan_directory(&input_root, &output_root, classifier, rels, &mut report);
            if !pairs.is_empty() {
                groups.insert(dir, pairs);
            }
        }

        debug!(
            dirs = report.directories,
            files = report.files,
            transcodable = report.transcodable,
            "Input tree scanned"
        );

        Ok(Self {
            output_root,
            directories,
            groups,
            report,
        })
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn report(&self) -> &ScanReport {
        &self.report
    }

    /// Total transcodable inputs, including containers
    pub fn transcodable_count(&self) -> usize {
        self.report.transcodable
    }

    /// Number of batches that will be streamed
    pub fn batch_count(&self) -> usize {
        self.groups.len()
    }

    /// Output directories to mirror, root first
    pub fn output_directories(&self) -> impl Iterator<Item = PathBuf> + '_ {
        iter::once(self.output_root.clone()).chain(self.directories.iter().map(|d| self.output_root.join(d)))
    }

    /// Create the output root and every mirrored subdirectory
    ///
    /// Idempotent. In a dry run nothing is created and the directories that
    /// would be created are only counted.
    pub fn prepare_output_tree(&self, dry_run: bool) -> Result<usize> {
        let mut missing = 0;
        for dir in self.output_directories() {
            if dir.is_dir() {
                continue;
            }
            missing += 1;
            if dry_run {
                info!(path = %dir.display(), "Would create directory");
            } else {
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(missing)
    }

    /// Lazily stream the batches
    pub fn into_batches(self) -> Batches {
        Batches {
            output_root: self.output_root,
            groups: self.groups.into_iter(),
        }
    }

    /// Batches followed by exactly `num_workers` end-of-work markers
    pub fn work_items(self, num_workers: usize) -> impl Iterator<Item = WorkItem> {
        self.into_batches()
            .map(WorkItem::Batch)
            .chain(iter::repeat(WorkItem::EndOfWork).take(num_workers))
    }
}

/// Classify one directory's files and drop output collisions
fn plan_directory(
    input_root: &Path,
    output_root: &Path,
    classifier: &Classifier,
    rels: Vec<PathBuf>,
    report: &mut ScanReport,
) -> Vec<FilePair> {
    let mut pairs: Vec<FilePair> = Vec::with_capacity(rels.len());
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for rel in rels {
        report.files += 1;
        let input = input_root.join(&rel);
        let kind = classifier.classify(&rel);

        let output = match classifier.output_path(output_root, &rel, kind) {
            Some(output) => output,
            None => {
                report.ignored += 1;
                pairs.push(FilePair {
                    output: output_root.join(&rel),
                    input,
                    kind: FileKind::Ignored,
                });
                continue;
            }
        };

        if !claimed.insert(output.clone()) {
            let kept = pairs
                .iter()
                .find(|p| p.kind != FileKind::Ignored && p.output == output)
                .map(|p| p.input.clone())
                .unwrap_or_default();
            warn!(
                kept = %kept.display(),
                dropped = %input.display(),
                output = %output.display(),
                "Two inputs map to the same output; keeping the first"
            );
            report.collisions.push(Collision {
                kept,
                dropped: input,
                output,
            });
            continue;
        }

        match kind {
            FileKind::Transcode | FileKind::Container => report.transcodable += 1,
            FileKind::Copy => report.copyable += 1,
            FileKind::Ignored => {}
        }
        pairs.push(FilePair { input, output, kind });
    }

    pairs
}

/// Lazy, non-restartable stream of [`WorkBatch`]es
pub struct Batches {
    output_root: PathBuf,
    groups: btree_map::IntoIter<PathBuf, Vec<FilePair>>,
}

impl Iterator for Batches {
    type Item = WorkBatch;

    fn next(&mut self) -> Option<WorkBatch> {
        let (dir, pairs) = self.groups.next()?;
        Some(WorkBatch {
            output_directory: self.output_root.join(dir),
            pairs,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.groups.size_hint()
    }
}

/// Total size in bytes of the regular files under `root`
pub fn tree_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_tree_size() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/one"), b"12345").unwrap();
        fs::write(dir.path().join("a/b/two"), b"123").unwrap();
        assert_eq!(tree_size(dir.path()), 8);
        assert_eq!(tree_size(&dir.path().join("missing")), 0);
    }

    #[test]
    fn test_missing_input_fails_fast() {
        let dir = tempdir().unwrap();
        let err = resolve_roots(&dir.path().join("nope"), &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ConfigError::InputNotFound { .. }));
    }

    #[test]
    fn test_same_roots_rejected() {
        let dir = tempdir().unwrap();
        let err = resolve_roots(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::SameRoots { .. }));

        // Spelled differently, same place
        let dotted = dir.path().join(".");
        let err = resolve_roots(dir.path(), &dotted).unwrap_err();
        assert!(matches!(err, ConfigError::SameRoots { .. }));
    }

    #[test]
    fn test_output_inside_input_rejected() {
        let dir = tempdir().unwrap();
        let err = resolve_roots(dir.path(), &dir.path().join("out/nested")).unwrap_err();
        assert!(matches!(err, ConfigError::OutputInsideInput { .. }));
    }

    #[test]
    fn test_input_inside_output_rejected() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("library/in");
        fs::create_dir_all(&input).unwrap();

        let err = resolve_roots(&input, &dir.path().join("library")).unwrap_err();
        assert!(matches!(err, ConfigError::InputInsideOutput { .. }));

        // Through a parent component
        let err = resolve_roots(&input, &input.join("..")).unwrap_err();
        assert!(matches!(err, ConfigError::InputInsideOutput { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_errors_become_fault_records() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        touch(&input.join("a/1.wav"));
        std::os::unix::fs::symlink(input.join("a/gone.wav"), input.join("a/2.wav")).unwrap();

        let scan = TreeScan::scan(&input, &dir.path().join("out"), &Classifier::default()).unwrap();
        let errors = &scan.report().walk_errors;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, crate::error::ErrorKind::UnhandledFault);
        assert!(errors[0].input.ends_with("a/2.wav"));
        assert_eq!(errors[0].output, scan.output_root().join("a/2.wav"));
        assert_eq!(scan.transcodable_count(), 1);
    }

    #[test]
    fn test_sibling_output_accepted() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir(&input).unwrap();
        let (i, o) = resolve_roots(&input, &dir.path().join("out/deeper")).unwrap();
        assert!(i.ends_with("in"));
        assert!(o.ends_with("out/deeper"));
    }

    #[test]
    fn test_batches_group_by_directory() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        touch(&input.join("a/1.wav"));
        touch(&input.join("a/2.png"));
        touch(&input.join("b/3.mp3"));
        touch(&input.join("c/readme.txt"));
        fs::create_dir_all(input.join("d/empty")).unwrap();

        let scan = TreeScan::scan(&input, &dir.path().join("out"), &Classifier::default()).unwrap();
        assert_eq!(scan.transcodable_count(), 2);
        assert_eq!(scan.report().copyable, 1);
        assert_eq!(scan.report().ignored, 1);
        assert_eq!(scan.report().directories, 5);
        assert_eq!(scan.batch_count(), 3);

        let out_root = scan.output_root().to_path_buf();
        let batches: Vec<_> = scan.into_batches().collect();
        assert_eq!(batches[0].output_directory, out_root.join("a"));
        assert_eq!(batches[0].pairs.len(), 2);
        assert_eq!(batches[0].pairs[0].output, out_root.join("a/1.mp3"));
        assert_eq!(batches[0].pairs[1].kind, FileKind::Copy);
        assert_eq!(batches[1].pairs[0].output, out_root.join("b/3.mp3"));
        assert_eq!(batches[2].pairs[0].kind, FileKind::Ignored);
    }

    #[test]
    fn test_output_paths_disjoint() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        for d in ["x", "x/y", "x/y/z", "w"] {
            for f in ["1.wav", "1.mp3", "1.m4a", "2.mp3", "c.jpg", "n.txt"] {
                touch(&input.join(d).join(f));
            }
        }

        let scan = TreeScan::scan(&input, &dir.path().join("out"), &Classifier::default()).unwrap();
        // 1.m4a, 1.mp3, 1.wav all map to 1.mp3 in each of the four directories
        assert_eq!(scan.report().collisions.len(), 8);

        let mut seen = HashSet::new();
        for batch in scan.into_batches() {
            for pair in batch.pairs.iter().filter(|p| p.kind != FileKind::Ignored) {
                assert_eq!(pair.output.parent().unwrap(), batch.output_directory);
                assert!(seen.insert(pair.output.clone()), "duplicate {}", pair.output.display());
            }
        }
        assert_eq!(seen.len(), 4 * 3);
    }

    #[test]
    fn test_end_of_work_markers_follow_batches() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        touch(&input.join("a/1.wav"));
        touch(&input.join("b/1.wav"));

        let scan = TreeScan::scan(&input, &dir.path().join("out"), &Classifier::default()).unwrap();
        let items: Vec<_> = scan.work_items(3).collect();

        assert_eq!(items.len(), 5);
        assert!(matches!(items[0], WorkItem::Batch(_)));
        assert!(matches!(items[1], WorkItem::Batch(_)));
        assert!(items[2..].iter().all(|i| *i == WorkItem::EndOfWork));
    }

    #[test]
    fn test_prepare_output_tree() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        touch(&input.join("a/b/c/1.wav"));
        fs::create_dir_all(input.join("only/dirs")).unwrap();

        let scan = TreeScan::scan(&input, &dir.path().join("out"), &Classifier::default()).unwrap();

        assert_eq!(scan.prepare_output_tree(true).unwrap(), 6);
        assert!(!dir.path().join("out").exists());

        assert_eq!(scan.prepare_output_tree(false).unwrap(), 6);
        assert!(dir.path().join("out/a/b/c").is_dir());
        assert!(dir.path().join("out/only/dirs").is_dir());

        // Second call is a no-op
        assert_eq!(scan.prepare_output_tree(false).unwrap(), 0);
    }
}
