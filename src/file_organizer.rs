//! The organizer engine.
//!
//! Walks the input tree and, for every file, reads its metadata, fingerprints
//! its content, checks it against the run's duplicate registry, resolves a
//! collision-free destination and hands the decision to a [`PlacementSink`].
//! Dry runs and real runs share this single decision path; only the sink
//! differs ([`DescribeSink`] records, [`ApplySink`] touches the filesystem).
//!
//! A failure on one file is recorded in the report and the run moves on. Only
//! an unusable input root or a failed `clean_output` stop the run, and both
//! happen before any file is processed.

use crate::classifier::{self, Classifier};
use crate::config::{CompiledFilters, DedupeMode, OrganizeSettings, TransferMode};
use crate::fingerprint::Fingerprint;
use crate::registry::{DuplicateRegistry, Registration};
use crate::report::{ReportBuilder, ReportSettings, RunReport};
use crate::resolver::PathResolver;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Flat folder (under the output root) that receives duplicates in
/// [`DedupeMode::Move`].
pub const DUPLICATES_DIR: &str = "Duplicates";

/// Errors that can occur while organizing.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The input or output root cannot be used; the run does not start.
    #[error("Invalid directory {}: {source}", .path.display())]
    InvalidRoot { path: PathBuf, source: io::Error },
    /// Metadata or content of a file could not be read.
    #[error("Cannot read {}: {source}", .path.display())]
    UnreadableSource { path: PathBuf, source: io::Error },
    /// The file could not be written to its destination. It stays at its
    /// original location.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    MoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    /// A duplicate could not be removed from the input.
    #[error("Failed to delete duplicate {}: {source}", .path.display())]
    DeleteFailure { path: PathBuf, source: io::Error },
    /// The output root could not be emptied; the run does not start.
    #[error("Failed to clean output directory {}: {source}", .path.display())]
    CleanupFailure { path: PathBuf, source: io::Error },
    /// The JSON report could not be written; the run itself completed.
    #[error("Failed to write report {}: {source}", .path.display())]
    ReportWriteFailed { path: PathBuf, source: io::Error },
}

impl OrganizeError {
    /// Short machine-readable name used in the report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRoot { .. } => "invalid-root",
            Self::UnreadableSource { .. } => "unreadable-source",
            Self::MoveFailure { .. } => "move-failure",
            Self::DeleteFailure { .. } => "delete-failure",
            Self::CleanupFailure { .. } => "cleanup-failure",
            Self::ReportWriteFailed { .. } => "report-write-failed",
        }
    }
}

/// Result type for organizer operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Metadata of one scanned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Normalized extension, `None` when the file has none.
    pub extension: Option<String>,
}

impl FileRecord {
    /// Reads the metadata of the file at `path`.
    ///
    /// Symbolic links are rejected, never followed.
    pub fn read(path: &Path) -> OrganizeResult<Self> {
        let unreadable = |source| OrganizeError::UnreadableSource {
            path: path.to_path_buf(),
            source,
        };

        let metadata = fs::symlink_metadata(path).map_err(unreadable)?;
        if metadata.file_type().is_symlink() {
            return Err(unreadable(io::Error::new(
                io::ErrorKind::InvalidInput,
                "symbolic links are not organized",
            )));
        }
        if !metadata.is_file() {
            return Err(unreadable(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        let modified = metadata.modified().map_err(unreadable)?;

        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: DateTime::<Utc>::from(modified),
            extension: classifier::extension_of(path),
        })
    }
}

/// Status of a handled file, as written in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    Placed,
    DuplicateMoved,
    DuplicateDeleted,
}

/// What the organizer decided for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementDecision {
    pub source: PathBuf,
    /// Absolute destination; `None` for deleted duplicates.
    pub destination: Option<PathBuf>,
    /// Destination relative to the output root.
    pub relative_destination: Option<PathBuf>,
    pub status: ActionStatus,
    /// Destination of the first file with the same content, for duplicates.
    pub duplicate_of: Option<PathBuf>,
    /// The destination had to be disambiguated.
    pub renamed: bool,
    pub fingerprint: Fingerprint,
}

impl PlacementDecision {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }
}

/// A file that could not be handled, and why.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: OrganizeError,
}

/// Receives the organizer's decisions.
pub trait PlacementSink {
    /// Empties `root` before the run starts.
    fn clean_output(&mut self, root: &Path) -> OrganizeResult<()>;

    /// Puts `source` at `destination`.
    fn place(&mut self, source: &Path, destination: &Path) -> OrganizeResult<()>;

    /// Drops a duplicate source file.
    fn discard(&mut self, source: &Path) -> OrganizeResult<()>;
}

/// Sink for dry runs: records decisions without touching the filesystem.
///
/// Placements that a real run would fail on (a destination folder blocked by
/// an existing regular file) are rejected the same way.
#[derive(Debug, Default)]
pub struct DescribeSink {
    /// Set once a clean of the output root has been simulated.
    cleaned_root: Option<PathBuf>,
}

impl DescribeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// First existing non-directory among the destination's ancestors.
    fn blocking_entry(&self, destination: &Path) -> Option<PathBuf> {
        for ancestor in destination.ancestors().skip(1) {
            if let Some(root) = &self.cleaned_root
                && ancestor.starts_with(root)
            {
                // everything below a cleaned root is gone by now
                if ancestor == root.as_path() {
                    return None;
                }
                continue;
            }
            match fs::metadata(ancestor) {
                Ok(metadata) if metadata.is_dir() => return None,
                Ok(_) => return Some(ancestor.to_path_buf()),
                Err(_) => continue,
            }
        }
        None
    }
}

impl PlacementSink for DescribeSink {
    fn clean_output(&mut self, root: &Path) -> OrganizeResult<()> {
        debug!(root = %root.display(), "dry run: would clean output directory");
        self.cleaned_root = Some(root.to_path_buf());
        Ok(())
    }

    fn place(&mut self, source: &Path, destination: &Path) -> OrganizeResult<()> {
        if let Some(blocker) = self.blocking_entry(destination) {
            return Err(OrganizeError::MoveFailure {
                from: source.to_path_buf(),
                to: destination.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{} is not a directory", blocker.display()),
                ),
            });
        }
        debug!(source = %source.display(), destination = %destination.display(), "dry run: would place");
        Ok(())
    }

    fn discard(&mut self, source: &Path) -> OrganizeResult<()> {
        debug!(source = %source.display(), "dry run: would delete duplicate");
        Ok(())
    }
}

/// Sink that performs the moves, copies and deletions.
#[derive(Debug)]
pub struct ApplySink {
    transfer: TransferMode,
}

impl ApplySink {
    pub fn new(transfer: TransferMode) -> Self {
        Self { transfer }
    }
}

impl PlacementSink for ApplySink {
    fn clean_output(&mut self, root: &Path) -> OrganizeResult<()> {
        let cleanup_failed = |source| OrganizeError::CleanupFailure {
            path: root.to_path_buf(),
            source,
        };

        if !root.exists() {
            return fs::create_dir_all(root).map_err(cleanup_failed);
        }

        for entry in fs::read_dir(root).map_err(cleanup_failed)? {
            let entry = entry.map_err(cleanup_failed)?;
            let path = entry.path();
            let removed = if entry.file_type().map_err(cleanup_failed)?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(cleanup_failed)?;
        }
        info!(root = %root.display(), "cleaned output directory");
        Ok(())
    }

    fn place(&mut self, source: &Path, destination: &Path) -> OrganizeResult<()> {
        let move_failed = |source_error| OrganizeError::MoveFailure {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: source_error,
        };

        // Fails if a component of the parent is an existing regular file.
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(move_failed)?;
        }

        match self.transfer {
            TransferMode::Move => move_file(source, destination),
            TransferMode::Copy => copy_file(source, destination),
        }
        .map_err(move_failed)
    }

    fn discard(&mut self, source: &Path) -> OrganizeResult<()> {
        if self.transfer == TransferMode::Copy {
            // copies never touch the input tree
            return Ok(());
        }
        fs::remove_file(source).map_err(|e| OrganizeError::DeleteFailure {
            path: source.to_path_buf(),
            source: e,
        })
    }
}

/// Moves a file, leaving it at `from` if anything goes wrong.
///
/// A rename is tried first; when it fails (typically across volumes) the file
/// is copied and the source removed afterwards.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    let Err(rename_error) = fs::rename(from, to) else {
        return Ok(());
    };
    debug!(source = %from.display(), error = %rename_error, "rename failed, falling back to copy");

    if copy_file(from, to).is_err() {
        return Err(rename_error);
    }
    if let Err(remove_error) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(remove_error);
    }
    Ok(())
}

/// Copies a file to a destination that must not exist yet, keeping its
/// modification time. A partial copy is removed on failure.
fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
    let mut reader = File::open(from)?;
    let modified = reader.metadata()?.modified()?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(to)?;

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.set_modified(modified))
        .and_then(|_| writer.sync_all());
    if let Err(e) = copied {
        drop(writer);
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

/// Mutable state of a single run.
struct RunState {
    classifier: Classifier,
    registry: DuplicateRegistry,
    resolver: PathResolver,
}

/// Organizes one input directory into one output directory.
///
/// # Examples
///
/// ```no_run
/// use dirsort::config::{DedupeMode, OrganizeSettings};
/// use dirsort::file_organizer::Organizer;
///
/// let settings = OrganizeSettings {
///     dedupe: DedupeMode::Move,
///     dry_run: true,
///     ..OrganizeSettings::default()
/// };
/// let report = Organizer::new(settings)?.run()?;
/// println!("{} files scanned", report.totals.scanned);
/// # Ok::<(), dirsort::file_organizer::OrganizeError>(())
/// ```
#[derive(Debug)]
pub struct Organizer {
    settings: OrganizeSettings,
    filters: CompiledFilters,
    input_root: PathBuf,
    output_root: PathBuf,
}

impl Organizer {
    /// Creates an organizer that scans every file under the input root.
    ///
    /// # Errors
    ///
    /// Returns [`OrganizeError::InvalidRoot`] if the input root does not exist
    /// or is not a directory, or if the output root cannot be made absolute.
    pub fn new(settings: OrganizeSettings) -> OrganizeResult<Self> {
        Self::with_filters(settings, CompiledFilters::default())
    }

    /// Creates an organizer that only scans files accepted by `filters`.
    pub fn with_filters(settings: OrganizeSettings, filters: CompiledFilters) -> OrganizeResult<Self> {
        let input_root = resolve_input_root(&settings.input)?;
        let output_root = resolve_output_root(&settings.output)?;

        Ok(Self {
            settings,
            filters,
            input_root,
            output_root,
        })
    }

    pub fn settings(&self) -> &OrganizeSettings {
        &self.settings
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Runs the organizer and returns its report.
    pub fn run(&self) -> OrganizeResult<RunReport> {
        self.run_with_progress(&ProgressBar::hidden())
    }

    /// Runs the organizer, advancing `progress` once per scanned file.
    pub fn run_with_progress(&self, progress: &ProgressBar) -> OrganizeResult<RunReport> {
        if self.settings.dry_run {
            self.run_with_sink(&mut DescribeSink::new(), progress)
        } else {
            self.run_with_sink(&mut ApplySink::new(self.settings.transfer), progress)
        }
    }

    /// Runs the organizer against an arbitrary sink.
    pub fn run_with_sink<S: PlacementSink>(
        &self,
        sink: &mut S,
        progress: &ProgressBar,
    ) -> OrganizeResult<RunReport> {
        info!(
            input = %self.input_root.display(),
            output = %self.output_root.display(),
            grouping = %self.settings.grouping,
            dedupe = %self.settings.dedupe,
            dry_run = self.settings.dry_run,
            "starting run"
        );

        if self.settings.clean_output {
            self.ensure_clean_is_safe()?;
            sink.clean_output(&self.output_root)?;
        }

        let mut state = RunState {
            classifier: Classifier::new(self.settings.grouping),
            registry: DuplicateRegistry::new(),
            resolver: if self.settings.clean_output && self.settings.dry_run {
                PathResolver::with_vacated_root(&self.output_root)
            } else {
                PathResolver::new()
            },
        };
        let mut report = ReportBuilder::new(self.report_settings());

        let candidates = self.scan();
        progress.set_length(candidates.len() as u64);

        for candidate in candidates {
            let outcome = match candidate {
                Ok(path) => self.process_file(&path, &mut state, sink),
                Err(failure) => Err(failure),
            };
            match &outcome {
                Ok(decision) => debug!(
                    source = %decision.source.display(),
                    status = ?decision.status,
                    renamed = decision.renamed,
                    "file handled"
                ),
                Err(failure) => warn!(source = %failure.path.display(), error = %failure.error, "file skipped"),
            }
            report.record(&outcome);
            progress.inc(1);
        }

        let report = report.finish();
        info!(
            scanned = report.totals.scanned,
            placed = report.totals.placed,
            duplicates = report.totals.duplicates,
            errors = report.totals.errors,
            "run finished"
        );
        Ok(report)
    }

    /// Lists the files to process, in a stable order.
    ///
    /// Walk errors become failures so they are reported like any other file.
    fn scan(&self) -> Vec<Result<PathBuf, FileFailure>> {
        let max_depth = if self.settings.recursive { usize::MAX } else { 1 };
        let output_root = self.output_root.as_path();

        WalkDir::new(&self.input_root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.path() != output_root)
            .filter_map(|entry| match entry {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }
                    let relative = entry
                        .path()
                        .strip_prefix(&self.input_root)
                        .unwrap_or(entry.path());
                    self.filters
                        .should_include(relative)
                        .then(|| Ok(entry.into_path()))
                }
                Err(error) => {
                    let path = error
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.input_root.clone());
                    Some(Err(FileFailure {
                        path: path.clone(),
                        error: OrganizeError::UnreadableSource {
                            path,
                            source: error.into(),
                        },
                    }))
                }
            })
            .collect()
    }

    /// Handles one file: classify, deduplicate, resolve, place.
    fn process_file<S: PlacementSink>(
        &self,
        path: &Path,
        state: &mut RunState,
        sink: &mut S,
    ) -> Result<PlacementDecision, FileFailure> {
        let fail = |error| FileFailure {
            path: path.to_path_buf(),
            error,
        };
        let unreadable = |source| {
            fail(OrganizeError::UnreadableSource {
                path: path.to_path_buf(),
                source,
            })
        };

        let record = FileRecord::read(path).map_err(fail)?;
        debug!(source = %path.display(), size = record.size, "hashing");
        let fingerprint = Fingerprint::of_file(path).map_err(unreadable)?;
        let file_name = classifier::destination_file_name(path).ok_or_else(|| {
            unreadable(io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))
        })?;

        let grouped = self
            .output_root
            .join(state.classifier.folder(record.extension.as_deref(), record.modified))
            .join(&file_name);

        let registration = state.registry.check_and_register(fingerprint, &grouped);
        let (desired, status) = match (&registration, self.settings.dedupe) {
            (Registration::Duplicate { .. }, DedupeMode::Delete) => {
                (None, ActionStatus::DuplicateDeleted)
            }
            (Registration::Duplicate { .. }, DedupeMode::Move) => (
                Some(self.output_root.join(DUPLICATES_DIR).join(&file_name)),
                ActionStatus::DuplicateMoved,
            ),
            _ => (Some(grouped), ActionStatus::Placed),
        };
        let duplicate_of = match registration {
            Registration::Duplicate { canonical } => Some(canonical),
            Registration::FirstSeen => None,
        };

        let Some(desired) = desired else {
            sink.discard(path).map_err(fail)?;
            return Ok(PlacementDecision {
                source: path.to_path_buf(),
                destination: None,
                relative_destination: None,
                status,
                duplicate_of,
                renamed: false,
                fingerprint,
            });
        };

        let destination = state.resolver.resolve(&desired);
        if let Err(error) = sink.place(path, &destination) {
            state.resolver.release(&destination);
            if duplicate_of.is_none() {
                state.registry.forget(&fingerprint);
            }
            return Err(fail(error));
        }
        if duplicate_of.is_none() {
            state.registry.confirm(fingerprint, &destination);
        }

        Ok(PlacementDecision {
            source: path.to_path_buf(),
            relative_destination: destination
                .strip_prefix(&self.output_root)
                .ok()
                .map(Path::to_path_buf),
            renamed: destination != desired,
            destination: Some(destination),
            status,
            duplicate_of,
            fingerprint,
        })
    }

    /// Refuses to clean an output root that contains the input root.
    fn ensure_clean_is_safe(&self) -> OrganizeResult<()> {
        if self.input_root.starts_with(&self.output_root) {
            return Err(OrganizeError::CleanupFailure {
                path: self.output_root.clone(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "output directory contains the input directory",
                ),
            });
        }
        Ok(())
    }

    fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            grouping: self.settings.grouping,
            dedupe: self.settings.dedupe,
            dry_run: self.settings.dry_run,
            clean_output: self.settings.clean_output,
            transfer: self.settings.transfer,
            recursive: self.settings.recursive,
            input: self.input_root.to_string_lossy().into_owned(),
            output: self.output_root.to_string_lossy().into_owned(),
        }
    }
}

/// Organizes files according to `settings`, scanning every file.
pub fn organize(settings: &OrganizeSettings) -> OrganizeResult<RunReport> {
    Organizer::new(settings.clone())?.run()
}

fn resolve_input_root(input: &Path) -> OrganizeResult<PathBuf> {
    let invalid = |source| OrganizeError::InvalidRoot {
        path: input.to_path_buf(),
        source,
    };

    let root = fs::canonicalize(input).map_err(invalid)?;
    if !root.is_dir() {
        return Err(invalid(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }
    Ok(root)
}

/// Canonicalizes the output root when it exists, so it compares equal to
/// paths produced by walking the input tree.
fn resolve_output_root(output: &Path) -> OrganizeResult<PathBuf> {
    let resolved = if output.exists() {
        fs::canonicalize(output)
    } else {
        std::path::absolute(output)
    };
    resolved.map_err(|source| OrganizeError::InvalidRoot {
        path: output.to_path_buf(),
        source,
    })
}
