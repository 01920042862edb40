//! Run report: what was scanned, where each file went, and what failed.
//!
//! The report is built incrementally while the organizer runs and serialized
//! to JSON at the end:
//!
//! ```json
//! {
//!   "settings": { "grouping": "type", "dedupe": "move", "dry_run": true, ... },
//!   "totals": { "scanned": 3, "placed": 3, "duplicates": 1, "deleted": 0, "errors": 0 },
//!   "actions": [ { "source": "...", "destination": "...", "status": "placed", ... } ],
//!   "errors": [],
//!   "folders": { "Duplicates": 1, "txt": 2 }
//! }
//! ```
//!
//! Under dry-run the report describes intended actions; `settings.dry_run`
//! says so.

use crate::classifier::GroupingMode;
use crate::config::{DedupeMode, TransferMode};
use crate::file_organizer::{
    ActionStatus, FileFailure, OrganizeError, OrganizeResult, PlacementDecision,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path};

/// Settings snapshot recorded at the top of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub grouping: GroupingMode,
    pub dedupe: DedupeMode,
    pub dry_run: bool,
    pub clean_output: bool,
    pub transfer: TransferMode,
    pub recursive: bool,
    pub input: String,
    pub output: String,
}

/// Summary counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Files visited (actions + errors).
    pub scanned: usize,
    /// Files given a destination in the output tree.
    pub placed: usize,
    /// Files whose content had already been seen this run.
    pub duplicates: usize,
    /// Duplicates dropped under `delete` dedupe.
    pub deleted: usize,
    pub errors: usize,
}

/// One successfully handled file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub source: String,
    pub destination: Option<String>,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
    pub renamed: bool,
    pub fingerprint: String,
}

/// One file that could not be handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub source: String,
    pub kind: String,
    pub message: String,
}

/// The finished report of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub settings: ReportSettings,
    pub totals: Totals,
    pub actions: Vec<ActionEntry>,
    pub errors: Vec<ErrorEntry>,
    /// Destination folder (relative to the output root, `/`-separated) to
    /// number of files placed in it.
    pub folders: BTreeMap<String, usize>,
}

impl RunReport {
    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes the report to `path`, creating parent directories as needed.
    pub fn write_json(&self, path: &Path) -> OrganizeResult<()> {
        let write_failed = |source| OrganizeError::ReportWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let json = self.to_json().map_err(|e| write_failed(e.into()))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }
        fs::write(path, json).map_err(write_failed)
    }

    /// Looks up the action recorded for a source path.
    pub fn action_for(&self, source: &Path) -> Option<&ActionEntry> {
        let source = source.to_string_lossy();
        self.actions.iter().find(|action| action.source == source)
    }
}

/// Accumulates per-file outcomes during a run.
#[derive(Debug)]
pub struct ReportBuilder {
    settings: ReportSettings,
    actions: Vec<ActionEntry>,
    errors: Vec<ErrorEntry>,
    folders: BTreeMap<String, usize>,
    duplicates: usize,
    deleted: usize,
}

impl ReportBuilder {
    pub fn new(settings: ReportSettings) -> Self {
        Self {
            settings,
            actions: Vec::new(),
            errors: Vec::new(),
            folders: BTreeMap::new(),
            duplicates: 0,
            deleted: 0,
        }
    }

    /// Records the outcome of one file.
    pub fn record(&mut self, outcome: &Result<PlacementDecision, FileFailure>) {
        match outcome {
            Ok(decision) => self.record_action(decision),
            Err(failure) => self.record_error(failure),
        }
    }

    pub fn record_action(&mut self, decision: &PlacementDecision) {
        if decision.is_duplicate() {
            self.duplicates += 1;
        }
        if decision.status == ActionStatus::DuplicateDeleted {
            self.deleted += 1;
        }
        if let Some(folder) = decision
            .relative_destination
            .as_deref()
            .and_then(Path::parent)
        {
            *self.folders.entry(folder_key(folder)).or_insert(0) += 1;
        }

        self.actions.push(ActionEntry {
            source: decision.source.to_string_lossy().into_owned(),
            destination: decision
                .destination
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            status: decision.status,
            duplicate_of: decision
                .duplicate_of
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            renamed: decision.renamed,
            fingerprint: decision.fingerprint.to_hex(),
        });
    }

    pub fn record_error(&mut self, failure: &FileFailure) {
        self.errors.push(ErrorEntry {
            source: failure.path.to_string_lossy().into_owned(),
            kind: failure.error.kind().to_string(),
            message: failure.error.to_string(),
        });
    }

    /// Computes totals and returns the finished report.
    pub fn finish(self) -> RunReport {
        let placed = self
            .actions
            .iter()
            .filter(|action| action.destination.is_some())
            .count();

        RunReport {
            totals: Totals {
                scanned: self.actions.len() + self.errors.len(),
                placed,
                duplicates: self.duplicates,
                deleted: self.deleted,
                errors: self.errors.len(),
            },
            settings: self.settings,
            actions: self.actions,
            errors: self.errors,
            folders: self.folders,
        }
    }
}

/// Joins the normal components of a relative folder with `/`.
fn folder_key(folder: &Path) -> String {
    folder
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
