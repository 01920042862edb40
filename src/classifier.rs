//! Destination grouping rules.
//!
//! The classifier turns a file's extension and modification time into the
//! folder segments it is placed under inside the output root:
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use dirsort::classifier::{Classifier, GroupingMode};
//!
//! let modified = Utc.with_ymd_and_hms(2026, 2, 14, 9, 30, 0).unwrap();
//! let classifier = Classifier::new(GroupingMode::TypeDate);
//! assert_eq!(classifier.folder_segments(Some("jpg"), modified), vec!["jpg", "2026-02"]);
//! ```

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Folder used for files without an extension.
pub const NO_EXTENSION_DIR: &str = "no_ext";

/// How files are grouped below the output root.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingMode {
    /// One folder per extension (`jpg/`, `pdf/`, `no_ext/`).
    #[default]
    Type,
    /// One folder per modification month (`2026-02/`).
    Date,
    /// Extension folder, then month folder (`jpg/2026-02/`).
    TypeDate,
}

impl GroupingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingMode::Type => "type",
            GroupingMode::Date => "date",
            GroupingMode::TypeDate => "type-date",
        }
    }
}

impl fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes a raw extension: strips one leading dot and lowercases.
///
/// Returns `None` when nothing is left, so `""` and `"."` count as
/// extensionless.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.strip_prefix('.').unwrap_or(raw);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Returns the normalized extension of `path`, if it has one.
///
/// `notes`, `.bashrc` and `file.` are all extensionless.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| normalize_extension(&ext.to_string_lossy()))
}

/// Formats a modification time as its `YYYY-MM` month folder (UTC).
pub fn month_folder(modified: DateTime<Utc>) -> String {
    modified.format("%Y-%m").to_string()
}

/// Returns the file name used at the destination.
///
/// The extension is replaced by its normalized form (`photo.JPG` becomes
/// `photo.jpg`); extensionless names are kept verbatim.
pub fn destination_file_name(path: &Path) -> Option<OsString> {
    let file_name = path.file_name()?;
    let Some(extension) = extension_of(path) else {
        return Some(file_name.to_os_string());
    };
    let mut name = path.file_stem()?.to_os_string();
    name.push(".");
    name.push(extension);
    Some(name)
}

/// Maps files to their grouped destination folders for one run.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    mode: GroupingMode,
}

impl Classifier {
    pub fn new(mode: GroupingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> GroupingMode {
        self.mode
    }

    /// Returns the ordered folder segments for a file.
    ///
    /// `extension` is expected to be normalized already (see
    /// [`normalize_extension`]).
    pub fn folder_segments(&self, extension: Option<&str>, modified: DateTime<Utc>) -> Vec<String> {
        let type_folder = || extension.unwrap_or(NO_EXTENSION_DIR).to_string();
        match self.mode {
            GroupingMode::Type => vec![type_folder()],
            GroupingMode::Date => vec![month_folder(modified)],
            GroupingMode::TypeDate => vec![type_folder(), month_folder(modified)],
        }
    }

    /// Returns the folder path (relative to the output root) for a file.
    pub fn folder(&self, extension: Option<&str>, modified: DateTime<Utc>) -> PathBuf {
        self.folder_segments(extension, modified).iter().collect()
    }
}
