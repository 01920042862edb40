//! dirsort - sort a directory of files into type/date folders
//!
//! This library walks an input directory, groups every file by extension
//! and/or modification month, detects duplicate content by SHA-256
//! fingerprint, places files under an output directory without ever
//! overwriting, and describes the whole run in a JSON report. Dry runs follow
//! the same decision path without touching the filesystem.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod file_organizer;
pub mod fingerprint;
pub mod logging;
pub mod output;
pub mod registry;
pub mod report;
pub mod resolver;

pub use classifier::{Classifier, GroupingMode};
pub use config::{CompiledFilters, Config, ConfigError, DedupeMode, OrganizeSettings, TransferMode};
pub use file_organizer::{OrganizeError, Organizer, organize};
pub use fingerprint::Fingerprint;
pub use registry::{DuplicateRegistry, Registration};
pub use report::RunReport;
pub use resolver::PathResolver;

pub use cli::{Cli, run_cli};
