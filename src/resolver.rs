//! Collision-free destination paths.
//!
//! When the desired destination is taken, a numeric disambiguator is inserted
//! before the extension: `report.pdf`, `report (1).pdf`, `report (2).pdf`, ...
//! A path counts as taken when it exists on disk or was already handed out
//! earlier in the same run (dry-run claims never reach the disk).

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Hands out destination paths for one run.
#[derive(Debug, Default)]
pub struct PathResolver {
    claimed: HashSet<PathBuf>,
    /// Root whose existing contents are treated as already removed.
    vacated_root: Option<PathBuf>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver that ignores whatever currently exists under `root`.
    ///
    /// Used to simulate `--clean-output` during a dry run.
    pub fn with_vacated_root(root: &Path) -> Self {
        Self {
            claimed: HashSet::new(),
            vacated_root: Some(root.to_path_buf()),
        }
    }

    /// Returns a free path for `desired` and claims it for this run.
    pub fn resolve(&mut self, desired: &Path) -> PathBuf {
        let resolved = if self.is_taken(desired) {
            (1u32..)
                .map(|n| disambiguated(desired, n))
                .find(|candidate| !self.is_taken(candidate))
                .unwrap_or_else(|| desired.to_path_buf())
        } else {
            desired.to_path_buf()
        };
        self.claimed.insert(resolved.clone());
        resolved
    }

    /// Returns a claim that will not be used after all.
    pub fn release(&mut self, path: &Path) {
        self.claimed.remove(path);
    }

    fn is_taken(&self, path: &Path) -> bool {
        if self.claimed.contains(path) {
            return true;
        }
        if let Some(root) = &self.vacated_root
            && path.starts_with(root)
        {
            return false;
        }
        // symlink_metadata so a dangling symlink still counts as occupied
        path.symlink_metadata().is_ok()
    }
}

/// Builds `<stem> (<n>)<.ext>` next to `path`.
fn disambiguated(path: &Path, n: u32) -> PathBuf {
    let mut name: OsString = path
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    name.push(format!(" ({})", n));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}
