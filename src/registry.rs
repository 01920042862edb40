//! Per-run record of which content has already been placed.

use crate::fingerprint::Fingerprint;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

/// Outcome of registering a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// No earlier file had this content; the candidate is now canonical.
    FirstSeen,
    /// An earlier file had this content.
    Duplicate {
        /// Where the first file with this content was placed.
        canonical: PathBuf,
    },
}

/// Maps each fingerprint to the destination of the first file that produced it.
///
/// Owned by a single run and dropped with it. Registration is one
/// check-and-insert on the map, so guarding the registry with a single lock is
/// enough if processing is ever parallelized.
#[derive(Debug, Default)]
pub struct DuplicateRegistry {
    canonical: HashMap<Fingerprint, PathBuf>,
}

impl DuplicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `candidate` as the placement for `fingerprint` unless the
    /// fingerprint was seen before.
    pub fn check_and_register(&mut self, fingerprint: Fingerprint, candidate: &Path) -> Registration {
        match self.canonical.entry(fingerprint) {
            Entry::Occupied(existing) => Registration::Duplicate {
                canonical: existing.get().clone(),
            },
            Entry::Vacant(slot) => {
                slot.insert(candidate.to_path_buf());
                Registration::FirstSeen
            }
        }
    }

    /// Updates the canonical destination once the final path is known.
    pub fn confirm(&mut self, fingerprint: Fingerprint, destination: &Path) {
        if let Some(slot) = self.canonical.get_mut(&fingerprint) {
            *slot = destination.to_path_buf();
        }
    }

    /// Withdraws a registration whose placement failed.
    pub fn forget(&mut self, fingerprint: &Fingerprint) {
        self.canonical.remove(fingerprint);
    }

    pub fn canonical_for(&self, fingerprint: &Fingerprint) -> Option<&Path> {
        self.canonical.get(fingerprint).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}
