//! FullFmriSet: the set of PFMRIs considered currently indexed (spec.md §3).

use super::{read_checked, write_checked};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Ground truth for "is this package indexed". Stores the anarchic
/// (publisher-elided) `name@version` form, the same key space as
/// `FastAddSet`/`FastRemoveSet` (spec.md §3: "FullFmriSet equals the set
/// of PFMRIs whose id appears in MainDictionary ∪ FastAddSet, minus
/// FastRemoveSet" — only checkable if all three share one key space).
/// `original_source/indexer.py`'s `_fast_update`/`_process_fmris` always
/// call `get_fmri(anarchy=True)` before touching `full_fmri`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullFmriSet {
    members: BTreeSet<String>,
}

impl FullFmriSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, anarchic: &str) -> bool {
        self.members.contains(anarchic)
    }

    pub fn insert(&mut self, anarchic: String) -> bool {
        self.members.insert(anarchic)
    }

    pub fn remove(&mut self, anarchic: &str) -> bool {
        self.members.remove(anarchic)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    /// Load from `path`, tolerating total absence as "nothing indexed yet".
    pub fn open(path: &Path) -> Result<(u64, Self)> {
        Ok(read_checked(path)?.unwrap_or((0, Self::default())))
    }

    pub fn write(&self, path: &Path, version: u64) -> Result<()> {
        write_checked(path, version, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn insert_and_contains() {
        let mut set = FullFmriSet::new();
        assert!(set.insert("a@1.0".into()));
        assert!(!set.insert("a@1.0".into()));
        assert!(set.contains("a@1.0"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("full_fmri");
        let mut set = FullFmriSet::new();
        set.insert("a@1.0".into());
        set.insert("b@2.0".into());
        set.write(&path, 4).unwrap();

        let (version, loaded) = FullFmriSet::open(&path).unwrap();
        assert_eq!(version, 4);
        assert_eq!(loaded, set);
    }

    #[test]
    fn absent_file_is_empty_at_version_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent");
        let (version, loaded) = FullFmriSet::open(&path).unwrap();
        assert_eq!(version, 0);
        assert!(loaded.is_empty());
    }
}
