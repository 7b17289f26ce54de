//! FastAddSet / FastRemoveSet: deferred client-side mutations (spec.md §3,
//! §4.7).
//!
//! Both are the same shape, a set of anarchic PFMRIs, so one type,
//! [`FastSet`], serves both; [`apply_add`]/[`apply_remove`] carry the
//! cross-set cancellation invariant ("adding `p` to FastAdd while it's
//! pending in FastRemove cancels the pending removal, and vice versa") that
//! only makes sense with both sets in hand at once.

use super::{read_checked, write_checked};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastSet {
    members: BTreeSet<String>,
}

impl FastSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, anarchic: &str) -> bool {
        self.members.contains(anarchic)
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

    fn insert(&mut self, anarchic: String) {
        self.members.insert(anarchic);
    }

    fn remove(&mut self, anarchic: &str) -> bool {
        self.members.remove(anarchic)
    }

    pub fn open(path: &Path) -> Result<(u64, Self)> {
        Ok(read_checked(path)?.unwrap_or((0, Self::default())))
    }

    pub fn write(&self, path: &Path, version: u64) -> Result<()> {
        write_checked(path, version, self)
    }
}

/// Record a pending client-side add of `anarchic`. Cancels a pending
/// removal of the same PFMRI if one exists; otherwise records the add.
///
/// Panics (debug-only) if `anarchic` is already a pending add — the
/// original source's `assert not fast_add.has(d_tmp)`, a caller-bug
/// invariant rather than a recoverable error (spec.md §9).
pub fn apply_add(add: &mut FastSet, remove: &mut FastSet, anarchic: &str) {
    if remove.remove(anarchic) {
        return;
    }
    debug_assert!(!add.has(anarchic), "duplicate fast add of {anarchic}");
    add.insert(anarchic.to_string());
}

/// Record a pending client-side removal of `anarchic`. Cancels a pending
/// add of the same PFMRI if one exists; otherwise records the removal.
pub fn apply_remove(add: &mut FastSet, remove: &mut FastSet, anarchic: &str) {
    if add.remove(anarchic) {
        return;
    }
    debug_assert!(!remove.has(anarchic), "duplicate fast remove of {anarchic}");
    remove.insert(anarchic.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_cancels_both() {
        let mut add = FastSet::new();
        let mut remove = FastSet::new();
        apply_add(&mut add, &mut remove, "a@1.0");
        assert!(add.has("a@1.0"));
        apply_remove(&mut add, &mut remove, "a@1.0");
        assert!(!add.has("a@1.0"));
        assert!(!remove.has("a@1.0"));
    }

    #[test]
    fn remove_then_add_cancels_both() {
        let mut add = FastSet::new();
        let mut remove = FastSet::new();
        apply_remove(&mut add, &mut remove, "a@1.0");
        assert!(remove.has("a@1.0"));
        apply_add(&mut add, &mut remove, "a@1.0");
        assert!(!add.has("a@1.0"));
        assert!(!remove.has("a@1.0"));
    }

    #[test]
    fn independent_entries_stay_disjoint() {
        let mut add = FastSet::new();
        let mut remove = FastSet::new();
        apply_add(&mut add, &mut remove, "a@1.0");
        apply_remove(&mut add, &mut remove, "b@1.0");
        assert!(add.has("a@1.0"));
        assert!(remove.has("b@1.0"));
        assert!(add.iter().collect::<Vec<_>>().iter().all(|p| !remove.has(p)));
    }
}
