//! TokenOffsetMap: `token -> byte offset` into the MainDictionary of the
//! same version (spec.md §3). Rewritten from scratch on every full
//! main-dictionary write, never patched incrementally.

use super::{read_checked, write_checked};
use crate::error::Result;
use crate::main_dict::Token;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOffsetMap {
    offsets: BTreeMap<Token, u64>,
}

impl TokenOffsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the offset of `token`'s line. Called once per emitted line
    /// by [`crate::side_index::SideIndexWriter`], in ascending token order,
    /// so `offsets` is built append-only even though it's keyed by token.
    pub fn record(&mut self, token: Token, offset: u64) {
        self.offsets.insert(token, offset);
    }

    pub fn get(&self, token: &[u8]) -> Option<u64> {
        self.offsets.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

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
    fn records_and_resolves_offsets() {
        let mut map = TokenOffsetMap::new();
        map.record(b"foo".to_vec(), 11);
        map.record(b"bar".to_vec(), 0);
        assert_eq!(map.get(b"foo"), Some(11));
        assert_eq!(map.get(b"bar"), Some(0));
        assert_eq!(map.get(b"missing"), None);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token_byte_offset.ascii");
        let mut map = TokenOffsetMap::new();
        map.record(b"foo".to_vec(), 11);
        map.write(&path, 2).unwrap();

        let (version, loaded) = TokenOffsetMap::open(&path).unwrap();
        assert_eq!(version, 2);
        assert_eq!(loaded, map);
    }
}
