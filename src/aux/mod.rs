//! Auxiliary dictionaries: the four small ByteStore specializations that
//! ride alongside the main dictionary (spec.md §2, §3).
//!
//! [`full_fmri_set`], [`fast_set`], and [`token_offset_map`] share one
//! on-disk shape — a version header, a bincode body, and a trailing CRC32C
//! of that body — factored into [`write_checked`]/[`read_checked`] below.
//! [`manifest_table`] is the exception: it is chunked and LRU-cached the way
//! the teacher's `ChunkedDictionary` is, because package counts can grow
//! large enough that holding every PFMRI string in memory is wasteful when
//! only a handful of ids are being resolved.

pub mod fast_set;
pub mod full_fmri_set;
pub mod manifest_table;
pub mod token_offset_map;

pub use fast_set::FastSet;
pub use full_fmri_set::FullFmriSet;
pub use manifest_table::ManifestTable;
pub use token_offset_map::TokenOffsetMap;

use crate::byte_store;
use crate::error::{IndexError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::path::Path;

/// Write `value` to `path` as `header ‖ bincode(value) ‖ crc32(bincode(value))`.
pub(crate) fn write_checked<T: Serialize>(path: &Path, version: u64, value: &T) -> Result<()> {
    let body = bincode::serialize(value)?;
    let checksum = crc32fast::hash(&body);
    let mut file = byte_store::create_versioned(path, version)?;
    file.write_all(&body)?;
    file.write_all(&checksum.to_le_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Read a file written by [`write_checked`]. Returns `Ok(None)` if `path`
/// does not exist; a checksum mismatch is `CorruptIndex`.
pub(crate) fn read_checked<T: DeserializeOwned>(path: &Path) -> Result<Option<(u64, T)>> {
    let Some((version, mut reader)) = byte_store::try_open_versioned(path)? else {
        return Ok(None);
    };
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    if rest.len() < 4 {
        return Err(IndexError::CorruptIndex(format!(
            "{} too short for a trailing checksum",
            path.display()
        )));
    }
    let split = rest.len() - 4;
    let (body, checksum_bytes) = rest.split_at(split);
    let expected = u32::from_le_bytes(checksum_bytes.try_into().expect("split at len-4"));
    let actual = crc32fast::hash(body);
    if actual != expected {
        return Err(IndexError::CorruptIndex(format!(
            "{} failed checksum verification",
            path.display()
        )));
    }
    let value = bincode::deserialize(body)?;
    Ok(Some((version, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    #[test]
    fn round_trips_checked_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aux");
        let value: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        write_checked(&path, 3, &value).unwrap();
        let (version, read_back): (u64, BTreeSet<String>) = read_checked(&path).unwrap().unwrap();
        assert_eq!(version, 3);
        assert_eq!(read_back, value);
    }

    #[test]
    fn detects_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aux");
        let value: BTreeSet<String> = ["a"].iter().map(|s| s.to_string()).collect();
        write_checked(&path, 1, &value).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();
        let result: Result<Option<(u64, BTreeSet<String>)>> = read_checked(&path);
        assert!(matches!(result, Err(IndexError::CorruptIndex(_))));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent");
        let result: Result<Option<(u64, BTreeSet<String>)>> = read_checked(&path);
        assert!(result.unwrap().is_none());
    }
}
