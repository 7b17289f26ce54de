//! ManifestTable: the bidirectional `package_id <-> PFMRI` mapping
//! (spec.md §3). Ids are dense, assigned monotonically from 0, never
//! reused.
//!
//! Persisted as chunks of `CHUNK_SIZE` consecutive ids, each chunk
//! independently bincode-encoded and CRC32C-checked, the same shape the
//! teacher's `ChunkedDictionary` gives its text dictionary — large package
//! counts shouldn't force the whole table into memory just to resolve a
//! handful of ids. Because `ManifestTable` is a single named file in the
//! produced layout (`manf`), all chunks live in that one file behind an
//! offset table written at the front of the body, rather than as the
//! teacher's separate `dict_chunk_NNNN.bin` files.
//!
//! The reverse direction (PFMRI -> id, needed to assign-or-look-up during
//! ingestion) is rebuilt into an in-memory map once at open — the table is
//! exclusively owned by one in-flight update (spec.md §5), so there's no
//! benefit to deferring that.

use crate::byte_store;
use crate::error::{IndexError, Result};
use crate::main_dict::PackageId;
use ahash::AHashMap;
use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

const CHUNK_SIZE: usize = 4096;
const CACHE_CHUNKS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DictionaryChunk {
    /// Anarchic (publisher-elided) PFMRI strings for ids
    /// `[base_id, base_id + len())` — `original_source/indexer.py`'s
    /// `_add_terms` normalizes to anarchic form before assigning an id.
    entries: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkLocation {
    offset: u64,
    len: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct DictionaryMetadata {
    total_entries: u32,
    chunks: Vec<ChunkLocation>,
}

pub struct ManifestTable {
    body: Arc<Vec<u8>>,
    metadata: DictionaryMetadata,
    cache: RwLock<LruCache<usize, Arc<DictionaryChunk>>>,
    by_fmri: AHashMap<String, PackageId>,
    next_id: PackageId,
}

impl ManifestTable {
    fn empty() -> Self {
        Self {
            body: Arc::new(Vec::new()),
            metadata: DictionaryMetadata {
                total_entries: 0,
                chunks: Vec::new(),
            },
            cache: RwLock::new(LruCache::new(NonZeroUsize::new(CACHE_CHUNKS).unwrap())),
            by_fmri: AHashMap::new(),
            next_id: 0,
        }
    }

    /// Open `path`, tolerating total absence as a fresh, empty table.
    pub fn open(path: &Path) -> Result<(u64, Self)> {
        let Some((version, mut reader)) = byte_store::try_open_versioned(path)? else {
            return Ok((0, Self::empty()));
        };
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        if body.is_empty() {
            return Ok((version, Self::empty()));
        }
        let meta_len = u32::from_le_bytes(
            body.get(..4)
                .ok_or_else(|| IndexError::CorruptIndex(format!("{} truncated metadata length", path.display())))?
                .try_into()
                .expect("checked len"),
        ) as usize;
        let meta_bytes = body
            .get(4..4 + meta_len)
            .ok_or_else(|| IndexError::CorruptIndex(format!("{} truncated metadata", path.display())))?;
        let metadata: DictionaryMetadata = bincode::deserialize(meta_bytes)?;

        let body = Arc::new(body);
        let mut table = Self {
            body: Arc::clone(&body),
            metadata,
            cache: RwLock::new(LruCache::new(NonZeroUsize::new(CACHE_CHUNKS).unwrap())),
            by_fmri: AHashMap::new(),
            next_id: 0,
        };
        table.next_id = table.metadata.total_entries;

        for chunk_index in 0..table.metadata.chunks.len() {
            let chunk = table.load_chunk(chunk_index)?;
            let base_id = chunk_index * CHUNK_SIZE;
            for (local, fmri) in chunk.entries.iter().enumerate() {
                table.by_fmri.insert(fmri.clone(), (base_id + local) as PackageId);
            }
        }
        Ok((version, table))
    }

    fn load_chunk(&self, chunk_index: usize) -> Result<Arc<DictionaryChunk>> {
        if let Some(chunk) = self.cache.write().get(&chunk_index) {
            return Ok(Arc::clone(chunk));
        }
        let location = self
            .metadata
            .chunks
            .get(chunk_index)
            .ok_or_else(|| IndexError::CorruptIndex(format!("no such manifest chunk {chunk_index}")))?;
        let start = location.offset as usize;
        let end = start + location.len as usize;
        let bytes = self
            .body
            .get(start..end)
            .ok_or_else(|| IndexError::CorruptIndex(format!("manifest chunk {chunk_index} out of bounds")))?;
        let chunk: DictionaryChunk = bincode::deserialize(bytes)?;
        let chunk = Arc::new(chunk);
        self.cache.write().put(chunk_index, Arc::clone(&chunk));
        Ok(chunk)
    }

    /// Resolve `package_id` back to its PFMRI string, loading (and caching)
    /// its owning chunk on demand.
    pub fn resolve(&self, package_id: PackageId) -> Result<Option<String>> {
        let chunk_index = package_id as usize / CHUNK_SIZE;
        let local = package_id as usize % CHUNK_SIZE;
        if chunk_index >= self.metadata.chunks.len() {
            return Ok(None);
        }
        let chunk = self.load_chunk(chunk_index)?;
        Ok(chunk.entries.get(local).cloned())
    }

    pub fn id_for(&self, anarchic: &str) -> Option<PackageId> {
        self.by_fmri.get(anarchic).copied()
    }

    /// Assign a fresh id for `anarchic` if it has none yet, or return its
    /// existing id. Ids are dense and never reused (spec.md §3). Callers
    /// pass the anarchic (publisher-elided) form, matching `FullFmriSet`'s
    /// key space.
    pub fn assign_or_lookup(&mut self, anarchic: &str) -> PackageId {
        if let Some(&id) = self.by_fmri.get(anarchic) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_fmri.insert(anarchic.to_string(), id);
        id
    }

    pub fn len(&self) -> usize {
        self.by_fmri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fmri.is_empty()
    }

    /// Write the full table as chunked entries, each independently
    /// bincode-encoded, addressed by an offset table at the front of the
    /// body.
    pub fn write(&self, path: &Path, version: u64) -> Result<()> {
        let mut by_id: Vec<(PackageId, &str)> =
            self.by_fmri.iter().map(|(fmri, &id)| (id, fmri.as_str())).collect();
        by_id.sort_by_key(|(id, _)| *id);

        let mut chunk_bytes = Vec::new();
        let mut locations = Vec::new();
        let mut offset: u64 = 0;
        for chunk in by_id.chunks(CHUNK_SIZE) {
            let entries: Vec<String> = chunk.iter().map(|(_, fmri)| fmri.to_string()).collect();
            let encoded = bincode::serialize(&DictionaryChunk { entries })?;
            locations.push(ChunkLocation {
                offset,
                len: encoded.len() as u32,
            });
            offset += encoded.len() as u64;
            chunk_bytes.extend_from_slice(&encoded);
        }
        let metadata = DictionaryMetadata {
            total_entries: by_id.len() as u32,
            chunks: locations,
        };
        let meta_encoded = bincode::serialize(&metadata)?;

        let mut file = byte_store::create_versioned(path, version)?;
        file.write_all(&(meta_encoded.len() as u32).to_le_bytes())?;
        file.write_all(&meta_encoded)?;
        file.write_all(&chunk_bytes)?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn assigns_dense_never_reused_ids() {
        let mut table = ManifestTable::empty();
        let a = table.assign_or_lookup("a@1.0");
        let b = table.assign_or_lookup("b@1.0");
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(table.assign_or_lookup("a@1.0"), a);
    }

    #[test]
    fn round_trips_through_disk_and_resolves_both_ways() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manf");

        let mut table = ManifestTable::empty();
        table.assign_or_lookup("a@1.0");
        table.assign_or_lookup("b@2.0");
        table.write(&path, 1).unwrap();

        let (version, loaded) = ManifestTable::open(&path).unwrap();
        assert_eq!(version, 1);
        assert_eq!(loaded.len(), 2);
        let a_id = loaded.id_for("a@1.0").unwrap();
        assert_eq!(loaded.resolve(a_id).unwrap().as_deref(), Some("a@1.0"));
        let b_id = loaded.id_for("b@2.0").unwrap();
        assert_eq!(loaded.resolve(b_id).unwrap().as_deref(), Some("b@2.0"));
    }

    #[test]
    fn spans_multiple_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manf");

        let mut table = ManifestTable::empty();
        let count = CHUNK_SIZE * 2 + 7;
        for i in 0..count {
            table.assign_or_lookup(&format!("pkg{i}@1.0"));
        }
        table.write(&path, 1).unwrap();

        let (_, loaded) = ManifestTable::open(&path).unwrap();
        assert_eq!(loaded.len(), count);
        for i in [0usize, CHUNK_SIZE - 1, CHUNK_SIZE, count - 1] {
            let fmri = format!("pkg{i}@1.0");
            let id = loaded.id_for(&fmri).unwrap();
            assert_eq!(loaded.resolve(id).unwrap().as_deref(), Some(fmri.as_str()));
        }
    }

    #[test]
    fn absent_file_is_empty_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent");
        let (version, table) = ManifestTable::open(&path).unwrap();
        assert_eq!(version, 0);
        assert!(table.is_empty());
    }
}
