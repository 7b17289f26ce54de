//! IndexUpdater: the top-level orchestrator (spec.md §2 item 6, §4.6-§4.10).
//!
//! Drives the state machine `Idle -> Reading -> Ingesting -> Merging ->
//! Committing -> Idle` (or `-> Failed` at any step) across the three entry
//! points: [`IndexUpdater::rebuild`] (full rebuild),
//! [`IndexUpdater::server_update_index`] (incremental server-side add), and
//! [`IndexUpdater::client_update_index`] (deferred client-side fast path).

use crate::aux::fast_set::{apply_add, apply_remove};
use crate::aux::{FastSet, FullFmriSet, ManifestTable, TokenOffsetMap};
use crate::byte_store;
use crate::config::IndexerConfig;
use crate::error::{IndexError, Result};
use crate::main_dict::payload::{filter_packages, singleton_payload};
use crate::main_dict::{MainDictionaryReader, MainDictionaryWriter, Payload, Token};
use crate::manifest_source::{ManifestSource, ProgressSink, RebuildRequest};
use crate::pfmri::Pfmri;
use crate::side_index::SideIndexWriter;
use crate::sort::{RunMerger, SortSpiller};
use std::cmp::Ordering;
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

const MAIN_DICT: &str = "main_dict.ascii";
const TOKEN_OFFSET: &str = "token_byte_offset.ascii";
const MANIFEST_TABLE: &str = "manf";
const FULL_FMRI: &str = "full_fmri";
const FAST_ADD: &str = "fast_add";
const FAST_REMOVE: &str = "fast_remove";
const TMP_DIR: &str = "TMP";

const INITIAL_VERSION_NUMBER: u64 = 1;

/// Coordinates one index directory. Holds no in-flight state between calls
/// — every entry point reads, does its work, and commits (or fails)
/// independently, matching the single-threaded, non-reentrant model of
/// spec.md §5.
pub struct IndexUpdater {
    index_dir: PathBuf,
    config: IndexerConfig,
}

impl IndexUpdater {
    pub fn new(index_dir: impl Into<PathBuf>, config: IndexerConfig) -> Self {
        Self {
            index_dir: index_dir.into(),
            config,
        }
    }

    fn main_dict_path(&self) -> PathBuf {
        self.index_dir.join(MAIN_DICT)
    }
    fn token_offset_path(&self) -> PathBuf {
        self.index_dir.join(TOKEN_OFFSET)
    }
    fn manf_path(&self) -> PathBuf {
        self.index_dir.join(MANIFEST_TABLE)
    }
    fn full_fmri_path(&self) -> PathBuf {
        self.index_dir.join(FULL_FMRI)
    }
    fn fast_add_path(&self) -> PathBuf {
        self.index_dir.join(FAST_ADD)
    }
    fn fast_remove_path(&self) -> PathBuf {
        self.index_dir.join(FAST_REMOVE)
    }
    fn tmp_dir(&self) -> PathBuf {
        self.index_dir.join(TMP_DIR)
    }

    fn core_paths(&self) -> Vec<PathBuf> {
        vec![
            self.main_dict_path(),
            self.token_offset_path(),
            self.manf_path(),
            self.full_fmri_path(),
            self.fast_add_path(),
            self.fast_remove_path(),
        ]
    }

    fn guard_no_tmp(&self) -> Result<()> {
        if self.tmp_dir().exists() {
            return Err(IndexError::PartialIndexing(self.tmp_dir()));
        }
        Ok(())
    }

    /// Seed a brand-new index directory with empty stub files at version 1.
    /// A no-op if the directory is already fully and consistently set up;
    /// a partially-seeded directory surfaces as `InconsistentIndex`.
    pub fn setup(&self) -> Result<()> {
        let existing =
            byte_store::consistent_open(&self.core_paths(), &self.index_dir, self.config.file_open_timeout)?;
        if existing.is_some() {
            return Ok(());
        }
        fs::create_dir_all(&self.index_dir)?;
        let version = INITIAL_VERSION_NUMBER;
        MainDictionaryWriter::create(&self.main_dict_path(), version)?.finish()?;
        TokenOffsetMap::new().write(&self.token_offset_path(), version)?;
        ManifestTable::open(&self.manf_path())?.1.write(&self.manf_path(), version)?;
        FullFmriSet::new().write(&self.full_fmri_path(), version)?;
        FastSet::new().write(&self.fast_add_path(), version)?;
        FastSet::new().write(&self.fast_remove_path(), version)?;
        Ok(())
    }

    /// A read-only probe: does a consistent, fully-committed index exist?
    /// Swallows every error rather than propagating it.
    pub fn exists(&self) -> bool {
        matches!(
            byte_store::consistent_open(&self.core_paths(), &self.index_dir, self.config.file_open_timeout),
            Ok(Some(_))
        )
    }

    /// Remove already-indexed PFMRIs from `candidates` in place. Absence of
    /// an index is treated as "nothing indexed yet", not an error.
    pub fn filter_unindexed(&self, candidates: &mut Vec<Pfmri>) -> Result<()> {
        let (_, full_fmri) = FullFmriSet::open(&self.full_fmri_path())?;
        candidates.retain(|p| !full_fmri.contains(&p.anarchic()));
        Ok(())
    }

    /// Full rebuild: discard the entire index directory and reindex
    /// `added` from scratch.
    pub fn rebuild(
        &self,
        added: &[Pfmri],
        manifest_source: &dyn ManifestSource,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<()> {
        match fs::remove_dir_all(&self.index_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(IndexError::ProblematicPermissions(self.index_dir.clone()));
            }
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.index_dir)?;
        self.server_update_index(added, manifest_source, progress)
    }

    /// Incremental server-side add (spec.md §4.6). No removals: the
    /// server path carries forward the original's acknowledged limitation
    /// (spec.md §9).
    pub fn server_update_index(
        &self,
        added: &[Pfmri],
        manifest_source: &dyn ManifestSource,
        mut progress: Option<&mut dyn ProgressSink>,
    ) -> Result<()> {
        self.guard_no_tmp()?;

        let old_version =
            byte_store::consistent_open(&self.core_paths(), &self.index_dir, self.config.file_open_timeout)?;
        let new_version = old_version.map(|v| v + 1).unwrap_or(INITIAL_VERSION_NUMBER);

        let tmp_dir = self.tmp_dir();
        fs::create_dir(&tmp_dir)?;

        let (_, mut manifest) = ManifestTable::open(&self.manf_path())?;
        let (_, mut full_fmri) = FullFmriSet::open(&self.full_fmri_path())?;
        let (_, fast_add) = FastSet::open(&self.fast_add_path())?;
        let (_, fast_remove) = FastSet::open(&self.fast_remove_path())?;

        if let Some(p) = progress.as_deref_mut() {
            p.set_goal("indexing", added.len());
        }

        let mut spiller = SortSpiller::new(tmp_dir.clone(), self.config.max_run_bytes, self.config.sort_file_prefix);
        for pfmri in added {
            let anarchic = pfmri.anarchic();
            let package_id = manifest.assign_or_lookup(&anarchic);
            full_fmri.insert(anarchic);

            let search_dict = manifest_source.search_dict(pfmri, &[])?;
            for ((token, action_type, attr_subtype, attr_value), positions) in search_dict {
                let payload = singleton_payload(action_type, attr_subtype, attr_value, package_id, positions);
                spiller.append(crate::main_dict::codec::serialize_line(&token, &payload))?;
            }
            if let Some(p) = progress.as_deref_mut() {
                p.add_progress();
            }
        }
        let runs = spiller.finish()?;
        if let Some(p) = progress.as_deref_mut() {
            p.optimize();
        }
        let mut merger = RunMerger::open(&runs)?;

        let existing = MainDictionaryReader::open(&self.main_dict_path())?;
        let mut existing_reader = existing.map(|(_, reader)| reader);
        let mut existing_current = match &mut existing_reader {
            Some(reader) => reader.next_entry()?,
            None => None,
        };

        let mut merger_current = merger.next_entry()?;

        let mut writer = MainDictionaryWriter::create(&self.index_tmp_path(&tmp_dir, MAIN_DICT), new_version)?;
        let mut token_offset = TokenOffsetMap::new();
        let mut side_index = SideIndexWriter::new(tmp_dir.clone());

        loop {
            let which = match (&existing_current, &merger_current) {
                (None, None) => break,
                (Some(_), None) => Side::Existing,
                (None, Some(_)) => Side::Merger,
                (Some((etok, _)), Some((mtok, _))) => match mtok.cmp(etok) {
                    Ordering::Less => Side::Merger,
                    Ordering::Greater => Side::Existing,
                    Ordering::Equal => Side::Both,
                },
            };

            match which {
                Side::Merger => {
                    let (token, payload) = merger_current.take().expect("checked Some above");
                    emit(&mut writer, &mut token_offset, &mut side_index, &manifest, token, payload)?;
                    merger_current = merger.next_entry()?;
                }
                Side::Existing => {
                    let (token, mut payload) = existing_current.take().expect("checked Some above");
                    // Server add path never removes (spec.md §9); the hook
                    // for deferred removals during a real rebuild lives
                    // here for the fast-path-backed merge to reuse.
                    filter_packages(&mut payload, |_| true);
                    if !payload.is_empty() {
                        emit(&mut writer, &mut token_offset, &mut side_index, &manifest, token, payload)?;
                    }
                    existing_current = match &mut existing_reader {
                        Some(reader) => reader.next_entry()?,
                        None => None,
                    };
                }
                Side::Both => {
                    let (token, mut epayload) = existing_current.take().expect("checked Some above");
                    let (_, mpayload) = merger_current.take().expect("checked Some above");
                    filter_packages(&mut epayload, |_| true);
                    crate::main_dict::payload::splice_payload(&mut epayload, mpayload);
                    if !epayload.is_empty() {
                        emit(&mut writer, &mut token_offset, &mut side_index, &manifest, token, epayload)?;
                    }
                    existing_current = match &mut existing_reader {
                        Some(reader) => reader.next_entry()?,
                        None => None,
                    };
                    merger_current = merger.next_entry()?;
                }
            }
        }

        writer.finish()?;
        side_index.finish()?;

        manifest.write(&self.index_tmp_path(&tmp_dir, MANIFEST_TABLE), new_version)?;
        full_fmri.write(&self.index_tmp_path(&tmp_dir, FULL_FMRI), new_version)?;
        fast_add.write(&self.index_tmp_path(&tmp_dir, FAST_ADD), new_version)?;
        fast_remove.write(&self.index_tmp_path(&tmp_dir, FAST_REMOVE), new_version)?;
        token_offset.write(&self.index_tmp_path(&tmp_dir, TOKEN_OFFSET), new_version)?;

        self.migrate(&tmp_dir, &[])?;
        if let Some(p) = progress {
            p.done();
        }
        Ok(())
    }

    fn index_tmp_path(&self, tmp_dir: &Path, name: &str) -> PathBuf {
        tmp_dir.join(name)
    }

    /// Client-side fast update (spec.md §4.7): defers all token-level work
    /// to a future rebuild, recording only the pending add/remove sets.
    pub fn client_update_index(
        &self,
        added: &[Pfmri],
        removed: &[Pfmri],
        rebuild_request: &mut dyn RebuildRequest,
        mut progress: Option<&mut dyn ProgressSink>,
    ) -> Result<()> {
        self.guard_no_tmp()?;

        let version = byte_store::consistent_open(&self.core_paths(), &self.index_dir, self.config.file_open_timeout)?
            .unwrap_or(INITIAL_VERSION_NUMBER);

        let (_, mut full_fmri) = FullFmriSet::open(&self.full_fmri_path())?;
        let (_, mut fast_add) = FastSet::open(&self.fast_add_path())?;
        let (_, mut fast_remove) = FastSet::open(&self.fast_remove_path())?;

        for pfmri in added {
            full_fmri.insert(pfmri.anarchic());
            apply_add(&mut fast_add, &mut fast_remove, &pfmri.anarchic());
        }
        for pfmri in removed {
            full_fmri.remove(&pfmri.anarchic());
            apply_remove(&mut fast_add, &mut fast_remove, &pfmri.anarchic());
        }

        if fast_add.len() > self.config.max_added_number_packages {
            rebuild_request.rebuild_search_index(progress.as_deref_mut())?;
            return Ok(());
        }

        let tmp_dir = self.tmp_dir();
        fs::create_dir(&tmp_dir)?;
        full_fmri.write(&self.index_tmp_path(&tmp_dir, FULL_FMRI), version)?;
        fast_add.write(&self.index_tmp_path(&tmp_dir, FAST_ADD), version)?;
        fast_remove.write(&self.index_tmp_path(&tmp_dir, FAST_REMOVE), version)?;

        self.migrate(&tmp_dir, &[MAIN_DICT, TOKEN_OFFSET, MANIFEST_TABLE])?;
        if let Some(p) = progress {
            p.done();
        }
        Ok(())
    }

    /// `_migrate`: best-effort directory swap from `tmp_dir` into the index
    /// directory (spec.md §4.8). `skip` names core files this update never
    /// wrote to `tmp_dir` and that must be left untouched in place.
    fn migrate(&self, tmp_dir: &Path, skip: &[&str]) -> Result<()> {
        let tmp_pkg = tmp_dir.join("pkg");
        if tmp_pkg.is_dir() {
            remove_dir_ignore_missing(&self.index_dir.join("pkg"))?;
            fs::rename(&tmp_pkg, self.index_dir.join("pkg"))?;
        }

        for name in [MAIN_DICT, TOKEN_OFFSET, MANIFEST_TABLE, FULL_FMRI, FAST_ADD, FAST_REMOVE] {
            if skip.contains(&name) {
                continue;
            }
            fs::rename(tmp_dir.join(name), self.index_dir.join(name))?;
        }

        for entry in fs::read_dir(tmp_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if name_str.starts_with("__at_") || name_str.starts_with("__st_") {
                fs::rename(entry.path(), self.index_dir.join(&*name_str))?;
            }
        }

        sync_dir(&self.index_dir)?;
        fs::remove_dir(tmp_dir)?;
        Ok(())
    }
}

enum Side {
    Existing,
    Merger,
    Both,
}

fn emit(
    writer: &mut MainDictionaryWriter,
    token_offset: &mut TokenOffsetMap,
    side_index: &mut SideIndexWriter,
    manifest: &ManifestTable,
    token: Token,
    payload: Payload,
) -> Result<()> {
    let offset = writer.append(&token, &payload)?;
    token_offset.record(token, offset);
    side_index.observe(offset, &payload, manifest)?;
    Ok(())
}

fn remove_dir_ignore_missing(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// fsync the directory itself so the renames above are durable before the
/// next update starts, mirroring `Manifest::commit_atomic`'s directory
/// fsync.
fn sync_dir(dir: &Path) -> Result<()> {
    let c_path = CString::new(dir.as_os_str().as_bytes()).map_err(|_| {
        IndexError::CorruptIndex(format!("index path {} contains an interior NUL", dir.display()))
    })?;
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let result = unsafe { libc::fsync(fd) };
    unsafe { libc::close(fd) };
    if result != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}
