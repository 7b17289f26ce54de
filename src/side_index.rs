//! SideIndexWriter: per-`action_type`, per-`attr_subtype`, and per-package
//! offset files written alongside the new MainDictionary (spec.md §4.9).
//!
//! File handles are opened lazily, one per distinct key observed during a
//! single update, and cached for the update's lifetime rather than reopened
//! per line — the original `Indexer` keeps exactly this shape as `at_fh`/
//! `st_fh` dicts.

use crate::aux::ManifestTable;
use crate::error::{IndexError, Result};
use crate::main_dict::payload::{distinct_action_types, distinct_attr_subtypes, package_ids};
use crate::main_dict::Payload;
use crate::pfmri::Pfmri;
use ahash::AHashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct SideIndexWriter {
    tmp_dir: PathBuf,
    at_files: AHashMap<Vec<u8>, BufWriter<File>>,
    st_files: AHashMap<Vec<u8>, BufWriter<File>>,
    pkg_files: AHashMap<(String, String), BufWriter<File>>,
}

impl SideIndexWriter {
    pub fn new(tmp_dir: PathBuf) -> Self {
        Self {
            tmp_dir,
            at_files: AHashMap::new(),
            st_files: AHashMap::new(),
            pkg_files: AHashMap::new(),
        }
    }

    fn at_writer(&mut self, action_type: &[u8]) -> Result<&mut BufWriter<File>> {
        if !self.at_files.contains_key(action_type) {
            let name = format!("__at_{}", String::from_utf8_lossy(action_type));
            let file = OpenOptions::new().create(true).append(true).open(self.tmp_dir.join(name))?;
            self.at_files.insert(action_type.to_vec(), BufWriter::new(file));
        }
        Ok(self.at_files.get_mut(action_type).expect("just inserted"))
    }

    fn st_writer(&mut self, attr_subtype: &[u8]) -> Result<&mut BufWriter<File>> {
        if !self.st_files.contains_key(attr_subtype) {
            let name = format!("__st_{}", String::from_utf8_lossy(attr_subtype));
            let file = OpenOptions::new().create(true).append(true).open(self.tmp_dir.join(name))?;
            self.st_files.insert(attr_subtype.to_vec(), BufWriter::new(file));
        }
        Ok(self.st_files.get_mut(attr_subtype).expect("just inserted"))
    }

    fn pkg_writer(&mut self, stem: &str, version: &str) -> Result<&mut BufWriter<File>> {
        let key = (stem.to_string(), version.to_string());
        if !self.pkg_files.contains_key(&key) {
            let dir = self.tmp_dir.join("pkg").join(stem);
            fs::create_dir_all(&dir)?;
            let file = OpenOptions::new().create(true).append(true).open(dir.join(version))?;
            self.pkg_files.insert(key.clone(), BufWriter::new(file));
        }
        Ok(self.pkg_files.get_mut(&key).expect("just inserted"))
    }

    /// Record `offset` (the byte position the just-emitted main-dictionary
    /// line started at) into every side file `payload` touches.
    pub fn observe(&mut self, offset: u64, payload: &Payload, manifest: &ManifestTable) -> Result<()> {
        let line = format!("{offset}\n");

        for at in distinct_action_types(payload) {
            let at = at.to_vec();
            self.at_writer(&at)?.write_all(line.as_bytes())?;
        }
        for st in distinct_attr_subtypes(payload) {
            let st = st.to_vec();
            self.st_writer(&st)?.write_all(line.as_bytes())?;
        }
        for package_id in package_ids(payload) {
            let anarchic = manifest.resolve(package_id)?.ok_or_else(|| {
                IndexError::CorruptIndex(format!("package id {package_id} has no ManifestTable entry"))
            })?;
            let pfmri = Pfmri::parse(&anarchic).ok_or_else(|| {
                IndexError::CorruptIndex(format!("malformed PFMRI in ManifestTable: {anarchic}"))
            })?;
            let stem = pfmri.stem().to_string();
            let version = pfmri.version().to_string();
            self.pkg_writer(&stem, &version)?.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    /// Flush and fsync every side file opened during this update.
    pub fn finish(mut self) -> Result<()> {
        for (_, writer) in self.at_files.drain() {
            flush_and_sync(writer)?;
        }
        for (_, writer) in self.st_files.drain() {
            flush_and_sync(writer)?;
        }
        for (_, writer) in self.pkg_files.drain() {
            flush_and_sync(writer)?;
        }
        Ok(())
    }
}

fn flush_and_sync(mut writer: BufWriter<File>) -> Result<()> {
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_dict::payload::singleton_payload;
    use tempfile::TempDir;

    #[test]
    fn writes_action_subtype_and_package_offsets() {
        let dir = TempDir::new().unwrap();
        let mut manifest = ManifestTable::open(&dir.path().join("manf")).unwrap().1;
        let pid = manifest.assign_or_lookup("pub/a@1.0");

        let payload = singleton_payload(b"file".to_vec(), b"basename".to_vec(), b"/bin/foo".to_vec(), pid, vec![42]);

        let mut writer = SideIndexWriter::new(dir.path().to_path_buf());
        writer.observe(11, &payload, &manifest).unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("__at_file")).unwrap(), "11\n");
        assert_eq!(fs::read_to_string(dir.path().join("__st_basename")).unwrap(), "11\n");
        assert_eq!(fs::read_to_string(dir.path().join("pkg/a/1.0")).unwrap(), "11\n");
    }

    #[test]
    fn appends_across_multiple_observations() {
        let dir = TempDir::new().unwrap();
        let mut manifest = ManifestTable::open(&dir.path().join("manf")).unwrap().1;
        let pid = manifest.assign_or_lookup("pub/a@1.0");

        let p1 = singleton_payload(b"file".to_vec(), b"basename".to_vec(), b"/bin/foo".to_vec(), pid, vec![1]);
        let p2 = singleton_payload(b"file".to_vec(), b"basename".to_vec(), b"/bin/bar".to_vec(), pid, vec![2]);

        let mut writer = SideIndexWriter::new(dir.path().to_path_buf());
        writer.observe(0, &p1, &manifest).unwrap();
        writer.observe(20, &p2, &manifest).unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("__at_file")).unwrap(), "0\n20\n");
        assert_eq!(fs::read_to_string(dir.path().join("pkg/a/1.0")).unwrap(), "0\n20\n");
    }
}
