//! ByteStore: the version header every persisted index file shares.
//!
//! Every file this crate writes under `index_dir` begins with a plain-text
//! header `VERSION: <n>\n` followed by the file's body. A single version
//! number is shared by every file in one index snapshot (spec.md §3), and
//! [`consistent_open`] is the only thing allowed to treat a mismatch as
//! anything other than a hard error.
//!
//! This mirrors the role `Manifest`/`MANIFEST-CURRENT` play in the teacher's
//! LSM engine, but the commit point here is the directory-level `_migrate`
//! step (`crate::updater`) rather than a single atomic rename, because a
//! snapshot here is several independently-named files, not one.

pub mod consistent;

pub use consistent::consistent_open;

use crate::error::{IndexError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

const HEADER_PREFIX: &str = "VERSION: ";

/// The exact bytes of the header for `version`, including its trailing
/// newline — callers that track byte offsets into the body (e.g.
/// [`crate::main_dict::dictionary`]) need this length up front.
pub fn header_bytes(version: u64) -> Vec<u8> {
    format!("{HEADER_PREFIX}{version}\n").into_bytes()
}

/// Write `VERSION: <n>\n` as the first thing in a freshly created file.
pub fn write_header<W: Write>(w: &mut W, version: u64) -> std::io::Result<()> {
    w.write_all(&header_bytes(version))
}

/// Read and parse the header line from an already-open reader, leaving the
/// reader positioned at the start of the body.
pub fn read_header<R: BufRead>(r: &mut R) -> Result<u64> {
    let mut line = String::new();
    let n = r.read_line(&mut line)?;
    if n == 0 {
        return Err(IndexError::CorruptIndex("empty file, missing version header".into()));
    }
    parse_header(&line)
}

fn parse_header(line: &str) -> Result<u64> {
    let rest = line
        .strip_prefix(HEADER_PREFIX)
        .ok_or_else(|| IndexError::CorruptIndex(format!("malformed version header: {line:?}")))?;
    rest.trim_end()
        .parse::<u64>()
        .map_err(|e| IndexError::CorruptIndex(format!("malformed version number: {e}")))
}

/// Open `path` and read just its version header, leaving the returned
/// reader positioned at the start of the body.
///
/// Returns `Ok(None)` if the file does not exist (the caller decides
/// whether that means "fresh index" or "torn write in progress" — see
/// [`consistent_open`]). A `PermissionDenied` is reported distinctly so
/// callers can surface `ProblematicPermissions` rather than retrying.
pub fn try_open_versioned(path: &Path) -> Result<Option<(u64, BufReader<File>)>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IndexError::ProblematicPermissions(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);
    let version = read_header(&mut reader)?;
    Ok(Some((version, reader)))
}

/// Create `path` truncated, write the version header, and return the open
/// handle positioned right after it so the caller can append the body.
pub fn create_versioned(path: &Path, version: u64) -> Result<File> {
    let mut file = File::create(path)?;
    write_header(&mut file, version)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        let mut file = create_versioned(&path, 7).unwrap();
        file.flush().unwrap();
        drop(file);

        let (version, _reader) = try_open_versioned(&path).unwrap().unwrap();
        assert_eq!(version, 7);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent");
        assert!(try_open_versioned(&path).unwrap().is_none());
    }

    #[test]
    fn malformed_header_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"not a header\n").unwrap();
        let err = try_open_versioned(&path).unwrap_err();
        assert!(matches!(err, IndexError::CorruptIndex(_)));
    }
}
