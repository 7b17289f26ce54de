//! Consistent-open: all-or-fail-all reads of a multi-file snapshot.
//!
//! Because the filesystem offers no multi-file atomic rename, every reader
//! of the index directory must independently verify it is looking at one
//! coherent version rather than a half-migrated one. `consistent_open`
//! retries for up to `timeout` to tolerate a concurrent `_migrate` in
//! flight, then gives up.

use crate::error::{IndexError, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Poll interval between retries while waiting for a torn read to resolve.
const RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Attempt to observe one consistent version across `paths`.
///
/// - `Ok(Some(v))`: every path in `paths` exists and carries version `v`.
/// - `Ok(None)`: none of `paths` exist — treated as "fresh index".
/// - `Err(InconsistentIndex)`: some paths exist and some don't, or existing
///   paths disagree on version, and this persisted past `timeout`.
///
/// `PermissionDenied` while trying to open any file surfaces immediately as
/// `ProblematicPermissions` rather than being retried.
pub fn consistent_open(paths: &[PathBuf], dir: &Path, timeout: Duration) -> Result<Option<u64>> {
    let deadline = Instant::now() + timeout;
    loop {
        let mut versions = Vec::with_capacity(paths.len());
        let mut any_present = false;
        let mut all_present = true;

        for path in paths {
            match super::try_open_versioned(path)? {
                Some((version, _reader)) => {
                    versions.push(version);
                    any_present = true;
                }
                None => all_present = false,
            }
        }

        if !any_present {
            return Ok(None);
        }
        if all_present {
            let first = versions[0];
            if versions.iter().all(|&v| v == first) {
                return Ok(Some(first));
            }
        }

        if Instant::now() >= deadline {
            return Err(IndexError::InconsistentIndex(dir.to_path_buf()));
        }
        std::thread::sleep(RETRY_INTERVAL);
    }
}
