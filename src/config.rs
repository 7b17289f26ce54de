//! Tunables for the indexing engine.
//!
//! Mirrors the constants the original indexer hard-coded at module scope
//! (`FILE_OPEN_TIMEOUT_SECS`, `MAX_ADDED_NUMBER_PACKAGES`,
//! `SORT_FILE_MAX_SIZE`, `SORT_FILE_PREFIX`), collected into one struct so
//! callers can override them for tests without touching global state.

use std::time::Duration;

/// Configuration for a single [`crate::updater::IndexUpdater`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Size at which a sort run is closed, sorted, and a new one opened.
    ///
    /// Bounds per-run memory use during the external sort: the whole run is
    /// loaded into memory to be sorted, so this is also roughly the peak
    /// memory used by one run. Default 128 MiB.
    pub max_run_bytes: u64,

    /// How long `consistent_open` waits for a torn read (some files present,
    /// some absent, or versions briefly disagreeing during a concurrent
    /// swap) to resolve before giving up. Default 2s.
    pub file_open_timeout: Duration,

    /// Fast-path add-set size at which the caller is asked to perform a
    /// full rebuild instead of continuing to defer. Default 20.
    pub max_added_number_packages: usize,

    /// Filename prefix for sort run files inside `TMP/`.
    pub sort_file_prefix: &'static str,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_run_bytes: 128 * 1024 * 1024,
            file_open_timeout: Duration::from_secs(2),
            max_added_number_packages: 20,
            sort_file_prefix: "sort.",
        }
    }
}

impl IndexerConfig {
    /// A config tuned for tests: tiny runs, short timeouts.
    pub fn for_tests() -> Self {
        Self {
            max_run_bytes: 4096,
            file_open_timeout: Duration::from_millis(200),
            max_added_number_packages: 20,
            sort_file_prefix: "sort.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = IndexerConfig::default();
        assert_eq!(cfg.max_run_bytes, 128 * 1024 * 1024);
        assert_eq!(cfg.file_open_timeout, Duration::from_secs(2));
        assert_eq!(cfg.max_added_number_packages, 20);
        assert_eq!(cfg.sort_file_prefix, "sort.");
    }
}
