//! SortSpiller: the write side of the external sort (spec.md §4.3).

use crate::error::Result;
use rayon::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Accepts pre-serialized main-dictionary lines for newly added packages
/// and spills them into bounded, individually-sorted run files.
pub struct SortSpiller {
    run_dir: PathBuf,
    max_run_bytes: u64,
    prefix: &'static str,
    current: Vec<Vec<u8>>,
    current_bytes: u64,
    next_run_index: u64,
    finished_runs: Vec<PathBuf>,
}

impl SortSpiller {
    pub fn new(run_dir: PathBuf, max_run_bytes: u64, prefix: &'static str) -> Self {
        Self {
            run_dir,
            max_run_bytes,
            prefix,
            current: Vec::new(),
            current_bytes: 0,
            next_run_index: 0,
            finished_runs: Vec::new(),
        }
    }

    /// Append one already-serialized line (including its trailing `\n`).
    /// Closes, sorts, and writes the current run once this append would
    /// bring it to `max_run_bytes` or beyond.
    pub fn append(&mut self, line: Vec<u8>) -> Result<()> {
        self.current_bytes += line.len() as u64;
        self.current.push(line);
        if self.current_bytes >= self.max_run_bytes {
            self.flush_run()?;
        }
        Ok(())
    }

    fn flush_run(&mut self) -> Result<()> {
        if self.current.is_empty() {
            return Ok(());
        }
        // Lexicographic over the whole line: token is the prefix up to the
        // first separator, so byte order already equals token order
        // (spec.md §4.3).
        self.current.par_sort_unstable();

        let path = self.run_dir.join(format!("{}{}", self.prefix, self.next_run_index));
        self.next_run_index += 1;
        let mut file = File::create(&path)?;
        for line in self.current.drain(..) {
            file.write_all(&line)?;
        }
        file.sync_all()?;
        self.current_bytes = 0;
        self.finished_runs.push(path);
        Ok(())
    }

    /// Close and sort whatever is left in the current run, returning every
    /// run-file path in creation order.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        self.flush_run()?;
        Ok(self.finished_runs)
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}
