//! RunMerger: the read side of the external sort (spec.md §4.4).
//!
//! A small binary heap over each run's current head, the same shape the
//! teacher's `MergingIterator` uses over its LSM run iterators
//! (`src/storage/lsm/merging_iterator.rs`), except ties here don't mean
//! "later source wins" (MVCC) — they mean "splice both payloads together"
//! (spec.md §4.5), and every tied head advances before the merger moves on.

use crate::error::Result;
use crate::main_dict::codec::parse_line;
use crate::main_dict::payload::splice_payload;
use crate::main_dict::{Payload, Token};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

struct RunHead {
    reader: BufReader<File>,
    current: Option<(Token, Payload)>,
}

impl RunHead {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut head = Self {
            reader: BufReader::new(file),
            current: None,
        };
        head.advance()?;
        Ok(head)
    }

    fn advance(&mut self) -> Result<()> {
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line)?;
        self.current = if n == 0 { None } else { Some(parse_line(&line)?) };
        Ok(())
    }
}

/// Heap key: ascending by token, then by run index — the stable tie-break
/// spec.md §9 calls for, so splice order across equal-token runs is
/// deterministic (lowest run index contributes the base payload).
#[derive(PartialEq, Eq)]
struct HeapKey {
    token: Token,
    run_index: usize,
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.token.cmp(&other.token).then(self.run_index.cmp(&other.run_index))
    }
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A lazy, finite, non-restartable k-way merge over a set of sorted run
/// files, splicing payloads for duplicate tokens as it goes.
pub struct RunMerger {
    heads: Vec<RunHead>,
    heap: BinaryHeap<Reverse<HeapKey>>,
}

impl RunMerger {
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let mut heads = Vec::with_capacity(paths.len());
        let mut heap = BinaryHeap::new();
        for (run_index, path) in paths.iter().enumerate() {
            let head = RunHead::open(path)?;
            if let Some((token, _)) = &head.current {
                heap.push(Reverse(HeapKey {
                    token: token.clone(),
                    run_index,
                }));
            }
            heads.push(head);
        }
        Ok(Self { heads, heap })
    }

    /// Take this run's current head and advance it, re-pushing its new
    /// head onto the heap if it isn't exhausted.
    fn take_head(&mut self, run_index: usize) -> Result<(Token, Payload)> {
        let (token, payload) = self.heads[run_index]
            .current
            .take()
            .expect("heap entry implies a current head");
        self.heads[run_index].advance()?;
        if let Some((next_token, _)) = &self.heads[run_index].current {
            self.heap.push(Reverse(HeapKey {
                token: next_token.clone(),
                run_index,
            }));
        }
        Ok((token, payload))
    }

    pub fn next_entry(&mut self) -> Result<Option<(Token, Payload)>> {
        let Reverse(top) = match self.heap.pop() {
            Some(top) => top,
            None => return Ok(None),
        };
        let (token, mut payload) = self.take_head(top.run_index)?;

        while let Some(Reverse(next)) = self.heap.peek() {
            if next.token != token {
                break;
            }
            let Reverse(next) = self.heap.pop().expect("peeked");
            let (_, more) = self.take_head(next.run_index)?;
            splice_payload(&mut payload, more);
        }

        Ok(Some((token, payload)))
    }
}

impl Iterator for RunMerger {
    type Item = Result<(Token, Payload)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_dict::codec::serialize_line;
    use crate::main_dict::payload::singleton_payload;
    use tempfile::TempDir;

    fn write_run(dir: &Path, name: &str, entries: &[(&str, Payload)]) -> PathBuf {
        let path = dir.join(name);
        let mut bytes = Vec::new();
        for (token, payload) in entries {
            bytes.extend_from_slice(&serialize_line(&token.as_bytes().to_vec(), payload));
        }
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn singleton(pid: u32, pos: u64) -> Payload {
        singleton_payload(b"file".to_vec(), b"path".to_vec(), b"/x".to_vec(), pid, vec![pos])
    }

    #[test]
    fn merges_disjoint_runs_in_order() {
        let dir = TempDir::new().unwrap();
        let r1 = write_run(dir.path(), "sort.0", &[("bar", singleton(1, 1))]);
        let r2 = write_run(dir.path(), "sort.1", &[("foo", singleton(2, 2))]);
        let merger = RunMerger::open(&[r1, r2]).unwrap();
        let tokens: Vec<Token> = merger.map(|r| r.unwrap().0).collect();
        assert_eq!(tokens, vec![b"bar".to_vec(), b"foo".to_vec()]);
    }

    #[test]
    fn splices_duplicate_tokens_across_runs() {
        let dir = TempDir::new().unwrap();
        let r1 = write_run(dir.path(), "sort.0", &[("foo", singleton(1, 1))]);
        let r2 = write_run(dir.path(), "sort.1", &[("foo", singleton(2, 2))]);
        let mut merger = RunMerger::open(&[r1, r2]).unwrap();
        let (token, payload) = merger.next_entry().unwrap().unwrap();
        assert_eq!(token, b"foo".to_vec());
        let packages = &payload[0].1[0].1[0].1;
        assert_eq!(packages, &vec![(1, vec![1]), (2, vec![2])]);
        assert!(merger.next_entry().unwrap().is_none());
    }

    #[test]
    fn splices_three_way_tie_in_run_order() {
        let dir = TempDir::new().unwrap();
        let r0 = write_run(dir.path(), "sort.0", &[("foo", singleton(1, 1))]);
        let r1 = write_run(dir.path(), "sort.1", &[("foo", singleton(2, 2))]);
        let r2 = write_run(dir.path(), "sort.2", &[("foo", singleton(3, 3))]);
        let mut merger = RunMerger::open(&[r0, r1, r2]).unwrap();
        let (_, payload) = merger.next_entry().unwrap().unwrap();
        let packages = &payload[0].1[0].1[0].1;
        assert_eq!(packages, &vec![(1, vec![1]), (2, vec![2]), (3, vec![3])]);
    }

    #[test]
    fn empty_run_set_yields_nothing() {
        let merger = RunMerger::open(&[]).unwrap();
        assert_eq!(merger.count(), 0);
    }
}
