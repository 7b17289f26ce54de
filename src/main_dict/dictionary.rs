//! `main_dict.ascii`: the large, sorted on-disk token dictionary.
//!
//! A writer appends lines in strictly ascending token order and reports the
//! byte offset each line started at (for [`crate::aux::token_offset_map`]);
//! a reader walks an existing dictionary line by line for the merge pass
//! (spec.md §4.6); and a memory-mapped random accessor lets any offset
//! recorded in `TokenOffsetMap` be resolved back to its line without a
//! sequential scan, the same shape `VamanaSSTFile` gives vector search over
//! its SST file.

use super::codec::{parse_line, serialize_line};
use super::payload::{Payload, Token};
use crate::byte_store;
use crate::error::{IndexError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Appends main-dictionary lines in ascending token order, tracking the
/// byte offset each one begins at.
pub struct MainDictionaryWriter {
    writer: BufWriter<File>,
    offset: u64,
    last_token: Option<Token>,
}

impl MainDictionaryWriter {
    /// Create (truncating) `path` and write its version header.
    pub fn create(path: &Path, version: u64) -> Result<Self> {
        let file = byte_store::create_versioned(path, version)?;
        let offset = byte_store::header_bytes(version).len() as u64;
        Ok(Self {
            writer: BufWriter::new(file),
            offset,
            last_token: None,
        })
    }

    /// Append one line, returning the byte offset it starts at. Tokens must
    /// be passed in strictly ascending order (spec.md invariant); violating
    /// this is a caller bug, not a recoverable error.
    pub fn append(&mut self, token: &Token, payload: &Payload) -> Result<u64> {
        if let Some(last) = &self.last_token {
            debug_assert!(
                last < token,
                "main-dictionary tokens must be written in strictly ascending order"
            );
        }
        let line_offset = self.offset;
        let line = serialize_line(token, payload);
        self.writer.write_all(&line)?;
        self.offset += line.len() as u64;
        self.last_token = Some(token.clone());
        Ok(line_offset)
    }

    /// Flush and fsync so the file is durable before the directory
    /// migration that makes it visible.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Reads an existing main dictionary line by line, in the order it was
/// written (ascending token order).
pub struct MainDictionaryReader {
    reader: BufReader<File>,
    offset: u64,
}

impl MainDictionaryReader {
    /// Open `path`, returning its version and a reader positioned at the
    /// first token line.
    pub fn open(path: &Path) -> Result<Option<(u64, Self)>> {
        match byte_store::try_open_versioned(path)? {
            None => Ok(None),
            Some((version, reader)) => {
                let offset = byte_store::header_bytes(version).len() as u64;
                Ok(Some((version, Self { reader, offset })))
            }
        }
    }

    /// Read the next `(token, payload)` entry, or `None` at end of file.
    pub fn next_entry(&mut self) -> Result<Option<(Token, Payload)>> {
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;
        let (token, payload) = parse_line(&line)?;
        Ok(Some((token, payload)))
    }
}

impl Iterator for MainDictionaryReader {
    type Item = Result<(Token, Payload)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

/// Memory-mapped random access into a committed `main_dict.ascii`, used to
/// resolve a `TokenOffsetMap` entry straight to its line (spec.md §8,
/// testable property 2) without re-scanning the file.
pub struct MainDictionaryMmap {
    mmap: Mmap,
}

impl MainDictionaryMmap {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    /// Parse the line beginning at `offset`. Returns `CorruptIndex` if
    /// `offset` does not land on a line boundary or the line is malformed.
    pub fn read_at(&self, offset: u64) -> Result<(Token, Payload)> {
        let start = offset as usize;
        let bytes = self
            .mmap
            .get(start..)
            .ok_or_else(|| IndexError::CorruptIndex(format!("offset {offset} past end of file")))?;
        let end = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| IndexError::CorruptIndex(format!("no line terminator at offset {offset}")))?;
        parse_line(&bytes[..=end])
    }
}
