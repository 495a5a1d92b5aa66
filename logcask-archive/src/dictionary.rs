// SPDX-License-Identifier: AGPL-3.0-or-later
// LogCask - Columnar Log Archive Engine
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Dictionary store
//!
//! Maps logtype templates and variable values to stable numeric ids and
//! tracks, per entry, the set of segments the entry occurs in. Ids are
//! assigned in insertion order starting at 1 and are never reused.
//!
//! During ingestion the dictionary is paired with an append-only on-disk
//! stream ([`DictionaryWriter`]); every entry a segment references is
//! flushed to that stream before the segment seals, so replaying readers
//! always resolve their lookups.
//!
//! ## On-disk layout
//!
//! `*.dict`: a 16-byte plain header `{entry_count: u64, reserved: u64}`
//! followed by one zstd stream of `{len: u32, bytes}` blocks in id order.
//! `*.segindex`: an 8-byte plain header `{block_count: u64}` followed by
//! one zstd stream of `{segment_id: u32, id_count: u64, ids: u64…}`
//! blocks.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use logcask_core::wildcard::wildcard_match;
use logcask_core::{LogCaskError, Result};

/// Dictionary entry id. Id 0 is never assigned.
pub type DictId = u64;

/// Highest id assignable to a logtype dictionary entry.
pub const MAX_LOGTYPE_ID: DictId = (1 << 62) - 1;

/// Highest id assignable to a variable dictionary entry.
pub const MAX_VAR_ID: DictId = (1 << 62) - 1;

/// A packed, growable set of segment ids.
///
/// Segment ids are dense and monotonic, so a plain bitmap stays compact
/// even for archives with very many segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentSet {
    words: Vec<u64>,
}

impl SegmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, segment_id: u32) {
        let word = segment_id as usize / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (segment_id % 64);
    }

    pub fn contains(&self, segment_id: u32) -> bool {
        let word = segment_id as usize / 64;
        self.words
            .get(word)
            .is_some_and(|w| (w >> (segment_id % 64)) & 1 == 1)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Set intersection.
    pub fn intersection(&self, other: &SegmentSet) -> SegmentSet {
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| a & b)
            .collect();
        SegmentSet { words }
    }

    /// In-place set union.
    pub fn union_with(&mut self, other: &SegmentSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            (0..64)
                .filter(move |b| (w >> b) & 1 == 1)
                .map(move |b| (wi * 64 + b) as u32)
        })
    }
}

impl FromIterator<u32> for SegmentSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        let mut set = SegmentSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// One dictionary entry: a value, its id, and the segments it occurs in.
#[derive(Debug, Clone)]
pub struct DictionaryEntry {
    pub id: DictId,
    pub value: String,
    pub segments: SegmentSet,
}

/// In-memory dictionary state shared by the writer and reader sides.
#[derive(Debug)]
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
    ids: HashMap<String, DictId>,
    max_id: DictId,
}

impl Dictionary {
    pub fn new(max_id: DictId) -> Self {
        Self {
            entries: Vec::new(),
            ids: HashMap::new(),
            max_id,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds one occurrence of `value`, returning its id and whether the
    /// entry is new. Fails with `OutOfRange` when the id space is
    /// exhausted.
    pub fn add_occurrence(&mut self, value: &str) -> Result<(DictId, bool)> {
        if let Some(&id) = self.ids.get(value) {
            return Ok((id, false));
        }
        let id = self.entries.len() as DictId + 1;
        if id > self.max_id {
            return Err(LogCaskError::OutOfRange(
                "dictionary id space exhausted".into(),
            ));
        }
        self.entries.push(DictionaryEntry {
            id,
            value: value.to_owned(),
            segments: SegmentSet::new(),
        });
        self.ids.insert(value.to_owned(), id);
        Ok((id, true))
    }

    pub fn lookup_by_id(&self, id: DictId) -> Result<&str> {
        self.entry_by_id(id).map(|e| e.value.as_str())
    }

    pub fn entry_by_id(&self, id: DictId) -> Result<&DictionaryEntry> {
        if id == 0 || id as usize > self.entries.len() {
            return Err(LogCaskError::OutOfRange(format!(
                "dictionary id {id} is not assigned"
            )));
        }
        Ok(&self.entries[id as usize - 1])
    }

    pub fn lookup_by_value(&self, value: &str) -> Option<DictId> {
        self.ids.get(value).copied()
    }

    /// Records that the given ids occur in `segment_id`.
    pub fn index_segment(&mut self, segment_id: u32, ids: impl IntoIterator<Item = DictId>) {
        for id in ids {
            if id >= 1 && (id as usize) <= self.entries.len() {
                self.entries[id as usize - 1].segments.insert(segment_id);
            }
        }
    }

    /// All entries whose value matches the wildcard pattern.
    pub fn entries_matching_wildcard(
        &self,
        pattern: &str,
        case_sensitive: bool,
    ) -> Vec<&DictionaryEntry> {
        self.entries
            .iter()
            .filter(|e| wildcard_match(&e.value, pattern, case_sensitive))
            .collect()
    }

    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }
}

const DICT_HEADER_LEN: u64 = 16;
const SEGINDEX_HEADER_LEN: u64 = 8;

/// Writer-side dictionary: the in-memory state plus its two append-only
/// on-disk streams.
pub struct DictionaryWriter {
    dict: Dictionary,
    dict_path: PathBuf,
    segindex_path: PathBuf,
    entry_stream: zstd::stream::write::Encoder<'static, File>,
    segindex_stream: zstd::stream::write::Encoder<'static, File>,
    flushed_entries: usize,
    segindex_blocks: u64,
}

impl DictionaryWriter {
    /// Creates the two backing files and writes placeholder headers.
    pub fn create(
        dict_path: impl Into<PathBuf>,
        segindex_path: impl Into<PathBuf>,
        max_id: DictId,
        compression_level: i32,
    ) -> Result<Self> {
        let dict_path = dict_path.into();
        let segindex_path = segindex_path.into();

        let mut dict_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&dict_path)?;
        dict_file.write_u64::<LittleEndian>(0)?;
        dict_file.write_u64::<LittleEndian>(0)?;

        let mut segindex_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&segindex_path)?;
        segindex_file.write_u64::<LittleEndian>(0)?;

        Ok(Self {
            dict: Dictionary::new(max_id),
            dict_path,
            segindex_path,
            entry_stream: zstd::stream::write::Encoder::new(dict_file, compression_level)?,
            segindex_stream: zstd::stream::write::Encoder::new(segindex_file, compression_level)?,
            flushed_entries: 0,
            segindex_blocks: 0,
        })
    }

    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    pub fn add_occurrence(&mut self, value: &str) -> Result<(DictId, bool)> {
        self.dict.add_occurrence(value)
    }

    /// Writes every entry added since the previous flush. Must run
    /// before any segment referencing those entries seals.
    pub fn flush_pending(&mut self) -> Result<()> {
        for entry in &self.dict.entries[self.flushed_entries..] {
            let bytes = entry.value.as_bytes();
            self.entry_stream
                .write_u32::<LittleEndian>(bytes.len() as u32)?;
            self.entry_stream.write_all(bytes)?;
        }
        self.flushed_entries = self.dict.entries.len();
        self.entry_stream.flush()?;
        Ok(())
    }

    /// Indexes and persists the set of ids occurring in a sealed
    /// segment.
    pub fn index_segment(&mut self, segment_id: u32, ids: &[DictId]) -> Result<()> {
        self.dict.index_segment(segment_id, ids.iter().copied());
        self.segindex_stream.write_u32::<LittleEndian>(segment_id)?;
        self.segindex_stream
            .write_u64::<LittleEndian>(ids.len() as u64)?;
        for &id in ids {
            self.segindex_stream.write_u64::<LittleEndian>(id)?;
        }
        self.segindex_blocks += 1;
        self.segindex_stream.flush()?;
        Ok(())
    }

    /// Finishes both streams and patches the headers. Returns the
    /// dictionary and the total bytes on disk.
    pub fn close(mut self) -> Result<(Dictionary, u64)> {
        self.flush_pending()?;
        debug!(
            entries = self.dict.len(),
            path = %self.dict_path.display(),
            "closing dictionary"
        );

        let mut dict_file = self.entry_stream.finish()?;
        dict_file.flush()?;
        dict_file.seek(SeekFrom::Start(0))?;
        dict_file.write_u64::<LittleEndian>(self.dict.len() as u64)?;
        dict_file.write_u64::<LittleEndian>(0)?;
        dict_file.flush()?;
        let dict_len = dict_file.metadata()?.len();

        let mut segindex_file = self.segindex_stream.finish()?;
        segindex_file.flush()?;
        segindex_file.seek(SeekFrom::Start(0))?;
        segindex_file.write_u64::<LittleEndian>(self.segindex_blocks)?;
        segindex_file.flush()?;
        let segindex_len = segindex_file.metadata()?.len();

        Ok((self.dict, dict_len + segindex_len))
    }
}

/// Loads a dictionary and its segment index from disk.
pub fn read_dictionary(
    dict_path: &Path,
    segindex_path: &Path,
    max_id: DictId,
) -> Result<Dictionary> {
    let mut dict_file = BufReader::new(File::open(dict_path)?);
    let entry_count = dict_file.read_u64::<LittleEndian>().map_err(|_| {
        LogCaskError::CorruptedMetadata(format!("{}: truncated header", dict_path.display()))
    })?;
    let _reserved = dict_file.read_u64::<LittleEndian>().map_err(|_| {
        LogCaskError::CorruptedMetadata(format!("{}: truncated header", dict_path.display()))
    })?;
    if entry_count > max_id {
        return Err(LogCaskError::CorruptedMetadata(format!(
            "{}: entry count {} exceeds the id space",
            dict_path.display(),
            entry_count
        )));
    }

    let mut dict = Dictionary::new(max_id);
    let mut entries = zstd::stream::read::Decoder::new(dict_file)?;
    let mut value = Vec::new();
    for _ in 0..entry_count {
        let len = entries.read_u32::<LittleEndian>().map_err(|_| {
            LogCaskError::CorruptedMetadata(format!(
                "{}: truncated entry block",
                dict_path.display()
            ))
        })?;
        value.resize(len as usize, 0);
        entries.read_exact(&mut value)?;
        let text = std::str::from_utf8(&value).map_err(|_| {
            LogCaskError::CorruptedMetadata(format!(
                "{}: entry is not valid UTF-8",
                dict_path.display()
            ))
        })?;
        dict.add_occurrence(text)?;
    }

    let mut segindex_file = BufReader::new(File::open(segindex_path)?);
    let block_count = segindex_file.read_u64::<LittleEndian>().map_err(|_| {
        LogCaskError::CorruptedMetadata(format!("{}: truncated header", segindex_path.display()))
    })?;
    let mut blocks = zstd::stream::read::Decoder::new(segindex_file)?;
    for _ in 0..block_count {
        let segment_id = blocks.read_u32::<LittleEndian>()?;
        let id_count = blocks.read_u64::<LittleEndian>()?;
        for _ in 0..id_count {
            let id = blocks.read_u64::<LittleEndian>()?;
            dict.index_segment(segment_id, [id]);
        }
    }

    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_is_idempotent() {
        let mut dict = Dictionary::new(MAX_VAR_ID);
        let (id1, new1) = dict.add_occurrence("bin/python2.7.3").unwrap();
        let (id2, new2) = dict.add_occurrence("bin/python2.7.3").unwrap();
        assert_eq!(id1, id2);
        assert!(new1);
        assert!(!new2);
        assert_eq!(dict.lookup_by_id(id1).unwrap(), "bin/python2.7.3");
        assert_eq!(dict.lookup_by_value("bin/python2.7.3"), Some(id1));
        assert_eq!(dict.lookup_by_value("missing"), None);
    }

    #[test]
    fn test_ids_assigned_in_insertion_order() {
        let mut dict = Dictionary::new(MAX_VAR_ID);
        for (i, value) in ["a1", "b2", "c3"].iter().enumerate() {
            let (id, _) = dict.add_occurrence(value).unwrap();
            assert_eq!(id, i as DictId + 1);
        }
    }

    #[test]
    fn test_id_space_exhaustion() {
        let mut dict = Dictionary::new(2);
        dict.add_occurrence("one").unwrap();
        dict.add_occurrence("two").unwrap();
        let err = dict.add_occurrence("three").unwrap_err();
        assert!(matches!(err, LogCaskError::OutOfRange(_)));
    }

    #[test]
    fn test_wildcard_filter() {
        let mut dict = Dictionary::new(MAX_VAR_ID);
        dict.add_occurrence("bin/python2.7.3").unwrap();
        dict.add_occurrence("bin/python3.4.6").unwrap();
        dict.add_occurrence("usr/bin/ls").unwrap();

        let hits = dict.entries_matching_wildcard("bin/python?.*", true);
        let values: Vec<_> = hits.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["bin/python2.7.3", "bin/python3.4.6"]);

        let hits = dict.entries_matching_wildcard("BIN/*", false);
        assert_eq!(hits.len(), 2);
        assert!(dict.entries_matching_wildcard("BIN/*", true).is_empty());
    }

    #[test]
    fn test_segment_set() {
        let mut set = SegmentSet::new();
        set.insert(0);
        set.insert(63);
        set.insert(64);
        set.insert(200);
        assert!(set.contains(0) && set.contains(63) && set.contains(64) && set.contains(200));
        assert!(!set.contains(1));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 63, 64, 200]);

        let other: SegmentSet = [63, 200, 500].into_iter().collect();
        let both = set.intersection(&other);
        assert_eq!(both.iter().collect::<Vec<_>>(), vec![63, 200]);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempdir().unwrap();
        let dict_path = dir.path().join("var.dict");
        let segindex_path = dir.path().join("var.segindex");

        let mut writer =
            DictionaryWriter::create(&dict_path, &segindex_path, MAX_VAR_ID, 3).unwrap();
        let (a, _) = writer.add_occurrence("alpha9").unwrap();
        let (b, _) = writer.add_occurrence("beta42").unwrap();
        writer.flush_pending().unwrap();
        writer.index_segment(0, &[a]).unwrap();
        writer.index_segment(1, &[a, b]).unwrap();
        writer.close().unwrap();

        let dict = read_dictionary(&dict_path, &segindex_path, MAX_VAR_ID).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.lookup_by_id(a).unwrap(), "alpha9");
        assert_eq!(dict.lookup_by_id(b).unwrap(), "beta42");
        let entry = dict.entry_by_id(a).unwrap();
        assert_eq!(entry.segments.iter().collect::<Vec<_>>(), vec![0, 1]);
        let entry = dict.entry_by_id(b).unwrap();
        assert_eq!(entry.segments.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_corrupted_header() {
        let dir = tempdir().unwrap();
        let dict_path = dir.path().join("bad.dict");
        let segindex_path = dir.path().join("bad.segindex");
        std::fs::write(&dict_path, b"short").unwrap();
        std::fs::write(&segindex_path, b"").unwrap();
        let err = read_dictionary(&dict_path, &segindex_path, MAX_VAR_ID).unwrap_err();
        assert!(matches!(err, LogCaskError::CorruptedMetadata(_)));
    }
}
