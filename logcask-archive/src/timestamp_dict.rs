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

//! Timestamp dictionary
//!
//! Recognizes timestamp formats in string columns and tracks, per
//! timestamp column, the min/max epoch range. Previously seen patterns
//! are tried before the known-pattern table, so one hot pattern costs a
//! single parse attempt per value. On write, per-column ranges merge by
//! key name.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use logcask_core::timestamp::{search_known_patterns, EpochTimeMs, TimestampPattern};
use logcask_core::{LogCaskError, Result};

use crate::schema_tree::NodeId;

/// Range entry for one timestamp column (or one merged key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampEntry {
    pub key: String,
    pub column_ids: BTreeSet<NodeId>,
    pub begin: EpochTimeMs,
    pub end: EpochTimeMs,
}

impl TimestampEntry {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            column_ids: BTreeSet::new(),
            begin: EpochTimeMs::MAX,
            end: EpochTimeMs::MIN,
        }
    }

    fn ingest(&mut self, epoch: EpochTimeMs) {
        self.begin = self.begin.min(epoch);
        self.end = self.end.max(epoch);
    }

    fn merge(&mut self, other: &TimestampEntry) {
        self.begin = self.begin.min(other.begin);
        self.end = self.end.max(other.end);
        self.column_ids.extend(&other.column_ids);
    }

    /// Whether `[begin, end]` overlaps the given query range.
    pub fn overlaps(&self, begin: EpochTimeMs, end: EpochTimeMs) -> bool {
        self.begin <= end && begin <= self.end
    }
}

/// The per-archive timestamp dictionary.
#[derive(Debug, Default)]
pub struct TimestampDictionary {
    patterns: Vec<TimestampPattern>,
    pattern_ids: HashMap<String, u64>,
    column_ranges: HashMap<NodeId, TimestampEntry>,
}

impl TimestampDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern_pattern(&mut self, pattern: TimestampPattern) -> u64 {
        if let Some(&id) = self.pattern_ids.get(pattern.format()) {
            return id;
        }
        let id = self.patterns.len() as u64;
        self.pattern_ids.insert(pattern.format().to_owned(), id);
        self.patterns.push(pattern);
        id
    }

    pub fn pattern(&self, id: u64) -> Result<&TimestampPattern> {
        self.patterns
            .get(id as usize)
            .ok_or_else(|| LogCaskError::OutOfRange(format!("timestamp pattern {id}")))
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Parses a timestamp string and interns its pattern without
    /// recording a column range. Seen patterns are tried first.
    pub fn parse_and_intern(&mut self, text: &str) -> Option<(EpochTimeMs, u64)> {
        for (id, pattern) in self.patterns.iter().enumerate() {
            if let Some(epoch) = pattern.parse(text) {
                return Some((epoch, id as u64));
            }
        }
        let (pattern, epoch) = search_known_patterns(text)?;
        let id = self.intern_pattern(pattern);
        Some((epoch, id))
    }

    /// Parses a timestamp string for the column `(key, node_id)`.
    /// Returns the epoch and the pattern id, or `None` if no pattern
    /// matches.
    pub fn ingest_text(
        &mut self,
        key: &str,
        node_id: NodeId,
        text: &str,
    ) -> Option<(EpochTimeMs, u64)> {
        let (epoch, id) = self.parse_and_intern(text)?;
        self.record(key, node_id, epoch);
        Some((epoch, id))
    }

    /// Records a numeric epoch-ms timestamp for a column.
    pub fn ingest_epoch(&mut self, key: &str, node_id: NodeId, epoch: EpochTimeMs) {
        self.record(key, node_id, epoch);
    }

    fn record(&mut self, key: &str, node_id: NodeId, epoch: EpochTimeMs) {
        let entry = self
            .column_ranges
            .entry(node_id)
            .or_insert_with(|| TimestampEntry::new(key));
        entry.column_ids.insert(node_id);
        entry.ingest(epoch);
    }

    /// Whether `node_id` is a recognized timestamp column.
    pub fn is_timestamp_column(&self, node_id: NodeId) -> bool {
        self.column_ranges.contains_key(&node_id)
    }

    /// Per-key merged ranges.
    pub fn merged_ranges(&self) -> BTreeMap<String, TimestampEntry> {
        let mut merged: BTreeMap<String, TimestampEntry> = BTreeMap::new();
        for entry in self.column_ranges.values() {
            merged
                .entry(entry.key.clone())
                .and_modify(|e| e.merge(entry))
                .or_insert_with(|| entry.clone());
        }
        merged
    }

    /// Earliest timestamp across all columns, 0 if none were seen.
    pub fn begin_timestamp(&self) -> EpochTimeMs {
        self.column_ranges
            .values()
            .map(|e| e.begin)
            .min()
            .unwrap_or(0)
    }

    /// Latest timestamp across all columns, 0 if none were seen.
    pub fn end_timestamp(&self) -> EpochTimeMs {
        self.column_ranges
            .values()
            .map(|e| e.end)
            .max()
            .unwrap_or(0)
    }

    pub fn write_to_file(&self, path: &Path, compression_level: i32) -> Result<u64> {
        let file = File::create(path)?;
        let mut w = zstd::stream::write::Encoder::new(file, compression_level)?;

        let merged = self.merged_ranges();
        w.write_u64::<LittleEndian>(merged.len() as u64)?;
        for entry in merged.values() {
            w.write_u32::<LittleEndian>(entry.key.len() as u32)?;
            w.write_all(entry.key.as_bytes())?;
            w.write_u64::<LittleEndian>(entry.column_ids.len() as u64)?;
            for &id in &entry.column_ids {
                w.write_u32::<LittleEndian>(id)?;
            }
            w.write_i64::<LittleEndian>(entry.begin)?;
            w.write_i64::<LittleEndian>(entry.end)?;
        }

        w.write_u64::<LittleEndian>(self.patterns.len() as u64)?;
        for pattern in &self.patterns {
            let format = pattern.format().as_bytes();
            w.write_u32::<LittleEndian>(format.len() as u32)?;
            w.write_all(format)?;
        }
        let file = w.finish()?;
        Ok(file.metadata()?.len())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        let mut r = zstd::stream::read::Decoder::new(file)?;
        let mut dict = TimestampDictionary::new();

        let num_entries = r
            .read_u64::<LittleEndian>()
            .map_err(|_| LogCaskError::CorruptedMetadata("truncated timestamp dict".into()))?;
        let mut buf = Vec::new();
        for _ in 0..num_entries {
            let key_len = r.read_u32::<LittleEndian>()? as usize;
            buf.resize(key_len, 0);
            r.read_exact(&mut buf)?;
            let key = String::from_utf8(buf.clone()).map_err(|_| {
                LogCaskError::CorruptedMetadata("timestamp key is not UTF-8".into())
            })?;
            let num_ids = r.read_u64::<LittleEndian>()?;
            let mut ids = BTreeSet::new();
            for _ in 0..num_ids {
                ids.insert(r.read_u32::<LittleEndian>()?);
            }
            let begin = r.read_i64::<LittleEndian>()?;
            let end = r.read_i64::<LittleEndian>()?;
            for &id in &ids {
                let entry = dict.column_ranges.entry(id).or_insert_with(|| {
                    let mut e = TimestampEntry::new(&key);
                    e.begin = begin;
                    e.end = end;
                    e
                });
                entry.column_ids = ids.clone();
                entry.begin = entry.begin.min(begin);
                entry.end = entry.end.max(end);
            }
        }

        let num_patterns = r.read_u64::<LittleEndian>()?;
        for _ in 0..num_patterns {
            let len = r.read_u32::<LittleEndian>()? as usize;
            buf.resize(len, 0);
            r.read_exact(&mut buf)?;
            let format = String::from_utf8(buf.clone()).map_err(|_| {
                LogCaskError::CorruptedMetadata("timestamp pattern is not UTF-8".into())
            })?;
            dict.intern_pattern(TimestampPattern::new(format));
        }
        Ok(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ingest_text_and_ranges() {
        let mut dict = TimestampDictionary::new();
        let (epoch1, pattern1) = dict
            .ingest_text("timestamp", 4, "2023-01-15 08:30:00,123")
            .unwrap();
        let (epoch2, pattern2) = dict
            .ingest_text("timestamp", 4, "2023-01-15 08:31:00,000")
            .unwrap();
        assert_eq!(pattern1, pattern2, "seen pattern is reused");
        assert!(epoch2 > epoch1);
        assert_eq!(dict.begin_timestamp(), epoch1);
        assert_eq!(dict.end_timestamp(), epoch2);
        assert!(dict.is_timestamp_column(4));
        assert!(!dict.is_timestamp_column(5));

        assert!(dict.ingest_text("timestamp", 4, "not a date").is_none());
    }

    #[test]
    fn test_pattern_roundtrips_original_text() {
        let mut dict = TimestampDictionary::new();
        let text = "2023-06-01T00:00:00.250";
        let (epoch, pattern_id) = dict.ingest_text("ts", 2, text).unwrap();
        assert_eq!(dict.pattern(pattern_id).unwrap().render(epoch), text);
    }

    #[test]
    fn test_merge_by_key() {
        let mut dict = TimestampDictionary::new();
        dict.ingest_epoch("ts", 3, 100);
        dict.ingest_epoch("ts", 9, 50);
        dict.ingest_epoch("other", 5, 70);

        let merged = dict.merged_ranges();
        assert_eq!(merged.len(), 2);
        let ts = &merged["ts"];
        assert_eq!(ts.begin, 50);
        assert_eq!(ts.end, 100);
        assert_eq!(ts.column_ids.iter().copied().collect::<Vec<_>>(), vec![3, 9]);
        assert!(ts.overlaps(90, 200));
        assert!(!ts.overlaps(101, 200));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timestamp.dict");

        let mut dict = TimestampDictionary::new();
        dict.ingest_text("timestamp", 4, "2023-01-15 08:30:00,123")
            .unwrap();
        dict.ingest_epoch("epoch", 7, 1_700_000_000_000);
        dict.write_to_file(&path, 3).unwrap();

        let loaded = TimestampDictionary::read_from_file(&path).unwrap();
        assert_eq!(loaded.begin_timestamp(), dict.begin_timestamp());
        assert_eq!(loaded.end_timestamp(), dict.end_timestamp());
        assert_eq!(loaded.num_patterns(), 1);
        assert!(loaded.is_timestamp_column(4));
        assert!(loaded.is_timestamp_column(7));
    }
}
