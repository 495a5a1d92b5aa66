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

//! Archive and file metadata
//!
//! `metadata` sits uncompressed at the archive root and is rewritten in
//! place after each segment seal, so a crash between seals leaves a
//! consistent view of the already-sealed segments. `logs/` holds one
//! JSON metadata record per ingested input file; a segment is visible to
//! readers only once the metadata that references it is on disk.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use logcask_core::timestamp::EpochTimeMs;
use logcask_core::{LogCaskError, Result};

/// Archive format version checked exactly on open.
pub const FORMAT_VERSION: u32 = 1;

const METADATA_MAGIC: u32 = 0x4C43_4152; // "LCAR"

/// Top-level archive metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMetadata {
    pub format_version: u32,
    /// UUID string identifying the archive.
    pub archive_id: String,
    pub creator_id: String,
    /// Monotonic creation counter supplied by the creator.
    pub creation_num: u64,
    pub begin_timestamp: EpochTimeMs,
    pub end_timestamp: EpochTimeMs,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub num_segments: u32,
    pub num_log_events: u64,
}

impl ArchiveMetadata {
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_u32::<LittleEndian>(METADATA_MAGIC)?;
        file.write_u32::<LittleEndian>(self.format_version)?;
        write_string(&mut file, &self.archive_id)?;
        write_string(&mut file, &self.creator_id)?;
        file.write_u64::<LittleEndian>(self.creation_num)?;
        file.write_i64::<LittleEndian>(self.begin_timestamp)?;
        file.write_i64::<LittleEndian>(self.end_timestamp)?;
        file.write_u64::<LittleEndian>(self.uncompressed_size)?;
        file.write_u64::<LittleEndian>(self.compressed_size)?;
        file.write_u32::<LittleEndian>(self.num_segments)?;
        file.write_u64::<LittleEndian>(self.num_log_events)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogCaskError::FileNotFound(path.display().to_string())
            } else {
                LogCaskError::Io(e)
            }
        })?;
        let magic = file
            .read_u32::<LittleEndian>()
            .map_err(|_| LogCaskError::CorruptedMetadata("truncated archive metadata".into()))?;
        if magic != METADATA_MAGIC {
            return Err(LogCaskError::CorruptedMetadata(
                "bad archive metadata magic".into(),
            ));
        }
        let format_version = file.read_u32::<LittleEndian>()?;
        if format_version != FORMAT_VERSION {
            return Err(LogCaskError::UnsupportedVersion(format!(
                "archive format {format_version}"
            )));
        }
        Ok(Self {
            format_version,
            archive_id: read_string(&mut file)?,
            creator_id: read_string(&mut file)?,
            creation_num: file.read_u64::<LittleEndian>()?,
            begin_timestamp: file.read_i64::<LittleEndian>()?,
            end_timestamp: file.read_i64::<LittleEndian>()?,
            uncompressed_size: file.read_u64::<LittleEndian>()?,
            compressed_size: file.read_u64::<LittleEndian>()?,
            num_segments: file.read_u32::<LittleEndian>()?,
            num_log_events: file.read_u64::<LittleEndian>()?,
        })
    }
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    if len > 4096 {
        return Err(LogCaskError::CorruptedMetadata(
            "metadata string is implausibly long".into(),
        ));
    }
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|_| LogCaskError::CorruptedMetadata("metadata string is not UTF-8".into()))
}

/// Writer-side lifecycle of one ingested input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileState {
    /// Accepting records.
    Open,
    /// Finished; its records sit in the open (unsealed) segment.
    AppendingToSegment,
    /// Every record is in a sealed segment.
    InSealedSegment,
    /// Metadata has been persisted.
    MetadataClean,
}

/// Metadata record for one ingested input file, stored under `logs/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    pub file_id: u64,
    pub orig_path: String,
    pub num_messages: u64,
    /// Global log-event index range `[begin, end)`.
    pub begin_message_ix: u64,
    pub end_message_ix: u64,
    pub begin_timestamp: EpochTimeMs,
    pub end_timestamp: EpochTimeMs,
    pub segment_ids: Vec<u32>,
    pub state: FileState,
}

impl FileMetadata {
    pub fn write_to_dir(&self, logs_dir: &Path) -> Result<()> {
        let path = logs_dir.join(format!("{}.json", self.file_id));
        let bytes = serde_json::to_vec(self)
            .map_err(|e| LogCaskError::CorruptedMetadata(e.to_string()))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn read_dir_entries(logs_dir: &Path) -> Result<Vec<FileMetadata>> {
        let mut out = Vec::new();
        if !logs_dir.exists() {
            return Ok(out);
        }
        for entry in std::fs::read_dir(logs_dir)? {
            let entry = entry?;
            if entry.path().extension().is_none_or(|e| e != "json") {
                continue;
            }
            let bytes = std::fs::read(entry.path())?;
            let meta: FileMetadata = serde_json::from_slice(&bytes)
                .map_err(|e| LogCaskError::CorruptedMetadata(e.to_string()))?;
            out.push(meta);
        }
        out.sort_by_key(|m| m.file_id);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_metadata_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata");
        let meta = ArchiveMetadata {
            format_version: FORMAT_VERSION,
            archive_id: "0a1b2c".into(),
            creator_id: "writer-1".into(),
            creation_num: 7,
            begin_timestamp: 100,
            end_timestamp: 900,
            uncompressed_size: 4096,
            compressed_size: 512,
            num_segments: 2,
            num_log_events: 1000,
        };
        meta.write_to_file(&path).unwrap();
        assert_eq!(ArchiveMetadata::read_from_file(&path).unwrap(), meta);
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata");
        let mut meta = ArchiveMetadata {
            format_version: FORMAT_VERSION,
            archive_id: String::new(),
            creator_id: String::new(),
            creation_num: 0,
            begin_timestamp: 0,
            end_timestamp: 0,
            uncompressed_size: 0,
            compressed_size: 0,
            num_segments: 0,
            num_log_events: 0,
        };
        meta.format_version = 99;
        meta.write_to_file(&path).unwrap();
        assert!(matches!(
            ArchiveMetadata::read_from_file(&path).unwrap_err(),
            LogCaskError::UnsupportedVersion(_)
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ArchiveMetadata::read_from_file(&dir.path().join("nope")).unwrap_err(),
            LogCaskError::FileNotFound(_)
        ));
    }

    #[test]
    fn test_file_metadata_roundtrip() {
        let dir = tempdir().unwrap();
        let meta = FileMetadata {
            file_id: 3,
            orig_path: "/var/log/app.jsonl".into(),
            num_messages: 10,
            begin_message_ix: 20,
            end_message_ix: 30,
            begin_timestamp: 1,
            end_timestamp: 2,
            segment_ids: vec![0, 1],
            state: FileState::MetadataClean,
        };
        meta.write_to_dir(dir.path()).unwrap();
        let all = FileMetadata::read_dir_entries(dir.path()).unwrap();
        assert_eq!(all, vec![meta]);
    }
}
