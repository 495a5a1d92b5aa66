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

//! Segments
//!
//! An immutable unit written once per seal: one file under `segments/`
//! holding the compressed column tables of one or more schema
//! signatures. A plain table-of-contents heads the file so a reader can
//! decompress exactly the tables it needs, in offset order.
//!
//! ## Layout
//!
//! ```text
//! u32 table_count
//! per table: { u32 schema_id, u64 num_messages, u64 offset, u64 len }
//! table_count zstd frames, one per table, at the recorded offsets
//! ```

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use logcask_core::{LogCaskError, Result};

use crate::schema::SchemaId;

/// TOC row for one schema table inside a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTocEntry {
    pub schema_id: SchemaId,
    pub num_messages: u64,
    /// File offset of the table's compressed bytes.
    pub offset: u64,
    /// Compressed length in bytes.
    pub len: u64,
}

/// One serialized (still uncompressed) schema table, ready to seal.
pub struct PendingTable {
    pub schema_id: SchemaId,
    pub num_messages: u64,
    pub bytes: Vec<u8>,
}

/// Writes a sealed segment file; returns its TOC and compressed size.
pub fn write_segment(
    path: &Path,
    tables: &[PendingTable],
    compression_level: i32,
) -> Result<(Vec<SegmentTocEntry>, u64)> {
    let mut compressed: Vec<Vec<u8>> = Vec::with_capacity(tables.len());
    for table in tables {
        compressed.push(
            zstd::bulk::compress(&table.bytes, compression_level)
                .map_err(|e| LogCaskError::Io(std::io::Error::other(e)))?,
        );
    }

    let header_len = 4 + 28 * tables.len() as u64;
    let mut toc = Vec::with_capacity(tables.len());
    let mut offset = header_len;
    for (table, bytes) in tables.iter().zip(&compressed) {
        toc.push(SegmentTocEntry {
            schema_id: table.schema_id,
            num_messages: table.num_messages,
            offset,
            len: bytes.len() as u64,
        });
        offset += bytes.len() as u64;
    }

    let mut file = File::create(path)?;
    file.write_u32::<LittleEndian>(tables.len() as u32)?;
    for entry in &toc {
        file.write_u32::<LittleEndian>(entry.schema_id)?;
        file.write_u64::<LittleEndian>(entry.num_messages)?;
        file.write_u64::<LittleEndian>(entry.offset)?;
        file.write_u64::<LittleEndian>(entry.len)?;
    }
    for bytes in &compressed {
        file.write_all(bytes)?;
    }
    file.flush()?;
    file.sync_all()?;

    debug!(path = %path.display(), tables = tables.len(), bytes = offset, "sealed segment");
    Ok((toc, offset))
}

/// Read-side handle to one segment file.
#[derive(Debug)]
pub struct SegmentReader {
    path: PathBuf,
    toc: Vec<SegmentTocEntry>,
}

impl SegmentReader {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = BufReader::new(File::open(&path)?);
        let count = file.read_u32::<LittleEndian>().map_err(|_| {
            LogCaskError::CorruptedArchive(format!("{}: truncated TOC", path.display()))
        })?;
        let mut toc = Vec::with_capacity(count as usize);
        for _ in 0..count {
            toc.push(SegmentTocEntry {
                schema_id: file.read_u32::<LittleEndian>()?,
                num_messages: file.read_u64::<LittleEndian>()?,
                offset: file.read_u64::<LittleEndian>()?,
                len: file.read_u64::<LittleEndian>()?,
            });
        }
        Ok(Self { path, toc })
    }

    /// TOC entries in file-offset order, so sequential reads never seek
    /// backwards.
    pub fn toc(&self) -> &[SegmentTocEntry] {
        &self.toc
    }

    pub fn toc_entry(&self, schema_id: SchemaId) -> Result<&SegmentTocEntry> {
        self.toc
            .iter()
            .find(|e| e.schema_id == schema_id)
            .ok_or_else(|| {
                LogCaskError::OutOfRange(format!(
                    "schema {schema_id} is not present in {}",
                    self.path.display()
                ))
            })
    }

    /// Decompresses one schema table into memory. The buffer belongs to
    /// the caller's read session.
    pub fn read_table(&self, schema_id: SchemaId) -> Result<(Vec<u8>, u64)> {
        let entry = self.toc_entry(schema_id)?.clone();
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(entry.offset))?;
        let mut compressed = vec![0u8; entry.len as usize];
        file.read_exact(&mut compressed)?;
        let bytes = zstd::stream::decode_all(compressed.as_slice()).map_err(|e| {
            LogCaskError::CorruptedArchive(format!(
                "{}: schema {schema_id} table: {e}",
                self.path.display()
            ))
        })?;
        Ok((bytes, entry.num_messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_segment_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");

        let tables = vec![
            PendingTable {
                schema_id: 0,
                num_messages: 2,
                bytes: b"first table bytes".to_vec(),
            },
            PendingTable {
                schema_id: 3,
                num_messages: 5,
                bytes: vec![0xAB; 4096],
            },
        ];
        let (toc, total) = write_segment(&path, &tables, 3).unwrap();
        assert_eq!(toc.len(), 2);
        assert_eq!(total, std::fs::metadata(&path).unwrap().len());
        assert!(toc[0].offset < toc[1].offset);

        let reader = SegmentReader::open(&path).unwrap();
        assert_eq!(reader.toc(), toc.as_slice());

        let (bytes, rows) = reader.read_table(0).unwrap();
        assert_eq!(bytes, b"first table bytes");
        assert_eq!(rows, 2);
        let (bytes, rows) = reader.read_table(3).unwrap();
        assert_eq!(bytes, vec![0xAB; 4096]);
        assert_eq!(rows, 5);

        assert!(reader.read_table(9).is_err());
    }

    #[test]
    fn test_truncated_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad");
        std::fs::write(&path, b"xy").unwrap();
        assert!(matches!(
            SegmentReader::open(&path).unwrap_err(),
            LogCaskError::CorruptedArchive(_)
        ));
    }
}
