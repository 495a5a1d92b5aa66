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

//! Log-order decompression
//!
//! Each schema table keeps its rows in record-insertion order and knows
//! the global log-event index of every row, so a min-heap over one
//! reader per table yields records in original log order. Output rolls
//! over every `chunk_size` records: the in-progress file is renamed to
//! `<archive>_<begin>_<end>.jsonl` and a chunk document is reported to
//! the optional record store.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use logcask_core::{LogCaskError, Result};

use crate::reader::ArchiveReader;

/// One finished chunk, as reported to the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDocument {
    pub path: String,
    pub orig_file_id: String,
    pub begin_msg_ix: u64,
    pub end_msg_ix: u64,
    pub is_last_chunk: bool,
}

/// Optional sink for chunk metadata. A failure here is fatal to the
/// decompression session (already-written chunks stay on disk), but the
/// archive itself is untouched.
pub trait RecordSink {
    fn insert_many(&mut self, documents: &[ChunkDocument]) -> Result<()>;
}

/// Collects chunk documents in memory.
#[derive(Debug, Default)]
pub struct CollectingRecordSink {
    pub documents: Vec<ChunkDocument>,
}

impl RecordSink for CollectingRecordSink {
    fn insert_many(&mut self, documents: &[ChunkDocument]) -> Result<()> {
        self.documents.extend(documents.iter().cloned());
        Ok(())
    }
}

/// Decompresses the whole archive in log-event order, rolling the
/// output every `chunk_size` records (0 means a single chunk). Returns
/// the chunk paths in order.
pub fn decompress_ordered(
    reader: &ArchiveReader,
    output_dir: &Path,
    chunk_size: u64,
    mut sink: Option<&mut dyn RecordSink>,
) -> Result<Vec<PathBuf>> {
    let archive_id = reader.metadata().archive_id.clone();
    let chunk_size = if chunk_size == 0 { u64::MAX } else { chunk_size };
    std::fs::create_dir_all(output_dir)?;

    let mut tables = reader.read_all_tables(true)?;
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();
    for (ix, table) in tables.iter().enumerate() {
        if let Some(next) = table.next_log_event_idx() {
            heap.push(Reverse((next, ix)));
        }
    }

    let in_progress_path = output_dir.join(format!("{archive_id}.inprogress"));
    let mut out: Option<BufWriter<File>> = None;
    let mut chunk_begin: u64 = 0;
    let mut last_ix: u64 = 0;
    let mut in_chunk: u64 = 0;
    let mut chunks: Vec<PathBuf> = Vec::new();
    let mut documents: Vec<ChunkDocument> = Vec::new();

    while let Some(Reverse((expected_ix, table_ix))) = heap.pop() {
        let table = &mut tables[table_ix];
        let (event_ix, message) = table.next_message()?.ok_or_else(|| {
            LogCaskError::CorruptedArchive("table exhausted while still queued".into())
        })?;
        debug_assert_eq!(event_ix, expected_ix);
        if let Some(next) = table.next_log_event_idx() {
            heap.push(Reverse((next, table_ix)));
        }

        if out.is_none() {
            chunk_begin = event_ix;
            in_chunk = 0;
            out = Some(BufWriter::new(File::create(&in_progress_path)?));
        }
        let writer = out.as_mut().expect("chunk file just ensured");
        writer.write_all(message.as_bytes())?;
        writer.write_all(b"\n")?;
        last_ix = event_ix;
        in_chunk += 1;

        if in_chunk >= chunk_size {
            let writer = out.take().expect("chunk in progress");
            let path = finish_chunk(
                writer,
                &in_progress_path,
                output_dir,
                &archive_id,
                chunk_begin,
                last_ix + 1,
            )?;
            documents.push(ChunkDocument {
                path: path.display().to_string(),
                orig_file_id: archive_id.clone(),
                begin_msg_ix: chunk_begin,
                end_msg_ix: last_ix + 1,
                is_last_chunk: false,
            });
            chunks.push(path);
        }
    }

    if let Some(writer) = out.take() {
        let path = finish_chunk(
            writer,
            &in_progress_path,
            output_dir,
            &archive_id,
            chunk_begin,
            last_ix + 1,
        )?;
        documents.push(ChunkDocument {
            path: path.display().to_string(),
            orig_file_id: archive_id.clone(),
            begin_msg_ix: chunk_begin,
            end_msg_ix: last_ix + 1,
            is_last_chunk: false,
        });
        chunks.push(path);
    }

    if let Some(last) = documents.last_mut() {
        last.is_last_chunk = true;
    }
    if let Some(sink) = sink.as_deref_mut() {
        sink.insert_many(&documents)?;
    }

    info!(archive = %archive_id, chunks = chunks.len(), "ordered decompression finished");
    Ok(chunks)
}

fn finish_chunk(
    mut writer: BufWriter<File>,
    in_progress_path: &Path,
    output_dir: &Path,
    archive_id: &str,
    begin: u64,
    end: u64,
) -> Result<PathBuf> {
    writer.flush()?;
    drop(writer);
    let final_path = output_dir.join(format!("{archive_id}_{begin}_{end}.jsonl"));
    std::fs::rename(in_progress_path, &final_path)?;
    debug!(path = %final_path.display(), "chunk rolled over");
    Ok(final_path)
}
