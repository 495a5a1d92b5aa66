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

//! End-to-end archive tests: compress, reopen, decompress.

use serde_json::{json, Value};
use tempfile::tempdir;

use logcask_archive::ordered::CollectingRecordSink;
use logcask_archive::{decompress_ordered, ArchiveReader, ArchiveWriter, ArchiveWriterConfig};

fn canonical(value: &Value) -> String {
    // Default serde_json maps are key-sorted, so this is canonical.
    serde_json::to_string(value).unwrap()
}

fn compress(records: &[Value], dir: &std::path::Path, segment_size: u64) -> String {
    let mut config = ArchiveWriterConfig::new(dir);
    config.target_segment_size = segment_size;
    config.creator_id = "test-writer".into();
    let mut writer = ArchiveWriter::create(config).unwrap();
    writer.start_file("input.jsonl").unwrap();
    for record in records {
        writer.ingest_record(record).unwrap();
    }
    let metadata = writer.close().unwrap();
    assert_eq!(metadata.num_log_events, records.len() as u64);
    metadata.archive_id
}

fn open_loaded(dir: &std::path::Path, archive_id: &str) -> ArchiveReader {
    let mut reader = ArchiveReader::open(dir.join(archive_id)).unwrap();
    reader.read_dictionaries_and_metadata().unwrap();
    reader
}

fn heterogeneous_records() -> Vec<Value> {
    vec![
        json!({
            "timestamp": "2023-05-01 10:00:00,000",
            "level": "INFO",
            "message": "job 17 finished in 2.5 ms on node-3",
            "attempt": 1,
        }),
        json!({
            "timestamp": "2023-05-01 10:00:01,500",
            "level": "WARN",
            "message": "job 18 retried after 0.75 s",
            "ctx": {"host": "worker-9", "free_mem": 12345, "swapping": false},
        }),
        json!({
            "timestamp": "2023-05-01 10:00:02,000",
            "level": "ERROR",
            "message": "job 19 failed",
            "ctx": {"host": "worker-9", "free_mem": 11111, "swapping": true},
            "tags": [1, 2, 3],
            "detail": null,
            "extra": {},
        }),
        json!({
            "timestamp": "2023-05-01 10:00:03,250",
            "level": "INFO",
            "events": [
                {"kind": "open", "fd": 3},
                {"kind": "close", "fd": 3, "meta": {"dirty": true}},
            ],
        }),
        // Same signature as the first record: shares its columns.
        json!({
            "timestamp": "2023-05-01 10:00:04,000",
            "level": "DEBUG",
            "message": "job 20 finished in 0.1 ms on node-7",
            "attempt": 2,
        }),
    ]
}

#[test]
fn unordered_roundtrip_preserves_records() {
    let dir = tempdir().unwrap();
    let records = heterogeneous_records();
    let archive_id = compress(&records, dir.path(), u64::MAX);
    let reader = open_loaded(dir.path(), &archive_id);

    let mut decompressed: Vec<String> = Vec::new();
    for mut table in reader.read_all_tables(true).unwrap() {
        while let Some((_, message)) = table.next_message().unwrap() {
            let value: Value = serde_json::from_str(&message).unwrap();
            decompressed.push(canonical(&value));
        }
    }
    let mut expected: Vec<String> = records.iter().map(canonical).collect();
    decompressed.sort();
    expected.sort();
    assert_eq!(decompressed, expected);
}

#[test]
fn ordered_roundtrip_restores_log_order() {
    let dir = tempdir().unwrap();
    let records = heterogeneous_records();
    let archive_id = compress(&records, dir.path(), u64::MAX);
    let reader = open_loaded(dir.path(), &archive_id);

    let out_dir = dir.path().join("out");
    let chunks = decompress_ordered(&reader, &out_dir, 0, None).unwrap();
    assert_eq!(chunks.len(), 1);

    let contents = std::fs::read_to_string(&chunks[0]).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), records.len());
    for (line, record) in lines.iter().zip(&records) {
        let value: Value = serde_json::from_str(line).unwrap();
        assert_eq!(canonical(&value), canonical(record));
    }
    assert!(contents.ends_with('\n'), "last chunk keeps its newline");
}

#[test]
fn multiple_segments_roundtrip() {
    let dir = tempdir().unwrap();
    let mut records = Vec::new();
    for i in 0..200 {
        records.push(json!({
            "timestamp": 1_700_000_000_000i64 + i,
            "message": format!("request {i} served in {}.5 ms", i % 9),
            "status": if i % 2 == 0 { 200 } else { 500 },
        }));
    }
    // A tiny segment target forces many seals.
    let archive_id = compress(&records, dir.path(), 512);
    let reader = open_loaded(dir.path(), &archive_id);
    assert!(
        reader.metadata().num_segments > 1,
        "expected more than one segment, got {}",
        reader.metadata().num_segments
    );

    let out_dir = dir.path().join("out");
    let chunks = decompress_ordered(&reader, &out_dir, 0, None).unwrap();
    let contents = std::fs::read_to_string(&chunks[0]).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), records.len());
    for (line, record) in lines.iter().zip(&records) {
        let value: Value = serde_json::from_str(line).unwrap();
        assert_eq!(canonical(&value), canonical(record));
    }
}

#[test]
fn ordered_chunking_rolls_over() {
    let dir = tempdir().unwrap();
    let mut records = Vec::new();
    for i in 0..5_000i64 {
        records.push(json!({
            "timestamp": 1_700_000_000_000i64 + i,
            "message": format!("event {i}"),
        }));
    }
    let archive_id = compress(&records, dir.path(), u64::MAX);
    let reader = open_loaded(dir.path(), &archive_id);

    let out_dir = dir.path().join("out");
    let mut sink = CollectingRecordSink::default();
    let chunks = decompress_ordered(&reader, &out_dir, 2_000, Some(&mut sink)).unwrap();

    let names: Vec<String> = chunks
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            format!("{archive_id}_0_2000.jsonl"),
            format!("{archive_id}_2000_4000.jsonl"),
            format!("{archive_id}_4000_5000.jsonl"),
        ]
    );

    assert_eq!(sink.documents.len(), 3);
    assert!(sink.documents[..2].iter().all(|d| !d.is_last_chunk));
    assert!(sink.documents[2].is_last_chunk);
    assert_eq!(sink.documents[2].begin_msg_ix, 4_000);
    assert_eq!(sink.documents[2].end_msg_ix, 5_000);

    let total_lines: usize = chunks
        .iter()
        .map(|p| std::fs::read_to_string(p).unwrap().lines().count())
        .sum();
    assert_eq!(total_lines, 5_000);
}

#[test]
fn second_writer_is_rejected() {
    let dir = tempdir().unwrap();
    let mut config = ArchiveWriterConfig::new(dir.path());
    config.archive_id = Some("fixed-id".into());
    let _writer = ArchiveWriter::create(config.clone()).unwrap();

    let err = ArchiveWriter::create(config).unwrap_err();
    assert!(matches!(
        err,
        logcask_core::LogCaskError::AlreadyOpen(_)
    ));
}

#[test]
fn file_metadata_is_persisted() {
    let dir = tempdir().unwrap();
    let records = heterogeneous_records();
    let archive_id = compress(&records, dir.path(), u64::MAX);
    let reader = open_loaded(dir.path(), &archive_id);

    let files = reader.files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].orig_path, "input.jsonl");
    assert_eq!(files[0].num_messages, records.len() as u64);
    assert_eq!(files[0].begin_message_ix, 0);
    assert_eq!(files[0].end_message_ix, records.len() as u64);
    assert_eq!(files[0].state, logcask_archive::FileState::MetadataClean);
}
