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

//! Compress-then-search tests over a real archive directory.

use std::sync::atomic::AtomicBool;

use serde_json::json;
use tempfile::tempdir;

use logcask_archive::{ArchiveReader, ArchiveWriter, ArchiveWriterConfig};
use logcask_search::{search_archive, CollectingOutputHandler, SearchConfig};

fn build_archive(dir: &std::path::Path) -> ArchiveReader {
    let mut config = ArchiveWriterConfig::new(dir);
    config.creator_id = "search-test".into();
    let mut writer = ArchiveWriter::create(config).unwrap();
    writer.start_file("app.jsonl").unwrap();
    let records = [
        json!({
            "timestamp": 1_000,
            "msg": "exec bin/python2.7.3 took 14 ms",
        }),
        json!({
            "timestamp": 2_000,
            "msg": "exec bin/python3.4.6 took 15 ms",
        }),
        json!({
            "timestamp": 3_000,
            "msg": "exec usr/bin/ls took 1 ms",
        }),
        json!({
            "timestamp": 4_000,
            "msg": "idle heartbeat OK",
        }),
    ];
    for record in &records {
        writer.ingest_record(record).unwrap();
    }
    let metadata = writer.close().unwrap();

    let mut reader = ArchiveReader::open(dir.join(&metadata.archive_id)).unwrap();
    reader.read_dictionaries_and_metadata().unwrap();
    reader
}

fn run(reader: &ArchiveReader, config: SearchConfig) -> Vec<String> {
    let mut handler = CollectingOutputHandler::default();
    let cancel = AtomicBool::new(false);
    search_archive(reader, &config, &mut handler, &cancel).unwrap();
    handler.results.into_iter().map(|r| r.message).collect()
}

#[test]
fn wildcard_variable_query_matches_dictionary_entries() {
    let dir = tempdir().unwrap();
    let reader = build_archive(dir.path());

    let results = run(&reader, SearchConfig::new("*bin/python?.*"));
    assert_eq!(results.len(), 2);
    assert!(results.iter().any(|m| m.contains("python2.7.3")));
    assert!(results.iter().any(|m| m.contains("python3.4.6")));
    assert!(!results.iter().any(|m| m.contains("usr/bin/ls")));
}

#[test]
fn exact_query_matches_one_message() {
    let dir = tempdir().unwrap();
    let reader = build_archive(dir.path());

    let results = run(&reader, SearchConfig::new("*exec usr/bin/ls took 1 ms*"));
    assert_eq!(results, vec!["exec usr/bin/ls took 1 ms".to_string()]);
}

#[test]
fn star_matches_every_message() {
    let dir = tempdir().unwrap();
    let reader = build_archive(dir.path());

    let results = run(&reader, SearchConfig::new("*"));
    assert_eq!(results.len(), 4);
}

#[test]
fn no_match_is_empty_without_scanning_errors() {
    let dir = tempdir().unwrap();
    let reader = build_archive(dir.path());

    let results = run(&reader, SearchConfig::new("*no such literal anywhere*"));
    assert!(results.is_empty());
}

#[test]
fn case_insensitive_matching() {
    let dir = tempdir().unwrap();
    let reader = build_archive(dir.path());

    let mut config = SearchConfig::new("*HEARTBEAT*");
    assert!(run(&reader, config.clone()).is_empty());
    config.case_sensitive = false;
    let results = run(&reader, config);
    assert_eq!(results, vec!["idle heartbeat OK".to_string()]);
}

#[test]
fn time_range_gates_results() {
    let dir = tempdir().unwrap();
    let reader = build_archive(dir.path());

    let mut config = SearchConfig::new("*exec*");
    config.begin_ts = Some(1_500);
    config.end_ts = Some(3_500);
    let results = run(&reader, config);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|m| !m.contains("python2.7.3")));
}

#[test]
fn cancellation_stops_the_scan() {
    let dir = tempdir().unwrap();
    let reader = build_archive(dir.path());

    let mut handler = CollectingOutputHandler::default();
    let cancel = AtomicBool::new(true);
    let count = search_archive(&reader, &SearchConfig::new("*"), &mut handler, &cancel).unwrap();
    assert_eq!(count, 0);
    assert!(handler.results.is_empty());
}
