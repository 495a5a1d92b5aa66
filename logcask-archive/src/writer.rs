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

//! Columnar archive writer
//!
//! Ingest pipeline per record: parse the JSON into (leaf id → value)
//! against the schema tree, inserting nodes as needed; compute the
//! record's schema signature; route each value into that signature's
//! typed columns, running the variable encoder for CLP-string leaves;
//! seal a segment once the open size crosses the configured target.
//!
//! Every dictionary entry a sealed segment references is flushed to its
//! dictionary stream before the segment file lands, and a segment only
//! becomes reader-visible once the archive metadata that counts it is
//! rewritten — a partially written segment is invisible.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use byteorder::{LittleEndian, WriteBytesExt};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use logcask_core::encoding::encode_message;
use logcask_core::placeholder::get_bounds_of_next_var;
use logcask_core::timestamp::EpochTimeMs;
use logcask_core::{LogCaskError, Result};

use crate::column::ColumnWriter;
use crate::dictionary::{DictId, DictionaryWriter, MAX_LOGTYPE_ID, MAX_VAR_ID};
use crate::metadata::{ArchiveMetadata, FileMetadata, FileState, FORMAT_VERSION};
use crate::schema::{array_open_marker, object_open_marker, Schema, SchemaId, SchemaMap};
use crate::schema_tree::{NodeId, NodeType, SchemaTree, ROOT_ID};
use crate::segment::{write_segment, PendingTable};
use crate::timestamp_dict::TimestampDictionary;

/// Default segment target: 256 MiB of uncompressed input.
pub const DEFAULT_TARGET_SEGMENT_SIZE: u64 = 256 * 1024 * 1024;

/// Writer configuration.
#[derive(Debug, Clone)]
pub struct ArchiveWriterConfig {
    pub output_dir: PathBuf,
    /// Archive id; a random UUID when absent.
    pub archive_id: Option<String>,
    pub creator_id: String,
    pub creation_num: u64,
    pub compression_level: i32,
    pub target_segment_size: u64,
    /// Dotted path of the record field holding the timestamp.
    pub timestamp_key: Option<String>,
}

impl ArchiveWriterConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            archive_id: None,
            creator_id: "logcask".into(),
            creation_num: 0,
            compression_level: 3,
            target_segment_size: DEFAULT_TARGET_SEGMENT_SIZE,
            timestamp_key: Some("timestamp".into()),
        }
    }
}

/// A parsed leaf value, ready for column routing.
enum LeafValue<'a> {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// CLP-encoded text: plain strings borrow, serialized arrays own.
    Clp(Cow<'a, str>),
    VarStr(&'a str),
    Date { epoch: EpochTimeMs, pattern_id: u64 },
    /// Null or empty object: present in the signature, no storage.
    None,
}

enum UnorderedEntry<'a> {
    Marker(u32),
    Leaf(NodeId, LeafValue<'a>),
}

/// Columns of one open (unsealed) schema table.
struct TableWriter {
    /// One slot per signature entry; `None` for markers and
    /// storage-free leaves.
    columns: Vec<Option<ColumnWriter>>,
    event_indices: Vec<u64>,
    num_messages: u64,
}

/// Single writer for one archive directory.
impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("archive_id", &self.archive_id)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

pub struct ArchiveWriter {
    config: ArchiveWriterConfig,
    dir: PathBuf,
    archive_id: String,

    schema_tree: SchemaTree,
    schema_map: SchemaMap,
    logtype_dict: DictionaryWriter,
    var_dict: DictionaryWriter,
    ts_dict: TimestampDictionary,

    open_tables: BTreeMap<SchemaId, TableWriter>,
    open_size: u64,
    seg_logtype_ids: HashSet<DictId>,
    seg_var_ids: HashSet<DictId>,

    next_segment_id: u32,
    next_log_event_ix: u64,
    next_file_id: u64,
    total_uncompressed: u64,
    total_compressed: u64,

    current_file: Option<FileMetadata>,
    pending_files: Vec<FileMetadata>,
}

impl ArchiveWriter {
    /// Creates the archive directory and takes exclusive ownership of
    /// it. A second writer on the same directory fails with
    /// `AlreadyOpen`.
    pub fn create(config: ArchiveWriterConfig) -> Result<Self> {
        let archive_id = config
            .archive_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let dir = config.output_dir.join(&archive_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::create_dir_all(dir.join("segments"))?;
        std::fs::create_dir_all(dir.join("logs"))?;

        match OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(dir.join(".lock"))
        {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(LogCaskError::AlreadyOpen(dir.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let logtype_dict = DictionaryWriter::create(
            dir.join("logtype.dict"),
            dir.join("logtype.segindex"),
            MAX_LOGTYPE_ID,
            config.compression_level,
        )?;
        let var_dict = DictionaryWriter::create(
            dir.join("var.dict"),
            dir.join("var.segindex"),
            MAX_VAR_ID,
            config.compression_level,
        )?;

        info!(archive = %archive_id, dir = %dir.display(), "created archive");
        Ok(Self {
            config,
            dir,
            archive_id,
            schema_tree: SchemaTree::new(),
            schema_map: SchemaMap::new(),
            logtype_dict,
            var_dict,
            ts_dict: TimestampDictionary::new(),
            open_tables: BTreeMap::new(),
            open_size: 0,
            seg_logtype_ids: HashSet::new(),
            seg_var_ids: HashSet::new(),
            next_segment_id: 0,
            next_log_event_ix: 0,
            next_file_id: 0,
            total_uncompressed: 0,
            total_compressed: 0,
            current_file: None,
            pending_files: Vec::new(),
        })
    }

    pub fn archive_id(&self) -> &str {
        &self.archive_id
    }

    pub fn archive_dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Begins a new input file. The previous file, if any, is finished
    /// first.
    pub fn start_file(&mut self, orig_path: &str) -> Result<u64> {
        if self.current_file.is_some() {
            self.finish_file()?;
        }
        let file_id = self.next_file_id;
        self.next_file_id += 1;
        self.current_file = Some(FileMetadata {
            file_id,
            orig_path: orig_path.to_owned(),
            num_messages: 0,
            begin_message_ix: self.next_log_event_ix,
            end_message_ix: self.next_log_event_ix,
            begin_timestamp: EpochTimeMs::MAX,
            end_timestamp: EpochTimeMs::MIN,
            segment_ids: Vec::new(),
            state: FileState::Open,
        });
        Ok(file_id)
    }

    /// Marks the current file as finished; its records wait in the open
    /// segment.
    pub fn finish_file(&mut self) -> Result<()> {
        let Some(mut file) = self.current_file.take() else {
            return Ok(());
        };
        if file.begin_timestamp > file.end_timestamp {
            // No timestamped record was seen.
            file.begin_timestamp = 0;
            file.end_timestamp = 0;
        }
        file.state = FileState::AppendingToSegment;
        self.pending_files.push(file);
        Ok(())
    }

    /// Ingests one JSON record.
    pub fn ingest_record(&mut self, record: &Value) -> Result<()> {
        if let Some(file) = &self.current_file {
            if file.state != FileState::Open {
                return Err(LogCaskError::ProtocolNotSupported(
                    "file no longer accepts records".into(),
                ));
            }
        }
        let Some(object) = record.as_object() else {
            return Err(LogCaskError::BadParam(
                "top-level record must be a JSON object".into(),
            ));
        };

        let mut ordered: Vec<(NodeId, LeafValue<'_>)> = Vec::new();
        let mut raw: Vec<(NodeId, &Value)> = Vec::new();
        let mut unordered: Vec<UnorderedEntry<'_>> = Vec::new();
        let mut record_ts: Option<EpochTimeMs> = None;
        parse_object(
            &mut self.schema_tree,
            &mut self.ts_dict,
            self.config.timestamp_key.as_deref(),
            ROOT_ID,
            &mut String::new(),
            object,
            &mut ordered,
            &mut raw,
            &mut unordered,
            &mut record_ts,
        )?;
        self.schema_tree.validate_record(&raw)?;
        ordered.sort_by_key(|&(id, _)| id);

        let mut schema = Schema::new();
        for &(id, _) in &ordered {
            schema.insert_ordered(id);
        }
        for entry in &unordered {
            match entry {
                UnorderedEntry::Marker(m) => schema.insert_unordered(*m),
                UnorderedEntry::Leaf(id, _) => schema.insert_unordered(*id),
            }
        }

        let (schema_id, _) = self.schema_map.get_or_insert(&schema);
        if !self.open_tables.contains_key(&schema_id) {
            let table = new_table(&self.schema_tree, &schema)?;
            self.open_tables.insert(schema_id, table);
        }

        // Columns are appended positionally: ordered leaves first (the
        // signature's ordered region is sorted, and so is `ordered`),
        // then the unordered entries in record order.
        let num_ordered = schema.num_ordered();
        {
            let table = self.open_tables.get_mut(&schema_id).expect("just inserted");
            for (slot, (_, leaf)) in ordered.into_iter().enumerate() {
                append_leaf(
                    table.columns[slot].as_mut(),
                    leaf,
                    &mut self.logtype_dict,
                    &mut self.var_dict,
                    &mut self.seg_logtype_ids,
                    &mut self.seg_var_ids,
                )?;
            }
            let mut slot = num_ordered;
            for entry in unordered {
                if let UnorderedEntry::Leaf(_, leaf) = entry {
                    append_leaf(
                        table.columns[slot].as_mut(),
                        leaf,
                        &mut self.logtype_dict,
                        &mut self.var_dict,
                        &mut self.seg_logtype_ids,
                        &mut self.seg_var_ids,
                    )?;
                    slot += 1;
                } else {
                    slot += 1;
                }
            }
            table.event_indices.push(self.next_log_event_ix);
            table.num_messages += 1;
        }

        let record_bytes = serde_json::to_string(record)
            .map(|s| s.len() as u64)
            .unwrap_or(0);
        self.total_uncompressed += record_bytes;
        self.open_size += record_bytes;
        self.next_log_event_ix += 1;

        if let Some(file) = &mut self.current_file {
            file.num_messages += 1;
            file.end_message_ix = self.next_log_event_ix;
            if let Some(ts) = record_ts {
                file.begin_timestamp = file.begin_timestamp.min(ts);
                file.end_timestamp = file.end_timestamp.max(ts);
            }
            if !file.segment_ids.contains(&self.next_segment_id) {
                file.segment_ids.push(self.next_segment_id);
            }
        }

        if self.open_size >= self.config.target_segment_size {
            self.seal_segment()?;
        }
        Ok(())
    }

    /// Seals the open segment: flushes the dictionary streams, writes
    /// the segment file, persists file metadata, and rewrites the
    /// archive metadata row.
    pub fn seal_segment(&mut self) -> Result<()> {
        if self.open_tables.is_empty() {
            return Ok(());
        }
        let segment_id = self.next_segment_id;

        // Dictionary entries referenced by this segment must hit disk
        // before the segment does.
        self.logtype_dict.flush_pending()?;
        self.var_dict.flush_pending()?;
        let mut ids: Vec<DictId> = self.seg_logtype_ids.drain().collect();
        ids.sort_unstable();
        self.logtype_dict.index_segment(segment_id, &ids)?;
        let mut ids: Vec<DictId> = self.seg_var_ids.drain().collect();
        ids.sort_unstable();
        self.var_dict.index_segment(segment_id, &ids)?;

        let mut tables = Vec::with_capacity(self.open_tables.len());
        for (schema_id, table) in std::mem::take(&mut self.open_tables) {
            let mut bytes = Vec::new();
            for &ix in &table.event_indices {
                bytes.write_u64::<LittleEndian>(ix)?;
            }
            for column in table.columns.iter().flatten() {
                column.write_to(&mut bytes)?;
            }
            tables.push(PendingTable {
                schema_id,
                num_messages: table.num_messages,
                bytes,
            });
        }

        let path = self.dir.join("segments").join(segment_id.to_string());
        let (_, compressed) = write_segment(&path, &tables, self.config.compression_level)?;
        self.total_compressed += compressed;
        self.next_segment_id += 1;
        self.open_size = 0;

        for mut file in std::mem::take(&mut self.pending_files) {
            file.state = FileState::InSealedSegment;
            file.write_to_dir(&self.dir.join("logs"))?;
            file.state = FileState::MetadataClean;
            file.write_to_dir(&self.dir.join("logs"))?;
        }

        self.write_metadata()?;
        debug!(segment = segment_id, "segment sealed and visible");
        Ok(())
    }

    fn write_metadata(&self) -> Result<()> {
        self.build_metadata().write_to_file(&self.dir.join("metadata"))
    }

    fn build_metadata(&self) -> ArchiveMetadata {
        ArchiveMetadata {
            format_version: FORMAT_VERSION,
            archive_id: self.archive_id.clone(),
            creator_id: self.config.creator_id.clone(),
            creation_num: self.config.creation_num,
            begin_timestamp: self.ts_dict.begin_timestamp(),
            end_timestamp: self.ts_dict.end_timestamp(),
            uncompressed_size: self.total_uncompressed,
            compressed_size: self.total_compressed,
            num_segments: self.next_segment_id,
            num_log_events: self.next_log_event_ix,
        }
    }

    /// Flushes everything and seals the archive.
    pub fn close(mut self) -> Result<ArchiveMetadata> {
        self.finish_file()?;
        self.seal_segment()?;
        // Files that never saw a seal (empty archive) still get their
        // metadata persisted.
        for mut file in std::mem::take(&mut self.pending_files) {
            file.state = FileState::MetadataClean;
            file.write_to_dir(&self.dir.join("logs"))?;
        }

        self.total_compressed += self
            .schema_tree
            .write_to_file(&self.dir.join("schema_tree"), self.config.compression_level)?;
        self.total_compressed += self
            .ts_dict
            .write_to_file(&self.dir.join("timestamp.dict"), self.config.compression_level)?;
        write_schema_map(
            &self.dir.join("schema_map"),
            &self.schema_map,
            self.config.compression_level,
        )?;

        let metadata_path = self.dir.join("metadata");
        let mut metadata = self.build_metadata();

        let Self {
            logtype_dict,
            var_dict,
            ..
        } = self;
        let (_, logtype_bytes) = logtype_dict.close()?;
        let (_, var_bytes) = var_dict.close()?;
        metadata.compressed_size += logtype_bytes + var_bytes;
        metadata.write_to_file(&metadata_path)?;
        info!(
            archive = %metadata.archive_id,
            events = metadata.num_log_events,
            segments = metadata.num_segments,
            "archive closed"
        );
        Ok(metadata)
    }
}

/// Persists the signature table: schema ids are dense, so the file is
/// just each signature's entries plus its ordered-region length.
pub(crate) fn write_schema_map(
    path: &std::path::Path,
    map: &SchemaMap,
    compression_level: i32,
) -> Result<()> {
    let file = File::create(path)?;
    let mut w = zstd::stream::write::Encoder::new(file, compression_level)?;
    w.write_u32::<LittleEndian>(map.len() as u32)?;
    for id in 0..map.len() as SchemaId {
        let schema = map.get(id).expect("dense ids");
        w.write_u32::<LittleEndian>(schema.len() as u32)?;
        w.write_u32::<LittleEndian>(schema.num_ordered() as u32)?;
        for &entry in schema.entries() {
            w.write_u32::<LittleEndian>(entry)?;
        }
    }
    w.finish()?;
    Ok(())
}

fn new_table(tree: &SchemaTree, schema: &Schema) -> Result<TableWriter> {
    let mut columns = Vec::with_capacity(schema.len());
    for (i, &entry) in schema.entries().iter().enumerate() {
        if i >= schema.num_ordered() && crate::schema::is_marker(entry) {
            columns.push(None);
            continue;
        }
        let node = tree.get_node(entry)?;
        columns.push(ColumnWriter::for_node(entry, node.node_type));
    }
    Ok(TableWriter {
        columns,
        event_indices: Vec::new(),
        num_messages: 0,
    })
}

fn append_leaf(
    column: Option<&mut ColumnWriter>,
    leaf: LeafValue<'_>,
    logtype_dict: &mut DictionaryWriter,
    var_dict: &mut DictionaryWriter,
    seg_logtype_ids: &mut HashSet<DictId>,
    seg_var_ids: &mut HashSet<DictId>,
) -> Result<()> {
    let Some(column) = column else {
        return match leaf {
            LeafValue::None => Ok(()),
            _ => Err(LogCaskError::ProtocolError(
                "value for a storage-free leaf".into(),
            )),
        };
    };
    match leaf {
        LeafValue::Int(v) => column.append_int(v),
        LeafValue::Float(v) => column.append_float(v),
        LeafValue::Bool(v) => column.append_bool(v),
        LeafValue::VarStr(s) => {
            let (id, _) = var_dict.add_occurrence(s)?;
            seg_var_ids.insert(id);
            column.append_var_string(id)
        }
        LeafValue::Date { epoch, pattern_id } => column.append_date(pattern_id as i64, epoch),
        LeafValue::Clp(text) => {
            let encoded = encode_message::<i64>(&text);
            let logtype = std::str::from_utf8(&encoded.logtype)
                .map_err(|_| LogCaskError::ProtocolError("logtype is not UTF-8".into()))?;
            let (logtype_id, _) = logtype_dict.add_occurrence(logtype)?;
            seg_logtype_ids.insert(logtype_id);
            let mut dict_ids = Vec::with_capacity(encoded.dict_vars.len());
            for var in &encoded.dict_vars {
                let (id, _) = var_dict.add_occurrence(var)?;
                seg_var_ids.insert(id);
                dict_ids.push(id);
            }
            column.append_clp(logtype_id, &encoded.encoded_vars, &dict_ids)
        }
        LeafValue::None => Err(LogCaskError::ProtocolError(
            "missing value for a stored column".into(),
        )),
    }
}

/// Whether a string leaf holds any encodable variable.
fn contains_variable(text: &str) -> bool {
    let (mut begin, mut end) = (0usize, 0usize);
    get_bounds_of_next_var(text.as_bytes(), &mut begin, &mut end)
}

fn joined_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}

#[allow(clippy::too_many_arguments)]
fn parse_object<'a>(
    tree: &mut SchemaTree,
    ts_dict: &mut TimestampDictionary,
    timestamp_key: Option<&str>,
    parent: NodeId,
    path: &mut String,
    object: &'a Map<String, Value>,
    ordered: &mut Vec<(NodeId, LeafValue<'a>)>,
    raw: &mut Vec<(NodeId, &'a Value)>,
    unordered: &mut Vec<UnorderedEntry<'a>>,
    record_ts: &mut Option<EpochTimeMs>,
) -> Result<()> {
    for (key, value) in object {
        let child_path = joined_path(path, key);
        let is_ts_field = timestamp_key == Some(child_path.as_str());
        match value {
            Value::Null => {
                let id = tree.add_node(parent, NodeType::NullValue, key)?;
                ordered.push((id, LeafValue::None));
                raw.push((id, value));
            }
            Value::Bool(b) => {
                let id = tree.add_node(parent, NodeType::Boolean, key)?;
                ordered.push((id, LeafValue::Bool(*b)));
                raw.push((id, value));
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    let id = tree.add_node(parent, NodeType::Integer, key)?;
                    if is_ts_field {
                        ts_dict.ingest_epoch(&child_path, id, i);
                        *record_ts = Some(i);
                    }
                    ordered.push((id, LeafValue::Int(i)));
                    raw.push((id, value));
                } else {
                    let f = n.as_f64().unwrap_or_default();
                    let id = tree.add_node(parent, NodeType::Float, key)?;
                    if is_ts_field {
                        ts_dict.ingest_epoch(&child_path, id, f as EpochTimeMs);
                        *record_ts = Some(f as EpochTimeMs);
                    }
                    ordered.push((id, LeafValue::Float(f)));
                    raw.push((id, value));
                }
            }
            Value::String(s) => {
                if is_ts_field {
                    if let Some((epoch, pattern_id)) = ts_dict.parse_and_intern(s) {
                        let id = tree.add_node(parent, NodeType::DateString, key)?;
                        ts_dict.ingest_epoch(&child_path, id, epoch);
                        *record_ts = Some(epoch);
                        ordered.push((id, LeafValue::Date { epoch, pattern_id }));
                        raw.push((id, value));
                        continue;
                    }
                }
                if contains_variable(s) {
                    let id = tree.add_node(parent, NodeType::ClpString, key)?;
                    ordered.push((id, LeafValue::Clp(Cow::Borrowed(s))));
                    raw.push((id, value));
                } else {
                    let id = tree.add_node(parent, NodeType::VarString, key)?;
                    ordered.push((id, LeafValue::VarStr(s)));
                    raw.push((id, value));
                }
            }
            Value::Object(inner) => {
                if inner.is_empty() {
                    let id = tree.add_node(parent, NodeType::Object, key)?;
                    ordered.push((id, LeafValue::None));
                    raw.push((id, value));
                } else {
                    let id = tree.add_node(parent, NodeType::Object, key)?;
                    let saved = path.len();
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(key);
                    parse_object(
                        tree,
                        ts_dict,
                        timestamp_key,
                        id,
                        path,
                        inner,
                        ordered,
                        raw,
                        unordered,
                        record_ts,
                    )?;
                    path.truncate(saved);
                }
            }
            Value::Array(items) => {
                if !items.is_empty() && items.iter().all(Value::is_object) {
                    let array_node = tree.add_node(parent, NodeType::StructuredArray, key)?;
                    parse_structured_array(tree, array_node, items, unordered)?;
                } else {
                    let id = tree.add_node(parent, NodeType::UnstructuredArray, key)?;
                    let text = serde_json::to_string(value)
                        .map_err(|e| LogCaskError::BadParam(e.to_string()))?;
                    ordered.push((id, LeafValue::Clp(Cow::Owned(text))));
                    raw.push((id, value));
                }
            }
        }
    }
    Ok(())
}

/// Lays an array of objects out as marker entries plus per-path leaves.
fn parse_structured_array<'a>(
    tree: &mut SchemaTree,
    array_node: NodeId,
    items: &'a [Value],
    unordered: &mut Vec<UnorderedEntry<'a>>,
) -> Result<()> {
    let array_marker_pos = unordered.len();
    unordered.push(UnorderedEntry::Marker(0));
    for item in items {
        let object = item.as_object().expect("checked by the caller");
        let object_marker_pos = unordered.len();
        unordered.push(UnorderedEntry::Marker(0));
        let before = unordered.len();
        parse_element_object(tree, array_node, object, unordered)?;
        let len = (unordered.len() - before) as u32;
        unordered[object_marker_pos] = UnorderedEntry::Marker(object_open_marker(len));
    }
    let total = (unordered.len() - array_marker_pos - 1) as u32;
    unordered[array_marker_pos] = UnorderedEntry::Marker(array_open_marker(total));
    Ok(())
}

/// One array element: leaves flatten depth-first so the reader can
/// rebuild nesting from the tree paths alone.
fn parse_element_object<'a>(
    tree: &mut SchemaTree,
    parent: NodeId,
    object: &'a Map<String, Value>,
    unordered: &mut Vec<UnorderedEntry<'a>>,
) -> Result<()> {
    for (key, value) in object {
        match value {
            Value::Null => {
                let id = tree.add_node(parent, NodeType::NullValue, key)?;
                unordered.push(UnorderedEntry::Leaf(id, LeafValue::None));
            }
            Value::Bool(b) => {
                let id = tree.add_node(parent, NodeType::Boolean, key)?;
                unordered.push(UnorderedEntry::Leaf(id, LeafValue::Bool(*b)));
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    let id = tree.add_node(parent, NodeType::Integer, key)?;
                    unordered.push(UnorderedEntry::Leaf(id, LeafValue::Int(i)));
                } else {
                    let id = tree.add_node(parent, NodeType::Float, key)?;
                    unordered.push(UnorderedEntry::Leaf(
                        id,
                        LeafValue::Float(n.as_f64().unwrap_or_default()),
                    ));
                }
            }
            Value::String(s) => {
                if contains_variable(s) {
                    let id = tree.add_node(parent, NodeType::ClpString, key)?;
                    unordered.push(UnorderedEntry::Leaf(id, LeafValue::Clp(Cow::Borrowed(s))));
                } else {
                    let id = tree.add_node(parent, NodeType::VarString, key)?;
                    unordered.push(UnorderedEntry::Leaf(id, LeafValue::VarStr(s)));
                }
            }
            Value::Object(inner) => {
                let id = tree.add_node(parent, NodeType::Object, key)?;
                if inner.is_empty() {
                    unordered.push(UnorderedEntry::Leaf(id, LeafValue::None));
                } else {
                    parse_element_object(tree, id, inner, unordered)?;
                }
            }
            Value::Array(_) => {
                // Nested arrays inside structured elements stay
                // unstructured.
                let id = tree.add_node(parent, NodeType::UnstructuredArray, key)?;
                let text = serde_json::to_string(value)
                    .map_err(|e| LogCaskError::BadParam(e.to_string()))?;
                unordered.push(UnorderedEntry::Leaf(id, LeafValue::Clp(Cow::Owned(text))));
            }
        }
    }
    Ok(())
}
