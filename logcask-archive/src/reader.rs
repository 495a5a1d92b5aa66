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

//! Columnar archive reader
//!
//! Opens an archive directory, materializes the schema tree,
//! dictionaries and per-schema table locations, then serves
//! [`SchemaReader`]s that either expose raw columns (for search) or
//! marshal records back to JSON.
//!
//! JSON marshalling never builds a DOM: a *template* — a flat op list
//! plus a reordered column pointer list — is computed once per schema by
//! walking the local projection of the schema tree, and each record is
//! emitted by one pass over the template. Unordered (structured-array)
//! regions emit balanced brackets by walking consecutive leaf paths to
//! their nearest common ancestor.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use logcask_core::timestamp::EpochTimeMs;
use logcask_core::{LogCaskError, Result};

use crate::column::{ColumnReader, ColumnValues};
use crate::dictionary::{read_dictionary, Dictionary, MAX_LOGTYPE_ID, MAX_VAR_ID};
use crate::metadata::{ArchiveMetadata, FileMetadata};
use crate::schema::{is_marker, is_object_open, marker_len, Schema, SchemaId, SchemaMap};
use crate::schema_tree::{NodeId, NodeType, SchemaTree, ROOT_ID};
use crate::segment::SegmentReader;
use crate::timestamp_dict::TimestampDictionary;

/// One op of the precomputed JSON template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOp {
    /// `{` without a key (document root or array element).
    BeginDocument,
    /// `"key":{`
    BeginObject(String),
    EndObject,
    /// `"key":[`
    BeginArray(String),
    EndArray,
    /// Consume the next reordered column.
    AddInt(String),
    AddFloat(String),
    AddBool(String),
    AddString(String),
    /// Raw JSON splice of an unstructured array (consumes a column).
    AddArrayField(String),
    AddNullField(String),
    AddEmptyObject(String),
}

impl TemplateOp {
    fn consumes_column(&self) -> bool {
        matches!(
            self,
            TemplateOp::AddInt(_)
                | TemplateOp::AddFloat(_)
                | TemplateOp::AddBool(_)
                | TemplateOp::AddString(_)
                | TemplateOp::AddArrayField(_)
        )
    }
}

fn write_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_key(out: &mut String, key: &str) {
    write_json_string(out, key);
    out.push(':');
}

fn trim_comma(out: &mut String) {
    if out.ends_with(',') {
        out.pop();
    }
}

/// Reads one schema's columns and (optionally) marshals its records.
pub struct SchemaReader {
    schema_id: SchemaId,
    num_messages: u64,
    cur_message: u64,
    columns: Vec<ColumnReader>,
    event_indices: Vec<u64>,
    template: Vec<TemplateOp>,
    reordered_columns: Vec<usize>,
    timestamp_column: Option<usize>,
    logtype_dict: Arc<Dictionary>,
    var_dict: Arc<Dictionary>,
    ts_dict: Arc<TimestampDictionary>,
}

impl SchemaReader {
    pub fn schema_id(&self) -> SchemaId {
        self.schema_id
    }

    pub fn num_messages(&self) -> u64 {
        self.num_messages
    }

    pub fn columns(&self) -> &[ColumnReader] {
        &self.columns
    }

    /// The smallest unread global log-event index, or `None` when the
    /// table is exhausted.
    pub fn next_log_event_idx(&self) -> Option<u64> {
        self.event_indices.get(self.cur_message as usize).copied()
    }

    /// The global log-event index of an arbitrary row.
    pub fn event_index_at(&self, row: u64) -> Option<u64> {
        self.event_indices.get(row as usize).copied()
    }

    /// Marshals one record to JSON by a single template walk.
    pub fn marshal_row(&self, row: u64) -> Result<String> {
        if row >= self.num_messages {
            return Err(LogCaskError::OutOfRange(format!(
                "row {row} of {}",
                self.num_messages
            )));
        }
        let row = row as usize;
        let mut out = String::with_capacity(128);
        let mut next_col = 0usize;
        for op in &self.template {
            let column = if op.consumes_column() {
                let col = &self.columns[self.reordered_columns[next_col]];
                next_col += 1;
                Some(col)
            } else {
                None
            };
            match op {
                TemplateOp::BeginDocument => out.push('{'),
                TemplateOp::BeginObject(key) => {
                    write_key(&mut out, key);
                    out.push('{');
                }
                TemplateOp::EndObject => {
                    trim_comma(&mut out);
                    out.push('}');
                    out.push(',');
                }
                TemplateOp::BeginArray(key) => {
                    write_key(&mut out, key);
                    out.push('[');
                }
                TemplateOp::EndArray => {
                    trim_comma(&mut out);
                    out.push(']');
                    out.push(',');
                }
                TemplateOp::AddInt(key) => {
                    let column = column.expect("op consumes a column");
                    write_key(&mut out, key);
                    match &column.values {
                        ColumnValues::Int64(v) => {
                            let _ = write!(out, "{}", v[row]);
                        }
                        _ => return Err(type_confusion(column)),
                    }
                    out.push(',');
                }
                TemplateOp::AddFloat(key) => {
                    let column = column.expect("op consumes a column");
                    write_key(&mut out, key);
                    match &column.values {
                        ColumnValues::Float64(v) => {
                            let _ = write!(out, "{}", v[row]);
                        }
                        _ => return Err(type_confusion(column)),
                    }
                    out.push(',');
                }
                TemplateOp::AddBool(key) => {
                    let column = column.expect("op consumes a column");
                    write_key(&mut out, key);
                    match &column.values {
                        ColumnValues::Bool(v) => {
                            out.push_str(if v[row] != 0 { "true" } else { "false" })
                        }
                        _ => return Err(type_confusion(column)),
                    }
                    out.push(',');
                }
                TemplateOp::AddString(key) => {
                    let column = column.expect("op consumes a column");
                    write_key(&mut out, key);
                    let text = self.string_value(column, row)?;
                    write_json_string(&mut out, &text);
                    out.push(',');
                }
                TemplateOp::AddArrayField(key) => {
                    let column = column.expect("op consumes a column");
                    write_key(&mut out, key);
                    // The stored text is the array's JSON form; splice
                    // it back verbatim.
                    let text =
                        column.decode_clp_row(row, &self.logtype_dict, &self.var_dict)?;
                    out.push_str(&text);
                    out.push(',');
                }
                TemplateOp::AddNullField(key) => {
                    write_key(&mut out, key);
                    out.push_str("null,");
                }
                TemplateOp::AddEmptyObject(key) => {
                    write_key(&mut out, key);
                    out.push_str("{},");
                }
            }
        }
        trim_comma(&mut out);
        Ok(out)
    }

    fn string_value(&self, column: &ColumnReader, row: usize) -> Result<String> {
        match (&column.values, column.node_type) {
            (ColumnValues::VarString(ids), _) => {
                Ok(self.var_dict.lookup_by_id(ids[row])?.to_owned())
            }
            (ColumnValues::DateString {
                pattern_ids,
                epochs,
            }, _) => {
                let pattern = self.ts_dict.pattern(pattern_ids[row] as u64)?;
                Ok(pattern.render(epochs[row]))
            }
            (ColumnValues::ClpString { .. }, _) => {
                column.decode_clp_row(row, &self.logtype_dict, &self.var_dict)
            }
            _ => Err(type_confusion(column)),
        }
    }

    /// The record timestamp at `row`, if this schema has a timestamp
    /// column.
    pub fn timestamp_at(&self, row: u64) -> Option<EpochTimeMs> {
        let column = &self.columns[self.timestamp_column?];
        let row = row as usize;
        match &column.values {
            ColumnValues::DateString { epochs, .. } => Some(epochs[row]),
            ColumnValues::Int64(v) => Some(v[row]),
            ColumnValues::Float64(v) => Some(v[row] as EpochTimeMs),
            _ => None,
        }
    }

    /// Returns the next record as JSON plus its event index, advancing
    /// the read cursor.
    pub fn next_message(&mut self) -> Result<Option<(u64, String)>> {
        if self.cur_message >= self.num_messages {
            return Ok(None);
        }
        let row = self.cur_message;
        let message = self.marshal_row(row)?;
        self.cur_message += 1;
        Ok(Some((self.event_indices[row as usize], message)))
    }
}

fn type_confusion(column: &ColumnReader) -> LogCaskError {
    LogCaskError::CorruptedArchive(format!(
        "column for node {} does not match its template op",
        column.node_id
    ))
}

struct LoadedState {
    schema_tree: Arc<SchemaTree>,
    logtype_dict: Arc<Dictionary>,
    var_dict: Arc<Dictionary>,
    ts_dict: Arc<TimestampDictionary>,
    schema_map: SchemaMap,
    segments: Vec<(u32, SegmentReader)>,
    files: Vec<FileMetadata>,
}

/// Read-side handle to one archive directory.
pub struct ArchiveReader {
    dir: PathBuf,
    metadata: ArchiveMetadata,
    state: Option<LoadedState>,
}

impl ArchiveReader {
    /// Opens an archive by its directory, checking the format version.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let metadata = ArchiveMetadata::read_from_file(&dir.join("metadata"))?;
        Ok(Self {
            dir,
            metadata,
            state: None,
        })
    }

    pub fn metadata(&self) -> &ArchiveMetadata {
        &self.metadata
    }

    /// Materializes the schema tree, dictionaries, signatures and
    /// per-schema table locations.
    pub fn read_dictionaries_and_metadata(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }
        let schema_tree = Arc::new(SchemaTree::read_from_file(&self.dir.join("schema_tree"))?);
        let logtype_dict = Arc::new(read_dictionary(
            &self.dir.join("logtype.dict"),
            &self.dir.join("logtype.segindex"),
            MAX_LOGTYPE_ID,
        )?);
        let var_dict = Arc::new(read_dictionary(
            &self.dir.join("var.dict"),
            &self.dir.join("var.segindex"),
            MAX_VAR_ID,
        )?);
        let ts_dict = Arc::new(TimestampDictionary::read_from_file(
            &self.dir.join("timestamp.dict"),
        )?);
        let schema_map = read_schema_map(&self.dir.join("schema_map"))?;

        let mut segments = Vec::with_capacity(self.metadata.num_segments as usize);
        for segment_id in 0..self.metadata.num_segments {
            let path = self.dir.join("segments").join(segment_id.to_string());
            segments.push((segment_id, SegmentReader::open(path)?));
        }
        let files = FileMetadata::read_dir_entries(&self.dir.join("logs"))?;

        debug!(
            archive = %self.metadata.archive_id,
            schemas = schema_map.len(),
            segments = segments.len(),
            "archive materialized"
        );
        self.state = Some(LoadedState {
            schema_tree,
            logtype_dict,
            var_dict,
            ts_dict,
            schema_map,
            segments,
            files,
        });
        Ok(())
    }

    fn state(&self) -> Result<&LoadedState> {
        self.state.as_ref().ok_or_else(|| {
            LogCaskError::NotInitialized("call read_dictionaries_and_metadata first".into())
        })
    }

    pub fn schema_tree(&self) -> Result<Arc<SchemaTree>> {
        Ok(self.state()?.schema_tree.clone())
    }

    pub fn logtype_dict(&self) -> Result<Arc<Dictionary>> {
        Ok(self.state()?.logtype_dict.clone())
    }

    pub fn var_dict(&self) -> Result<Arc<Dictionary>> {
        Ok(self.state()?.var_dict.clone())
    }

    pub fn timestamp_dict(&self) -> Result<Arc<TimestampDictionary>> {
        Ok(self.state()?.ts_dict.clone())
    }

    pub fn files(&self) -> Result<&[FileMetadata]> {
        Ok(&self.state()?.files)
    }

    pub fn segment_ids(&self) -> Result<Vec<u32>> {
        Ok(self.state()?.segments.iter().map(|(id, _)| *id).collect())
    }

    /// Every (segment, schema) table, ordered so a sequential consumer
    /// never seeks backwards within a segment.
    pub fn schemas(&self) -> Result<Vec<(u32, SchemaId)>> {
        let state = self.state()?;
        let mut out = Vec::new();
        for (segment_id, segment) in &state.segments {
            for entry in segment.toc() {
                out.push((*segment_id, entry.schema_id));
            }
        }
        Ok(out)
    }

    /// Loads one schema table into a [`SchemaReader`]. With
    /// `marshal_records` the JSON template is precomputed; without it
    /// only raw column access is available.
    pub fn read_schema_table(
        &self,
        segment_id: u32,
        schema_id: SchemaId,
        marshal_records: bool,
    ) -> Result<SchemaReader> {
        let state = self.state()?;
        let segment = state
            .segments
            .iter()
            .find(|(id, _)| *id == segment_id)
            .map(|(_, s)| s)
            .ok_or_else(|| LogCaskError::OutOfRange(format!("segment {segment_id}")))?;
        let schema = state
            .schema_map
            .get(schema_id)
            .ok_or_else(|| LogCaskError::OutOfRange(format!("schema {schema_id}")))?;

        let (bytes, num_messages) = segment.read_table(schema_id)?;
        let mut cursor = bytes.as_slice();
        let mut event_indices = vec![0u64; num_messages as usize];
        cursor.read_u64_into::<LittleEndian>(&mut event_indices)?;

        let mut columns = Vec::new();
        for &entry in schema.entries() {
            if is_marker(entry) {
                continue;
            }
            let node = state.schema_tree.get_node(entry)?;
            if let Some(column) =
                ColumnReader::load(&mut cursor, entry, node.node_type, num_messages)?
            {
                columns.push(column);
            }
        }

        let (template, reordered_columns) = if marshal_records {
            build_template(&state.schema_tree, schema)?
        } else {
            (Vec::new(), Vec::new())
        };

        let timestamp_column = columns
            .iter()
            .position(|c| state.ts_dict.is_timestamp_column(c.node_id));

        Ok(SchemaReader {
            schema_id,
            num_messages,
            cur_message: 0,
            columns,
            event_indices,
            template,
            reordered_columns,
            timestamp_column,
            logtype_dict: state.logtype_dict.clone(),
            var_dict: state.var_dict.clone(),
            ts_dict: state.ts_dict.clone(),
        })
    }

    /// One [`SchemaReader`] per table, in [`Self::schemas`] order.
    pub fn read_all_tables(&self, marshal_records: bool) -> Result<Vec<SchemaReader>> {
        self.schemas()?
            .into_iter()
            .map(|(segment_id, schema_id)| {
                self.read_schema_table(segment_id, schema_id, marshal_records)
            })
            .collect()
    }
}

/// Reads the signature table written by the archive writer.
pub(crate) fn read_schema_map(path: &Path) -> Result<SchemaMap> {
    let file = BufReader::new(File::open(path)?);
    let mut r = zstd::stream::read::Decoder::new(file)?;
    let count = r
        .read_u32::<LittleEndian>()
        .map_err(|_| LogCaskError::CorruptedMetadata("truncated schema map".into()))?;
    let mut map = SchemaMap::new();
    for _ in 0..count {
        let len = r.read_u32::<LittleEndian>()? as usize;
        let num_ordered = r.read_u32::<LittleEndian>()? as usize;
        let mut entries = vec![0u32; len];
        r.read_u32_into::<LittleEndian>(&mut entries)?;
        let schema = Schema::from_parts(entries, num_ordered);
        map.get_or_insert(&schema);
    }
    Ok(map)
}

/// Builds the JSON template for one signature: ops in document order
/// plus the column pointer list the value ops consume.
fn build_template(tree: &SchemaTree, schema: &Schema) -> Result<(Vec<TemplateOp>, Vec<usize>)> {
    // Entry position -> column index, counting storable entries only.
    let mut entry_columns: Vec<Option<usize>> = Vec::with_capacity(schema.len());
    let mut next_column = 0usize;
    for (i, &entry) in schema.entries().iter().enumerate() {
        let storable = if i >= schema.num_ordered() && is_marker(entry) {
            false
        } else {
            let node = tree.get_node(entry)?;
            !matches!(
                node.node_type,
                NodeType::NullValue | NodeType::Object | NodeType::StructuredArray
            )
        };
        if storable {
            entry_columns.push(Some(next_column));
            next_column += 1;
        } else {
            entry_columns.push(None);
        }
    }

    // Projection of internal nodes reachable from ordered leaves and
    // from structured-array attach points.
    let mut projected: HashSet<NodeId> = HashSet::new();
    let mut ordered_leaves: HashMap<NodeId, usize> = HashMap::new();
    for (i, &id) in schema.ordered().iter().enumerate() {
        ordered_leaves.insert(id, i);
        let mut cur = tree.get_node(id)?.parent;
        while let Some(p) = cur {
            projected.insert(p);
            cur = tree.get_node(p)?.parent;
        }
    }

    // Structured arrays: group the unordered region into
    // (attach parent, array node, span) triples.
    let unordered = schema.unordered();
    let mut arrays: HashMap<NodeId, Vec<(NodeId, std::ops::Range<usize>)>> = HashMap::new();
    let mut pos = 0usize;
    while pos < unordered.len() {
        let entry = unordered[pos];
        if !is_marker(entry) {
            return Err(LogCaskError::CorruptedArchive(
                "unordered region must start each group with a marker".into(),
            ));
        }
        let len = marker_len(entry);
        let span = pos + 1..pos + 1 + len;
        if span.end > unordered.len() {
            return Err(LogCaskError::CorruptedArchive(
                "marker span exceeds the signature".into(),
            ));
        }
        let first_leaf = unordered[span.clone()]
            .iter()
            .copied()
            .find(|&e| !is_marker(e))
            .ok_or_else(|| {
                LogCaskError::CorruptedArchive("structured array without leaves".into())
            })?;
        let array_node = tree
            .find_subtree_root(ROOT_ID, first_leaf, NodeType::StructuredArray)
            .ok_or_else(|| {
                LogCaskError::CorruptedArchive(
                    "unordered leaf without a structured-array ancestor".into(),
                )
            })?;
        let attach = tree.get_node(array_node)?.parent.unwrap_or(ROOT_ID);
        arrays.entry(attach).or_default().push((array_node, span.clone()));

        let mut cur = Some(attach);
        while let Some(p) = cur {
            projected.insert(p);
            cur = tree.get_node(p)?.parent;
        }
        pos = span.end;
    }

    let mut builder = TemplateBuilder {
        tree,
        schema,
        entry_columns,
        projected,
        ordered_leaves,
        arrays,
        ops: Vec::new(),
        reordered: Vec::new(),
    };
    builder.ops.push(TemplateOp::BeginDocument);
    builder.emit_object_children(ROOT_ID)?;
    builder.ops.push(TemplateOp::EndObject);
    Ok((builder.ops, builder.reordered))
}

struct TemplateBuilder<'a> {
    tree: &'a SchemaTree,
    schema: &'a Schema,
    entry_columns: Vec<Option<usize>>,
    projected: HashSet<NodeId>,
    ordered_leaves: HashMap<NodeId, usize>,
    arrays: HashMap<NodeId, Vec<(NodeId, std::ops::Range<usize>)>>,
    ops: Vec<TemplateOp>,
    reordered: Vec<usize>,
}

impl TemplateBuilder<'_> {
    fn emit_object_children(&mut self, node_id: NodeId) -> Result<()> {
        let children = self.tree.get_node(node_id)?.children().to_vec();
        for child in children {
            if let Some(&ordered_ix) = self.ordered_leaves.get(&child) {
                let entry_ix = ordered_ix; // ordered region precedes unordered
                self.emit_leaf(child, entry_ix)?;
            } else if self.projected.contains(&child) {
                let node = self.tree.get_node(child)?;
                if node.node_type == NodeType::StructuredArray {
                    continue; // emitted from its attach point below
                }
                self.ops.push(TemplateOp::BeginObject(node.key.clone()));
                self.emit_object_children(child)?;
                self.ops.push(TemplateOp::EndObject);
            }
        }
        if let Some(arrays) = self.arrays.remove(&node_id) {
            for (array_node, span) in arrays {
                self.emit_array(array_node, span)?;
            }
        }
        Ok(())
    }

    fn emit_leaf(&mut self, node_id: NodeId, entry_ix: usize) -> Result<()> {
        let node = self.tree.get_node(node_id)?;
        let key = node.key.clone();
        let op = match node.node_type {
            NodeType::Integer => TemplateOp::AddInt(key),
            NodeType::Float => TemplateOp::AddFloat(key),
            NodeType::Boolean => TemplateOp::AddBool(key),
            NodeType::ClpString | NodeType::VarString | NodeType::DateString => {
                TemplateOp::AddString(key)
            }
            NodeType::UnstructuredArray => TemplateOp::AddArrayField(key),
            NodeType::NullValue => TemplateOp::AddNullField(key),
            NodeType::Object => TemplateOp::AddEmptyObject(key),
            other => {
                return Err(LogCaskError::CorruptedArchive(format!(
                    "leaf with internal type {other:?}"
                )))
            }
        };
        if op.consumes_column() {
            let column = self.entry_columns[entry_ix].ok_or_else(|| {
                LogCaskError::CorruptedArchive("value op for a storage-free entry".into())
            })?;
            self.reordered.push(column);
        }
        self.ops.push(op);
        Ok(())
    }

    /// Emits a structured array: one document per object-open span, the
    /// leaves bracket-fixed against each other.
    fn emit_array(&mut self, array_node: NodeId, span: std::ops::Range<usize>) -> Result<()> {
        let key = self.tree.get_node(array_node)?.key.clone();
        self.ops.push(TemplateOp::BeginArray(key));

        let unordered_base = self.schema.num_ordered();
        let entries = self.schema.unordered().to_vec();
        let mut pos = span.start;
        while pos < span.end {
            let entry = entries[pos];
            if !is_object_open(entry) {
                return Err(LogCaskError::CorruptedArchive(
                    "array span must be a run of object-open groups".into(),
                ));
            }
            let len = marker_len(entry);
            let element = pos + 1..pos + 1 + len;
            self.emit_element(array_node, &entries[element.clone()], unordered_base + element.start)?;
            pos = element.end;
        }

        self.ops.push(TemplateOp::EndArray);
        Ok(())
    }

    fn emit_element(
        &mut self,
        array_node: NodeId,
        leaves: &[u32],
        first_entry_ix: usize,
    ) -> Result<()> {
        self.ops.push(TemplateOp::BeginDocument);
        let mut cur_parent = array_node;
        for (offset, &leaf) in leaves.iter().enumerate() {
            if is_marker(leaf) {
                return Err(LogCaskError::CorruptedArchive(
                    "nested markers inside an element span".into(),
                ));
            }
            let target = self
                .tree
                .get_node(leaf)?
                .parent
                .unwrap_or(ROOT_ID);
            self.fix_brackets(cur_parent, target)?;
            self.emit_leaf(leaf, first_entry_ix + offset)?;
            cur_parent = target;
        }
        while cur_parent != array_node {
            self.ops.push(TemplateOp::EndObject);
            cur_parent = self
                .tree
                .get_node(cur_parent)?
                .parent
                .unwrap_or(ROOT_ID);
        }
        self.ops.push(TemplateOp::EndObject);
        Ok(())
    }

    /// Emits EndObject/BeginObject for every level between the previous
    /// leaf's parent and the next leaf's parent, meeting at their
    /// nearest common ancestor.
    fn fix_brackets(&mut self, mut cur: NodeId, mut target: NodeId) -> Result<()> {
        if cur == target {
            return Ok(());
        }
        let mut path_down: Vec<NodeId> = Vec::new();
        let mut cur_depth = self.tree.get_node(cur)?.depth;
        let mut target_depth = self.tree.get_node(target)?.depth;
        while cur != target {
            if cur_depth >= target_depth && cur_depth > 0 {
                self.ops.push(TemplateOp::EndObject);
                cur = self.tree.get_node(cur)?.parent.unwrap_or(ROOT_ID);
                cur_depth -= 1;
            }
            if target_depth > cur_depth {
                path_down.push(target);
                target = self.tree.get_node(target)?.parent.unwrap_or(ROOT_ID);
                target_depth -= 1;
            }
        }
        for &node in path_down.iter().rev() {
            let key = self.tree.get_node(node)?.key.clone();
            self.ops.push(TemplateOp::BeginObject(key));
        }
        Ok(())
    }
}
