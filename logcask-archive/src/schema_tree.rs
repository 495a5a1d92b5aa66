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

//! Schema tree
//!
//! Indexes every (parent, key, type) tuple observed during ingestion.
//! Nodes live in an arena vector indexed by id: node 0 is the root, ids
//! grow monotonically and are never reused, and the tree is append-only
//! within an archive. The same key may appear under one parent with
//! several types — that is how per-archive type evolution is expressed —
//! but each (parent, key, type) triple maps to exactly one node.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde_json::Value;

use logcask_core::{LogCaskError, Result};

/// Schema tree node id. The root is always id 0.
pub type NodeId = u32;

pub const ROOT_ID: NodeId = 0;

/// Node ids must stay below the schema-signature marker tag space.
pub const MAX_NODE_ID: NodeId = (1 << 30) - 1;

/// The type of the value a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    Object = 0,
    Integer = 1,
    Float = 2,
    Boolean = 3,
    /// String stored as (logtype id, encoded variables).
    ClpString = 4,
    /// String stored whole in the variable dictionary.
    VarString = 5,
    DateString = 6,
    /// Array stored as CLP-encoded JSON text.
    UnstructuredArray = 7,
    /// Array of objects laid out column-by-column.
    StructuredArray = 8,
    NullValue = 9,
    Metadata = 10,
    Unknown = 11,
}

impl NodeType {
    /// Whether nodes of this type may have children.
    pub fn is_internal(self) -> bool {
        matches!(
            self,
            NodeType::Object | NodeType::StructuredArray | NodeType::Metadata
        )
    }
}

impl TryFrom<u8> for NodeType {
    type Error = LogCaskError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => NodeType::Object,
            1 => NodeType::Integer,
            2 => NodeType::Float,
            3 => NodeType::Boolean,
            4 => NodeType::ClpString,
            5 => NodeType::VarString,
            6 => NodeType::DateString,
            7 => NodeType::UnstructuredArray,
            8 => NodeType::StructuredArray,
            9 => NodeType::NullValue,
            10 => NodeType::Metadata,
            11 => NodeType::Unknown,
            other => {
                return Err(LogCaskError::CorruptedMetadata(format!(
                    "unknown schema node type {other}"
                )))
            }
        })
    }
}

/// One schema tree node.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub id: NodeId,
    /// `None` only for the root.
    pub parent: Option<NodeId>,
    pub key: String,
    pub node_type: NodeType,
    pub depth: u32,
    children: Vec<NodeId>,
}

impl SchemaNode {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// The per-archive schema tree.
#[derive(Debug)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
    index: HashMap<(NodeId, String, NodeType), NodeId>,
}

impl Default for SchemaTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaTree {
    pub fn new() -> Self {
        let root = SchemaNode {
            id: ROOT_ID,
            parent: None,
            key: String::new(),
            node_type: NodeType::Object,
            depth: 0,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            index: HashMap::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Adds a node, or returns the existing id for an identical
    /// (parent, key, type) triple.
    pub fn add_node(&mut self, parent: NodeId, node_type: NodeType, key: &str) -> Result<NodeId> {
        let parent_node = self.get_node(parent)?;
        if !parent_node.node_type.is_internal() {
            return Err(LogCaskError::ConflictingNodeType(format!(
                "parent node {parent} ({:?}) cannot have children",
                parent_node.node_type
            )));
        }
        if let Some(&id) = self.index.get(&(parent, key.to_owned(), node_type)) {
            return Ok(id);
        }
        let id = self.nodes.len() as u64;
        if id > u64::from(MAX_NODE_ID) {
            return Err(LogCaskError::OutOfRange("schema tree node ids".into()));
        }
        let id = id as NodeId;
        let depth = self.nodes[parent as usize].depth + 1;
        self.nodes.push(SchemaNode {
            id,
            parent: Some(parent),
            key: key.to_owned(),
            node_type,
            depth,
            children: Vec::new(),
        });
        self.nodes[parent as usize].children.push(id);
        self.index.insert((parent, key.to_owned(), node_type), id);
        Ok(id)
    }

    pub fn get_node(&self, id: NodeId) -> Result<&SchemaNode> {
        self.nodes
            .get(id as usize)
            .ok_or_else(|| LogCaskError::OutOfRange(format!("schema tree node {id}")))
    }

    pub fn children_of(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.get_node(id)?.children())
    }

    /// Looks up a node by its (parent, key, type) triple.
    pub fn find_node(&self, parent: NodeId, key: &str, node_type: NodeType) -> Option<NodeId> {
        self.index.get(&(parent, key.to_owned(), node_type)).copied()
    }

    /// Iterates nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.iter()
    }

    /// Returns the node of `node_type` nearest to `ancestor` on the path
    /// strictly between `ancestor` (exclusive) and `descendant`
    /// (inclusive), or `None`.
    pub fn find_subtree_root(
        &self,
        ancestor: NodeId,
        descendant: NodeId,
        node_type: NodeType,
    ) -> Option<NodeId> {
        let mut found = None;
        let mut cur = descendant;
        while cur != ancestor {
            let node = self.nodes.get(cur as usize)?;
            if node.node_type == node_type {
                found = Some(cur);
            }
            cur = node.parent?;
        }
        found
    }

    /// Whether `value`'s runtime type is compatible with `node_type`.
    fn value_compatible(node_type: NodeType, value: &Value) -> bool {
        match node_type {
            NodeType::Object => {
                value.is_null() || value.as_object().is_some_and(|o| o.is_empty())
            }
            NodeType::Integer => value.as_i64().is_some(),
            NodeType::Float => value.is_number(),
            NodeType::Boolean => value.is_boolean(),
            NodeType::ClpString | NodeType::VarString | NodeType::DateString => value.is_string(),
            // Unstructured arrays carry their CLP-encoded JSON text.
            NodeType::UnstructuredArray => value.is_string() || value.is_array(),
            NodeType::NullValue => value.is_null(),
            NodeType::StructuredArray | NodeType::Metadata | NodeType::Unknown => false,
        }
    }

    /// Validates a record's (leaf id → value) map against the tree.
    pub fn validate_record(&self, leaves: &[(NodeId, &Value)]) -> Result<()> {
        let mut seen_keys: HashMap<(NodeId, &str), NodeId> = HashMap::new();
        for &(id, value) in leaves {
            if id == ROOT_ID {
                return Err(LogCaskError::OperationNotPermitted(
                    "the root node cannot carry a value".into(),
                ));
            }
            let node = self.get_node(id)?;
            if !Self::value_compatible(node.node_type, value) {
                return Err(LogCaskError::ProtocolError(format!(
                    "value for node {id} does not match type {:?}",
                    node.node_type
                )));
            }
            let parent = node.parent.unwrap_or(ROOT_ID);
            if let Some(prev) = seen_keys.insert((parent, node.key.as_str()), id) {
                if prev != id {
                    return Err(LogCaskError::ProtocolNotSupported(format!(
                        "key {:?} appears twice under node {parent}",
                        node.key
                    )));
                }
            }
        }

        // An Object leaf (null or empty object) may not coexist with any
        // of its descendants.
        for &(id, _) in leaves {
            let node = self.get_node(id)?;
            if node.node_type != NodeType::Object {
                continue;
            }
            for &(other, _) in leaves {
                if other == id {
                    continue;
                }
                let mut cur = self.get_node(other)?.parent;
                while let Some(p) = cur {
                    if p == id {
                        return Err(LogCaskError::OperationNotPermitted(format!(
                            "object node {id} carries a value while descendant {other} is present"
                        )));
                    }
                    cur = self.get_node(p)?.parent;
                }
            }
        }
        Ok(())
    }

    /// Serializes a validated (leaf id → value) map to compact JSON.
    ///
    /// Computes the bitmap of nodes on any root-to-leaf path and walks
    /// it depth-first.
    pub fn serialize_record(&self, leaves: &[(NodeId, &Value)]) -> Result<String> {
        let mut bitmap = vec![false; self.nodes.len()];
        let mut values: HashMap<NodeId, &Value> = HashMap::new();
        for &(id, value) in leaves {
            if id as usize >= self.nodes.len() {
                return Err(LogCaskError::OutOfRange(format!(
                    "leaf id {id} exceeds the tree size"
                )));
            }
            values.insert(id, value);
            let mut cur = Some(id);
            while let Some(c) = cur {
                bitmap[c as usize] = true;
                cur = self.nodes[c as usize].parent;
            }
        }

        let mut out = String::with_capacity(64);
        self.write_subtree(ROOT_ID, &bitmap, &values, &mut out)?;
        Ok(out)
    }

    fn write_subtree(
        &self,
        id: NodeId,
        bitmap: &[bool],
        values: &HashMap<NodeId, &Value>,
        out: &mut String,
    ) -> Result<()> {
        out.push('{');
        let mut first = true;
        for &child in self.nodes[id as usize].children() {
            if !bitmap[child as usize] {
                continue;
            }
            if !first {
                out.push(',');
            }
            first = false;
            let node = &self.nodes[child as usize];
            out.push_str(&serde_json::to_string(&node.key).expect("keys serialize"));
            out.push(':');
            match values.get(&child) {
                Some(value) => out.push_str(
                    &serde_json::to_string(value)
                        .map_err(|e| LogCaskError::ProtocolError(e.to_string()))?,
                ),
                None => self.write_subtree(child, bitmap, values, out)?,
            }
        }
        out.push('}');
        Ok(())
    }

    /// Persists the tree (root excluded, it is implicit).
    pub fn write_to_file(&self, path: &Path, compression_level: i32) -> Result<u64> {
        let file = File::create(path)?;
        let mut stream = zstd::stream::write::Encoder::new(file, compression_level)?;
        stream.write_u32::<LittleEndian>((self.nodes.len() - 1) as u32)?;
        for node in &self.nodes[1..] {
            stream.write_u32::<LittleEndian>(node.parent.unwrap_or(ROOT_ID))?;
            stream.write_u8(node.node_type as u8)?;
            stream.write_u32::<LittleEndian>(node.key.len() as u32)?;
            stream.write_all(node.key.as_bytes())?;
        }
        let file = stream.finish()?;
        Ok(file.metadata()?.len())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        let mut stream = zstd::stream::read::Decoder::new(file)?;
        let count = stream
            .read_u32::<LittleEndian>()
            .map_err(|_| LogCaskError::CorruptedMetadata("truncated schema tree".into()))?;
        let mut tree = SchemaTree::new();
        let mut key = Vec::new();
        for _ in 0..count {
            let parent = stream.read_u32::<LittleEndian>()?;
            let node_type = NodeType::try_from(stream.read_u8()?)?;
            let key_len = stream.read_u32::<LittleEndian>()? as usize;
            key.resize(key_len, 0);
            stream.read_exact(&mut key)?;
            let key = std::str::from_utf8(&key).map_err(|_| {
                LogCaskError::CorruptedMetadata("schema tree key is not UTF-8".into())
            })?;
            tree.add_node(parent, node_type, key)?;
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_add_node_idempotent() {
        let mut tree = SchemaTree::new();
        let a = tree.add_node(ROOT_ID, NodeType::Object, "a").unwrap();
        let b = tree.add_node(a, NodeType::Integer, "b").unwrap();
        assert_eq!(tree.add_node(ROOT_ID, NodeType::Object, "a").unwrap(), a);
        assert_eq!(tree.add_node(a, NodeType::Integer, "b").unwrap(), b);
        assert_eq!(tree.size(), 3);

        // Same key, different type: a distinct node, not a conflict.
        let b_float = tree.add_node(a, NodeType::Float, "b").unwrap();
        assert_ne!(b_float, b);
    }

    #[test]
    fn test_leaf_parent_rejected() {
        let mut tree = SchemaTree::new();
        let leaf = tree.add_node(ROOT_ID, NodeType::Integer, "n").unwrap();
        let err = tree.add_node(leaf, NodeType::Integer, "child").unwrap_err();
        assert!(matches!(err, LogCaskError::ConflictingNodeType(_)));
    }

    #[test]
    fn test_object_with_descendants_rejected() {
        let mut tree = SchemaTree::new();
        let a = tree.add_node(ROOT_ID, NodeType::Object, "a").unwrap();
        let b = tree.add_node(a, NodeType::Integer, "b").unwrap();

        let null = Value::Null;
        let seven = json!(7);
        let err = tree
            .validate_record(&[(a, &null), (b, &seven)])
            .unwrap_err();
        assert!(matches!(err, LogCaskError::OperationNotPermitted(_)));
    }

    #[test]
    fn test_root_value_rejected() {
        let tree = SchemaTree::new();
        let null = Value::Null;
        let err = tree.validate_record(&[(ROOT_ID, &null)]).unwrap_err();
        assert!(matches!(err, LogCaskError::OperationNotPermitted(_)));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut tree = SchemaTree::new();
        let n = tree.add_node(ROOT_ID, NodeType::Integer, "n").unwrap();
        let text = json!("not an int");
        let err = tree.validate_record(&[(n, &text)]).unwrap_err();
        assert!(matches!(err, LogCaskError::ProtocolError(_)));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut tree = SchemaTree::new();
        let int_n = tree.add_node(ROOT_ID, NodeType::Integer, "n").unwrap();
        let str_n = tree.add_node(ROOT_ID, NodeType::VarString, "n").unwrap();
        let one = json!(1);
        let text = json!("x");
        let err = tree
            .validate_record(&[(int_n, &one), (str_n, &text)])
            .unwrap_err();
        assert!(matches!(err, LogCaskError::ProtocolNotSupported(_)));
    }

    #[test]
    fn test_serialize_record() {
        let mut tree = SchemaTree::new();
        let a = tree.add_node(ROOT_ID, NodeType::Object, "a").unwrap();
        let b = tree.add_node(a, NodeType::Integer, "b").unwrap();
        let c = tree.add_node(a, NodeType::VarString, "c").unwrap();
        let top = tree.add_node(ROOT_ID, NodeType::Boolean, "top").unwrap();

        let seven = json!(7);
        let text = json!("seven");
        let yes = json!(true);
        let out = tree
            .serialize_record(&[(b, &seven), (c, &text), (top, &yes)])
            .unwrap();
        assert_eq!(out, r#"{"a":{"b":7,"c":"seven"},"top":true}"#);
    }

    #[test]
    fn test_serialize_out_of_range_leaf() {
        let tree = SchemaTree::new();
        let v = json!(1);
        let err = tree.serialize_record(&[(99, &v)]).unwrap_err();
        assert!(matches!(err, LogCaskError::OutOfRange(_)));
    }

    #[test]
    fn test_find_subtree_root() {
        let mut tree = SchemaTree::new();
        let a = tree.add_node(ROOT_ID, NodeType::Object, "a").unwrap();
        let arr = tree.add_node(a, NodeType::StructuredArray, "items").unwrap();
        let obj = tree.add_node(arr, NodeType::Object, "inner").unwrap();
        let leaf = tree.add_node(obj, NodeType::Integer, "v").unwrap();

        assert_eq!(
            tree.find_subtree_root(ROOT_ID, leaf, NodeType::StructuredArray),
            Some(arr)
        );
        assert_eq!(
            tree.find_subtree_root(a, leaf, NodeType::StructuredArray),
            Some(arr)
        );
        assert_eq!(
            tree.find_subtree_root(arr, leaf, NodeType::StructuredArray),
            None
        );
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema_tree");

        let mut tree = SchemaTree::new();
        let a = tree.add_node(ROOT_ID, NodeType::Object, "a").unwrap();
        tree.add_node(a, NodeType::Integer, "b").unwrap();
        tree.add_node(a, NodeType::ClpString, "msg").unwrap();
        tree.write_to_file(&path, 3).unwrap();

        let loaded = SchemaTree::read_from_file(&path).unwrap();
        assert_eq!(loaded.size(), tree.size());
        for (orig, read) in tree.iter().zip(loaded.iter()) {
            assert_eq!(orig.id, read.id);
            assert_eq!(orig.parent, read.parent);
            assert_eq!(orig.key, read.key);
            assert_eq!(orig.node_type, read.node_type);
        }
    }
}
