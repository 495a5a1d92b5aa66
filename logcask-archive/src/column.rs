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

//! Typed columns
//!
//! Per (schema signature, leaf) pair the archive keeps one contiguous
//! typed vector of values in record-insertion order. A tagged union
//! carries the per-type storage; dispatch happens once at the column
//! boundary, not per row. Readers load a column's whole buffer for the
//! lifetime of the schema read session.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use logcask_core::encoding::decode_message;
use logcask_core::{LogCaskError, Result};

use crate::dictionary::{DictId, Dictionary};
use crate::schema_tree::{NodeId, NodeType};

/// Writer-side storage for one column.
#[derive(Debug)]
pub enum ColumnData {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bool(Vec<u8>),
    /// CLP-encoded strings: per row a logtype id plus spans into the
    /// shared encoded-variable and dictionary-id vectors.
    ClpString {
        logtype_ids: Vec<DictId>,
        encoded_counts: Vec<u32>,
        dict_counts: Vec<u32>,
        encoded_vars: Vec<i64>,
        dict_ids: Vec<DictId>,
    },
    /// Whole-string variables stored by dictionary id.
    VarString(Vec<DictId>),
    /// Timestamp strings: (pattern id, epoch ms) per row.
    DateString {
        pattern_ids: Vec<i64>,
        epochs: Vec<i64>,
    },
}

/// One open column: the leaf it belongs to plus its data.
#[derive(Debug)]
pub struct ColumnWriter {
    pub node_id: NodeId,
    pub data: ColumnData,
}

impl ColumnWriter {
    /// Creates the storage variant for a leaf type, or `None` for types
    /// with no per-row storage (null values, empty objects).
    pub fn for_node(node_id: NodeId, node_type: NodeType) -> Option<Self> {
        let data = match node_type {
            NodeType::Integer => ColumnData::Int64(Vec::new()),
            NodeType::Float => ColumnData::Float64(Vec::new()),
            NodeType::Boolean => ColumnData::Bool(Vec::new()),
            NodeType::ClpString | NodeType::UnstructuredArray => ColumnData::ClpString {
                logtype_ids: Vec::new(),
                encoded_counts: Vec::new(),
                dict_counts: Vec::new(),
                encoded_vars: Vec::new(),
                dict_ids: Vec::new(),
            },
            NodeType::VarString => ColumnData::VarString(Vec::new()),
            NodeType::DateString => ColumnData::DateString {
                pattern_ids: Vec::new(),
                epochs: Vec::new(),
            },
            _ => return None,
        };
        Some(Self { node_id, data })
    }

    pub fn append_int(&mut self, value: i64) -> Result<()> {
        match &mut self.data {
            ColumnData::Int64(values) => {
                values.push(value);
                Ok(())
            }
            _ => Err(LogCaskError::ProtocolError("int into non-int column".into())),
        }
    }

    pub fn append_float(&mut self, value: f64) -> Result<()> {
        match &mut self.data {
            ColumnData::Float64(values) => {
                values.push(value);
                Ok(())
            }
            _ => Err(LogCaskError::ProtocolError(
                "float into non-float column".into(),
            )),
        }
    }

    pub fn append_bool(&mut self, value: bool) -> Result<()> {
        match &mut self.data {
            ColumnData::Bool(values) => {
                values.push(u8::from(value));
                Ok(())
            }
            _ => Err(LogCaskError::ProtocolError(
                "bool into non-bool column".into(),
            )),
        }
    }

    pub fn append_clp(
        &mut self,
        logtype_id: DictId,
        encoded: &[i64],
        dict: &[DictId],
    ) -> Result<()> {
        match &mut self.data {
            ColumnData::ClpString {
                logtype_ids,
                encoded_counts,
                dict_counts,
                encoded_vars,
                dict_ids,
            } => {
                logtype_ids.push(logtype_id);
                encoded_counts.push(encoded.len() as u32);
                dict_counts.push(dict.len() as u32);
                encoded_vars.extend_from_slice(encoded);
                dict_ids.extend_from_slice(dict);
                Ok(())
            }
            _ => Err(LogCaskError::ProtocolError(
                "encoded string into non-string column".into(),
            )),
        }
    }

    pub fn append_var_string(&mut self, id: DictId) -> Result<()> {
        match &mut self.data {
            ColumnData::VarString(ids) => {
                ids.push(id);
                Ok(())
            }
            _ => Err(LogCaskError::ProtocolError(
                "variable string into non-string column".into(),
            )),
        }
    }

    pub fn append_date(&mut self, pattern_id: i64, epoch_ms: i64) -> Result<()> {
        match &mut self.data {
            ColumnData::DateString {
                pattern_ids,
                epochs,
            } => {
                pattern_ids.push(pattern_id);
                epochs.push(epoch_ms);
                Ok(())
            }
            _ => Err(LogCaskError::ProtocolError(
                "date into non-date column".into(),
            )),
        }
    }

    /// Rough uncompressed size, used for the segment-size threshold.
    pub fn size_estimate(&self) -> u64 {
        match &self.data {
            ColumnData::Int64(v) => 8 * v.len() as u64,
            ColumnData::Float64(v) => 8 * v.len() as u64,
            ColumnData::Bool(v) => v.len() as u64,
            ColumnData::ClpString {
                logtype_ids,
                encoded_vars,
                dict_ids,
                ..
            } => 16 * logtype_ids.len() as u64
                + 8 * encoded_vars.len() as u64
                + 8 * dict_ids.len() as u64,
            ColumnData::VarString(v) => 8 * v.len() as u64,
            ColumnData::DateString { epochs, .. } => 16 * epochs.len() as u64,
        }
    }

    /// Serializes the column into a segment stream.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        match &self.data {
            ColumnData::Int64(values) => {
                for &v in values {
                    w.write_i64::<LittleEndian>(v)?;
                }
            }
            ColumnData::Float64(values) => {
                for &v in values {
                    w.write_f64::<LittleEndian>(v)?;
                }
            }
            ColumnData::Bool(values) => {
                w.write_all(values)?;
            }
            ColumnData::ClpString {
                logtype_ids,
                encoded_counts,
                dict_counts,
                encoded_vars,
                dict_ids,
            } => {
                for &id in logtype_ids {
                    w.write_u64::<LittleEndian>(id)?;
                }
                for &n in encoded_counts {
                    w.write_u32::<LittleEndian>(n)?;
                }
                for &n in dict_counts {
                    w.write_u32::<LittleEndian>(n)?;
                }
                w.write_u64::<LittleEndian>(encoded_vars.len() as u64)?;
                for &v in encoded_vars {
                    w.write_i64::<LittleEndian>(v)?;
                }
                w.write_u64::<LittleEndian>(dict_ids.len() as u64)?;
                for &id in dict_ids {
                    w.write_u64::<LittleEndian>(id)?;
                }
            }
            ColumnData::VarString(ids) => {
                for &id in ids {
                    w.write_u64::<LittleEndian>(id)?;
                }
            }
            ColumnData::DateString {
                pattern_ids,
                epochs,
            } => {
                for &p in pattern_ids {
                    w.write_i64::<LittleEndian>(p)?;
                }
                for &e in epochs {
                    w.write_i64::<LittleEndian>(e)?;
                }
            }
        }
        Ok(())
    }
}

/// Reader-side storage for one column.
#[derive(Debug)]
pub enum ColumnValues {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bool(Vec<u8>),
    ClpString {
        logtype_ids: Vec<DictId>,
        /// Prefix offsets, length `rows + 1`.
        encoded_offsets: Vec<usize>,
        dict_offsets: Vec<usize>,
        encoded_vars: Vec<i64>,
        dict_ids: Vec<DictId>,
    },
    VarString(Vec<DictId>),
    DateString {
        pattern_ids: Vec<i64>,
        epochs: Vec<i64>,
    },
}

/// One loaded column.
#[derive(Debug)]
pub struct ColumnReader {
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub values: ColumnValues,
}

impl ColumnReader {
    /// Loads `rows` values of a column from a segment stream. Must
    /// mirror [`ColumnWriter::write_to`] exactly.
    pub fn load<R: Read>(
        r: &mut R,
        node_id: NodeId,
        node_type: NodeType,
        rows: u64,
    ) -> Result<Option<Self>> {
        let rows = rows as usize;
        let values = match node_type {
            NodeType::Integer => {
                let mut values = vec![0i64; rows];
                r.read_i64_into::<LittleEndian>(&mut values)?;
                ColumnValues::Int64(values)
            }
            NodeType::Float => {
                let mut values = vec![0f64; rows];
                r.read_f64_into::<LittleEndian>(&mut values)?;
                ColumnValues::Float64(values)
            }
            NodeType::Boolean => {
                let mut values = vec![0u8; rows];
                r.read_exact(&mut values)?;
                ColumnValues::Bool(values)
            }
            NodeType::ClpString | NodeType::UnstructuredArray => {
                let mut logtype_ids = vec![0u64; rows];
                r.read_u64_into::<LittleEndian>(&mut logtype_ids)?;
                let mut encoded_counts = vec![0u32; rows];
                r.read_u32_into::<LittleEndian>(&mut encoded_counts)?;
                let mut dict_counts = vec![0u32; rows];
                r.read_u32_into::<LittleEndian>(&mut dict_counts)?;

                let encoded_len = r.read_u64::<LittleEndian>()? as usize;
                let mut encoded_vars = vec![0i64; encoded_len];
                r.read_i64_into::<LittleEndian>(&mut encoded_vars)?;
                let dict_len = r.read_u64::<LittleEndian>()? as usize;
                let mut dict_ids = vec![0u64; dict_len];
                r.read_u64_into::<LittleEndian>(&mut dict_ids)?;

                let encoded_offsets = prefix_offsets(&encoded_counts, encoded_len)?;
                let dict_offsets = prefix_offsets(&dict_counts, dict_len)?;
                ColumnValues::ClpString {
                    logtype_ids,
                    encoded_offsets,
                    dict_offsets,
                    encoded_vars,
                    dict_ids,
                }
            }
            NodeType::VarString => {
                let mut ids = vec![0u64; rows];
                r.read_u64_into::<LittleEndian>(&mut ids)?;
                ColumnValues::VarString(ids)
            }
            NodeType::DateString => {
                let mut pattern_ids = vec![0i64; rows];
                r.read_i64_into::<LittleEndian>(&mut pattern_ids)?;
                let mut epochs = vec![0i64; rows];
                r.read_i64_into::<LittleEndian>(&mut epochs)?;
                ColumnValues::DateString {
                    pattern_ids,
                    epochs,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(Self {
            node_id,
            node_type,
            values,
        }))
    }

    pub fn rows(&self) -> usize {
        match &self.values {
            ColumnValues::Int64(v) => v.len(),
            ColumnValues::Float64(v) => v.len(),
            ColumnValues::Bool(v) => v.len(),
            ColumnValues::ClpString { logtype_ids, .. } => logtype_ids.len(),
            ColumnValues::VarString(v) => v.len(),
            ColumnValues::DateString { epochs, .. } => epochs.len(),
        }
    }

    /// Decodes a CLP-encoded row back to its original text.
    pub fn decode_clp_row(
        &self,
        row: usize,
        logtype_dict: &Dictionary,
        var_dict: &Dictionary,
    ) -> Result<String> {
        match &self.values {
            ColumnValues::ClpString {
                logtype_ids,
                encoded_offsets,
                dict_offsets,
                encoded_vars,
                dict_ids,
            } => {
                let logtype = logtype_dict.lookup_by_id(logtype_ids[row])?;
                let encoded = &encoded_vars[encoded_offsets[row]..encoded_offsets[row + 1]];
                let dict: Vec<&str> = dict_ids[dict_offsets[row]..dict_offsets[row + 1]]
                    .iter()
                    .map(|&id| var_dict.lookup_by_id(id))
                    .collect::<Result<_>>()?;
                decode_message(logtype.as_bytes(), encoded, &dict)
            }
            _ => Err(LogCaskError::ProtocolError(
                "decode_clp_row on a non-CLP column".into(),
            )),
        }
    }

    /// The row's variable streams, for search-time confirmation.
    pub fn clp_row_vars(&self, row: usize) -> Option<(DictId, &[i64], &[DictId])> {
        match &self.values {
            ColumnValues::ClpString {
                logtype_ids,
                encoded_offsets,
                dict_offsets,
                encoded_vars,
                dict_ids,
            } => Some((
                logtype_ids[row],
                &encoded_vars[encoded_offsets[row]..encoded_offsets[row + 1]],
                &dict_ids[dict_offsets[row]..dict_offsets[row + 1]],
            )),
            _ => None,
        }
    }
}

fn prefix_offsets(counts: &[u32], total: usize) -> Result<Vec<usize>> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    let mut sum = 0usize;
    offsets.push(0);
    for &c in counts {
        sum += c as usize;
        offsets.push(sum);
    }
    if sum != total {
        return Err(LogCaskError::CorruptedArchive(
            "column span counts disagree with the variable stream length".into(),
        ));
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::MAX_VAR_ID;
    use logcask_core::encoding::encode_message;

    #[test]
    fn test_int_column_roundtrip() {
        let mut col = ColumnWriter::for_node(3, NodeType::Integer).unwrap();
        for v in [1, -5, i64::MAX] {
            col.append_int(v).unwrap();
        }
        let mut buf = Vec::new();
        col.write_to(&mut buf).unwrap();

        let reader = ColumnReader::load(&mut buf.as_slice(), 3, NodeType::Integer, 3)
            .unwrap()
            .unwrap();
        match reader.values {
            ColumnValues::Int64(values) => assert_eq!(values, vec![1, -5, i64::MAX]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_clp_column_roundtrip() {
        let mut logtype_dict = Dictionary::new(MAX_VAR_ID);
        let mut var_dict = Dictionary::new(MAX_VAR_ID);

        let messages = [
            "task 12 finished in 0.5 s on host-1",
            "task 13 finished in 1.5 s on host-2",
        ];
        let mut col = ColumnWriter::for_node(7, NodeType::ClpString).unwrap();
        for msg in &messages {
            let encoded = encode_message::<i64>(msg);
            let (logtype_id, _) = logtype_dict
                .add_occurrence(std::str::from_utf8(&encoded.logtype).unwrap())
                .unwrap();
            let dict_ids: Vec<_> = encoded
                .dict_vars
                .iter()
                .map(|v| var_dict.add_occurrence(v).unwrap().0)
                .collect();
            col.append_clp(logtype_id, &encoded.encoded_vars, &dict_ids)
                .unwrap();
        }

        let mut buf = Vec::new();
        col.write_to(&mut buf).unwrap();
        let reader = ColumnReader::load(&mut buf.as_slice(), 7, NodeType::ClpString, 2)
            .unwrap()
            .unwrap();
        for (row, msg) in messages.iter().enumerate() {
            assert_eq!(
                reader.decode_clp_row(row, &logtype_dict, &var_dict).unwrap(),
                *msg
            );
        }
    }

    #[test]
    fn test_null_types_have_no_storage() {
        assert!(ColumnWriter::for_node(1, NodeType::NullValue).is_none());
        assert!(ColumnWriter::for_node(1, NodeType::Object).is_none());
        assert!(ColumnWriter::for_node(1, NodeType::StructuredArray).is_none());
    }

    #[test]
    fn test_type_confusion_is_rejected() {
        let mut col = ColumnWriter::for_node(1, NodeType::Integer).unwrap();
        assert!(col.append_bool(true).is_err());
        assert!(col.append_int(1).is_ok());
    }

    #[test]
    fn test_corrupt_span_counts() {
        let mut buf = Vec::new();
        {
            let mut col = ColumnWriter::for_node(1, NodeType::ClpString).unwrap();
            col.append_clp(1, &[42], &[]).unwrap();
            col.write_to(&mut buf).unwrap();
        }
        // Shrink the encoded-variable stream length from 1 to 2 so the
        // counts disagree.
        let count_pos = 8 + 4; // logtype id + encoded count
        buf[count_pos - 4] = 2;
        let err = ColumnReader::load(&mut buf.as_slice(), 1, NodeType::ClpString, 1).unwrap_err();
        assert!(matches!(
            err,
            LogCaskError::CorruptedArchive(_) | LogCaskError::Io(_)
        ));
    }
}
