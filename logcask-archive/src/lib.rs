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

//! LogCask Archive
//!
//! The columnar archive engine: heterogeneous JSON log records are
//! compressed into a per-archive *schema tree* plus type-specialized
//! columns grouped by *schema signature* (the exact set of leaves a
//! record touched). Message-like strings split into a dictionary-coded
//! logtype and packed variables, so both the templates and the values
//! deduplicate across millions of records.
//!
//! An archive is one directory: `metadata`, the logtype/variable
//! dictionary pairs, `schema_tree`, `schema_map`, `timestamp.dict`, a
//! `logs/` directory of per-input-file metadata, and `segments/` with
//! one immutable file per sealed segment. A single writer owns the
//! directory during ingestion; any number of readers may open it once
//! the metadata row exists.

pub mod column;
pub mod dictionary;
pub mod metadata;
pub mod ordered;
pub mod reader;
pub mod schema;
pub mod schema_tree;
pub mod segment;
pub mod timestamp_dict;
pub mod writer;

pub use metadata::{ArchiveMetadata, FileMetadata, FileState};
pub use ordered::{decompress_ordered, ChunkDocument, CollectingRecordSink, RecordSink};
pub use reader::{ArchiveReader, SchemaReader};
pub use writer::{ArchiveWriter, ArchiveWriterConfig};
