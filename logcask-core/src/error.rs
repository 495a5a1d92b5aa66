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

//! Error types for LogCask

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogCaskError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Already open: {0}")]
    AlreadyOpen(String),

    #[error("Bad parameter: {0}")]
    BadParam(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("End of file")]
    EndOfFile,

    #[error("Truncated data: {0}")]
    Truncated(String),

    #[error("Corrupted archive: {0}")]
    CorruptedArchive(String),

    #[error("Corrupted IR stream: {0}")]
    CorruptedIr(String),

    #[error("Incomplete IR stream: more bytes required")]
    IncompleteIr,

    #[error("Corrupted metadata: {0}")]
    CorruptedMetadata(String),

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(String),

    #[error("Conflicting node type: {0}")]
    ConflictingNodeType(String),

    #[error("Schema/value mismatch: {0}")]
    ProtocolError(String),

    #[error("Operation not supported by the protocol: {0}")]
    ProtocolNotSupported(String),

    #[error("Operation not permitted: {0}")]
    OperationNotPermitted(String),

    #[error("Illegal byte sequence at offset {0}")]
    IllegalByteSequence(usize),

    #[error("Bulk write to record store failed: {0}")]
    DbBulkWrite(String),
}

pub type Result<T> = std::result::Result<T, LogCaskError>;
