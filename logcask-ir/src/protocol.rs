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

//! IR stream protocol constants
//!
//! Every value here is a fixed wire constant. Readers reject streams with
//! unknown magic numbers or versions; writers always emit the smallest
//! valid length variant and readers accept all of them.

/// Magic number opening an 8-byte-encoded IR stream.
pub const EIGHT_BYTE_MAGIC: [u8; 4] = [0xFD, 0x2F, 0xB5, 0x29];

/// Magic number opening a 4-byte-encoded IR stream.
pub const FOUR_BYTE_MAGIC: [u8; 4] = [0xFD, 0x2F, 0xB5, 0x28];

pub const MAGIC_LEN: usize = 4;

/// Stream format version carried in the preamble metadata.
pub const VERSION: &str = "0.0.1";

/// Preamble metadata keys.
pub mod metadata {
    pub const ENCODING_JSON: u8 = 0x01;
    pub const LENGTH_U8: u8 = 0x11;
    pub const LENGTH_U16: u8 = 0x12;

    pub const VERSION_KEY: &str = "VERSION";
    pub const TIMESTAMP_PATTERN_KEY: &str = "TIMESTAMP_PATTERN";
    pub const TIMESTAMP_PATTERN_SYNTAX_KEY: &str = "TIMESTAMP_PATTERN_SYNTAX";
    pub const TIME_ZONE_ID_KEY: &str = "TZ_ID";
    pub const REFERENCE_TIMESTAMP_KEY: &str = "REFERENCE_TIMESTAMP";
}

/// Per-message payload tags.
pub mod tag {
    /// End of stream.
    pub const EOF: u8 = 0x00;

    /// Dictionary variable literal, u8 length.
    pub const VAR_STR_LEN_U8: u8 = 0x11;
    /// Dictionary variable literal, u16 length.
    pub const VAR_STR_LEN_U16: u8 = 0x12;
    /// Dictionary variable literal, u32 length.
    pub const VAR_STR_LEN_U32: u8 = 0x13;

    /// Encoded variable, 4-byte payload.
    pub const VAR_FOUR_BYTE: u8 = 0x18;
    /// Encoded variable, 8-byte payload.
    pub const VAR_EIGHT_BYTE: u8 = 0x19;

    /// Logtype literal, u8 length.
    pub const LOGTYPE_LEN_U8: u8 = 0x21;
    /// Logtype literal, u16 length.
    pub const LOGTYPE_LEN_U16: u8 = 0x22;
    /// Logtype literal, u32 length.
    pub const LOGTYPE_LEN_U32: u8 = 0x23;

    /// Absolute timestamp, i64 (8-byte streams).
    pub const TIMESTAMP_VAL: u8 = 0x30;
    /// Timestamp delta, i8 (4-byte streams).
    pub const TIMESTAMP_DELTA_I8: u8 = 0x31;
    /// Timestamp delta, i16 (4-byte streams).
    pub const TIMESTAMP_DELTA_I16: u8 = 0x32;
    /// Timestamp delta, i32 (4-byte streams).
    pub const TIMESTAMP_DELTA_I32: u8 = 0x33;
}

/// Which encoded-variable width a stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrEncoding {
    FourByte,
    EightByte,
}

impl IrEncoding {
    pub fn magic(self) -> [u8; 4] {
        match self {
            IrEncoding::FourByte => FOUR_BYTE_MAGIC,
            IrEncoding::EightByte => EIGHT_BYTE_MAGIC,
        }
    }
}
