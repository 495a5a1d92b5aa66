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

//! IR stream serializer
//!
//! Frames one preamble plus a sequence of encoded log events into a byte
//! buffer. The 4-byte variant stores timestamps as deltas against the
//! preamble's reference timestamp; the 8-byte variant stores absolute
//! values.

use byteorder::{LittleEndian, WriteBytesExt};
use serde_json::json;

use logcask_core::encoding::{encode_message, EncodedVariable};
use logcask_core::timestamp::EpochTimeMs;
use logcask_core::{LogCaskError, Result};

use crate::protocol::{metadata, tag, IrEncoding, MAGIC_LEN, VERSION};

/// Preamble metadata of an IR stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrMetadata {
    pub timestamp_pattern: String,
    pub timestamp_pattern_syntax: String,
    pub time_zone_id: String,
    /// Base timestamp for delta encoding; only meaningful for 4-byte
    /// streams.
    pub reference_timestamp: EpochTimeMs,
}

/// Serializes log events into an in-memory IR stream.
pub struct IrStreamWriter<V: EncodedVariable> {
    buf: Vec<u8>,
    prev_timestamp: EpochTimeMs,
    finished: bool,
    _width: std::marker::PhantomData<V>,
}

impl<V: EncodedVariable> IrStreamWriter<V> {
    fn encoding() -> IrEncoding {
        if V::WIDTH == 4 {
            IrEncoding::FourByte
        } else {
            IrEncoding::EightByte
        }
    }

    /// Creates a writer and emits the preamble.
    pub fn new(meta: &IrMetadata) -> Result<Self> {
        let mut writer = Self {
            buf: Vec::with_capacity(256),
            prev_timestamp: meta.reference_timestamp,
            finished: false,
            _width: std::marker::PhantomData,
        };
        writer.buf.extend_from_slice(&Self::encoding().magic());
        writer.write_metadata(meta)?;
        Ok(writer)
    }

    fn write_metadata(&mut self, meta: &IrMetadata) -> Result<()> {
        let mut object = json!({
            metadata::VERSION_KEY: VERSION,
            metadata::TIMESTAMP_PATTERN_KEY: meta.timestamp_pattern,
            metadata::TIMESTAMP_PATTERN_SYNTAX_KEY: meta.timestamp_pattern_syntax,
            metadata::TIME_ZONE_ID_KEY: meta.time_zone_id,
        });
        if Self::encoding() == IrEncoding::FourByte {
            object[metadata::REFERENCE_TIMESTAMP_KEY] = json!(meta.reference_timestamp);
        }
        let bytes = serde_json::to_vec(&object)
            .map_err(|e| LogCaskError::CorruptedMetadata(e.to_string()))?;

        self.buf.push(metadata::ENCODING_JSON);
        if let Ok(len) = u8::try_from(bytes.len()) {
            self.buf.push(metadata::LENGTH_U8);
            self.buf.push(len);
        } else if let Ok(len) = u16::try_from(bytes.len()) {
            self.buf.push(metadata::LENGTH_U16);
            self.buf.write_u16::<LittleEndian>(len)?;
        } else {
            return Err(LogCaskError::BadParam(
                "preamble metadata exceeds 64 KiB".into(),
            ));
        }
        self.buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// Encodes and appends one log event.
    pub fn write_message(&mut self, timestamp: EpochTimeMs, message: &str) -> Result<()> {
        if self.finished {
            return Err(LogCaskError::OperationNotPermitted(
                "stream already finished".into(),
            ));
        }
        let encoded = encode_message::<V>(message);

        // Variables and logtype first, timestamp last; the decoder uses
        // the timestamp as the end-of-message marker.
        let mut encoded_ix = 0;
        let mut dict_ix = 0;
        let mut i = 0;
        let logtype = &encoded.logtype;
        while i < logtype.len() {
            match logtype[i] {
                logcask_core::placeholder::ESCAPE_CHAR => i += 1,
                logcask_core::placeholder::INTEGER_PLACEHOLDER
                | logcask_core::placeholder::FLOAT_PLACEHOLDER => {
                    let var = encoded.encoded_vars[encoded_ix];
                    encoded_ix += 1;
                    self.write_encoded_var(var)?;
                }
                logcask_core::placeholder::DICTIONARY_PLACEHOLDER => {
                    let var = &encoded.dict_vars[dict_ix];
                    dict_ix += 1;
                    self.write_dict_var(var)?;
                }
                _ => {}
            }
            i += 1;
        }

        self.write_logtype(&encoded.logtype)?;
        self.write_timestamp(timestamp)?;
        Ok(())
    }

    fn write_encoded_var(&mut self, var: V) -> Result<()> {
        if V::WIDTH == 4 {
            self.buf.push(tag::VAR_FOUR_BYTE);
            self.buf.write_i32::<LittleEndian>(var.to_i64() as i32)?;
        } else {
            self.buf.push(tag::VAR_EIGHT_BYTE);
            self.buf.write_i64::<LittleEndian>(var.to_i64())?;
        }
        Ok(())
    }

    fn write_dict_var(&mut self, var: &str) -> Result<()> {
        let bytes = var.as_bytes();
        if let Ok(len) = u8::try_from(bytes.len()) {
            self.buf.push(tag::VAR_STR_LEN_U8);
            self.buf.push(len);
        } else if let Ok(len) = u16::try_from(bytes.len()) {
            self.buf.push(tag::VAR_STR_LEN_U16);
            self.buf.write_u16::<LittleEndian>(len)?;
        } else {
            let len = u32::try_from(bytes.len())
                .map_err(|_| LogCaskError::OutOfRange("dictionary variable length".into()))?;
            self.buf.push(tag::VAR_STR_LEN_U32);
            self.buf.write_u32::<LittleEndian>(len)?;
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_logtype(&mut self, logtype: &[u8]) -> Result<()> {
        if let Ok(len) = u8::try_from(logtype.len()) {
            self.buf.push(tag::LOGTYPE_LEN_U8);
            self.buf.push(len);
        } else if let Ok(len) = u16::try_from(logtype.len()) {
            self.buf.push(tag::LOGTYPE_LEN_U16);
            self.buf.write_u16::<LittleEndian>(len)?;
        } else {
            let len = u32::try_from(logtype.len())
                .map_err(|_| LogCaskError::OutOfRange("logtype length".into()))?;
            self.buf.push(tag::LOGTYPE_LEN_U32);
            self.buf.write_u32::<LittleEndian>(len)?;
        }
        self.buf.extend_from_slice(logtype);
        Ok(())
    }

    fn write_timestamp(&mut self, timestamp: EpochTimeMs) -> Result<()> {
        if Self::encoding() == IrEncoding::EightByte {
            self.buf.push(tag::TIMESTAMP_VAL);
            self.buf.write_i64::<LittleEndian>(timestamp)?;
            return Ok(());
        }

        let delta = timestamp - self.prev_timestamp;
        self.prev_timestamp = timestamp;
        if let Ok(delta) = i8::try_from(delta) {
            self.buf.push(tag::TIMESTAMP_DELTA_I8);
            self.buf.write_i8(delta)?;
        } else if let Ok(delta) = i16::try_from(delta) {
            self.buf.push(tag::TIMESTAMP_DELTA_I16);
            self.buf.write_i16::<LittleEndian>(delta)?;
        } else if let Ok(delta) = i32::try_from(delta) {
            self.buf.push(tag::TIMESTAMP_DELTA_I32);
            self.buf.write_i32::<LittleEndian>(delta)?;
        } else {
            return Err(LogCaskError::OutOfRange(
                "timestamp delta exceeds 32 bits".into(),
            ));
        }
        Ok(())
    }

    /// Emits the end-of-stream tag. Further writes fail.
    pub fn finish(&mut self) {
        if !self.finished {
            self.buf.push(tag::EOF);
            self.finished = true;
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.finish();
        self.buf
    }

    /// Bytes written so far, preamble included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() <= MAGIC_LEN
    }
}
