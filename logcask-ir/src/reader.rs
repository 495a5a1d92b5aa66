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

//! IR stream deserializer
//!
//! The reader keeps a committed cursor: every read first runs against a
//! trial position and commits only on success, so an
//! [`LogCaskError::IncompleteIr`] failure leaves the stream position
//! untouched and the caller can retry once more bytes arrive.

use serde_json::Value;

use logcask_core::encoding::{decode_message, EncodedVariable};
use logcask_core::timestamp::EpochTimeMs;
use logcask_core::{LogCaskError, Result};

use crate::protocol::{
    metadata, tag, IrEncoding, EIGHT_BYTE_MAGIC, FOUR_BYTE_MAGIC, MAGIC_LEN, VERSION,
};
use crate::writer::IrMetadata;

/// One decoded log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrLogEvent<V> {
    /// Absolute epoch milliseconds. For 4-byte streams this is the
    /// preamble reference plus the running delta sum.
    pub timestamp: EpochTimeMs,
    pub logtype: Vec<u8>,
    pub encoded_vars: Vec<V>,
    pub dict_vars: Vec<String>,
}

impl<V: EncodedVariable> IrLogEvent<V> {
    /// Reconstructs the original message text.
    pub fn message(&self) -> Result<String> {
        decode_message(&self.logtype, &self.encoded_vars, &self.dict_vars)
    }
}

/// Trial cursor over the stream bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(LogCaskError::IncompleteIr);
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    fn i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

/// Detects the stream encoding from its magic number.
pub fn detect_encoding(data: &[u8]) -> Result<IrEncoding> {
    if data.len() < MAGIC_LEN {
        return Err(LogCaskError::IncompleteIr);
    }
    let magic = &data[..MAGIC_LEN];
    if magic == EIGHT_BYTE_MAGIC.as_slice() {
        Ok(IrEncoding::EightByte)
    } else if magic == FOUR_BYTE_MAGIC.as_slice() {
        Ok(IrEncoding::FourByte)
    } else {
        Err(LogCaskError::CorruptedIr("unknown magic number".into()))
    }
}

/// Deserializes an IR stream of a fixed encoded-variable width.
#[derive(Debug)]
pub struct IrStreamReader<'a, V: EncodedVariable> {
    data: &'a [u8],
    pos: usize,
    metadata: IrMetadata,
    prev_timestamp: EpochTimeMs,
    _width: std::marker::PhantomData<V>,
}

impl<'a, V: EncodedVariable> IrStreamReader<'a, V> {
    /// Opens a stream, checking the magic number and decoding the
    /// preamble.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let encoding = detect_encoding(data)?;
        let expected = if V::WIDTH == 4 {
            IrEncoding::FourByte
        } else {
            IrEncoding::EightByte
        };
        if encoding != expected {
            return Err(LogCaskError::CorruptedIr(
                "stream width does not match the requested decoder".into(),
            ));
        }

        let mut cursor = Cursor {
            data,
            pos: MAGIC_LEN,
        };
        let metadata = Self::read_metadata(&mut cursor, encoding)?;
        let prev_timestamp = metadata.reference_timestamp;
        Ok(Self {
            data,
            pos: cursor.pos,
            metadata,
            prev_timestamp,
            _width: std::marker::PhantomData,
        })
    }

    fn read_metadata(cursor: &mut Cursor<'_>, encoding: IrEncoding) -> Result<IrMetadata> {
        if cursor.u8()? != metadata::ENCODING_JSON {
            return Err(LogCaskError::CorruptedIr(
                "unknown preamble metadata encoding".into(),
            ));
        }
        let len = match cursor.u8()? {
            metadata::LENGTH_U8 => usize::from(cursor.u8()?),
            metadata::LENGTH_U16 => usize::from(cursor.u16()?),
            _ => {
                return Err(LogCaskError::CorruptedIr(
                    "unknown preamble length tag".into(),
                ))
            }
        };
        let bytes = cursor.take(len)?;
        let object: Value = serde_json::from_slice(bytes)
            .map_err(|e| LogCaskError::CorruptedMetadata(e.to_string()))?;

        let get_str = |key: &str| -> Result<String> {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| LogCaskError::CorruptedMetadata(format!("missing key {key}")))
        };

        let version = get_str(metadata::VERSION_KEY)?;
        if version != VERSION {
            return Err(LogCaskError::UnsupportedVersion(version));
        }

        let reference_timestamp = if encoding == IrEncoding::FourByte {
            object
                .get(metadata::REFERENCE_TIMESTAMP_KEY)
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    LogCaskError::CorruptedMetadata("missing reference timestamp".into())
                })?
        } else {
            0
        };

        Ok(IrMetadata {
            timestamp_pattern: get_str(metadata::TIMESTAMP_PATTERN_KEY)?,
            timestamp_pattern_syntax: get_str(metadata::TIMESTAMP_PATTERN_SYNTAX_KEY)?,
            time_zone_id: get_str(metadata::TIME_ZONE_ID_KEY)?,
            reference_timestamp,
        })
    }

    pub fn metadata(&self) -> &IrMetadata {
        &self.metadata
    }

    /// Current committed position in the stream.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reads the next log event. Returns `Ok(None)` at the end-of-stream
    /// tag. On [`LogCaskError::IncompleteIr`] the position is unchanged.
    pub fn read_message(&mut self) -> Result<Option<IrLogEvent<V>>> {
        let mut cursor = Cursor {
            data: self.data,
            pos: self.pos,
        };

        let mut encoded_vars: Vec<V> = Vec::new();
        let mut dict_vars: Vec<String> = Vec::new();
        let mut logtype: Option<Vec<u8>> = None;

        let timestamp = loop {
            let tag_byte = cursor.u8()?;
            match tag_byte {
                tag::EOF => {
                    self.pos = cursor.pos;
                    return Ok(None);
                }
                tag::VAR_FOUR_BYTE => {
                    if V::WIDTH != 4 {
                        return Err(LogCaskError::CorruptedIr(
                            "4-byte variable in an 8-byte stream".into(),
                        ));
                    }
                    encoded_vars.push(V::from_i64(i64::from(cursor.i32()?)));
                }
                tag::VAR_EIGHT_BYTE => {
                    if V::WIDTH != 8 {
                        return Err(LogCaskError::CorruptedIr(
                            "8-byte variable in a 4-byte stream".into(),
                        ));
                    }
                    encoded_vars.push(V::from_i64(cursor.i64()?));
                }
                tag::VAR_STR_LEN_U8 | tag::VAR_STR_LEN_U16 | tag::VAR_STR_LEN_U32 => {
                    let len = match tag_byte {
                        tag::VAR_STR_LEN_U8 => usize::from(cursor.u8()?),
                        tag::VAR_STR_LEN_U16 => usize::from(cursor.u16()?),
                        _ => cursor.u32()? as usize,
                    };
                    let bytes = cursor.take(len)?;
                    let value = std::str::from_utf8(bytes).map_err(|_| {
                        LogCaskError::CorruptedIr("dictionary variable is not UTF-8".into())
                    })?;
                    dict_vars.push(value.to_owned());
                }
                tag::LOGTYPE_LEN_U8 | tag::LOGTYPE_LEN_U16 | tag::LOGTYPE_LEN_U32 => {
                    if logtype.is_some() {
                        return Err(LogCaskError::CorruptedIr(
                            "second logtype in one message".into(),
                        ));
                    }
                    let len = match tag_byte {
                        tag::LOGTYPE_LEN_U8 => usize::from(cursor.u8()?),
                        tag::LOGTYPE_LEN_U16 => usize::from(cursor.u16()?),
                        _ => cursor.u32()? as usize,
                    };
                    logtype = Some(cursor.take(len)?.to_vec());
                }
                tag::TIMESTAMP_VAL => {
                    if V::WIDTH != 8 {
                        return Err(LogCaskError::CorruptedIr(
                            "absolute timestamp in a 4-byte stream".into(),
                        ));
                    }
                    break cursor.i64()?;
                }
                tag::TIMESTAMP_DELTA_I8 | tag::TIMESTAMP_DELTA_I16 | tag::TIMESTAMP_DELTA_I32 => {
                    if V::WIDTH != 4 {
                        return Err(LogCaskError::CorruptedIr(
                            "timestamp delta in an 8-byte stream".into(),
                        ));
                    }
                    let delta = match tag_byte {
                        tag::TIMESTAMP_DELTA_I8 => i64::from(cursor.u8()? as i8),
                        tag::TIMESTAMP_DELTA_I16 => i64::from(cursor.u16()? as i16),
                        _ => i64::from(cursor.i32()?),
                    };
                    break self.prev_timestamp + delta;
                }
                other => {
                    return Err(LogCaskError::CorruptedIr(format!(
                        "unknown payload tag 0x{other:02x}"
                    )));
                }
            }
        };

        let logtype = logtype.ok_or_else(|| {
            LogCaskError::CorruptedIr("message carries a timestamp but no logtype".into())
        })?;

        self.pos = cursor.pos;
        self.prev_timestamp = timestamp;
        Ok(Some(IrLogEvent {
            timestamp,
            logtype,
            encoded_vars,
            dict_vars,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::IrStreamWriter;

    fn test_metadata() -> IrMetadata {
        IrMetadata {
            timestamp_pattern: "%Y-%m-%d %H:%M:%S,%3".into(),
            timestamp_pattern_syntax: "yyyy-MM-dd HH:mm:ss".into(),
            time_zone_id: "Asia/Tokyo".into(),
            reference_timestamp: 10_000_000,
        }
    }

    #[test]
    fn test_detect_encoding() {
        assert_eq!(
            detect_encoding(&EIGHT_BYTE_MAGIC).unwrap(),
            IrEncoding::EightByte
        );
        assert_eq!(
            detect_encoding(&FOUR_BYTE_MAGIC).unwrap(),
            IrEncoding::FourByte
        );
        assert!(matches!(
            detect_encoding(&[0xFD, 0x2F]).unwrap_err(),
            LogCaskError::IncompleteIr
        ));
        assert!(matches!(
            detect_encoding(&[0x02, 0x43, 0x24, 0x34]).unwrap_err(),
            LogCaskError::CorruptedIr(_)
        ));
    }

    #[test]
    fn test_four_byte_negative_delta() {
        let meta = test_metadata();
        let mut writer = IrStreamWriter::<i32>::new(&meta).unwrap();
        writer
            .write_message(9_999_995, "connection reset by peer on fd 12")
            .unwrap();
        let bytes = writer.into_bytes();

        let mut reader = IrStreamReader::<i32>::new(&bytes).unwrap();
        let event = reader.read_message().unwrap().unwrap();
        assert_eq!(event.timestamp, 9_999_995);
        assert_eq!(event.message().unwrap(), "connection reset by peer on fd 12");
        assert!(reader.read_message().unwrap().is_none());
    }

    #[test]
    fn test_incomplete_is_resumable() {
        let meta = test_metadata();
        let mut writer = IrStreamWriter::<i64>::new(&meta).unwrap();
        writer.write_message(1_234, "queue depth 17 exceeded").unwrap();
        writer.finish();
        let bytes = writer.as_bytes().to_vec();

        // Find the first prefix long enough to hold the preamble.
        let mut reader = IrStreamReader::<i64>::new(&bytes[..bytes.len() - 3]).unwrap();
        let before = reader.position();
        assert!(matches!(
            reader.read_message().unwrap_err(),
            LogCaskError::IncompleteIr
        ));
        assert_eq!(reader.position(), before);

        let mut reader = IrStreamReader::<i64>::new(&bytes).unwrap();
        let event = reader.read_message().unwrap().unwrap();
        assert_eq!(event.timestamp, 1_234);
        assert_eq!(event.message().unwrap(), "queue depth 17 exceeded");
    }

    #[test]
    fn test_corrupted_tag() {
        let meta = test_metadata();
        let mut writer = IrStreamWriter::<i64>::new(&meta).unwrap();
        writer.write_message(1, "x 1").unwrap();
        let mut bytes = writer.into_bytes();
        // Find the position just after the preamble and plant an invalid
        // tag there.
        let reader = IrStreamReader::<i64>::new(&bytes).unwrap();
        let payload_start = reader.position();
        bytes[payload_start] = 0x7F;
        let mut reader = IrStreamReader::<i64>::new(&bytes).unwrap();
        assert!(matches!(
            reader.read_message().unwrap_err(),
            LogCaskError::CorruptedIr(_)
        ));
    }

    #[test]
    fn test_version_check() {
        let meta = test_metadata();
        let writer = IrStreamWriter::<i64>::new(&meta).unwrap();
        let mut bytes = writer.into_bytes();
        // The version string appears inside the JSON preamble; break it.
        let needle = VERSION.as_bytes();
        let pos = bytes
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap();
        bytes[pos] = b'9';
        assert!(matches!(
            IrStreamReader::<i64>::new(&bytes).unwrap_err(),
            LogCaskError::UnsupportedVersion(_)
        ));
    }
}
