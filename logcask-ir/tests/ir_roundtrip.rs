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

//! IR stream round-trip tests across both widths.

use logcask_core::encoding::EncodedVariable;
use logcask_ir::{IrMetadata, IrStreamReader, IrStreamWriter};

fn metadata() -> IrMetadata {
    IrMetadata {
        timestamp_pattern: "%Y-%m-%d %H:%M:%S,%3".into(),
        timestamp_pattern_syntax: "yyyy-MM-dd HH:mm:ss".into(),
        time_zone_id: "Asia/Tokyo".into(),
        reference_timestamp: 1_700_000_000_000,
    }
}

fn roundtrip<V: EncodedVariable>(events: &[(i64, &str)]) {
    let meta = metadata();
    let mut writer = IrStreamWriter::<V>::new(&meta).unwrap();
    for (ts, msg) in events {
        writer.write_message(*ts, msg).unwrap();
    }
    let bytes = writer.into_bytes();

    let mut reader = IrStreamReader::<V>::new(&bytes).unwrap();
    assert_eq!(reader.metadata().timestamp_pattern, meta.timestamp_pattern);
    assert_eq!(reader.metadata().time_zone_id, meta.time_zone_id);
    for (ts, msg) in events {
        let event = reader.read_message().unwrap().unwrap();
        assert_eq!(event.timestamp, *ts);
        assert_eq!(event.message().unwrap(), *msg);
    }
    assert!(reader.read_message().unwrap().is_none());
}

#[test]
fn four_byte_stream_roundtrip() {
    roundtrip::<i32>(&[
        (
            1_700_000_000_123,
            "Static <text>, dictVar1, 123, 456.7, dictVar2, 987, 654.3, end of static text",
        ),
        (
            1_700_000_000_001, // negative delta against the previous event
            "Static <text>, dictVar3, 355.2352512, 23953324532112, python3.4.6, end of static text",
        ),
        (1_700_000_600_000, "large forward jump over 4 digits 9999"),
    ]);
}

#[test]
fn eight_byte_stream_roundtrip() {
    roundtrip::<i64>(&[
        (0, "job 1 started"),
        (-5_000, "timestamps may precede the epoch by 5 seconds"),
        (
            i64::MAX,
            "absolute timestamps use the full i64 range 9223372036854775807",
        ),
    ]);
}

#[test]
fn mixed_variable_widths_demote_consistently() {
    // A value that fits the 8-byte integer encoding but not the 4-byte
    // one must still round-trip in a 4-byte stream (via the dictionary).
    let msg = format!("counter wrapped at {}", i64::MAX);
    let meta = metadata();

    let mut writer = IrStreamWriter::<i32>::new(&meta).unwrap();
    writer.write_message(meta.reference_timestamp, &msg).unwrap();
    let bytes = writer.into_bytes();

    let mut reader = IrStreamReader::<i32>::new(&bytes).unwrap();
    let event = reader.read_message().unwrap().unwrap();
    assert_eq!(event.message().unwrap(), msg);
    assert_eq!(event.encoded_vars.len(), 0);
    assert_eq!(event.dict_vars.len(), 1);
}
