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

//! LogCask IR Stream
//!
//! A self-describing byte stream of encoded log events for unstructured
//! logs, independent of any archive. A stream is a 4-byte magic number
//! (selecting the 4-byte or 8-byte encoded-variable width), a JSON
//! metadata preamble, then one frame per log event: the event's
//! variables, its logtype, and its timestamp — absolute in 8-byte
//! streams, a signed delta against the running timestamp in 4-byte
//! streams.

pub mod protocol;
pub mod reader;
pub mod writer;

pub use protocol::IrEncoding;
pub use reader::{detect_encoding, IrLogEvent, IrStreamReader};
pub use writer::{IrMetadata, IrStreamWriter};
