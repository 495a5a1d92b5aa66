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

//! Search output handlers
//!
//! The executor pushes every confirmed match through an
//! [`OutputHandler`]. A handler failure is terminal for the search
//! session; skipped files are merely logged. Network-streaming,
//! reducer and result-cache sinks plug in through the same trait.

use std::io::Write;

use logcask_archive::FileMetadata;
use logcask_core::timestamp::EpochTimeMs;
use logcask_core::Result;

/// Sink for confirmed search results.
pub trait OutputHandler {
    /// Delivers one result. An error aborts the search session.
    fn add_result(&mut self, path: &str, message: &str, timestamp_ms: EpochTimeMs) -> Result<()>;

    /// Gives the handler a chance to skip a whole input file (e.g. a
    /// result cache that already holds it).
    fn can_skip_file(&mut self, _file: &FileMetadata) -> bool {
        false
    }

    /// Flushes buffered results at end of session.
    fn flush(&mut self) -> Result<()>;
}

/// Streams results line-by-line to a writer (stdout in the CLI).
pub struct StreamingOutputHandler<W: Write> {
    writer: W,
    print_timestamps: bool,
}

impl<W: Write> StreamingOutputHandler<W> {
    pub fn new(writer: W, print_timestamps: bool) -> Self {
        Self {
            writer,
            print_timestamps,
        }
    }
}

impl<W: Write> OutputHandler for StreamingOutputHandler<W> {
    fn add_result(&mut self, _path: &str, message: &str, timestamp_ms: EpochTimeMs) -> Result<()> {
        if self.print_timestamps {
            write!(self.writer, "{timestamp_ms} ")?;
        }
        self.writer.write_all(message.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One collected result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub path: String,
    pub message: String,
    pub timestamp_ms: EpochTimeMs,
}

/// Batches results in memory (the result-cache shape).
#[derive(Debug, Default)]
pub struct CollectingOutputHandler {
    pub results: Vec<SearchResult>,
}

impl OutputHandler for CollectingOutputHandler {
    fn add_result(&mut self, path: &str, message: &str, timestamp_ms: EpochTimeMs) -> Result<()> {
        self.results.push(SearchResult {
            path: path.to_owned(),
            message: message.to_owned(),
            timestamp_ms,
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
