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

//! Validating UTF-8 filter
//!
//! Input paths and log bytes cross the environment boundary here. Two
//! policies exist: substitute invalid sequences with U+FFFD, or reject
//! the input outright.

use crate::error::{LogCaskError, Result};
use std::borrow::Cow;

/// What to do with an invalid byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Policy {
    /// Replace each invalid sequence with U+FFFD.
    Substitute,
    /// Fail with [`LogCaskError::IllegalByteSequence`].
    Reject,
}

/// Validates `bytes` under the given policy.
///
/// Valid input borrows; substitution allocates only when needed.
pub fn filter_utf8(bytes: &[u8], policy: Utf8Policy) -> Result<Cow<'_, str>> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(Cow::Borrowed(s)),
        Err(err) => match policy {
            Utf8Policy::Reject => Err(LogCaskError::IllegalByteSequence(err.valid_up_to())),
            Utf8Policy::Substitute => Ok(Cow::Owned(substitute(bytes))),
        },
    }
}

fn substitute(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                out.push_str(s);
                return out;
            }
            Err(err) => {
                let valid = err.valid_up_to();
                // Safe: validated prefix.
                out.push_str(unsafe { std::str::from_utf8_unchecked(&bytes[..valid]) });
                out.push('\u{FFFD}');
                let skip = err.error_len().unwrap_or(bytes.len() - valid);
                bytes = &bytes[valid + skip..];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input_borrows() {
        let out = filter_utf8(b"plain ascii", Utf8Policy::Reject).unwrap();
        assert!(matches!(out, Cow::Borrowed("plain ascii")));
    }

    #[test]
    fn test_reject_policy() {
        let err = filter_utf8(b"ab\xFFcd", Utf8Policy::Reject).unwrap_err();
        assert!(matches!(err, LogCaskError::IllegalByteSequence(2)));
    }

    #[test]
    fn test_substitute_policy() {
        let out = filter_utf8(b"ab\xFFcd", Utf8Policy::Substitute).unwrap();
        assert_eq!(out, "ab\u{FFFD}cd");

        // Truncated multi-byte sequence at end of input.
        let out = filter_utf8(b"ok \xE2\x82", Utf8Policy::Substitute).unwrap();
        assert_eq!(out, "ok \u{FFFD}");
    }
}
