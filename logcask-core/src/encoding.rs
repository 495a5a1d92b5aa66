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

//! CLP variable encoding
//!
//! Splits a log message into a logtype (the constant template with one
//! placeholder byte per variable) plus two variable streams:
//!
//! - *encoded variables*: integers and decimal floats packed losslessly
//!   into a fixed-width word, and
//! - *dictionary variables*: everything else, stored by value.
//!
//! Two widths exist. The 8-byte form packs into an `i64` and is used by
//! archives; the 4-byte form packs into an `i32` for the compact IR
//! stream. Values that do not fit the chosen width demote to dictionary
//! variables, so decoding always reproduces the original text
//! byte-for-byte.
//!
//! ## Packed float layout
//!
//! ```text
//! 8-byte: [sign:1][digits:53][decimal-pos:4][num-digits:6]
//! 4-byte: [sign:1][digits:25][decimal-pos:3][num-digits-1:3]
//! ```
//!
//! `digits` is the digit string (decimal point removed) parsed as an
//! unsigned integer, `decimal-pos` the count of digits right of the
//! point. Keeping the digit count lets decoding restore leading zeros,
//! so `-00.00` survives a round trip.

use crate::error::{LogCaskError, Result};
use crate::placeholder::{
    escape_and_append_constant, get_bounds_of_next_var, DICTIONARY_PLACEHOLDER, ESCAPE_CHAR,
    FLOAT_PLACEHOLDER, INTEGER_PLACEHOLDER,
};

/// A fixed-width encoded variable. Implemented for `i64` (8-byte
/// encoding) and `i32` (4-byte encoding).
pub trait EncodedVariable: Copy + PartialEq + Eq + std::fmt::Debug + 'static {
    /// Width of the encoded form in bytes.
    const WIDTH: usize;

    /// Encodes an integer token, or `None` if it does not fit.
    fn encode_integer(token: &str) -> Option<Self>;

    /// Encodes a float token, or `None` if it does not fit.
    fn encode_float(token: &str) -> Option<Self>;

    /// Reverses [`Self::encode_integer`].
    fn decode_integer(self) -> String;

    /// Reverses [`Self::encode_float`].
    fn decode_float(self) -> String;

    fn to_i64(self) -> i64;

    fn from_i64(raw: i64) -> Self;
}

/// Splits `token` into (is-negative, integer digits, fraction digits).
///
/// Returns `None` unless the token is `-?\d+\.\d+` with exactly one
/// decimal point.
fn split_float_token(token: &str) -> Option<(bool, &str, &str)> {
    let (negative, rest) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let dot = rest.find('.')?;
    let (int_part, frac_part) = (&rest[..dot], &rest[dot + 1..]);
    if int_part.is_empty() || frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    Some((negative, int_part, frac_part))
}

/// Folds the digit characters of both parts into one unsigned value.
fn fold_digits(int_part: &str, frac_part: &str) -> Option<u64> {
    let mut digits: u64 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        digits = digits
            .checked_mul(10)?
            .checked_add(u64::from(b - b'0'))?;
    }
    Some(digits)
}

/// Renders a packed float back to its original text.
fn render_float(negative: bool, digits: u64, decimal_pos: usize, num_digits: usize) -> String {
    let mut s = format!("{digits:0num_digits$}");
    s.insert(num_digits - decimal_pos, '.');
    if negative {
        s.insert(0, '-');
    }
    s
}

impl EncodedVariable for i64 {
    const WIDTH: usize = 8;

    fn encode_integer(token: &str) -> Option<Self> {
        let value: i64 = token.parse().ok()?;
        // Reject forms that would not survive a round trip, e.g. "+7",
        // "007" or "-0".
        if value.to_string() != token {
            return None;
        }
        Some(value)
    }

    fn encode_float(token: &str) -> Option<Self> {
        let (negative, int_part, frac_part) = split_float_token(token)?;
        let num_digits = int_part.len() + frac_part.len();
        let decimal_pos = frac_part.len();
        if num_digits >= 1 << 6 || decimal_pos >= 1 << 4 {
            return None;
        }
        let digits = fold_digits(int_part, frac_part)?;
        if digits >= 1 << 53 {
            return None;
        }
        let raw = (u64::from(negative) << 63)
            | (digits << 10)
            | ((decimal_pos as u64) << 6)
            | num_digits as u64;
        Some(raw as i64)
    }

    fn decode_integer(self) -> String {
        self.to_string()
    }

    fn decode_float(self) -> String {
        let raw = self as u64;
        let num_digits = (raw & 0x3F) as usize;
        let decimal_pos = ((raw >> 6) & 0xF) as usize;
        let digits = (raw >> 10) & ((1 << 53) - 1);
        let negative = (raw >> 63) != 0;
        render_float(negative, digits, decimal_pos, num_digits)
    }

    fn to_i64(self) -> i64 {
        self
    }

    fn from_i64(raw: i64) -> Self {
        raw
    }
}

impl EncodedVariable for i32 {
    const WIDTH: usize = 4;

    fn encode_integer(token: &str) -> Option<Self> {
        let value: i32 = token.parse().ok()?;
        if value.to_string() != token {
            return None;
        }
        Some(value)
    }

    fn encode_float(token: &str) -> Option<Self> {
        let (negative, int_part, frac_part) = split_float_token(token)?;
        let num_digits = int_part.len() + frac_part.len();
        let decimal_pos = frac_part.len();
        if num_digits > 8 || decimal_pos >= 1 << 3 {
            return None;
        }
        let digits = fold_digits(int_part, frac_part)?;
        if digits >= 1 << 25 {
            return None;
        }
        let raw = (u32::from(negative) << 31)
            | ((digits as u32) << 6)
            | ((decimal_pos as u32) << 3)
            | (num_digits as u32 - 1);
        Some(raw as i32)
    }

    fn decode_integer(self) -> String {
        self.to_string()
    }

    fn decode_float(self) -> String {
        let raw = self as u32;
        let num_digits = (raw & 0x7) as usize + 1;
        let decimal_pos = ((raw >> 3) & 0x7) as usize;
        let digits = u64::from((raw >> 6) & ((1 << 25) - 1));
        let negative = (raw >> 31) != 0;
        render_float(negative, digits, decimal_pos, num_digits)
    }

    fn to_i64(self) -> i64 {
        i64::from(self)
    }

    fn from_i64(raw: i64) -> Self {
        raw as i32
    }
}

/// The result of encoding one message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedMessage<V> {
    /// The template: constant bytes plus placeholder bytes, with
    /// placeholder/escape collisions escaped.
    pub logtype: Vec<u8>,
    /// Packed integer/float variables, in placeholder order.
    pub encoded_vars: Vec<V>,
    /// Dictionary variables, in placeholder order.
    pub dict_vars: Vec<String>,
}

/// Encodes `message` into a logtype and its variable streams.
pub fn encode_message<V: EncodedVariable>(message: &str) -> EncodedMessage<V> {
    let mut out = EncodedMessage {
        logtype: Vec::with_capacity(message.len()),
        encoded_vars: Vec::new(),
        dict_vars: Vec::new(),
    };
    let bytes = message.as_bytes();
    let (mut begin, mut end) = (0usize, 0usize);
    let mut constant_start = 0usize;
    while get_bounds_of_next_var(bytes, &mut begin, &mut end) {
        escape_and_append_constant(&message[constant_start..begin], &mut out.logtype);
        let token = &message[begin..end];
        if let Some(var) = V::encode_integer(token) {
            out.logtype.push(INTEGER_PLACEHOLDER);
            out.encoded_vars.push(var);
        } else if let Some(var) = V::encode_float(token) {
            out.logtype.push(FLOAT_PLACEHOLDER);
            out.encoded_vars.push(var);
        } else {
            out.logtype.push(DICTIONARY_PLACEHOLDER);
            out.dict_vars.push(token.to_string());
        }
        constant_start = end;
    }
    escape_and_append_constant(&message[constant_start..], &mut out.logtype);
    out
}

/// Decodes a message from its logtype and variable streams.
///
/// Fails with [`LogCaskError::Truncated`] when the logtype references
/// more variables than provided and with
/// [`LogCaskError::CorruptedArchive`] on a dangling escape byte.
pub fn decode_message<V: EncodedVariable, S: AsRef<str>>(
    logtype: &[u8],
    encoded_vars: &[V],
    dict_vars: &[S],
) -> Result<String> {
    let mut out: Vec<u8> = Vec::with_capacity(logtype.len() + 16 * encoded_vars.len());
    let mut encoded_ix = 0;
    let mut dict_ix = 0;
    let mut i = 0;
    while i < logtype.len() {
        match logtype[i] {
            ESCAPE_CHAR => {
                i += 1;
                let c = *logtype.get(i).ok_or_else(|| {
                    LogCaskError::CorruptedArchive("logtype ends with a dangling escape".into())
                })?;
                out.push(c);
                i += 1;
            }
            INTEGER_PLACEHOLDER => {
                let var = encoded_vars.get(encoded_ix).ok_or_else(|| {
                    LogCaskError::Truncated("logtype references a missing encoded variable".into())
                })?;
                out.extend_from_slice(var.decode_integer().as_bytes());
                encoded_ix += 1;
                i += 1;
            }
            FLOAT_PLACEHOLDER => {
                let var = encoded_vars.get(encoded_ix).ok_or_else(|| {
                    LogCaskError::Truncated("logtype references a missing encoded variable".into())
                })?;
                out.extend_from_slice(var.decode_float().as_bytes());
                encoded_ix += 1;
                i += 1;
            }
            DICTIONARY_PLACEHOLDER => {
                let var = dict_vars.get(dict_ix).ok_or_else(|| {
                    LogCaskError::Truncated(
                        "logtype references a missing dictionary variable".into(),
                    )
                })?;
                out.extend_from_slice(var.as_ref().as_bytes());
                dict_ix += 1;
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|e| LogCaskError::IllegalByteSequence(e.utf8_error().valid_up_to()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<V: EncodedVariable>(message: &str) -> EncodedMessage<V> {
        let encoded = encode_message::<V>(message);
        let decoded =
            decode_message(&encoded.logtype, &encoded.encoded_vars, &encoded.dict_vars).unwrap();
        assert_eq!(decoded, message, "round trip mismatch");
        encoded
    }

    #[test]
    fn test_encode_mixed_message_eight_byte() {
        let message = "here is a string with a small int 4938 and a medium int 2147483647 \
                       and a very large int 9223372036854775807 and a small double 0.1 and \
                       a weird double -25.5196868642755 and a string with numbers \
                       bin/python2.7.3 and an escape \\ and an int placeholder \u{11}";
        let encoded = roundtrip::<i64>(message);

        let mut expected_logtype = Vec::new();
        expected_logtype.extend_from_slice(b"here is a string with a small int ");
        expected_logtype.push(INTEGER_PLACEHOLDER);
        expected_logtype.extend_from_slice(b" and a medium int ");
        expected_logtype.push(INTEGER_PLACEHOLDER);
        expected_logtype.extend_from_slice(b" and a very large int ");
        expected_logtype.push(INTEGER_PLACEHOLDER);
        expected_logtype.extend_from_slice(b" and a small double ");
        expected_logtype.push(FLOAT_PLACEHOLDER);
        expected_logtype.extend_from_slice(b" and a weird double ");
        expected_logtype.push(FLOAT_PLACEHOLDER);
        expected_logtype.extend_from_slice(b" and a string with numbers ");
        expected_logtype.push(DICTIONARY_PLACEHOLDER);
        expected_logtype.extend_from_slice(b" and an escape ");
        expected_logtype.push(ESCAPE_CHAR);
        expected_logtype.push(b'\\');
        expected_logtype.extend_from_slice(b" and an int placeholder ");
        expected_logtype.push(ESCAPE_CHAR);
        expected_logtype.push(INTEGER_PLACEHOLDER);
        assert_eq!(encoded.logtype, expected_logtype);

        assert_eq!(
            &encoded.encoded_vars[..3],
            &[4938, 2147483647, 9223372036854775807]
        );
        assert_eq!(encoded.encoded_vars[3], i64::encode_float("0.1").unwrap());
        assert_eq!(
            encoded.encoded_vars[4],
            i64::encode_float("-25.5196868642755").unwrap()
        );
        assert_eq!(encoded.dict_vars, vec!["bin/python2.7.3".to_string()]);
    }

    #[test]
    fn test_integer_boundaries() {
        assert_eq!(
            i64::encode_integer(&i64::MAX.to_string()),
            Some(i64::MAX)
        );
        assert_eq!(
            i64::encode_integer(&i64::MIN.to_string()),
            Some(i64::MIN)
        );
        let too_long = format!("{}0", i64::MAX);
        assert_eq!(i64::encode_integer(&too_long), None);

        assert_eq!(i32::encode_integer(&i32::MAX.to_string()), Some(i32::MAX));
        assert_eq!(i32::encode_integer(&i64::MAX.to_string()), None);
    }

    #[test]
    fn test_integer_round_trip_forms() {
        // Forms that do not round trip are rejected.
        assert_eq!(i64::encode_integer("007"), None);
        assert_eq!(i64::encode_integer("+7"), None);
        assert_eq!(i64::encode_integer("-0"), None);
        assert_eq!(i64::encode_integer(""), None);
        assert_eq!(i64::encode_integer("1e3"), None);
    }

    #[test]
    fn test_float_lossless_forms() {
        for token in ["0.1", "-25.5196868642755", "-00.00", "123.4500", "0.0001"] {
            let var = i64::encode_float(token).unwrap_or_else(|| panic!("{token} must encode"));
            assert_eq!(var.decode_float(), token);
        }
    }

    #[test]
    fn test_float_rejects_non_floats() {
        for token in ["1", "1.", ".5", "1.2.3", "-.5", "1.2e3", "--1.0", "a.b"] {
            assert_eq!(i64::encode_float(token), None, "{token} must not encode");
        }
    }

    #[test]
    fn test_four_byte_float_narrower() {
        // 15 significant digits: fits the 8-byte layout, not the 4-byte one.
        let token = "-25.5196868642755";
        assert!(i64::encode_float(token).is_some());
        assert_eq!(i32::encode_float(token), None);

        let var = i32::encode_float("-25.51").unwrap();
        assert_eq!(var.decode_float(), "-25.51");
    }

    #[test]
    fn test_placeholder_count_matches_var_counts() {
        let message = "job 17 took 2.5 seconds on node-3 at load 0.93";
        let encoded = encode_message::<i64>(message);
        let mut encoded_count = 0;
        let mut dict_count = 0;
        let mut i = 0;
        while i < encoded.logtype.len() {
            match encoded.logtype[i] {
                ESCAPE_CHAR => i += 1,
                INTEGER_PLACEHOLDER | FLOAT_PLACEHOLDER => encoded_count += 1,
                DICTIONARY_PLACEHOLDER => dict_count += 1,
                _ => {}
            }
            i += 1;
        }
        assert_eq!(encoded_count, encoded.encoded_vars.len());
        assert_eq!(dict_count, encoded.dict_vars.len());
    }

    #[test]
    fn test_roundtrip_four_byte() {
        roundtrip::<i32>("req 42 served in 3.25 ms by worker-7");
        roundtrip::<i32>("big value 9223372036854775807 demotes to dictionary");
    }

    #[test]
    fn test_missing_vars_is_truncated() {
        let encoded = encode_message::<i64>("value 17");
        let err = decode_message::<i64, String>(&encoded.logtype, &[], &[]).unwrap_err();
        assert!(matches!(err, LogCaskError::Truncated(_)));
    }
}
