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

//! Variable placeholders and message tokenization
//!
//! A logtype is the template of a log message: the constant text is kept
//! verbatim and every variable is replaced by a single placeholder byte.
//! The placeholder values are wire-format constants shared by every
//! writer and reader; changing them breaks every existing archive and IR
//! stream.

/// Placeholder for a variable encoded as a packed integer.
pub const INTEGER_PLACEHOLDER: u8 = 0x11;

/// Placeholder for a variable stored in the variable dictionary.
pub const DICTIONARY_PLACEHOLDER: u8 = 0x12;

/// Placeholder for a variable encoded as a packed float.
pub const FLOAT_PLACEHOLDER: u8 = 0x13;

/// Escape byte prepended to literal placeholder/escape bytes in a logtype.
pub const ESCAPE_CHAR: u8 = 0x5c;

/// Whether `c` is one of the three variable placeholder bytes.
#[inline]
pub fn is_variable_placeholder(c: u8) -> bool {
    matches!(
        c,
        INTEGER_PLACEHOLDER | DICTIONARY_PLACEHOLDER | FLOAT_PLACEHOLDER
    )
}

/// Whether `c` is a token delimiter.
///
/// Everything except `+`, `-` through `9` (which covers `-`, `.`, `/` and
/// the decimal digits), `A`-`Z`, `\`, `_` and `a`-`z` is a delimiter.
#[inline]
pub fn is_delim(c: u8) -> bool {
    !(c == b'+'
        || (b'-'..=b'9').contains(&c)
        || c.is_ascii_uppercase()
        || c == b'\\'
        || c == b'_'
        || c.is_ascii_lowercase())
}

/// Whether the token could be a multi-digit hexadecimal value.
#[inline]
pub fn could_be_multi_digit_hex_value(token: &[u8]) -> bool {
    if token.len() < 2 {
        return false;
    }
    token.iter().all(|&c| c.is_ascii_hexdigit())
}

/// Whether `token` on its own would be treated as a variable by the
/// encoder: it contains a decimal digit or is a multi-digit hex run.
///
/// The `=`-prefixed rule is positional and handled by
/// [`get_bounds_of_next_var`], which sees the surrounding message.
#[inline]
pub fn is_variable_token(token: &[u8]) -> bool {
    token.iter().any(u8::is_ascii_digit) || could_be_multi_digit_hex_value(token)
}

/// Finds the bounds of the next variable in `msg`.
///
/// On entry `*end_pos` is the end of the previous variable (or 0). On
/// success `[*begin_pos, *end_pos)` delimits the next token that is a
/// variable:
/// - it contains a decimal digit, or
/// - it is a multi-digit hex run, or
/// - it is preceded by `=` and contains an alphabetic character.
pub fn get_bounds_of_next_var(msg: &[u8], begin_pos: &mut usize, end_pos: &mut usize) -> bool {
    let len = msg.len();
    loop {
        if *end_pos >= len {
            return false;
        }

        *begin_pos = *end_pos;
        while *begin_pos < len && is_delim(msg[*begin_pos]) {
            *begin_pos += 1;
        }
        if *begin_pos >= len {
            *end_pos = *begin_pos;
            return false;
        }

        *end_pos = *begin_pos;
        let mut contains_digit = false;
        let mut contains_alpha = false;
        while *end_pos < len && !is_delim(msg[*end_pos]) {
            let c = msg[*end_pos];
            contains_digit |= c.is_ascii_digit();
            contains_alpha |= c.is_ascii_alphabetic();
            *end_pos += 1;
        }

        let token = &msg[*begin_pos..*end_pos];
        let preceded_by_eq = *begin_pos > 0 && msg[*begin_pos - 1] == b'=';
        if contains_digit
            || could_be_multi_digit_hex_value(token)
            || (preceded_by_eq && contains_alpha)
        {
            return true;
        }
    }
}

/// Appends `constant` to `logtype`, escaping placeholder and escape bytes.
pub fn escape_and_append_constant(constant: &str, logtype: &mut Vec<u8>) {
    for &c in constant.as_bytes() {
        if is_variable_placeholder(c) || c == ESCAPE_CHAR {
            logtype.push(ESCAPE_CHAR);
        }
        logtype.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_classes() {
        for c in b"+-./0123456789_\\".iter().chain(b"azAZ".iter()) {
            assert!(!is_delim(*c), "{} should not be a delimiter", *c as char);
        }
        for c in b" \t:,!;%<>()[]{}\"'=*?".iter() {
            assert!(is_delim(*c), "{} should be a delimiter", *c as char);
        }
        assert!(is_delim(0x80));
        assert!(is_delim(0xFF));
    }

    #[test]
    fn test_hex_heuristic() {
        assert!(could_be_multi_digit_hex_value(b"deadbeef"));
        assert!(could_be_multi_digit_hex_value(b"aB"));
        assert!(!could_be_multi_digit_hex_value(b"a"));
        assert!(!could_be_multi_digit_hex_value(b"xyz"));
        assert!(!could_be_multi_digit_hex_value(b""));
    }

    #[test]
    fn test_bounds_finds_digit_tokens() {
        let msg = b"opened file log.14 for user=admin in 2ms";
        let mut begin = 0;
        let mut end = 0;
        let mut vars = Vec::new();
        while get_bounds_of_next_var(msg, &mut begin, &mut end) {
            vars.push(std::str::from_utf8(&msg[begin..end]).unwrap());
        }
        // "log.14" contains a digit, "admin" follows '=', "2ms" has a digit.
        assert_eq!(vars, vec!["log.14", "admin", "2ms"]);
    }

    #[test]
    fn test_bounds_empty_and_no_vars() {
        let mut begin = 0;
        let mut end = 0;
        assert!(!get_bounds_of_next_var(b"", &mut begin, &mut end));

        begin = 0;
        end = 0;
        assert!(!get_bounds_of_next_var(
            b"plain words only",
            &mut begin,
            &mut end
        ));
    }

    #[test]
    fn test_slash_joins_tokens() {
        let msg = b"started bin/python2.7.3 now";
        let mut begin = 0;
        let mut end = 0;
        assert!(get_bounds_of_next_var(msg, &mut begin, &mut end));
        assert_eq!(&msg[begin..end], b"bin/python2.7.3");
    }

    #[test]
    fn test_escape_constant() {
        let mut logtype = Vec::new();
        escape_and_append_constant("a\u{11}b\\c", &mut logtype);
        assert_eq!(logtype, vec![b'a', 0x5c, 0x11, b'b', 0x5c, b'\\', b'c']);
    }
}
