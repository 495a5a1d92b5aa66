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

//! Timestamp pattern recognition
//!
//! A small strftime-like dialect covering the formats that show up in
//! real log streams. A pattern both parses text to epoch milliseconds
//! and formats epoch milliseconds back to the original text, so a
//! date-string column round-trips exactly.
//!
//! Supported specifiers: `%Y` `%m` `%d` `%H` `%M` `%S` `%3` (millis)
//! and `%%`. All times are interpreted as UTC.

/// Epoch time in milliseconds.
pub type EpochTimeMs = i64;

const MS_PER_SECOND: i64 = 1_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// A timestamp format usable for both parsing and formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampPattern {
    format: String,
}

/// The built-in table of known formats, most specific first.
pub const KNOWN_PATTERNS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S.%3",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S,%3",
    "%Y-%m-%d %H:%M:%S.%3",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d",
];

impl TimestampPattern {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Parses `text` against this pattern. The whole input must be
    /// consumed.
    pub fn parse(&self, text: &str) -> Option<EpochTimeMs> {
        let bytes = text.as_bytes();
        let mut pos = 0usize;
        let mut year: i64 = 1970;
        let mut month: i64 = 1;
        let mut day: i64 = 1;
        let mut hour: i64 = 0;
        let mut minute: i64 = 0;
        let mut second: i64 = 0;
        let mut millis: i64 = 0;

        let mut spec = self.format.bytes().peekable();
        while let Some(c) = spec.next() {
            if c != b'%' {
                if bytes.get(pos) != Some(&c) {
                    return None;
                }
                pos += 1;
                continue;
            }
            let field = spec.next()?;
            match field {
                b'%' => {
                    if bytes.get(pos) != Some(&b'%') {
                        return None;
                    }
                    pos += 1;
                }
                b'Y' => year = read_digits(bytes, &mut pos, 4)?,
                b'm' => month = read_digits(bytes, &mut pos, 2)?,
                b'd' => day = read_digits(bytes, &mut pos, 2)?,
                b'H' => hour = read_digits(bytes, &mut pos, 2)?,
                b'M' => minute = read_digits(bytes, &mut pos, 2)?,
                b'S' => second = read_digits(bytes, &mut pos, 2)?,
                b'3' => millis = read_digits(bytes, &mut pos, 3)?,
                _ => return None,
            }
        }
        if pos != bytes.len() {
            return None;
        }
        if !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
            || !(0..=23).contains(&hour)
            || !(0..=59).contains(&minute)
            || !(0..=60).contains(&second)
        {
            return None;
        }

        let days = days_from_civil(year, month, day);
        Some(((days * SECONDS_PER_DAY + hour * 3_600 + minute * 60 + second) * MS_PER_SECOND) + millis)
    }

    /// Formats epoch milliseconds with this pattern.
    pub fn render(&self, epoch_ms: EpochTimeMs) -> String {
        let millis = epoch_ms.rem_euclid(MS_PER_SECOND);
        let total_seconds = (epoch_ms - millis) / MS_PER_SECOND;
        let days = total_seconds.div_euclid(SECONDS_PER_DAY);
        let mut rem = total_seconds.rem_euclid(SECONDS_PER_DAY);
        let hour = rem / 3_600;
        rem %= 3_600;
        let minute = rem / 60;
        let second = rem % 60;
        let (year, month, day) = civil_from_days(days);

        let mut out = String::with_capacity(self.format.len() + 8);
        let mut spec = self.format.bytes().peekable();
        while let Some(c) = spec.next() {
            if c != b'%' {
                out.push(c as char);
                continue;
            }
            match spec.next() {
                Some(b'%') => out.push('%'),
                Some(b'Y') => out.push_str(&format!("{year:04}")),
                Some(b'm') => out.push_str(&format!("{month:02}")),
                Some(b'd') => out.push_str(&format!("{day:02}")),
                Some(b'H') => out.push_str(&format!("{hour:02}")),
                Some(b'M') => out.push_str(&format!("{minute:02}")),
                Some(b'S') => out.push_str(&format!("{second:02}")),
                Some(b'3') => out.push_str(&format!("{millis:03}")),
                _ => {}
            }
        }
        out
    }
}

fn read_digits(bytes: &[u8], pos: &mut usize, count: usize) -> Option<i64> {
    let end = pos.checked_add(count)?;
    if end > bytes.len() {
        return None;
    }
    let mut value: i64 = 0;
    for &b in &bytes[*pos..end] {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value * 10 + i64::from(b - b'0');
    }
    *pos = end;
    Some(value)
}

/// Days from 1970-01-01 to the given civil date (proleptic Gregorian).
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`].
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    (if month <= 2 { y + 1 } else { y }, month, day)
}

/// Tries every known pattern in order; returns the matching pattern and
/// the parsed epoch milliseconds.
pub fn search_known_patterns(text: &str) -> Option<(TimestampPattern, EpochTimeMs)> {
    for format in KNOWN_PATTERNS {
        let pattern = TimestampPattern::new(*format);
        if let Some(epoch) = pattern.parse(text) {
            return Some((pattern, epoch));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render_roundtrip() {
        let texts = [
            "2023-01-15T08:30:00.123",
            "2023-01-15 08:30:00,123",
            "1999-12-31 23:59:59",
            "2024/02/29 00:00:01",
        ];
        for text in texts {
            let (pattern, epoch) = search_known_patterns(text)
                .unwrap_or_else(|| panic!("{text} should match a known pattern"));
            assert_eq!(pattern.render(epoch), text, "render mismatch for {text}");
        }
    }

    #[test]
    fn test_epoch_zero() {
        let pattern = TimestampPattern::new("%Y-%m-%d %H:%M:%S");
        assert_eq!(pattern.parse("1970-01-01 00:00:00"), Some(0));
        assert_eq!(pattern.render(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_known_value() {
        // 2001-09-09 01:46:40 UTC == 1_000_000_000 seconds.
        let pattern = TimestampPattern::new("%Y-%m-%d %H:%M:%S");
        assert_eq!(
            pattern.parse("2001-09-09 01:46:40"),
            Some(1_000_000_000_000)
        );
    }

    #[test]
    fn test_rejects_garbage() {
        let pattern = TimestampPattern::new("%Y-%m-%d %H:%M:%S");
        assert_eq!(pattern.parse("not a date"), None);
        assert_eq!(pattern.parse("2023-13-01 00:00:00"), None);
        assert_eq!(pattern.parse("2023-01-01 00:00:00 trailing"), None);
    }

    #[test]
    fn test_negative_epoch() {
        let pattern = TimestampPattern::new("%Y-%m-%d %H:%M:%S");
        let epoch = pattern.parse("1969-12-31 23:59:59").unwrap();
        assert_eq!(epoch, -1_000);
        assert_eq!(pattern.render(epoch), "1969-12-31 23:59:59");
    }
}
