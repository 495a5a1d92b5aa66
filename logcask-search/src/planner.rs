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

//! Subquery enumeration
//!
//! A wildcard expression is tokenized into static runs and *composite
//! tokens* — maximal runs of non-delimiter characters and wildcards.
//! Every `*`/`?` inside a composite token is ambiguous: interpreted as a
//! delimiter it splits the token, as a non-delimiter it stays inside a
//! variable. Each resulting variable token is itself ambiguous between
//! the interpretations its characters admit (static text, integer,
//! float, dictionary). One subquery is produced per combination, after
//! dedup.
//!
//! A `*` bordering a variable token is shared: it stays in the logtype
//! pattern and extends the token's own match pattern, because the text
//! it matches can spill into the variable. A `?` interpreted as a
//! delimiter bounds the token exactly. The enumeration knowingly
//! over-generates some impossible float interpretations; they cost one
//! dictionary probe each and are pruned there.

use std::collections::HashSet;
use std::hash::Hash;

use smallvec::SmallVec;
use tracing::warn;

use logcask_core::encoding::EncodedVariable;
use logcask_core::placeholder::{
    is_delim, is_variable_placeholder, is_variable_token, ESCAPE_CHAR,
};
use logcask_core::wildcard::is_wildcard;
use logcask_core::{LogCaskError, Result};

use crate::query::{ExactVariableToken, QueryVariable, Subquery, TokenType, WildcardVariableToken};

/// Soft cap on the Cartesian product of token interpretations.
pub const MAX_SUBQUERIES: usize = 2048;

/// Wildcards beyond this many per composite token stay non-delimiters.
const MAX_ENUMERATED_WILDCARDS: usize = 10;

/// Normalizes a raw wildcard expression: surrounds it with `*`,
/// collapses `**`, drops a trailing dangling `\`, and (in heuristic
/// mode) turns every `?` into `*`.
pub fn prepare_wildcard_query(raw: &str, heuristic_substitution: bool) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('*');
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                // A trailing dangling escape is dropped.
                if let Some(&next) = chars.peek() {
                    out.push('\\');
                    out.push(next);
                    chars.next();
                }
            }
            '*' => {
                if !out.ends_with('*') {
                    out.push('*');
                }
            }
            '?' if heuristic_substitution => {
                if !out.ends_with('*') {
                    out.push('*');
                }
            }
            c => out.push(c),
        }
    }
    if !out.ends_with('*') {
        out.push('*');
    }
    out
}

/// One query byte after escape resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QChar {
    byte: u8,
    /// True for an unescaped `*` or `?`.
    wildcard: bool,
}

#[derive(Debug)]
enum Item {
    Static(Vec<QChar>),
    Composite(Vec<QChar>),
}

/// Splits the query into static runs and composite tokens.
fn tokenize(query: &str) -> Vec<Item> {
    let bytes = query.as_bytes();
    let mut chars: Vec<QChar> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            chars.push(QChar {
                byte: bytes[i + 1],
                wildcard: false,
            });
            i += 2;
        } else {
            chars.push(QChar {
                byte: bytes[i],
                wildcard: is_wildcard(bytes[i]),
            });
            i += 1;
        }
    }

    let mut items = Vec::new();
    let mut static_run: Vec<QChar> = Vec::new();
    let mut token_run: Vec<QChar> = Vec::new();

    let flush_token =
        |items: &mut Vec<Item>, static_run: &mut Vec<QChar>, token_run: &mut Vec<QChar>| {
            if token_run.is_empty() {
                return;
            }
            let has_non_delim = token_run.iter().any(|c| !c.wildcard && !is_delim(c.byte));
            if has_non_delim {
                if !static_run.is_empty() {
                    items.push(Item::Static(std::mem::take(static_run)));
                }
                items.push(Item::Composite(std::mem::take(token_run)));
            } else {
                // Pure wildcard runs stay static.
                static_run.append(token_run);
            }
        };

    for qc in chars {
        let joins_token = qc.wildcard || !is_delim(qc.byte);
        if joins_token {
            token_run.push(qc);
        } else {
            flush_token(&mut items, &mut static_run, &mut token_run);
            static_run.push(qc);
        }
    }
    flush_token(&mut items, &mut static_run, &mut token_run);
    if !static_run.is_empty() {
        items.push(Item::Static(static_run));
    }
    items
}

/// One interpretation of a segment within a composite token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SegInterp<V> {
    Static,
    Exact(ExactVariableToken<V>),
    Variable(TokenType, String),
}

#[derive(Debug, Clone)]
struct Segment {
    chars: Vec<QChar>,
    prefix_star: bool,
    suffix_star: bool,
}

#[derive(Debug, Clone)]
enum Piece {
    Delim(u8),
    Seg(Segment),
}

/// One concrete rendering of a composite token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Rendering<V> {
    fragment: Vec<u8>,
    vars: Vec<QueryVariable<V>>,
}

/// Appends one static query byte to a logtype pattern.
///
/// Placeholder bytes that occur literally in the query must match the
/// escaped form stored in logtypes. With `double_escape` (wildcard
/// queries) the logtype pattern treats `\` as its own escape, so the
/// stored escape byte is escaped once more.
fn append_static_byte(fragment: &mut Vec<u8>, qc: QChar, double_escape: bool) {
    if qc.wildcard {
        if qc.byte == b'*' {
            push_star(fragment);
        } else {
            fragment.push(b'?');
        }
        return;
    }
    if is_variable_placeholder(qc.byte) || qc.byte == ESCAPE_CHAR {
        fragment.push(ESCAPE_CHAR);
        if double_escape {
            fragment.push(ESCAPE_CHAR);
            if qc.byte == ESCAPE_CHAR {
                fragment.push(ESCAPE_CHAR);
            }
        }
        fragment.push(qc.byte);
        return;
    }
    if double_escape && is_wildcard(qc.byte) {
        // A literal `*`/`?` must stay literal in the pattern.
        fragment.push(b'\\');
    }
    fragment.push(qc.byte);
}

#[inline]
fn push_star(fragment: &mut Vec<u8>) {
    if fragment.last() != Some(&b'*') {
        fragment.push(b'*');
    }
}

/// The wildcard pattern a variable-interpreted segment matches.
fn variable_pattern(seg: &Segment) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(seg.chars.len() + 2);
    if seg.prefix_star && seg.chars.first().map(|c| (c.byte, c.wildcard)) != Some((b'*', true)) {
        out.push(b'*');
    }
    for qc in &seg.chars {
        if !qc.wildcard && (is_wildcard(qc.byte) || qc.byte == b'\\') {
            out.push(b'\\');
        }
        out.push(qc.byte);
    }
    if seg.suffix_star && seg.chars.last().map(|c| (c.byte, c.wildcard)) != Some((b'*', true)) {
        out.push(b'*');
    }
    String::from_utf8(out).expect("query text is valid UTF-8")
}

/// Interpretations a segment admits.
fn segment_interps<V: EncodedVariable>(seg: &Segment) -> SmallVec<[SegInterp<V>; 4]> {
    let has_inner_wildcard = seg.chars.iter().any(|c| c.wildcard);
    let stripped: Vec<u8> = seg
        .chars
        .iter()
        .filter(|c| !c.wildcard)
        .map(|c| c.byte)
        .collect();
    let mut out = SmallVec::new();

    if !has_inner_wildcard && !seg.prefix_star && !seg.suffix_star {
        // A wildcard-free token bounded by true delimiters encodes
        // deterministically.
        let text = String::from_utf8(stripped).expect("query text is valid UTF-8");
        if is_variable_token(text.as_bytes()) {
            let token = if let Some(encoded) = V::encode_integer(&text) {
                ExactVariableToken {
                    value: text,
                    placeholder: TokenType::IntegerVariable.placeholder().unwrap(),
                    encoded: Some(encoded),
                }
            } else if let Some(encoded) = V::encode_float(&text) {
                ExactVariableToken {
                    value: text,
                    placeholder: TokenType::FloatVariable.placeholder().unwrap(),
                    encoded: Some(encoded),
                }
            } else {
                ExactVariableToken {
                    value: text,
                    placeholder: TokenType::DictionaryVariable.placeholder().unwrap(),
                    encoded: None,
                }
            };
            out.push(SegInterp::Exact(token));
        } else {
            out.push(SegInterp::Static);
        }
        return out;
    }

    // With wildcards in or around the token, interpretations multiply.
    let contains_digit = stripped.iter().any(u8::is_ascii_digit);
    if !contains_digit {
        out.push(SegInterp::Static);
    }
    let pattern = variable_pattern(seg);

    let int_ok = seg.chars.iter().enumerate().all(|(i, qc)| {
        qc.wildcard || qc.byte.is_ascii_digit() || (qc.byte == b'-' && i == 0)
    });
    if int_ok {
        out.push(SegInterp::Variable(
            TokenType::IntegerVariable,
            pattern.clone(),
        ));
    }

    let mut dots = 0;
    let float_ok = seg.chars.iter().enumerate().all(|(i, qc)| {
        if qc.wildcard || qc.byte.is_ascii_digit() || (qc.byte == b'-' && i == 0) {
            true
        } else if qc.byte == b'.' {
            dots += 1;
            dots <= 1
        } else {
            false
        }
    });
    if float_ok {
        out.push(SegInterp::Variable(
            TokenType::FloatVariable,
            pattern.clone(),
        ));
    }

    out.push(SegInterp::Variable(TokenType::DictionaryVariable, pattern));
    out
}

/// All deduplicated renderings of one composite token.
fn render_composite<V: EncodedVariable + Hash>(
    chars: &[QChar],
    double_escape: bool,
) -> Vec<Rendering<V>> {
    let wildcard_slots: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|(_, c)| c.wildcard)
        .map(|(i, _)| i)
        .collect();
    let enumerated = wildcard_slots.len().min(MAX_ENUMERATED_WILDCARDS);
    if wildcard_slots.len() > enumerated {
        warn!(
            wildcards = wildcard_slots.len(),
            "token has too many wildcards; the rest stay non-delimiters"
        );
    }

    let mut seen: HashSet<Rendering<V>> = HashSet::new();
    let mut out: Vec<Rendering<V>> = Vec::new();

    for mask in 0u32..(1u32 << enumerated) {
        // Split the token at delimiter-interpreted wildcards.
        let mut pieces: Vec<Piece> = Vec::new();
        let mut run: Vec<QChar> = Vec::new();
        for (i, qc) in chars.iter().enumerate() {
            let slot = wildcard_slots.iter().position(|&p| p == i);
            let as_delim = slot.is_some_and(|s| s < enumerated && (mask >> s) & 1 == 1);
            if as_delim {
                if !run.is_empty() {
                    pieces.push(Piece::Seg(Segment {
                        chars: std::mem::take(&mut run),
                        prefix_star: false,
                        suffix_star: false,
                    }));
                }
                pieces.push(Piece::Delim(qc.byte));
            } else {
                run.push(*qc);
            }
        }
        if !run.is_empty() {
            pieces.push(Piece::Seg(Segment {
                chars: run,
                prefix_star: false,
                suffix_star: false,
            }));
        }

        // A delimiter-interpreted `*` extends its neighbours.
        for i in 0..pieces.len() {
            let star_before = i > 0 && matches!(pieces[i - 1], Piece::Delim(b'*'));
            let star_after =
                i + 1 < pieces.len() && matches!(pieces[i + 1], Piece::Delim(b'*'));
            if let Piece::Seg(seg) = &mut pieces[i] {
                seg.prefix_star = star_before;
                seg.suffix_star = star_after;
            }
        }

        let interp_sets: Vec<(usize, SmallVec<[SegInterp<V>; 4]>)> = pieces
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match p {
                Piece::Seg(seg) => Some((i, segment_interps::<V>(seg))),
                Piece::Delim(_) => None,
            })
            .collect();

        // Depth-first product over per-segment interpretations.
        let mut choice = vec![0usize; interp_sets.len()];
        loop {
            let mut fragment: Vec<u8> = Vec::new();
            let mut vars: Vec<QueryVariable<V>> = Vec::new();
            let mut seg_ix = 0usize;
            for piece in &pieces {
                match piece {
                    Piece::Delim(b'*') => push_star(&mut fragment),
                    Piece::Delim(b) => fragment.push(*b),
                    Piece::Seg(seg) => {
                        let interp = &interp_sets[seg_ix].1[choice[seg_ix]];
                        seg_ix += 1;
                        match interp {
                            SegInterp::Static => {
                                for qc in &seg.chars {
                                    append_static_byte(&mut fragment, *qc, double_escape);
                                }
                            }
                            SegInterp::Exact(token) => {
                                fragment.push(token.placeholder);
                                vars.push(QueryVariable::Exact(token.clone()));
                            }
                            SegInterp::Variable(token_type, pattern) => {
                                let leading_star = seg.prefix_star
                                    || seg.chars.first().map(|c| (c.byte, c.wildcard))
                                        == Some((b'*', true));
                                let trailing_star = seg.chars.last().map(|c| (c.byte, c.wildcard))
                                    == Some((b'*', true));
                                if leading_star {
                                    push_star(&mut fragment);
                                }
                                fragment.push(token_type.placeholder().expect("variable type"));
                                if trailing_star {
                                    push_star(&mut fragment);
                                }
                                vars.push(QueryVariable::Wildcard(WildcardVariableToken {
                                    pattern: pattern.clone(),
                                    interpretation: *token_type,
                                }));
                            }
                        }
                    }
                }
            }

            let rendering = Rendering { fragment, vars };
            if seen.insert(rendering.clone()) {
                out.push(rendering);
            }

            // Next odometer position.
            let mut k = 0;
            loop {
                if k == choice.len() {
                    break;
                }
                choice[k] += 1;
                if choice[k] < interp_sets[k].1.len() {
                    break;
                }
                choice[k] = 0;
                k += 1;
            }
            if k == choice.len() {
                break;
            }
        }
    }
    out
}

/// Whether a logtype pattern still contains live wildcards.
fn fragment_contains_wildcards(fragment: &[u8]) -> bool {
    let mut i = 0;
    while i < fragment.len() {
        if fragment[i] == ESCAPE_CHAR {
            i += 2;
            continue;
        }
        if is_wildcard(fragment[i]) {
            return true;
        }
        i += 1;
    }
    false
}

/// Joins a fragment onto the accumulated logtype, collapsing `**`.
fn join_fragment(dst: &mut Vec<u8>, src: &[u8]) {
    let mut src = src;
    if dst.last() == Some(&b'*') {
        if let Some((b'*', rest)) = src.split_first() {
            src = rest;
        }
    }
    dst.extend_from_slice(src);
}

/// Expands a wildcard expression into its deduplicated subqueries.
pub fn generate_subqueries<V: EncodedVariable + Hash>(query: &str) -> Result<Vec<Subquery<V>>> {
    if query.is_empty() {
        return Err(LogCaskError::BadParam("empty wildcard query".into()));
    }
    let double_escape = {
        let bytes = query.as_bytes();
        let mut i = 0;
        let mut found = false;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            if is_wildcard(bytes[i]) {
                found = true;
                break;
            }
            i += 1;
        }
        found
    };

    let items = tokenize(query);
    let mut per_item: Vec<Vec<Rendering<V>>> = Vec::with_capacity(items.len());
    for item in &items {
        match item {
            Item::Static(chars) => {
                let mut fragment = Vec::new();
                for qc in chars {
                    append_static_byte(&mut fragment, *qc, double_escape);
                }
                per_item.push(vec![Rendering {
                    fragment,
                    vars: Vec::new(),
                }]);
            }
            Item::Composite(chars) => {
                per_item.push(render_composite::<V>(chars, double_escape));
            }
        }
    }

    let mut subqueries: Vec<Subquery<V>> = Vec::new();
    let mut seen: HashSet<(String, Vec<QueryVariable<V>>)> = HashSet::new();
    let mut choice = vec![0usize; per_item.len()];
    'outer: loop {
        let mut fragment: Vec<u8> = Vec::new();
        let mut vars: Vec<QueryVariable<V>> = Vec::new();
        for (i, renderings) in per_item.iter().enumerate() {
            let rendering = &renderings[choice[i]];
            join_fragment(&mut fragment, &rendering.fragment);
            vars.extend(rendering.vars.iter().cloned());
        }
        let logtype_contains_wildcards = fragment_contains_wildcards(&fragment);
        let logtype_query = String::from_utf8(fragment)
            .map_err(|_| LogCaskError::BadParam("query is not valid UTF-8".into()))?;
        if seen.insert((logtype_query.clone(), vars.clone())) {
            subqueries.push(Subquery {
                logtype_query,
                logtype_contains_wildcards,
                vars,
            });
            if subqueries.len() >= MAX_SUBQUERIES {
                warn!(cap = MAX_SUBQUERIES, "subquery cap reached; plan truncated");
                break 'outer;
            }
        }

        let mut k = 0;
        loop {
            if k == choice.len() {
                break 'outer;
            }
            choice[k] += 1;
            if choice[k] < per_item[k].len() {
                break;
            }
            choice[k] = 0;
            k += 1;
        }
    }

    if subqueries.is_empty() {
        return Err(LogCaskError::BadParam(
            "query produced no subqueries".into(),
        ));
    }
    Ok(subqueries)
}
