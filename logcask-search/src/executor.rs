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

//! Search execution
//!
//! Subqueries are first *compiled* against an archive's dictionaries:
//! the logtype pattern resolves to a set of logtype ids, exact
//! dictionary variables to id sets, and the intersection of the
//! entries' segment sets selects candidate segments — all before a
//! single column byte is decompressed. Execution then scans only the
//! candidate segments, confirms each message against the compiled
//! constraints, and falls back to a full wildcard match on the decoded
//! text only when a subquery carries live wildcards.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use logcask_archive::dictionary::{DictId, Dictionary, SegmentSet};
use logcask_archive::schema_tree::NodeType;
use logcask_archive::ArchiveReader;
use logcask_core::timestamp::EpochTimeMs;
use logcask_core::wildcard::wildcard_match;
use logcask_core::{LogCaskError, Result};

use crate::output::OutputHandler;
use crate::planner::{generate_subqueries, prepare_wildcard_query};
use crate::query::{QueryVariable, Subquery, TokenType};

/// A search request.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub query: String,
    pub case_sensitive: bool,
    /// Replace `?` with `*` during normalization.
    pub heuristic_substitution: bool,
    pub begin_ts: Option<EpochTimeMs>,
    pub end_ts: Option<EpochTimeMs>,
}

impl SearchConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            case_sensitive: true,
            heuristic_substitution: false,
            begin_ts: None,
            end_ts: None,
        }
    }
}

/// One variable constraint after dictionary resolution.
#[derive(Debug)]
enum CompiledVar {
    /// Must equal this packed value at its position.
    ExactEncoded(i64),
    /// Must be one of these dictionary ids.
    DictIds(HashSet<DictId>),
    /// Wildcard interpretation; verified by the residual text match.
    Deferred,
}

/// A subquery resolved against one archive.
struct CompiledSubquery {
    logtype_ids: HashSet<DictId>,
    segments: SegmentSet,
    vars: Vec<CompiledVar>,
    needs_residual_match: bool,
    supersedes_all: bool,
}

/// Resolves subqueries against the archive dictionaries, dropping the
/// ones that cannot match.
fn compile_subqueries(
    subqueries: Vec<Subquery<i64>>,
    logtype_dict: &Dictionary,
    var_dict: &Dictionary,
    case_sensitive: bool,
) -> Vec<CompiledSubquery> {
    let mut compiled = Vec::new();
    for subquery in subqueries {
        if subquery.supersedes_all() {
            // Matches every message; replaces the whole plan.
            let mut segments = SegmentSet::new();
            for entry in logtype_dict.entries() {
                segments.union_with(&entry.segments);
            }
            return vec![CompiledSubquery {
                logtype_ids: HashSet::new(),
                segments,
                vars: Vec::new(),
                needs_residual_match: true,
                supersedes_all: true,
            }];
        }

        let (logtype_ids, mut segments) = if subquery.logtype_contains_wildcards {
            let entries = logtype_dict
                .entries_matching_wildcard(&subquery.logtype_query, case_sensitive);
            let mut segments = SegmentSet::new();
            let ids: HashSet<DictId> = entries
                .iter()
                .map(|e| {
                    segments.union_with(&e.segments);
                    e.id
                })
                .collect();
            (ids, segments)
        } else {
            // Wildcard-free logtype queries hit the dictionary exactly.
            let hit = if case_sensitive {
                logtype_dict
                    .lookup_by_value(&subquery.logtype_query)
                    .and_then(|id| logtype_dict.entry_by_id(id).ok())
            } else {
                logtype_dict
                    .entries()
                    .iter()
                    .find(|e| e.value.eq_ignore_ascii_case(&subquery.logtype_query))
            };
            match hit {
                Some(entry) => {
                    (HashSet::from([entry.id]), entry.segments.clone())
                }
                None => (HashSet::new(), SegmentSet::new()),
            }
        };
        if logtype_ids.is_empty() {
            continue;
        }

        let mut vars = Vec::with_capacity(subquery.vars.len());
        let mut dead = false;
        for var in &subquery.vars {
            match var {
                QueryVariable::Exact(token) => match token.encoded {
                    Some(encoded) => vars.push(CompiledVar::ExactEncoded(encoded)),
                    None => {
                        let ids = resolve_dict_var(var_dict, &token.value, case_sensitive);
                        if ids.is_empty() {
                            dead = true;
                            break;
                        }
                        intersect_var_segments(var_dict, &ids, &mut segments);
                        vars.push(CompiledVar::DictIds(ids));
                    }
                },
                QueryVariable::Wildcard(token) => {
                    if token.interpretation == TokenType::DictionaryVariable {
                        let entries =
                            var_dict.entries_matching_wildcard(&token.pattern, case_sensitive);
                        if entries.is_empty() {
                            dead = true;
                            break;
                        }
                        let ids: HashSet<DictId> = entries.iter().map(|e| e.id).collect();
                        intersect_var_segments(var_dict, &ids, &mut segments);
                        vars.push(CompiledVar::DictIds(ids));
                    } else {
                        vars.push(CompiledVar::Deferred);
                    }
                }
            }
        }
        if dead || segments.is_empty() {
            continue;
        }

        let needs_residual_match = subquery.needs_residual_match();
        compiled.push(CompiledSubquery {
            logtype_ids,
            segments,
            vars,
            needs_residual_match,
            supersedes_all: false,
        });
    }
    compiled
}

fn resolve_dict_var(
    var_dict: &Dictionary,
    value: &str,
    case_sensitive: bool,
) -> HashSet<DictId> {
    if case_sensitive {
        var_dict.lookup_by_value(value).into_iter().collect()
    } else {
        var_dict
            .entries()
            .iter()
            .filter(|e| e.value.eq_ignore_ascii_case(value))
            .map(|e| e.id)
            .collect()
    }
}

fn intersect_var_segments(var_dict: &Dictionary, ids: &HashSet<DictId>, segments: &mut SegmentSet) {
    let mut var_segments = SegmentSet::new();
    for &id in ids {
        if let Ok(entry) = var_dict.entry_by_id(id) {
            var_segments.union_with(&entry.segments);
        }
    }
    *segments = segments.intersection(&var_segments);
}

/// Confirms a row's variable streams against a subquery's constraints.
///
/// For a wildcard-free subquery the alignment is positional; with
/// wildcards the constraints must appear as an in-order subsequence and
/// the residual text match makes the final call.
fn vars_match(
    compiled: &CompiledSubquery,
    encoded_vars: &[i64],
    dict_ids: &[DictId],
) -> bool {
    if !compiled.needs_residual_match {
        let expected_encoded: Vec<i64> = compiled
            .vars
            .iter()
            .filter_map(|v| match v {
                CompiledVar::ExactEncoded(e) => Some(*e),
                _ => None,
            })
            .collect();
        if expected_encoded.as_slice() != encoded_vars {
            return false;
        }
        let expected_dict: Vec<&HashSet<DictId>> = compiled
            .vars
            .iter()
            .filter_map(|v| match v {
                CompiledVar::DictIds(ids) => Some(ids),
                _ => None,
            })
            .collect();
        return expected_dict.len() == dict_ids.len()
            && expected_dict
                .iter()
                .zip(dict_ids)
                .all(|(set, id)| set.contains(id));
    }

    // Subsequence check per stream; deferred constraints are left to
    // the residual match.
    let mut enc_pos = 0usize;
    let mut dict_pos = 0usize;
    for var in &compiled.vars {
        match var {
            CompiledVar::ExactEncoded(expected) => {
                match encoded_vars[enc_pos..].iter().position(|v| v == expected) {
                    Some(p) => enc_pos += p + 1,
                    None => return false,
                }
            }
            CompiledVar::DictIds(set) => {
                match dict_ids[dict_pos..].iter().position(|id| set.contains(id)) {
                    Some(p) => dict_pos += p + 1,
                    None => return false,
                }
            }
            CompiledVar::Deferred => {}
        }
    }
    true
}

/// Runs a search over one archive, feeding matches to `handler`.
/// Returns the number of results delivered. Cancellation is
/// cooperative: `cancel` is checked between messages, tables and
/// segments.
pub fn search_archive(
    archive: &ArchiveReader,
    config: &SearchConfig,
    handler: &mut dyn OutputHandler,
    cancel: &AtomicBool,
) -> Result<u64> {
    let prepared = prepare_wildcard_query(&config.query, config.heuristic_substitution);
    let subqueries = generate_subqueries::<i64>(&prepared)?;
    debug!(query = %prepared, subqueries = subqueries.len(), "query planned");

    let logtype_dict = archive.logtype_dict()?;
    let var_dict = archive.var_dict()?;
    let compiled = compile_subqueries(
        subqueries,
        &logtype_dict,
        &var_dict,
        config.case_sensitive,
    );

    // Whole-string variable columns match when the full query matches
    // their dictionary value; resolve those entries up front.
    let mut whole_string_ids: HashSet<DictId> = HashSet::new();
    let mut whole_string_segments = SegmentSet::new();
    for entry in var_dict.entries_matching_wildcard(&prepared, config.case_sensitive) {
        whole_string_ids.insert(entry.id);
        whole_string_segments.union_with(&entry.segments);
    }

    if compiled.is_empty() && whole_string_ids.is_empty() {
        handler.flush()?;
        return Ok(0);
    }

    // Time range and handler gating by input file: matches inside a
    // skipped file's event range are suppressed.
    let mut skipped_ranges: Vec<(u64, u64)> = Vec::new();
    for file in archive.files()? {
        let has_range = file.begin_timestamp != 0 || file.end_timestamp != 0;
        let out_of_range = has_range
            && match (config.begin_ts, config.end_ts) {
                (Some(begin), _) if file.end_timestamp < begin => true,
                (_, Some(end)) if file.begin_timestamp > end => true,
                _ => false,
            };
        if out_of_range || handler.can_skip_file(file) {
            skipped_ranges.push((file.begin_message_ix, file.end_message_ix));
        }
    }

    let mut candidate_segments = SegmentSet::new();
    for subquery in &compiled {
        candidate_segments.union_with(&subquery.segments);
    }
    candidate_segments.union_with(&whole_string_segments);

    let mut num_results = 0u64;
    'segments: for (segment_id, schema_id) in archive.schemas()? {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if !candidate_segments.contains(segment_id) {
            continue;
        }
        let table = match archive.read_schema_table(segment_id, schema_id, false) {
            Ok(table) => table,
            Err(e) => {
                // Per-table failures are skippable; the rest of the
                // archive may still be readable.
                warn!(segment = segment_id, schema = schema_id, error = %e, "skipping unreadable table");
                continue;
            }
        };

        let clp_columns: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                matches!(c.node_type, NodeType::ClpString | NodeType::UnstructuredArray)
            })
            .map(|(i, _)| i)
            .collect();
        let var_string_columns: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.node_type == NodeType::VarString)
            .map(|(i, _)| i)
            .collect();
        if clp_columns.is_empty() && var_string_columns.is_empty() {
            continue;
        }

        for row in 0..table.num_messages() {
            if cancel.load(Ordering::Relaxed) {
                break 'segments;
            }
            let event_ix = row_event_ix(&table, row);
            if skipped_ranges
                .iter()
                .any(|&(begin, end)| event_ix >= begin && event_ix < end)
            {
                continue;
            }

            let timestamp = table.timestamp_at(row).unwrap_or(0);
            if let Some(begin) = config.begin_ts {
                if timestamp < begin {
                    continue;
                }
            }
            if let Some(end) = config.end_ts {
                if timestamp > end {
                    continue;
                }
            }

            let mut matched = false;
            for &col in &var_string_columns {
                let column = &table.columns()[col];
                let logcask_archive::column::ColumnValues::VarString(ids) = &column.values else {
                    continue;
                };
                let id = ids[row as usize];
                if whole_string_ids.contains(&id) {
                    let message = var_dict.lookup_by_id(id)?.to_owned();
                    let path = path_for_event(archive, event_ix)?;
                    handler
                        .add_result(&path, &message, timestamp)
                        .map_err(terminal_sink_failure)?;
                    num_results += 1;
                    matched = true;
                    break;
                }
            }
            if matched {
                continue;
            }

            'columns: for &col in &clp_columns {
                let column = &table.columns()[col];
                let Some((logtype_id, encoded_vars, dict_ids)) =
                    column.clp_row_vars(row as usize)
                else {
                    continue;
                };
                for subquery in &compiled {
                    if !subquery.supersedes_all {
                        if !subquery.segments.contains(segment_id) {
                            continue;
                        }
                        if !subquery.logtype_ids.contains(&logtype_id) {
                            continue;
                        }
                        if !vars_match(subquery, encoded_vars, dict_ids) {
                            continue;
                        }
                    }
                    if subquery.needs_residual_match {
                        let message =
                            column.decode_clp_row(row as usize, &logtype_dict, &var_dict)?;
                        if !wildcard_match(&message, &prepared, config.case_sensitive) {
                            continue;
                        }
                        let path = path_for_event(archive, event_ix)?;
                        handler
                            .add_result(&path, &message, timestamp)
                            .map_err(terminal_sink_failure)?;
                    } else {
                        let message =
                            column.decode_clp_row(row as usize, &logtype_dict, &var_dict)?;
                        let path = path_for_event(archive, event_ix)?;
                        handler
                            .add_result(&path, &message, timestamp)
                            .map_err(terminal_sink_failure)?;
                    }
                    num_results += 1;
                    break 'columns;
                }
            }
        }
    }

    handler.flush().map_err(terminal_sink_failure)?;
    Ok(num_results)
}

fn terminal_sink_failure(e: LogCaskError) -> LogCaskError {
    LogCaskError::DbBulkWrite(format!("result sink failed: {e}"))
}

fn row_event_ix(table: &logcask_archive::SchemaReader, row: u64) -> u64 {
    // Event indices are loaded with the table; fall back to the row
    // number for tables without them.
    table.event_index_at(row).unwrap_or(row)
}

fn path_for_event(archive: &ArchiveReader, event_ix: u64) -> Result<String> {
    for file in archive.files()? {
        if event_ix >= file.begin_message_ix && event_ix < file.end_message_ix {
            return Ok(file.orig_path.clone());
        }
    }
    Ok(archive.metadata().archive_id.clone())
}
