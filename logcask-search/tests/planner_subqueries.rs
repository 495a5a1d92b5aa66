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

//! Subquery enumeration tests.
//!
//! The `*abc*123?456?` case walks every delimiter/non-delimiter
//! interpretation of the wildcards and every variable interpretation of
//! the resulting tokens; the expected set below enumerates all 42
//! deduplicated subqueries by construction.

use std::collections::{HashMap, HashSet};

use logcask_core::LogCaskError;
use logcask_search::{generate_subqueries, QueryVariable, Subquery, TokenType};

const I: char = '\u{11}';
const D: char = '\u{12}';
const F: char = '\u{13}';

fn placeholder(t: TokenType) -> char {
    match t {
        TokenType::IntegerVariable => I,
        TokenType::FloatVariable => F,
        TokenType::DictionaryVariable => D,
        TokenType::StaticText => unreachable!(),
    }
}

const VAR_TYPES: [TokenType; 3] = [
    TokenType::IntegerVariable,
    TokenType::FloatVariable,
    TokenType::DictionaryVariable,
];

/// (is_exact, interpretation) per variable, keyed by logtype query.
type ExpectedVars = Vec<(bool, TokenType)>;

fn expected_subqueries() -> HashMap<String, ExpectedVars> {
    let mut expected: HashMap<String, ExpectedVars> = HashMap::new();

    // "abc" as static text or as a dictionary variable.
    let abc_variants: [(String, ExpectedVars); 2] = [
        ("*abc*".to_string(), vec![]),
        (
            format!("*{D}*"),
            vec![(false, TokenType::DictionaryVariable)],
        ),
    ];

    // Both '?' as delimiters: "123" wildcard (star-adjacent), "456" exact.
    for (prefix, prefix_vars) in &abc_variants {
        for x in VAR_TYPES {
            let logtype = format!("{prefix}{}?{I}?", placeholder(x));
            let mut vars = prefix_vars.clone();
            vars.push((false, x));
            vars.push((true, TokenType::IntegerVariable));
            expected.insert(logtype, vars);
        }
    }

    // First '?' delimiter, second '?' inside "456?": both wildcard.
    for (prefix, prefix_vars) in &abc_variants {
        for x in VAR_TYPES {
            for y in VAR_TYPES {
                let logtype = format!("{prefix}{}?{}", placeholder(x), placeholder(y));
                let mut vars = prefix_vars.clone();
                vars.push((false, x));
                vars.push((false, y));
                expected.insert(logtype, vars);
            }
        }
    }

    // First '?' inside "123?456", second '?' delimiter.
    for (prefix, prefix_vars) in &abc_variants {
        for x in VAR_TYPES {
            let logtype = format!("{prefix}{}?", placeholder(x));
            let mut vars = prefix_vars.clone();
            vars.push((false, x));
            expected.insert(logtype, vars);
        }
    }

    // Both '?' inside "123?456?".
    for (prefix, prefix_vars) in &abc_variants {
        for x in VAR_TYPES {
            let logtype = format!("{prefix}{}", placeholder(x));
            let mut vars = prefix_vars.clone();
            vars.push((false, x));
            expected.insert(logtype, vars);
        }
    }

    // Second '*' inside "abc*123" (digits and letters: dictionary only).
    // Both '?' as delimiters: "456" exact.
    expected.insert(
        format!("*{D}?{I}?"),
        vec![
            (false, TokenType::DictionaryVariable),
            (true, TokenType::IntegerVariable),
        ],
    );
    // First '?' delimiter, second inside "456?".
    for y in VAR_TYPES {
        expected.insert(
            format!("*{D}?{}", placeholder(y)),
            vec![(false, TokenType::DictionaryVariable), (false, y)],
        );
    }
    // "abc*123?456" with the trailing '?' as delimiter.
    expected.insert(
        format!("*{D}?"),
        vec![(false, TokenType::DictionaryVariable)],
    );
    // The whole "abc*123?456?" as one dictionary variable.
    expected.insert(format!("*{D}"), vec![(false, TokenType::DictionaryVariable)]);

    expected
}

fn var_summary(subquery: &Subquery<i64>) -> ExpectedVars {
    subquery
        .vars
        .iter()
        .map(|v| match v {
            QueryVariable::Exact(t) => (
                true,
                match t.placeholder {
                    0x11 => TokenType::IntegerVariable,
                    0x13 => TokenType::FloatVariable,
                    _ => TokenType::DictionaryVariable,
                },
            ),
            QueryVariable::Wildcard(t) => (false, t.interpretation),
        })
        .collect()
}

#[test]
fn enumerates_the_expected_subquery_set() {
    let subqueries = generate_subqueries::<i64>("*abc*123?456?").unwrap();
    let expected = expected_subqueries();
    assert_eq!(expected.len(), 42);

    let produced: HashSet<&String> = expected.keys().collect();
    assert_eq!(
        subqueries.len(),
        expected.len(),
        "produced logtypes: {:?}",
        subqueries
            .iter()
            .map(|s| s.logtype_query.escape_debug().to_string())
            .collect::<Vec<_>>()
    );
    let _ = produced;

    for subquery in &subqueries {
        let vars = expected.get(&subquery.logtype_query).unwrap_or_else(|| {
            panic!(
                "unexpected logtype query {:?}",
                subquery.logtype_query.escape_debug().to_string()
            )
        });
        assert!(subquery.logtype_contains_wildcards);
        assert_eq!(
            &var_summary(subquery),
            vars,
            "variable mismatch for {:?}",
            subquery.logtype_query.escape_debug().to_string()
        );
    }

    // The cases the specification singles out.
    assert!(subqueries
        .iter()
        .any(|s| s.logtype_query == format!("*abc*{I}?{I}?")));
    assert!(subqueries
        .iter()
        .any(|s| s.logtype_query == format!("*{D}*{F}?{D}")));
    assert!(subqueries.iter().all(|s| s.logtype_query != "*"));
}

#[test]
fn exact_variable_values_are_carried() {
    let subqueries = generate_subqueries::<i64>("*abc*123?456?").unwrap();
    let with_exact = subqueries
        .iter()
        .find(|s| s.logtype_query == format!("*abc*{I}?{I}?"))
        .unwrap();
    match &with_exact.vars[1] {
        QueryVariable::Exact(token) => {
            assert_eq!(token.value, "456");
            assert_eq!(token.encoded, Some(456));
        }
        other => panic!("expected an exact token, got {other:?}"),
    }
    match &with_exact.vars[0] {
        QueryVariable::Wildcard(token) => assert_eq!(token.pattern, "*123"),
        other => panic!("expected a wildcard token, got {other:?}"),
    }
}

#[test]
fn star_collapses_to_one_superseding_subquery() {
    let subqueries = generate_subqueries::<i64>("*").unwrap();
    assert_eq!(subqueries.len(), 1);
    assert!(subqueries[0].supersedes_all());
    assert!(subqueries[0].logtype_contains_wildcards);
}

#[test]
fn empty_query_is_rejected() {
    assert!(matches!(
        generate_subqueries::<i64>("").unwrap_err(),
        LogCaskError::BadParam(_)
    ));
}

#[test]
fn mid_token_star_forces_residual_match() {
    let subqueries = generate_subqueries::<i64>("abc*123").unwrap();
    assert!(!subqueries.is_empty());
    for subquery in &subqueries {
        assert!(
            subquery.needs_residual_match(),
            "{:?} must be residual-matched",
            subquery.logtype_query.escape_debug().to_string()
        );
    }
}

#[test]
fn wildcard_free_query_reproduces_the_encoder_logtype() {
    let message = "job 4938 finished in 0.5 s on bin/python2.7.3";
    let encoded = logcask_core::encoding::encode_message::<i64>(message);
    let subqueries = generate_subqueries::<i64>(message).unwrap();
    assert_eq!(subqueries.len(), 1);
    let subquery = &subqueries[0];
    assert!(!subquery.logtype_contains_wildcards);
    assert_eq!(
        subquery.logtype_query.as_bytes(),
        encoded.logtype.as_slice()
    );
    let summary = var_summary(subquery);
    assert_eq!(
        summary,
        vec![
            (true, TokenType::IntegerVariable),
            (true, TokenType::FloatVariable),
            (true, TokenType::DictionaryVariable),
        ]
    );
}

#[test]
fn placeholder_literals_are_double_escaped_in_wildcard_queries() {
    // A query with wildcards whose static text contains a raw integer
    // placeholder byte: the logtype pattern must escape the stored
    // escape byte itself.
    let query = format!("*escape {I} now*");
    let subqueries = generate_subqueries::<i64>(&query).unwrap();
    let expected_static = format!("\\\\{I}");
    assert!(
        subqueries
            .iter()
            .any(|s| s.logtype_query.contains(&expected_static)),
        "no subquery double-escapes the placeholder"
    );
}
