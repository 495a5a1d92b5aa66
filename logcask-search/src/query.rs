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

//! Query model
//!
//! A wildcard expression expands into a set of *subqueries*. Each
//! subquery pairs one concrete logtype pattern with ordered constraints
//! on the variables its placeholders stand for: either an exact token
//! (with its encoded value or dictionary string) or a wildcard token
//! carrying one concrete interpretation.

use logcask_core::encoding::EncodedVariable;
use logcask_core::placeholder::{
    DICTIONARY_PLACEHOLDER, FLOAT_PLACEHOLDER, INTEGER_PLACEHOLDER,
};

/// How a query token is interpreted in one subquery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    StaticText,
    IntegerVariable,
    FloatVariable,
    DictionaryVariable,
}

impl TokenType {
    /// The placeholder byte this interpretation stands for.
    pub fn placeholder(self) -> Option<u8> {
        match self {
            TokenType::StaticText => None,
            TokenType::IntegerVariable => Some(INTEGER_PLACEHOLDER),
            TokenType::FloatVariable => Some(FLOAT_PLACEHOLDER),
            TokenType::DictionaryVariable => Some(DICTIONARY_PLACEHOLDER),
        }
    }
}

/// A wildcard-free token whose encoding is fully determined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExactVariableToken<V> {
    pub value: String,
    pub placeholder: u8,
    /// `Some` for integer/float interpretations, `None` for dictionary.
    pub encoded: Option<V>,
}

/// A token containing (or bordered by) wildcards, pinned to one
/// interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WildcardVariableToken {
    /// The token's wildcard pattern, boundary `*`s included.
    pub pattern: String,
    pub interpretation: TokenType,
}

/// One ordered variable constraint of a subquery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryVariable<V> {
    Exact(ExactVariableToken<V>),
    Wildcard(WildcardVariableToken),
}

impl<V> QueryVariable<V> {
    pub fn is_exact(&self) -> bool {
        matches!(self, QueryVariable::Exact(_))
    }

    pub fn placeholder(&self) -> u8 {
        match self {
            QueryVariable::Exact(t) => t.placeholder,
            QueryVariable::Wildcard(t) => t
                .interpretation
                .placeholder()
                .expect("variable tokens always carry a placeholder"),
        }
    }
}

/// One branch of a query plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subquery<V> {
    /// Wildcard pattern over stored logtypes; contains placeholder
    /// bytes for the variable tokens and double-escaped placeholder
    /// literals for static text.
    pub logtype_query: String,
    pub logtype_contains_wildcards: bool,
    pub vars: Vec<QueryVariable<V>>,
}

impl<V: EncodedVariable> Subquery<V> {
    /// Whether this subquery matches every message and supersedes all
    /// others.
    pub fn supersedes_all(&self) -> bool {
        self.logtype_query == "*" && self.vars.is_empty()
    }

    /// Whether matching needs the decoded message text: any wildcard in
    /// the logtype pattern or in a variable token forces a residual
    /// full-text wildcard match.
    pub fn needs_residual_match(&self) -> bool {
        self.logtype_contains_wildcards || self.vars.iter().any(|v| !v.is_exact())
    }
}
