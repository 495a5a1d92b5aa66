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

//! LogCask Search
//!
//! Turns a wildcard expression into a disjunction of *subqueries* over
//! the encoded form — one concrete logtype pattern plus ordered
//! variable constraints each — so candidate segments can be pruned by
//! logtype- and variable-dictionary lookups before any column byte is
//! decompressed. The executor scans only surviving segments, confirms
//! encoded constraints per message, and decodes text solely for the
//! residual wildcard match.

pub mod executor;
pub mod output;
pub mod planner;
pub mod query;

pub use executor::{search_archive, SearchConfig};
pub use output::{CollectingOutputHandler, OutputHandler, SearchResult, StreamingOutputHandler};
pub use planner::{generate_subqueries, prepare_wildcard_query, MAX_SUBQUERIES};
pub use query::{ExactVariableToken, QueryVariable, Subquery, TokenType, WildcardVariableToken};
