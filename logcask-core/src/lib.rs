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

//! LogCask Core
//!
//! Shared primitives for the LogCask archive engine:
//!
//! - **Error taxonomy**: one [`error::LogCaskError`] enum for the whole
//!   workspace.
//! - **Variable encoding**: the logtype/variable split that turns a log
//!   message into a template plus packed or dictionary variables
//!   ([`encoding`]), with the placeholder wire constants in
//!   [`placeholder`].
//! - **Wildcard matching** ([`wildcard`]) used by dictionary filters and
//!   residual search matching.
//! - **UTF-8 boundary filter** ([`utf8`]) and **timestamp pattern
//!   recognition** ([`timestamp`]).

pub mod encoding;
pub mod error;
pub mod placeholder;
pub mod timestamp;
pub mod utf8;
pub mod wildcard;

pub use error::{LogCaskError, Result};
