// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or driving the tracker.
///
/// This is distinct from [`crate::table::InsertOutcome`]: `insert` returning
/// `Full` or `Invalid` is an expected, recoverable outcome of a single call,
/// not a failure of the engine itself.
#[derive(Debug)]
pub enum Error {
	/// `TrackerConfig` failed validation (bad ordering of row/percentage bounds).
	InvalidConfig(String),
	/// Reserved for a standby-allocation failure during refresh. The worker's
	/// skip-and-retry policy (see `worker::run_cycle`) currently handles this
	/// case by logging a warning and returning early rather than constructing
	/// this variant, since nothing in the call chain from the worker thread
	/// surfaces a `Result` to an application caller; kept in the vocabulary
	/// because it is the failure the skip-and-retry policy exists to handle.
	AllocFailed,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::InvalidConfig(msg) => write!(f, "invalid tracker configuration: {}", msg),
			Error::AllocFailed => write!(f, "standby table allocation failed"),
		}
	}
}

impl std::error::Error for Error {}
