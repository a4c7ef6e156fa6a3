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

//! Tunables for a [`crate::tracker::Tracker`].

use crate::error::{Error, Result};

pub const DEFAULT_STARTING_ROWS: u64 = 101197;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_REFRESH_PERIOD_SECS: u64 = 60;
pub const DEFAULT_MIN_ROWS: u64 = 50047;
pub const DEFAULT_MAX_ROWS: u64 = 15485783;
pub const DEFAULT_HASH_FULL_PCT: u8 = 8;
pub const DEFAULT_SCALE_UP_PCT: u8 = 6;
pub const DEFAULT_SCALE_DOWN_PCT: u8 = 1;

/// Configuration for a [`crate::tracker::Tracker`].
///
/// Construct with [`TrackerConfig::new`] (defaults) and override fields with
/// the builder methods, then call [`TrackerConfig::validate`] — this happens
/// automatically inside `Tracker::new`.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
	/// Initial capacity, rounded up to the nearest ladder prime.
	pub starting_rows: u64,
	/// Lower clamp on the ladder.
	pub min_rows: u64,
	/// Upper clamp on the ladder.
	pub max_rows: u64,
	/// Seconds the drain window lasts once a refresh begins.
	pub timeout_secs: u64,
	/// Seconds between refresh cycles. `0` disables the background worker.
	pub refresh_period_secs: u64,
	/// Load-factor ceiling, as a percentage of capacity; `insert` returns
	/// `Full` once `inserted` exceeds this.
	pub hash_full_pct: u8,
	/// Load percentage above which the worker steps the ladder up.
	pub scale_up_pct: u8,
	/// Load percentage below which the worker steps the ladder down.
	pub scale_down_pct: u8,
	/// Test-only fault injector: if set, a refresh cycle whose computed new
	/// capacity would exceed this ceiling is treated as a failed standby
	/// allocation and skipped (logged, retried next period) rather than
	/// performed. `None` (the default) never skips a cycle this way.
	pub alloc_ceiling: Option<u64>,
}

impl Default for TrackerConfig {
	fn default() -> TrackerConfig {
		TrackerConfig {
			starting_rows: DEFAULT_STARTING_ROWS,
			min_rows: DEFAULT_MIN_ROWS,
			max_rows: DEFAULT_MAX_ROWS,
			timeout_secs: DEFAULT_TIMEOUT_SECS,
			refresh_period_secs: DEFAULT_REFRESH_PERIOD_SECS,
			hash_full_pct: DEFAULT_HASH_FULL_PCT,
			scale_up_pct: DEFAULT_SCALE_UP_PCT,
			scale_down_pct: DEFAULT_SCALE_DOWN_PCT,
			alloc_ceiling: None,
		}
	}
}

impl TrackerConfig {
	pub fn new() -> TrackerConfig {
		TrackerConfig::default()
	}

	pub fn starting_rows(mut self, rows: u64) -> TrackerConfig {
		self.starting_rows = rows;
		self
	}

	pub fn min_rows(mut self, rows: u64) -> TrackerConfig {
		self.min_rows = rows;
		self
	}

	pub fn max_rows(mut self, rows: u64) -> TrackerConfig {
		self.max_rows = rows;
		self
	}

	pub fn timeout_secs(mut self, secs: u64) -> TrackerConfig {
		self.timeout_secs = secs;
		self
	}

	pub fn refresh_period_secs(mut self, secs: u64) -> TrackerConfig {
		self.refresh_period_secs = secs;
		self
	}

	pub fn hash_full_pct(mut self, pct: u8) -> TrackerConfig {
		self.hash_full_pct = pct;
		self
	}

	pub fn scale_up_pct(mut self, pct: u8) -> TrackerConfig {
		self.scale_up_pct = pct;
		self
	}

	pub fn scale_down_pct(mut self, pct: u8) -> TrackerConfig {
		self.scale_down_pct = pct;
		self
	}

	pub fn alloc_ceiling(mut self, ceiling: u64) -> TrackerConfig {
		self.alloc_ceiling = Some(ceiling);
		self
	}

	pub fn validate(&self) -> Result<()> {
		if self.min_rows > self.starting_rows || self.starting_rows > self.max_rows {
			return Err(Error::InvalidConfig(format!(
				"rows out of order: min_rows={} starting_rows={} max_rows={}",
				self.min_rows, self.starting_rows, self.max_rows,
			)));
		}
		for (name, pct) in [
			("hash_full_pct", self.hash_full_pct),
			("scale_up_pct", self.scale_up_pct),
			("scale_down_pct", self.scale_down_pct),
		] {
			if pct == 0 || pct > 100 {
				return Err(Error::InvalidConfig(format!("{} must be in 1..=100, got {}", name, pct)));
			}
		}
		if !(self.scale_down_pct < self.scale_up_pct && self.scale_up_pct < self.hash_full_pct) {
			return Err(Error::InvalidConfig(format!(
				"expected scale_down_pct < scale_up_pct < hash_full_pct, got {} < {} < {}",
				self.scale_down_pct, self.scale_up_pct, self.hash_full_pct,
			)));
		}
		Ok(())
	}

	pub(crate) fn max_inserts_for(&self, capacity: u64) -> u64 {
		capacity * self.hash_full_pct as u64 / 100
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn defaults_validate() {
		TrackerConfig::new().validate().unwrap();
	}

	#[test]
	fn rejects_rows_out_of_order() {
		let cfg = TrackerConfig::new().starting_rows(10).min_rows(100);
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn rejects_bad_percentage_ordering() {
		let cfg = TrackerConfig::new().scale_up_pct(90).hash_full_pct(50);
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn rejects_zero_percentage() {
		let cfg = TrackerConfig::new().scale_down_pct(0);
		assert!(cfg.validate().is_err());
	}
}
