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

//! The blue-green controller: owns an active table and, during a refresh
//! cycle, a standby table, and dispatches `insert`/`lookup`/`clear` to the
//! right one(s) depending on phase.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::key::FlowKey;
use crate::primes;
use crate::table::{Destructor, InsertOutcome, Table};
use crate::worker;

pub(crate) struct Inner<T> {
	pub(crate) active: Table<T>,
	pub(crate) standby: Option<Table<T>>,
	pub(crate) refreshing: bool,
}

pub(crate) struct Shared<T> {
	pub(crate) config: TrackerConfig,
	pub(crate) destructor: Destructor<T>,
	pub(crate) inner: Mutex<Inner<T>>,
	pub(crate) running: AtomicBool,
}

/// A point-in-time snapshot of the tracker's occupancy, taken under lock.
/// Not monotonic across calls while a refresh is in progress: it reflects
/// the active table at sample time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
	pub inserted: u64,
	pub collisions: u64,
	pub max_inserts: u64,
	pub num_rows: u64,
	pub in_refresh: bool,
}

/// A concurrent, self-expiring, self-resizing map keyed by [`FlowKey`].
///
/// Holds a single coarse lock. In both phases (steady and draining) an
/// operation holds the lock for its own bounded duration — a handful of
/// hash probes — and never across a whole refresh cycle. See `DESIGN.md`
/// for why this implementation keeps the lock held for that full duration
/// rather than releasing it mid-operation in steady phase.
pub struct Tracker<T> {
	shared: Arc<Shared<T>>,
	worker: Option<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> Tracker<T> {
	/// Build a tracker with its own destructor and spawn the background
	/// refresh worker (unless `config.refresh_period_secs == 0`).
	pub fn new<D>(config: TrackerConfig, destructor: D) -> Result<Tracker<T>>
	where
		D: Fn(T) + Send + Sync + 'static,
	{
		config.validate()?;
		let destructor: Destructor<T> = Arc::new(destructor);
		let capacity = primes::nearest_clamped(config.starting_rows, config.min_rows, config.max_rows);
		let max_inserts = config.max_inserts_for(capacity);
		let active = Table::new(capacity, max_inserts, destructor.clone());

		log::info!(
			target: "flow-tracker",
			"tracker starting with {} rows, refresh_period={}s, timeout={}s",
			capacity, config.refresh_period_secs, config.timeout_secs,
		);

		let refresh_period_secs = config.refresh_period_secs;
		let shared = Arc::new(Shared {
			config,
			destructor,
			inner: Mutex::new(Inner { active, standby: None, refreshing: false }),
			running: AtomicBool::new(true),
		});

		let worker = if refresh_period_secs > 0 {
			let shared = shared.clone();
			Some(thread::spawn(move || worker::run(shared)))
		} else {
			None
		};

		Ok(Tracker { shared, worker })
	}

	/// Insert `payload` under `key`. During a refresh, writes always land in
	/// standby; the entry is promoted into standby-to-be-active, or simply
	/// new, either way.
	pub fn insert(&self, key: FlowKey, payload: T) -> InsertOutcome {
		let mut inner = self.shared.inner.lock();
		if inner.refreshing {
			let standby = inner.standby.as_mut().expect("standby present while refreshing");
			standby.insert(key, payload)
		} else {
			inner.active.insert(key, payload)
		}
	}

	/// Remove any binding for `key`. Idempotent. During a refresh, clears
	/// both tables, since a live entry for `key` could be in either.
	pub fn clear(&self, key: &FlowKey) {
		let mut inner = self.shared.inner.lock();
		inner.active.clear(key);
		if let Some(standby) = inner.standby.as_mut() {
			standby.clear(key);
		}
	}

	/// A snapshot of the active table's occupancy, plus whether a refresh
	/// is currently in progress.
	pub fn stats(&self) -> Stats {
		let inner = self.shared.inner.lock();
		let stats = inner.active.stats();
		Stats {
			inserted: stats.inserted,
			collisions: stats.collisions,
			max_inserts: stats.max_inserts,
			num_rows: stats.capacity,
			in_refresh: inner.refreshing,
		}
	}

	/// Stop the worker, join it, and run every remaining payload's
	/// destructor exactly once as the tables are torn down.
	///
	/// Equivalent to dropping the tracker; provided as a named operation for
	/// callers who want teardown to happen at a specific point rather than
	/// whenever the value goes out of scope.
	pub fn free(self) {
		drop(self)
	}
}

impl<T> Tracker<T> {
	/// Look up `key`, returning a clone of its current payload if present.
	///
	/// During a refresh this may *promote* the entry: move it from active
	/// into standby, which is how the engine records recency without a
	/// per-entry timestamp.
	pub fn lookup(&self, key: &FlowKey) -> Option<T>
	where
		T: Clone,
	{
		let mut inner = self.shared.inner.lock();
		if !inner.refreshing {
			return inner.active.lookup(key).cloned();
		}

		let active_leads = {
			let standby_inserted = inner.standby.as_ref().map(|s| s.inserted()).unwrap_or(0);
			inner.active.inserted() >= standby_inserted
		};

		if active_leads {
			lookup_draining_active(&mut inner, key)
		} else {
			lookup_draining_standby(&mut inner, key)
		}
	}
}

// Active currently holds more entries: probe it first. A hit is promoted
// into standby immediately (residence in the newer table is how recency is
// encoded); a miss falls through to standby.
fn lookup_draining_active<T: Clone>(inner: &mut Inner<T>, key: &FlowKey) -> Option<T> {
	if let Some(payload) = inner.active.take(key) {
		let cloned = payload.clone();
		let standby = inner.standby.as_mut().expect("standby present while refreshing");
		standby.insert(*key, payload);
		return Some(cloned);
	}
	inner.standby.as_mut().and_then(|standby| standby.lookup(key).cloned())
}

// Standby currently holds more entries: probe it first, since it's more
// likely to already hold the answer. Falls back to active, promoting on a
// hit exactly as `lookup_draining_active` does.
fn lookup_draining_standby<T: Clone>(inner: &mut Inner<T>, key: &FlowKey) -> Option<T> {
	if let Some(payload) = inner.standby.as_mut().and_then(|standby| standby.lookup(key)) {
		return Some(payload.clone());
	}
	if let Some(payload) = inner.active.take(key) {
		let cloned = payload.clone();
		let standby = inner.standby.as_mut().expect("standby present while refreshing");
		standby.insert(*key, payload);
		return Some(cloned);
	}
	None
}

impl<T> Drop for Tracker<T> {
	fn drop(&mut self) {
		self.shared.running.store(false, Ordering::SeqCst);
		if let Some(handle) = self.worker.take() {
			let _ = handle.join();
		}
		log::info!(target: "flow-tracker", "tracker stopped");
		// `self.shared`'s Mutex<Inner<T>> drops here (this Tracker is its
		// last owner once the worker thread has exited), running the
		// destructor for every payload still resident in active/standby.
	}
}
