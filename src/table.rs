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

//! Single-thread-owned, open-addressed hash table with linear probing and
//! tombstones. Lives inside a `Tracker`; never shared or locked on its own.

use std::mem;
use std::sync::Arc;

use crate::key::FlowKey;

/// Invoked exactly once per payload that leaves the table: overwrite,
/// explicit clear, eviction at refresh completion, or table teardown.
///
/// Must be safe to call from the worker thread or any application thread,
/// and must not call back into the tracker for the key being destroyed.
pub type Destructor<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Outcome of [`Table::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
	Ok,
	/// Load ceiling reached; the worker should scale up on the next cycle.
	Full,
	/// Probe wrapped without finding a match or an insertable slot. Only
	/// reachable if invariant 2 (`inserted <= max_inserts <= capacity`) is
	/// violated; kept as a defensive sentinel rather than a panic.
	Invalid,
}

/// One slot. `Tombstone` is distinct from `Empty` so that linear probing can
/// still traverse past a deleted entry to reach a live one further down the
/// chain.
enum RowState<T> {
	Empty,
	Occupied(FlowKey, T),
	Tombstone,
}

enum Probe {
	Found(usize),
	Insertable(usize),
	Invalid,
}

/// A point-in-time snapshot of one table's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
	pub capacity: u64,
	pub inserted: u64,
	pub collisions: u64,
	pub max_inserts: u64,
}

pub struct Table<T> {
	rows: Vec<RowState<T>>,
	capacity: u64,
	inserted: u64,
	collisions: u64,
	max_inserts: u64,
	destructor: Destructor<T>,
}

impl<T> Table<T> {
	pub fn new(capacity: u64, max_inserts: u64, destructor: Destructor<T>) -> Table<T> {
		let mut rows = Vec::with_capacity(capacity as usize);
		rows.resize_with(capacity as usize, || RowState::Empty);
		Table { rows, capacity, inserted: 0, collisions: 0, max_inserts, destructor }
	}

	pub fn capacity(&self) -> u64 {
		self.capacity
	}

	pub fn inserted(&self) -> u64 {
		self.inserted
	}

	pub fn stats(&self) -> TableStats {
		TableStats {
			capacity: self.capacity,
			inserted: self.inserted,
			collisions: self.collisions,
			max_inserts: self.max_inserts,
		}
	}

	// Walk forward from h(key), wrapping once. Stops at the key (found,
	// traversing through tombstones and non-matching occupied slots on the
	// way) or at an Empty slot (miss). Collisions are credited only on a
	// miss: a hit on an already-placed key was credited once, at insertion
	// time, and must not inflate the counter again.
	fn probe_lookup(&mut self, key: &FlowKey) -> Option<usize> {
		let start = key.index(self.capacity);
		let mut idx = start;
		let mut steps = 0u64;
		loop {
			match &self.rows[idx as usize] {
				RowState::Occupied(k, _) if k == key => return Some(idx as usize),
				RowState::Empty => {
					self.collisions += steps;
					return None;
				}
				RowState::Tombstone | RowState::Occupied(_, _) => {}
			}
			idx = (idx + 1) % self.capacity;
			steps += 1;
			if idx == start {
				return None;
			}
		}
	}

	// Like `probe_lookup`, but remembers the first Tombstone/Empty slot seen
	// so an insert of a genuinely new key can use it, while still walking
	// the whole chain first to make sure the key isn't already present
	// further along (an insert must never create two rows for one key).
	fn probe_insert(&mut self, key: &FlowKey) -> Probe {
		let start = key.index(self.capacity);
		let mut idx = start;
		let mut steps = 0u64;
		let mut first_free: Option<(usize, u64)> = None;
		loop {
			match &self.rows[idx as usize] {
				RowState::Occupied(k, _) if k == key => return Probe::Found(idx as usize),
				RowState::Empty => {
					let (target, target_steps) = first_free.unwrap_or((idx as usize, steps));
					self.collisions += target_steps;
					return Probe::Insertable(target);
				}
				RowState::Tombstone => {
					if first_free.is_none() {
						first_free = Some((idx as usize, steps));
					}
				}
				RowState::Occupied(_, _) => {}
			}
			idx = (idx + 1) % self.capacity;
			steps += 1;
			if idx == start {
				return match first_free {
					Some((target, target_steps)) => {
						self.collisions += target_steps;
						Probe::Insertable(target)
					}
					None => Probe::Invalid,
				};
			}
		}
	}

	/// Insert `payload` under `key`. Overwrites (and destroys) any existing
	/// payload for an equal key in place without changing `inserted`.
	pub fn insert(&mut self, key: FlowKey, payload: T) -> InsertOutcome {
		if self.inserted >= self.max_inserts {
			return InsertOutcome::Full;
		}
		match self.probe_insert(&key) {
			Probe::Found(idx) => {
				if let RowState::Occupied(_, old) = mem::replace(&mut self.rows[idx], RowState::Occupied(key, payload)) {
					(self.destructor)(old);
				}
				InsertOutcome::Ok
			}
			Probe::Insertable(idx) => {
				self.rows[idx] = RowState::Occupied(key, payload);
				self.inserted += 1;
				InsertOutcome::Ok
			}
			Probe::Invalid => InsertOutcome::Invalid,
		}
	}

	/// Look up `key` without removing it.
	pub fn lookup(&mut self, key: &FlowKey) -> Option<&T> {
		let idx = self.probe_lookup(key)?;
		match &self.rows[idx] {
			RowState::Occupied(_, payload) => Some(payload),
			_ => unreachable!("probe_lookup only returns indices of occupied, matching rows"),
		}
	}

	/// Remove and return the payload for `key`, replacing its row with a
	/// tombstone, without running the destructor. Used to move a live entry
	/// from the active table into standby during a refresh.
	pub fn take(&mut self, key: &FlowKey) -> Option<T> {
		let idx = self.probe_lookup(key)?;
		match mem::replace(&mut self.rows[idx], RowState::Tombstone) {
			RowState::Occupied(_, payload) => {
				self.inserted -= 1;
				Some(payload)
			}
			_ => unreachable!("probe_lookup only returns indices of occupied, matching rows"),
		}
	}

	/// Remove `key`, running the destructor on its payload if present.
	/// Idempotent: clearing an absent key is a no-op.
	pub fn clear(&mut self, key: &FlowKey) {
		if let Some(payload) = self.take(key) {
			(self.destructor)(payload);
		}
	}

	/// Iterate all live (key, payload) pairs. Used by the refresh worker to
	/// account for what is retired without promotion.
	pub fn iter(&self) -> impl Iterator<Item = (&FlowKey, &T)> {
		self.rows.iter().filter_map(|r| match r {
			RowState::Occupied(k, v) => Some((k, v)),
			_ => None,
		})
	}
}

impl<T> Drop for Table<T> {
	fn drop(&mut self) {
		for row in self.rows.drain(..) {
			if let RowState::Occupied(_, payload) = row {
				(self.destructor)(payload);
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::key::FlowKey;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn counting_destructor() -> (Destructor<u32>, Arc<AtomicUsize>) {
		let count = Arc::new(AtomicUsize::new(0));
		let counted = count.clone();
		let destructor: Destructor<u32> = Arc::new(move |_| {
			counted.fetch_add(1, Ordering::SeqCst);
		});
		(destructor, count)
	}

	fn key(sip: u32) -> FlowKey {
		FlowKey::new(sip, 200, 3000, 5000, 5)
	}

	#[test]
	fn insert_then_lookup() {
		let (destructor, _) = counting_destructor();
		let mut table = Table::new(31, 16, destructor);
		assert_eq!(table.insert(key(10), 1), InsertOutcome::Ok);
		assert_eq!(table.lookup(&key(10)), Some(&1));
	}

	#[test]
	fn bidirectional_lookup() {
		let (destructor, _) = counting_destructor();
		let mut table = Table::new(31, 16, destructor);
		let k = FlowKey::new(10, 200, 3000, 5000, 5);
		table.insert(k, 42);
		let reverse = FlowKey::new(200, 10, 5000, 3000, 5);
		assert_eq!(table.lookup(&reverse), Some(&42));
	}

	#[test]
	fn overwrite_runs_destructor_once() {
		let (destructor, count) = counting_destructor();
		let mut table = Table::new(31, 16, destructor);
		table.insert(key(10), 1);
		table.insert(key(10), 2);
		assert_eq!(count.load(Ordering::SeqCst), 1);
		assert_eq!(table.lookup(&key(10)), Some(&2));
		assert_eq!(table.inserted(), 1);
	}

	#[test]
	fn clear_is_idempotent() {
		let (destructor, count) = counting_destructor();
		let mut table = Table::new(31, 16, destructor);
		table.insert(key(10), 1);
		table.clear(&key(10));
		table.clear(&key(10));
		assert_eq!(count.load(Ordering::SeqCst), 1);
		assert_eq!(table.lookup(&key(10)), None);
	}

	#[test]
	fn full_reports_before_exceeding_max_inserts() {
		let (destructor, _) = counting_destructor();
		let mut table = Table::new(13, 6, destructor);
		for sip in 0..6 {
			assert_eq!(table.insert(key(sip), sip), InsertOutcome::Ok);
		}
		assert_eq!(table.insert(key(6), 6), InsertOutcome::Full);
		for sip in 0..6 {
			assert_eq!(table.lookup(&key(sip)), Some(&sip));
		}
	}

	#[test]
	fn consecutive_indices_on_symmetric_collision() {
		let (destructor, _) = counting_destructor();
		let mut table = Table::new(13, 13, destructor);
		let k1 = FlowKey::new(10, 200, 3000, 4000, 5);
		let k2 = FlowKey::new(10, 200, 4000, 3000, 5);
		table.insert(k1, "foo1");
		table.insert(k2, "foo2");
		assert_eq!(table.lookup(&k1), Some(&"foo1"));
		assert_eq!(table.lookup(&k2), Some(&"foo2"));
	}

	#[test]
	fn teardown_runs_destructor_for_every_live_payload() {
		let (destructor, count) = counting_destructor();
		{
			let mut table = Table::new(31, 16, destructor);
			for sip in 0..5 {
				table.insert(key(sip), sip);
			}
		}
		assert_eq!(count.load(Ordering::SeqCst), 5);
	}

	#[test]
	fn tombstone_preserves_probe_chain() {
		let (destructor, _) = counting_destructor();
		let mut table = Table::new(13, 13, destructor);
		let k1 = FlowKey::new(10, 200, 3000, 4000, 5);
		let k2 = FlowKey::new(10, 200, 4000, 3000, 5);
		table.insert(k1, 1);
		table.insert(k2, 2);
		table.clear(&k1);
		// k1's slot is now a tombstone; k2 (which probed past it) must
		// still be reachable.
		assert_eq!(table.lookup(&k2), Some(&2));
		assert_eq!(table.lookup(&k1), None);
	}

	#[test]
	fn take_removes_without_destroying() {
		let (destructor, count) = counting_destructor();
		let mut table = Table::new(31, 16, destructor);
		table.insert(key(10), 7);
		let payload = table.take(&key(10));
		assert_eq!(payload, Some(7));
		assert_eq!(count.load(Ordering::SeqCst), 0);
		assert_eq!(table.lookup(&key(10)), None);
	}
}
