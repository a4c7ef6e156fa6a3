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

//! The background refresh worker: sizes and allocates the standby table,
//! drives the drain window, then swaps it in.

use std::mem;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::primes;
use crate::table::Table;
use crate::tracker::Shared;

const POLL_STEP: Duration = Duration::from_millis(50);

pub(crate) fn run<T: Send + 'static>(shared: Arc<Shared<T>>) {
	let period = Duration::from_secs(shared.config.refresh_period_secs);
	let mut last_cycle = Instant::now();

	while shared.running.load(Ordering::SeqCst) {
		if last_cycle.elapsed() < period {
			thread::sleep(POLL_STEP);
			continue;
		}
		last_cycle = Instant::now();

		if !run_cycle(&shared) {
			log::warn!(target: "flow-tracker", "refresh cycle skipped; will retry next period");
		}
	}
}

// Returns false if the cycle was skipped (standby "allocation" refused by
// the configured fault-injection ceiling) rather than completed.
fn run_cycle<T: Send + 'static>(shared: &Arc<Shared<T>>) -> bool {
	let (capacity, inserted) = {
		let inner = shared.inner.lock();
		(inner.active.capacity(), inner.active.inserted())
	};

	let idx = primes::nearest_idx(capacity);
	let scale_up_at = capacity * shared.config.scale_up_pct as u64 / 100;
	let scale_down_at = capacity * shared.config.scale_down_pct as u64 / 100;
	let new_capacity = if inserted > scale_up_at {
		primes::larger(idx)
	} else if inserted < scale_down_at {
		primes::smaller(idx)
	} else {
		capacity
	};
	let new_capacity = new_capacity.clamp(shared.config.min_rows, shared.config.max_rows);

	// `alloc_ceiling` stands in for a real allocator returning out-of-memory:
	// Rust's global allocator aborts the process on OOM rather than letting
	// us recover, so there is no real failure to inject here. Tests that
	// exercise the "standby allocation fails" path set an unreachable
	// ceiling instead.
	if let Some(ceiling) = shared.config.alloc_ceiling {
		if new_capacity > ceiling {
			log::warn!(
				target: "flow-tracker",
				"standby allocation refused: new capacity {} exceeds alloc_ceiling {}",
				new_capacity, ceiling,
			);
			return false;
		}
	}

	let max_inserts = shared.config.max_inserts_for(new_capacity);
	let standby = Table::new(new_capacity, max_inserts, shared.destructor.clone());

	log::debug!(
		target: "flow-tracker",
		"refresh: {} rows ({} inserted) -> {} rows",
		capacity, inserted, new_capacity,
	);

	{
		let mut inner = shared.inner.lock();
		inner.standby = Some(standby);
		inner.refreshing = true;
	}

	drain_window(shared, Duration::from_secs(shared.config.timeout_secs));

	let retired = {
		let mut inner = shared.inner.lock();
		let new_active = inner.standby.take().expect("standby was set before the drain window");
		let retired = mem::replace(&mut inner.active, new_active);
		inner.refreshing = false;
		retired
	};

	log::info!(
		target: "flow-tracker",
		"refresh complete: retiring table with {} unpromoted entries",
		retired.inserted(),
	);
	if log::log_enabled!(log::Level::Trace) {
		for (key, _) in retired.iter() {
			log::trace!(target: "flow-tracker", "dropping unpromoted flow {:?}", key);
		}
	}
	drop(retired); // runs the destructor for everything left un-promoted
	true
}

// Sleeps out the drain window in small steps so teardown (`running` going
// false) is noticed promptly instead of after a multi-second sleep.
fn drain_window<T>(shared: &Arc<Shared<T>>, window: Duration) {
	let mut waited = Duration::ZERO;
	while waited < window && shared.running.load(Ordering::SeqCst) {
		let step = POLL_STEP.min(window - waited);
		thread::sleep(step);
		waited += step;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::TrackerConfig;
	use crate::tracker::Inner;
	use parking_lot::Mutex;
	use std::sync::atomic::AtomicBool;

	fn shared_with(config: TrackerConfig) -> Arc<Shared<u32>> {
		env_logger::try_init().ok();
		let destructor: crate::table::Destructor<u32> = Arc::new(|_: u32| {});
		let capacity = crate::primes::nearest_clamped(config.starting_rows, config.min_rows, config.max_rows);
		let max_inserts = config.max_inserts_for(capacity);
		let active = Table::new(capacity, max_inserts, destructor.clone());
		Arc::new(Shared {
			config,
			destructor,
			inner: Mutex::new(Inner { active, standby: None, refreshing: false }),
			running: AtomicBool::new(true),
		})
	}

	// Default percentages give scale_up_at ≈ 3002 and max_inserts ≈ 4003 at
	// starting_rows=50047; 3500 distinct inserts lands strictly between the
	// two, so every insert succeeds and the load still crosses scale_up_pct.
	const OVER_SCALE_UP_THRESHOLD: u32 = 3500;

	fn load_keys(shared: &Arc<Shared<u32>>, count: u32) {
		let mut inner = shared.inner.lock();
		for sip in 0..count {
			inner.active.insert(crate::key::FlowKey::new(sip, 1_000_000, 3000, 5000, 3), sip);
		}
	}

	#[test]
	fn alloc_ceiling_below_target_capacity_skips_the_cycle() {
		let shared = shared_with(
			TrackerConfig::new()
				.starting_rows(50047)
				.min_rows(50047)
				.refresh_period_secs(0)
				.timeout_secs(0)
				.alloc_ceiling(50047),
		);
		load_keys(&shared, OVER_SCALE_UP_THRESHOLD);

		let completed = run_cycle(&shared);

		assert!(!completed, "cycle should have been skipped by the alloc_ceiling fault injector");
		assert_eq!(shared.inner.lock().active.capacity(), 50047, "capacity must be unchanged after a skipped cycle");
		assert!(shared.inner.lock().standby.is_none(), "no standby should have been published for a skipped cycle");
		assert!(!shared.inner.lock().refreshing);
	}

	#[test]
	fn cycle_runs_when_alloc_ceiling_is_unset() {
		let shared = shared_with(TrackerConfig::new().starting_rows(50047).min_rows(50047).refresh_period_secs(0).timeout_secs(0));
		load_keys(&shared, OVER_SCALE_UP_THRESHOLD);

		let completed = run_cycle(&shared);

		assert!(completed);
		assert_eq!(shared.inner.lock().active.capacity(), 100003);
	}
}
