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

//! Monotone ladder of prime table capacities.
//!
//! Primes are chosen to avoid pathological modulo aliasing with the flow
//! hash; the list itself is carried over unchanged from the reference
//! implementation rather than re-derived.

const PRIMES: &[u64] = &[
	50047,
	100003,
	200003,
	300043,
	400067,
	500107,
	600101,
	700027,
	800029,
	900091,
	1000117,
	2000081,
	3000017,
	4000081,
	5000153,
	5500003,
	6000101,
	7000003,
	8000071,
	9000143,
	10000141,
	11000081,
	12000097,
	13000133,
	14000071,
	15000017,
	15485783,
];

pub fn total() -> usize {
	PRIMES.len()
}

/// The index of the smallest ladder entry that is >= `val`, clamped to the
/// ladder's ends.
pub fn nearest_idx(val: u64) -> usize {
	match PRIMES.binary_search(&val) {
		Ok(idx) => idx,
		Err(idx) if idx >= PRIMES.len() => PRIMES.len() - 1,
		Err(idx) => idx,
	}
}

pub fn at(idx: usize) -> u64 {
	if idx >= PRIMES.len() {
		PRIMES[PRIMES.len() - 1]
	} else {
		PRIMES[idx]
	}
}

pub fn larger(idx: usize) -> u64 {
	if idx + 1 < PRIMES.len() {
		PRIMES[idx + 1]
	} else {
		PRIMES[PRIMES.len() - 1]
	}
}

pub fn smaller(idx: usize) -> u64 {
	if idx > 0 {
		PRIMES[idx - 1]
	} else {
		PRIMES[0]
	}
}

/// The ladder entry nearest to `val`, clamped to `[min, max]`.
pub fn nearest_clamped(val: u64, min: u64, max: u64) -> u64 {
	at(nearest_idx(val)).clamp(min, max)
}
