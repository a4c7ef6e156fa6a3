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

//! A concurrent flow session tracker for packet-processing pipelines.
//!
//! Keyed by a bidirectional 5-tuple ([`FlowKey`]: two addresses, two ports,
//! a VLAN tag), mapping to caller-owned per-session state. The engine is a
//! *blue-green* hash table: it expires idle flows and resizes itself without
//! a per-entry timestamp and without a global stop-the-world pass, by
//! periodically building a second table, draining traffic into it for a
//! bounded window, and swapping it in.
//!
//! ```
//! use flow_tracker::{FlowKey, Tracker, TrackerConfig};
//!
//! let tracker = Tracker::new(TrackerConfig::new().refresh_period_secs(0), |_payload: &'static str| {})
//! 	.expect("valid config");
//! let key = FlowKey::new(10, 200, 3000, 5000, 5);
//! tracker.insert(key, "hello");
//! assert_eq!(tracker.lookup(&key.reversed()), Some("hello"));
//! ```

mod config;
mod error;
mod key;
mod primes;
mod table;
mod tracker;
mod worker;

pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use key::FlowKey;
pub use table::InsertOutcome;
pub use tracker::{Stats, Tracker};
