// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
	sync::atomic::{AtomicI64, Ordering},
	time::Duration,
};

use chrono::Utc;

/// Time source for claim expiry
///
/// Claims are compared across processes that share one store, so the
/// values are wall-clock unix milliseconds. Clock skew between hosts shifts
/// the effective TTL by the skew.
pub trait Clock: Send + Sync {
	fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_millis(&self) -> i64 {
		Utc::now().timestamp_millis()
	}
}

/// Settable clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicI64,
}

impl ManualClock {
	pub fn new(start_millis: i64) -> Self {
		Self {
			now: AtomicI64::new(start_millis),
		}
	}

	pub fn set(&self, millis: i64) {
		self.now.store(millis, Ordering::SeqCst);
	}

	pub fn advance(&self, by: Duration) {
		let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
		// Saturate instead of wrapping past i64::MAX
		let _ = self
			.now
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
				Some(now.saturating_add(millis))
			});
	}
}

impl Clock for ManualClock {
	fn now_millis(&self) -> i64 {
		self.now.load(Ordering::SeqCst)
	}
}
