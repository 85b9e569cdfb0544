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

use std::{hash::Hash, num::NonZeroUsize};

use tracing::debug;

use crate::{
	filter::{
		Capabilities, CandidateFilter, DiscardCallback, DiscardSlot, FilterError, rollback_suffix,
	},
	seen::{Capacity, SeenSetCache},
};

/// In-memory accept-once filter
///
/// Admits each distinct candidate (by equality) exactly once for the
/// lifetime of the filter. With a bounded capacity, the oldest admitted
/// candidate is forgotten when the bound is reached and may be admitted
/// again on a later poll.
///
/// Characteristics:
/// - No persistence: a restart forgets everything
/// - No I/O, never fails
/// - Supports rollback and remove for partially failed batches
pub struct AcceptOnceFilter<T> {
	seen: SeenSetCache<T>,
	discard: DiscardSlot<T>,
}

impl<T> AcceptOnceFilter<T>
where
	T: Hash + Eq + Clone,
{
	/// Unbounded filter; remembers every candidate it admits
	pub fn new() -> Self {
		Self::with_limit(Capacity::Unbounded)
	}

	/// Filter remembering at most `max_capacity` candidates
	pub fn with_capacity(max_capacity: usize) -> Result<Self, FilterError> {
		let capacity = NonZeroUsize::new(max_capacity).ok_or_else(|| {
			FilterError::InvalidConfig("accept-once capacity must be greater than zero".to_string())
		})?;
		Ok(Self::with_limit(Capacity::Bounded(capacity)))
	}

	pub fn with_limit(capacity: Capacity) -> Self {
		Self {
			seen: SeenSetCache::new(capacity),
			discard: DiscardSlot::new(),
		}
	}

	/// Number of candidates currently remembered
	pub fn seen_count(&self) -> usize {
		self.seen.len()
	}

	fn admit(&self, candidate: &T) -> bool {
		let admitted = self.seen.admit(candidate);
		if !admitted {
			self.discard.notify(candidate);
		}
		admitted
	}
}

impl<T> Default for AcceptOnceFilter<T>
where
	T: Hash + Eq + Clone,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<T> CandidateFilter<T> for AcceptOnceFilter<T>
where
	T: Hash + Eq + Clone + Send + Sync,
{
	fn name(&self) -> &'static str {
		"AcceptOnceFilter"
	}

	fn capabilities(&self) -> Capabilities {
		Capabilities::NONE
			.with_single_candidate()
			.with_rollback()
			.with_remove()
			.with_discard_callback()
	}

	fn filter_candidates(&self, candidates: &[T]) -> Result<Vec<T>, FilterError> {
		// Admission is infallible, so a batch is never left half-admitted
		Ok(candidates
			.iter()
			.filter(|c| self.admit(c))
			.cloned()
			.collect())
	}

	fn accept(&self, candidate: &T) -> Result<bool, FilterError> {
		Ok(self.admit(candidate))
	}

	fn rollback(&self, candidate: &T, batch: &[T]) -> Result<(), FilterError> {
		let suffix = rollback_suffix(candidate, batch);
		let forgotten = self.seen.forget_all(suffix);
		debug!(
			target: "filter",
			batch_len = batch.len(),
			rolled_back = forgotten,
			"Accept-once batch rolled back"
		);
		Ok(())
	}

	fn remove(&self, candidate: &T) -> Result<bool, FilterError> {
		Ok(self.seen.forget(candidate))
	}

	fn set_discard_callback(&self, callback: DiscardCallback<T>) -> Result<(), FilterError> {
		self.discard.set(callback);
		Ok(())
	}
}
