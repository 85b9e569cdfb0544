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

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
	candidate::CandidateKeyAdapter,
	filter::{
		Capabilities, CandidateFilter, DiscardCallback, DiscardSlot, FilterError, rollback_suffix,
	},
	record::{decode_stamp, encode_stamp},
	store::MetadataStore,
};

/// Flush the store, logging instead of failing
///
/// A failed flush does not undo a CAS that already succeeded, so the
/// admission result stands.
pub(crate) fn flush_quietly(store: &dyn MetadataStore, filter: &'static str) {
	if let Err(e) = store.flush() {
		warn!(target: "filter", filter = filter, error = %e, "Metadata store flush failed");
	}
}

/// Persistent accept-once filter
///
/// One store entry per candidate, `prefix + key -> stamp`. A candidate is
/// admitted when its key is new, or when its stamp differs from the stored
/// one (a modified file counts as a new occurrence). Any number of filter
/// instances and processes may share the store: the put-if-absent /
/// compare-and-replace pair guarantees that each transition is admitted by
/// exactly one caller.
///
/// A caller that loses the compare-and-replace reports "not admitted"
/// rather than retrying; losing means someone else admitted the change.
pub struct PersistentAcceptOnceFilter<C> {
	store: Arc<dyn MetadataStore>,
	prefix: String,
	adapter: Arc<dyn CandidateKeyAdapter<C>>,
	flush_on_update: bool,
	check_existence: bool,
	discard: DiscardSlot<C>,
}

impl<C> PersistentAcceptOnceFilter<C> {
	/// Create a filter over `store`, namespacing every key with `prefix`
	pub fn new<A>(store: Arc<dyn MetadataStore>, prefix: impl Into<String>, adapter: A) -> Self
	where
		A: CandidateKeyAdapter<C> + 'static,
	{
		Self {
			store,
			prefix: prefix.into(),
			adapter: Arc::new(adapter),
			flush_on_update: false,
			check_existence: false,
			discard: DiscardSlot::new(),
		}
	}

	/// Flush the store after every successful update
	pub fn flush_on_update(mut self, flush: bool) -> Self {
		self.flush_on_update = flush;
		self
	}

	/// Re-check that the candidate still exists before admitting it
	pub fn check_existence(mut self, check: bool) -> Self {
		self.check_existence = check;
		self
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	fn build_key(&self, candidate: &C) -> String {
		format!("{}{}", self.prefix, self.adapter.key(candidate))
	}

	fn flush_if_needed(&self) {
		if self.flush_on_update {
			flush_quietly(self.store.as_ref(), "PersistentAcceptOnceFilter");
		}
	}

	/// Flush the underlying store
	pub fn close(&self) {
		flush_quietly(self.store.as_ref(), "PersistentAcceptOnceFilter");
	}

	/// Delete the stored stamps of `candidates`
	fn forget_all(&self, candidates: &[C]) -> Result<usize, FilterError> {
		let mut removed = 0;
		for c in candidates {
			if self.store.remove(&self.build_key(c))?.is_some() {
				removed += 1;
			}
		}
		if removed > 0 {
			self.flush_if_needed();
		}
		Ok(removed)
	}

	/// Forget the part of a batch admitted before `error`, then hand it back
	///
	/// The caller never receives those candidates, so they must stay
	/// eligible for the next poll.
	fn abandon(&self, admitted: &[C], error: FilterError) -> FilterError {
		match self.forget_all(admitted) {
			Ok(released) => warn!(
				target: "filter",
				released = released,
				error = %error,
				"Batch failed partway, admissions released"
			),
			Err(release_error) => warn!(
				target: "filter",
				error = %error,
				release_error = %release_error,
				"Batch failed partway, admissions could not be released"
			),
		}
		error
	}

	fn admit(&self, candidate: &C) -> Result<bool, FilterError> {
		let key = self.build_key(candidate);
		let stamp = self.adapter.stamp(candidate);
		let new_value = encode_stamp(stamp);

		let updated = match self.store.put_if_absent(&key, &new_value)? {
			None => true,
			Some(old_value) => {
				decode_stamp(&key, &old_value)? != stamp
					&& self
						.store
						.compare_and_replace(&key, &old_value, &new_value)?
			}
		};

		if !updated {
			return Ok(false);
		}

		self.flush_if_needed();

		if self.check_existence && !self.adapter.exists(candidate) {
			debug!(target: "filter", key = %key, "Candidate vanished after admission");
			return Ok(false);
		}

		Ok(true)
	}
}

impl<C> CandidateFilter<C> for PersistentAcceptOnceFilter<C>
where
	C: Clone + PartialEq + Send + Sync,
{
	fn name(&self) -> &'static str {
		"PersistentAcceptOnceFilter"
	}

	fn capabilities(&self) -> Capabilities {
		Capabilities::NONE
			.with_single_candidate()
			.with_rollback()
			.with_remove()
			.with_discard_callback()
	}

	fn filter_candidates(&self, candidates: &[C]) -> Result<Vec<C>, FilterError> {
		let mut accepted = Vec::with_capacity(candidates.len());
		for candidate in candidates {
			match self.accept(candidate) {
				Ok(true) => accepted.push(candidate.clone()),
				Ok(false) => {}
				Err(e) => return Err(self.abandon(&accepted, e)),
			}
		}
		Ok(accepted)
	}

	fn accept(&self, candidate: &C) -> Result<bool, FilterError> {
		let admitted = self.admit(candidate)?;
		if !admitted {
			self.discard.notify(candidate);
		}
		Ok(admitted)
	}

	fn rollback(&self, candidate: &C, batch: &[C]) -> Result<(), FilterError> {
		let removed = self.forget_all(rollback_suffix(candidate, batch))?;
		debug!(
			target: "filter",
			batch_len = batch.len(),
			rolled_back = removed,
			"Persistent batch rolled back"
		);
		Ok(())
	}

	fn remove(&self, candidate: &C) -> Result<bool, FilterError> {
		let removed = self.store.remove(&self.build_key(candidate))?.is_some();
		if removed {
			self.flush_if_needed();
		}
		Ok(removed)
	}

	fn set_discard_callback(&self, callback: DiscardCallback<C>) -> Result<(), FilterError> {
		self.discard.set(callback);
		Ok(())
	}
}
