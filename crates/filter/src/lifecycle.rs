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

//! Persistent lifecycle filter
//!
//! Tracks every candidate through a small state machine stored in the
//! metadata store:
//!
//! ```text
//!   (absent) --accept--> PROCESSING --commit--> PROCESSED
//!                         |    ^
//!                         |    | accept after TTL (retry_count += 1)
//!                         |----+
//!                         |
//!                         +--accept after TTL, retries exhausted--> REJECTED
//! ```
//!
//! PROCESSED and REJECTED are terminal; only `remove` brings a candidate
//! back, and `commit` leaves a REJECTED record as it is. A worker that
//! crashes mid-processing never commits, so its claim expires after
//! `processing_ttl` and another accept reclaims it.
//!
//! Rolling back a claim that was never delivered (a full dispatch queue, or
//! a batch that failed partway) returns it to its pre-claim state: a first
//! claim is deleted, a reclaim gives its retry back and stays expired.
//!
//! Every update is a compare-and-replace against the value just read, so
//! all readers of a key observe one totally ordered sequence of records.

use std::{
	num::NonZeroUsize,
	sync::{Arc, Mutex, MutexGuard},
	time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
	candidate::CandidateKeyAdapter,
	clock::{Clock, SystemClock},
	filter::{
		Capabilities, CandidateFilter, DiscardCallback, DiscardSlot, FilterError, rollback_suffix,
	},
	persistent::flush_quietly,
	record::{LifecycleRecord, ProcessingStatus},
	store::MetadataStore,
};

/// Default time a claim stays exclusive before it may be reclaimed
pub const DEFAULT_PROCESSING_TTL: Duration = Duration::from_secs(30);

/// Configuration for the lifecycle filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
	/// Reclaims allowed before a candidate is rejected; 0 means unlimited
	pub max_retries: u32,
	/// How long a PROCESSING claim is protected from reclaim
	pub processing_ttl: Duration,
	/// Stop evaluating a batch after this many admissions
	pub max_accepted_per_run: Option<NonZeroUsize>,
}

impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			max_retries: 0,
			processing_ttl: DEFAULT_PROCESSING_TTL,
			max_accepted_per_run: None,
		}
	}
}

pub struct PersistentLifecycleFilter<C> {
	store: Arc<dyn MetadataStore>,
	prefix: String,
	adapter: Arc<dyn CandidateKeyAdapter<C>>,
	config: LifecycleConfig,
	clock: Arc<dyn Clock>,
	flush_on_update: bool,
	discard: DiscardSlot<C>,
	/// Serializes accept/commit of this instance; the store orders
	/// instances against each other
	monitor: Mutex<()>,
}

impl<C> PersistentLifecycleFilter<C> {
	pub fn new<A>(
		store: Arc<dyn MetadataStore>,
		prefix: impl Into<String>,
		adapter: A,
		config: LifecycleConfig,
	) -> Self
	where
		A: CandidateKeyAdapter<C> + 'static,
	{
		Self {
			store,
			prefix: prefix.into(),
			adapter: Arc::new(adapter),
			config,
			clock: Arc::new(SystemClock),
			flush_on_update: false,
			discard: DiscardSlot::new(),
			monitor: Mutex::new(()),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Flush the store after every successful update
	pub fn flush_on_update(mut self, flush: bool) -> Self {
		self.flush_on_update = flush;
		self
	}

	pub fn config(&self) -> &LifecycleConfig {
		&self.config
	}

	/// Current stored record of a candidate, if any
	pub fn record(&self, candidate: &C) -> Result<Option<LifecycleRecord>, FilterError> {
		let key = self.build_key(candidate);
		self.store
			.get(&key)?
			.map(|value| LifecycleRecord::decode(&key, &value))
			.transpose()
	}

	/// Flush the underlying store
	pub fn close(&self) {
		flush_quietly(self.store.as_ref(), "PersistentLifecycleFilter");
	}

	fn build_key(&self, candidate: &C) -> String {
		format!("{}{}", self.prefix, self.adapter.key(candidate))
	}

	fn lock(&self) -> MutexGuard<'_, ()> {
		self.monitor.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn ttl_millis(&self) -> i64 {
		i64::try_from(self.config.processing_ttl.as_millis()).unwrap_or(i64::MAX)
	}

	fn flush_if_needed(&self) {
		if self.flush_on_update {
			flush_quietly(self.store.as_ref(), "PersistentLifecycleFilter");
		}
	}

	fn retries_exhausted(&self, record: &LifecycleRecord) -> bool {
		self.config.max_retries > 0 && record.retry_count >= self.config.max_retries
	}

	/// Try to claim `candidate` for processing
	fn claim(&self, candidate: &C) -> Result<bool, FilterError> {
		let _guard = self.lock();
		let key = self.build_key(candidate);
		let ttl = self.ttl_millis();

		loop {
			let now = self.clock.now_millis();
			let fresh = LifecycleRecord::processing(self.adapter.stamp(candidate), now).encode()?;

			if self.store.put_if_absent(&key, &fresh)?.is_none() {
				self.flush_if_needed();
				debug!(target: "filter", key = %key, "Candidate claimed");
				return Ok(true);
			}

			let Some(current) = self.store.get(&key)? else {
				// Removed between the two calls; start over
				continue;
			};
			let mut record = LifecycleRecord::decode(&key, &current)?;

			if record.status.is_terminal() {
				return Ok(false);
			}
			if !record.claim_expired(now, ttl) {
				return Ok(false);
			}

			if self.retries_exhausted(&record) {
				record.status = ProcessingStatus::Rejected;
			} else {
				record.retry_count += 1;
				record.last_retry_at_millis = now;
			}

			if !self
				.store
				.compare_and_replace(&key, &current, &record.encode()?)?
			{
				debug!(target: "filter", key = %key, "Lost claim race, retrying");
				continue;
			}

			self.flush_if_needed();

			if record.status == ProcessingStatus::Rejected {
				warn!(
					target: "filter",
					key = %key,
					retry_count = record.retry_count,
					"Candidate rejected after exhausting retries"
				);
				return Ok(false);
			}

			info!(
				target: "filter",
				key = %key,
				retry_count = record.retry_count,
				"Expired claim reclaimed"
			);
			return Ok(true);
		}
	}

	/// Move the candidate's record to PROCESSED
	fn finish(&self, candidate: &C) -> Result<(), FilterError> {
		let _guard = self.lock();
		let key = self.build_key(candidate);

		loop {
			match self.store.get(&key)? {
				None => {
					// Cleared externally mid-flight; record the outcome anyway
					let record = LifecycleRecord::processed(
						self.adapter.stamp(candidate),
						self.clock.now_millis(),
					);
					if self.store.put_if_absent(&key, &record.encode()?)?.is_none() {
						debug!(target: "filter", key = %key, "Committed candidate without claim record");
						break;
					}
				}
				Some(current) => {
					let mut record = LifecycleRecord::decode(&key, &current)?;
					match record.status {
						ProcessingStatus::Processed => {
							debug!(target: "filter", key = %key, "Candidate already committed");
							return Ok(());
						}
						ProcessingStatus::Rejected => {
							debug!(target: "filter", key = %key, "Candidate rejected, commit ignored");
							return Ok(());
						}
						ProcessingStatus::Processing => {}
					}

					record.status = ProcessingStatus::Processed;
					if self
						.store
						.compare_and_replace(&key, &current, &record.encode()?)?
					{
						break;
					}
					debug!(target: "filter", key = %key, "Lost commit race, retrying");
				}
			}
		}

		self.flush_if_needed();
		debug!(target: "filter", key = %key, "Candidate committed");
		Ok(())
	}

	/// Undo this filter's claim on `candidate`
	///
	/// Returns whether a record was changed. Finished records are left alone.
	fn release(&self, candidate: &C) -> Result<bool, FilterError> {
		let key = self.build_key(candidate);

		loop {
			let Some(current) = self.store.get(&key)? else {
				return Ok(false);
			};
			let mut record = LifecycleRecord::decode(&key, &current)?;
			if record.status != ProcessingStatus::Processing {
				return Ok(false);
			}

			if record.retry_count == 0 {
				return Ok(self.store.remove(&key)?.is_some());
			}

			record.retry_count -= 1;
			record.last_retry_at_millis = self.clock.now_millis().saturating_sub(self.ttl_millis());
			if self
				.store
				.compare_and_replace(&key, &current, &record.encode()?)?
			{
				return Ok(true);
			}
			debug!(target: "filter", key = %key, "Lost release race, retrying");
		}
	}

	fn release_all(&self, candidates: &[C]) -> Result<usize, FilterError> {
		let _guard = self.lock();
		let mut released = 0;
		for candidate in candidates {
			if self.release(candidate)? {
				released += 1;
			}
		}
		if released > 0 {
			self.flush_if_needed();
		}
		Ok(released)
	}

	/// Release the claims made before `error` in a batch, then hand it back
	///
	/// The caller never receives those candidates, so their claims must not
	/// hold them back or spend their retry budget.
	fn abandon(&self, claimed: &[C], error: FilterError) -> FilterError {
		match self.release_all(claimed) {
			Ok(released) => warn!(
				target: "filter",
				released = released,
				error = %error,
				"Batch failed partway, claims released"
			),
			Err(release_error) => warn!(
				target: "filter",
				error = %error,
				release_error = %release_error,
				"Batch failed partway, claims could not be released"
			),
		}
		error
	}
}

impl<C> CandidateFilter<C> for PersistentLifecycleFilter<C>
where
	C: Clone + PartialEq + Send + Sync,
{
	fn name(&self) -> &'static str {
		"PersistentLifecycleFilter"
	}

	fn capabilities(&self) -> Capabilities {
		Capabilities::NONE
			.with_single_candidate()
			.with_rollback()
			.with_remove()
			.with_discard_callback()
			.with_commit()
	}

	/// Claim candidates in listing order
	///
	/// Evaluation stops once `max_accepted_per_run` candidates are claimed;
	/// the rest of the batch is left untouched for the next poll.
	fn filter_candidates(&self, candidates: &[C]) -> Result<Vec<C>, FilterError> {
		let limit = self
			.config
			.max_accepted_per_run
			.map_or(usize::MAX, NonZeroUsize::get);

		let mut accepted = Vec::new();
		for (index, candidate) in candidates.iter().enumerate() {
			if accepted.len() >= limit {
				debug!(
					target: "filter",
					limit = limit,
					deferred = candidates.len() - index,
					"Per-run admission limit reached"
				);
				break;
			}
			match self.accept(candidate) {
				Ok(true) => accepted.push(candidate.clone()),
				Ok(false) => {}
				Err(e) => return Err(self.abandon(&accepted, e)),
			}
		}
		Ok(accepted)
	}

	fn accept(&self, candidate: &C) -> Result<bool, FilterError> {
		let claimed = self.claim(candidate)?;
		if !claimed {
			self.discard.notify(candidate);
		}
		Ok(claimed)
	}

	fn rollback(&self, candidate: &C, batch: &[C]) -> Result<(), FilterError> {
		let released = self.release_all(rollback_suffix(candidate, batch))?;
		debug!(
			target: "filter",
			batch_len = batch.len(),
			rolled_back = released,
			"Lifecycle batch rolled back"
		);
		Ok(())
	}

	fn remove(&self, candidate: &C) -> Result<bool, FilterError> {
		let _guard = self.lock();
		let removed = self.store.remove(&self.build_key(candidate))?.is_some();
		if removed {
			self.flush_if_needed();
		}
		Ok(removed)
	}

	fn commit(&self, candidate: &C) -> Result<(), FilterError> {
		self.finish(candidate)
	}

	fn set_discard_callback(&self, callback: DiscardCallback<C>) -> Result<(), FilterError> {
		self.discard.set(callback);
		Ok(())
	}
}
