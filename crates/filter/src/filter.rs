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

use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::store::StoreError;

/// Error types for filter operations
///
/// Lost CAS races and duplicate commits are not errors; they are resolved
/// inside the filters. What remains is store failure, undecodable records,
/// misuse of an optional capability, and bad configuration.
#[derive(Debug, Error)]
pub enum FilterError {
	#[error("Metadata store error: {0}")]
	Store(#[from] StoreError),
	#[error("Corrupt record for key {key}: {reason}")]
	CorruptRecord { key: String, reason: String },
	#[error("{filter} does not support {operation}")]
	Unsupported {
		filter: &'static str,
		operation: &'static str,
	},
	#[error("Invalid filter configuration: {0}")]
	InvalidConfig(String),
}

impl FilterError {
	pub(crate) fn unsupported(filter: &'static str, operation: &'static str) -> Self {
		FilterError::Unsupported { filter, operation }
	}
}

/// Invoked with every candidate a filter stage rejects
pub type DiscardCallback<C> = Arc<dyn Fn(&C) + Send + Sync>;

/// Optional operations a filter implements
///
/// Combinators consult these flags before delegating, so a chain can hold
/// filters with different capability sets without inspecting their types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
	pub single_candidate: bool,
	pub rollback: bool,
	pub remove: bool,
	pub discard_callback: bool,
	pub commit: bool,
}

impl Capabilities {
	pub const NONE: Capabilities = Capabilities {
		single_candidate: false,
		rollback: false,
		remove: false,
		discard_callback: false,
		commit: false,
	};

	pub fn with_single_candidate(mut self) -> Self {
		self.single_candidate = true;
		self
	}

	pub fn with_rollback(mut self) -> Self {
		self.rollback = true;
		self
	}

	pub fn with_remove(mut self) -> Self {
		self.remove = true;
		self
	}

	pub fn with_discard_callback(mut self) -> Self {
		self.discard_callback = true;
		self
	}

	pub fn with_commit(mut self) -> Self {
		self.commit = true;
		self
	}

	pub fn supports_single_candidate(&self) -> bool {
		self.single_candidate
	}

	pub fn supports_rollback(&self) -> bool {
		self.rollback
	}

	pub fn supports_remove(&self) -> bool {
		self.remove
	}

	pub fn supports_discard_callback(&self) -> bool {
		self.discard_callback
	}

	pub fn supports_commit(&self) -> bool {
		self.commit
	}

	/// Capabilities of a combinator over `children`
	///
	/// Single-candidate evaluation needs every child to support it; the
	/// delegated operations only need one child to support them.
	pub fn combine<I>(children: I) -> Self
	where
		I: IntoIterator<Item = Capabilities>,
	{
		let mut any = Capabilities::NONE;
		let mut all_single = true;
		for caps in children {
			all_single &= caps.single_candidate;
			any.rollback |= caps.rollback;
			any.remove |= caps.remove;
			any.discard_callback |= caps.discard_callback;
			any.commit |= caps.commit;
		}
		any.single_candidate = all_single;
		any
	}
}

/// Candidate filter - classifies the candidates of one poll cycle
///
/// `filter_candidates` is the batch form every filter provides. The other
/// operations are optional and gated by `capabilities()`; the defaults
/// report `FilterError::Unsupported`.
///
/// Filters are shared between poller threads, so every operation takes
/// `&self` and implementations synchronize internally.
pub trait CandidateFilter<C>: Send + Sync {
	/// Short name used in errors and logs
	fn name(&self) -> &'static str;

	fn capabilities(&self) -> Capabilities;

	/// Return the admitted subset of `candidates`, in listing order
	fn filter_candidates(&self, candidates: &[C]) -> Result<Vec<C>, FilterError>;

	/// Evaluate a single candidate
	fn accept(&self, _candidate: &C) -> Result<bool, FilterError> {
		Err(FilterError::unsupported(self.name(), "accept"))
	}

	/// Undo admission of `candidate` and everything after it in `batch`
	///
	/// `batch` is the list most recently returned by `filter_candidates`.
	/// A candidate that is not part of the batch is a no-op.
	fn rollback(&self, _candidate: &C, _batch: &[C]) -> Result<(), FilterError> {
		Err(FilterError::unsupported(self.name(), "rollback"))
	}

	/// Forget a candidate so it can be admitted again
	fn remove(&self, _candidate: &C) -> Result<bool, FilterError> {
		Err(FilterError::unsupported(self.name(), "remove"))
	}

	/// Mark a previously admitted candidate as fully processed
	fn commit(&self, _candidate: &C) -> Result<(), FilterError> {
		Err(FilterError::unsupported(self.name(), "commit"))
	}

	fn set_discard_callback(&self, _callback: DiscardCallback<C>) -> Result<(), FilterError> {
		Err(FilterError::unsupported(self.name(), "discard callback"))
	}
}

/// The suffix of `batch` starting at `candidate`, empty if absent
pub(crate) fn rollback_suffix<'a, C: PartialEq>(candidate: &C, batch: &'a [C]) -> &'a [C] {
	match batch.iter().position(|c| c == candidate) {
		Some(pos) => &batch[pos..],
		None => &[],
	}
}

/// Holder for an optional discard callback
pub struct DiscardSlot<C> {
	callback: RwLock<Option<DiscardCallback<C>>>,
}

impl<C> DiscardSlot<C> {
	pub fn new() -> Self {
		Self {
			callback: RwLock::new(None),
		}
	}

	pub fn set(&self, callback: DiscardCallback<C>) {
		*self.callback.write().unwrap_or_else(|e| e.into_inner()) = Some(callback);
	}

	pub fn get(&self) -> Option<DiscardCallback<C>> {
		self.callback
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}

	pub fn is_set(&self) -> bool {
		self.get().is_some()
	}

	/// Invoke the callback, if any, outside of the slot's lock
	pub fn notify(&self, candidate: &C) {
		if let Some(callback) = self.get() {
			callback(candidate);
		}
	}
}

impl<C> Default for DiscardSlot<C> {
	fn default() -> Self {
		Self::new()
	}
}

type Predicate<C> = Arc<dyn Fn(&C) -> bool + Send + Sync>;

/// Stateless filter backed by a predicate closure
///
/// Content rules (name patterns, sizes, ages) plug in here; the
/// predicate decides, the filter handles discard notification.
pub struct PredicateFilter<C> {
	name: &'static str,
	predicate: Predicate<C>,
	discard: DiscardSlot<C>,
}

impl<C> PredicateFilter<C> {
	pub fn new<P>(name: &'static str, predicate: P) -> Self
	where
		P: Fn(&C) -> bool + Send + Sync + 'static,
	{
		Self {
			name,
			predicate: Arc::new(predicate),
			discard: DiscardSlot::new(),
		}
	}
}

impl<C> CandidateFilter<C> for PredicateFilter<C>
where
	C: Clone + Send + Sync,
{
	fn name(&self) -> &'static str {
		self.name
	}

	fn capabilities(&self) -> Capabilities {
		Capabilities::NONE
			.with_single_candidate()
			.with_discard_callback()
	}

	fn filter_candidates(&self, candidates: &[C]) -> Result<Vec<C>, FilterError> {
		let mut accepted = Vec::with_capacity(candidates.len());
		for candidate in candidates {
			if self.accept(candidate)? {
				accepted.push(candidate.clone());
			}
		}
		Ok(accepted)
	}

	fn accept(&self, candidate: &C) -> Result<bool, FilterError> {
		let accepted = (self.predicate)(candidate);
		if !accepted {
			self.discard.notify(candidate);
		}
		Ok(accepted)
	}

	fn set_discard_callback(&self, callback: DiscardCallback<C>) -> Result<(), FilterError> {
		self.discard.set(callback);
		Ok(())
	}
}
