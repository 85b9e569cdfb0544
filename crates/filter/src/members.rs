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

use tracing::warn;

use crate::filter::{Capabilities, CandidateFilter, DiscardCallback, DiscardSlot, FilterError};

/// Child filters of a combinator
///
/// Holds the capability-gated delegation shared by the composite and the
/// chain: an operation goes to every child that declares it, and fails as
/// unsupported only when no child does.
pub(crate) struct Members<C> {
	filters: Vec<Arc<dyn CandidateFilter<C>>>,
	discard: DiscardSlot<C>,
}

impl<C> Members<C> {
	pub(crate) fn new() -> Self {
		Self {
			filters: Vec::new(),
			discard: DiscardSlot::new(),
		}
	}

	/// Append a child, handing it the discard callback if one is registered
	pub(crate) fn push(&mut self, filter: Arc<dyn CandidateFilter<C>>) {
		if filter.capabilities().supports_discard_callback()
			&& let Some(callback) = self.discard.get()
			&& let Err(e) = filter.set_discard_callback(callback)
		{
			warn!(target: "filter", filter = filter.name(), error = %e, "Failed to register discard callback");
		}
		self.filters.push(filter);
	}

	pub(crate) fn filters(&self) -> &[Arc<dyn CandidateFilter<C>>] {
		&self.filters
	}

	pub(crate) fn len(&self) -> usize {
		self.filters.len()
	}

	pub(crate) fn capabilities(&self) -> Capabilities {
		Capabilities::combine(self.filters.iter().map(|f| f.capabilities()))
	}

	/// Roll back the batches children admitted before a later failure
	///
	/// `admitted` pairs a child's index with that child's output.
	pub(crate) fn unwind(&self, admitted: &[(usize, Vec<C>)]) {
		for (index, batch) in admitted {
			let (Some(filter), Some(first)) = (self.filters.get(*index), batch.first()) else {
				continue;
			};
			if !filter.capabilities().supports_rollback() {
				continue;
			}
			if let Err(e) = filter.rollback(first, batch) {
				warn!(target: "filter", filter = filter.name(), error = %e, "Failed to unwind admitted batch");
			}
		}
	}

	fn supporting<'a>(
		&'a self,
		capability: fn(&Capabilities) -> bool,
	) -> impl Iterator<Item = &'a Arc<dyn CandidateFilter<C>>> + 'a {
		self.filters
			.iter()
			.filter(move |f| capability(&f.capabilities()))
	}

	pub(crate) fn rollback(
		&self,
		owner: &'static str,
		candidate: &C,
		batch: &[C],
	) -> Result<(), FilterError> {
		let mut delegated = false;
		for filter in self.supporting(Capabilities::supports_rollback) {
			filter.rollback(candidate, batch)?;
			delegated = true;
		}
		if delegated {
			Ok(())
		} else {
			Err(FilterError::unsupported(owner, "rollback"))
		}
	}

	pub(crate) fn remove(&self, owner: &'static str, candidate: &C) -> Result<bool, FilterError> {
		let mut delegated = false;
		let mut removed = false;
		for filter in self.supporting(Capabilities::supports_remove) {
			removed |= filter.remove(candidate)?;
			delegated = true;
		}
		if delegated {
			Ok(removed)
		} else {
			Err(FilterError::unsupported(owner, "remove"))
		}
	}

	pub(crate) fn commit(&self, owner: &'static str, candidate: &C) -> Result<(), FilterError> {
		let mut delegated = false;
		for filter in self.supporting(Capabilities::supports_commit) {
			filter.commit(candidate)?;
			delegated = true;
		}
		if delegated {
			Ok(())
		} else {
			Err(FilterError::unsupported(owner, "commit"))
		}
	}

	/// Register `callback` with every child that accepts one
	///
	/// A candidate discarded by several children triggers the callback once
	/// per child.
	pub(crate) fn set_discard_callback(
		&self,
		owner: &'static str,
		callback: DiscardCallback<C>,
	) -> Result<(), FilterError> {
		self.discard.set(callback.clone());
		let mut delegated = false;
		for filter in self.supporting(Capabilities::supports_discard_callback) {
			filter.set_discard_callback(callback.clone())?;
			delegated = true;
		}
		if delegated {
			Ok(())
		} else {
			Err(FilterError::unsupported(owner, "discard callback"))
		}
	}
}
