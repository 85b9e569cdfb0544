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

use crate::{
	filter::{Capabilities, CandidateFilter, DiscardCallback, FilterError},
	members::Members,
};

/// Pipelining combinator
///
/// Each child sees only what the previous child admitted. Put cheap
/// stateless filters first and stateful ones last, so a candidate rejected
/// on content never reaches the metadata store.
pub struct ChainFilter<C> {
	members: Members<C>,
}

impl<C> ChainFilter<C> {
	pub fn new() -> Self {
		Self {
			members: Members::new(),
		}
	}

	pub fn from_filters<I>(filters: I) -> Self
	where
		I: IntoIterator<Item = Arc<dyn CandidateFilter<C>>>,
	{
		let mut chain = Self::new();
		for filter in filters {
			chain.add_filter(filter);
		}
		chain
	}

	pub fn add_filter(&mut self, filter: Arc<dyn CandidateFilter<C>>) -> &mut Self {
		self.members.push(filter);
		self
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.len() == 0
	}
}

impl<C> Default for ChainFilter<C> {
	fn default() -> Self {
		Self::new()
	}
}

impl<C> CandidateFilter<C> for ChainFilter<C>
where
	C: Clone + Send + Sync,
{
	fn name(&self) -> &'static str {
		"ChainFilter"
	}

	fn capabilities(&self) -> Capabilities {
		self.members.capabilities()
	}

	fn filter_candidates(&self, candidates: &[C]) -> Result<Vec<C>, FilterError> {
		let mut outputs: Vec<(usize, Vec<C>)> = Vec::with_capacity(self.members.len());
		for (index, filter) in self.members.filters().iter().enumerate() {
			let input = outputs.last().map_or(candidates, |(_, admitted)| admitted.as_slice());
			if input.is_empty() {
				break;
			}
			match filter.filter_candidates(input) {
				Ok(admitted) => outputs.push((index, admitted)),
				Err(e) => {
					// Earlier stages admitted what this one never passed on
					self.members.unwind(&outputs);
					return Err(e);
				}
			}
		}
		Ok(outputs
			.pop()
			.map_or_else(|| candidates.to_vec(), |(_, admitted)| admitted))
	}

	fn accept(&self, candidate: &C) -> Result<bool, FilterError> {
		if !self.capabilities().supports_single_candidate() {
			return Err(FilterError::unsupported(self.name(), "accept"));
		}

		for filter in self.members.filters() {
			if !filter.accept(candidate)? {
				return Ok(false);
			}
		}
		Ok(true)
	}

	fn rollback(&self, candidate: &C, batch: &[C]) -> Result<(), FilterError> {
		self.members.rollback(self.name(), candidate, batch)
	}

	fn remove(&self, candidate: &C) -> Result<bool, FilterError> {
		self.members.remove(self.name(), candidate)
	}

	fn commit(&self, candidate: &C) -> Result<(), FilterError> {
		self.members.commit(self.name(), candidate)
	}

	fn set_discard_callback(&self, callback: DiscardCallback<C>) -> Result<(), FilterError> {
		self.members.set_discard_callback(self.name(), callback)
	}
}
