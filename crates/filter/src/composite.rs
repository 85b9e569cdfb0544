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

use std::{collections::HashSet, hash::Hash, sync::Arc};

use crate::{
	filter::{Capabilities, CandidateFilter, DiscardCallback, FilterError},
	members::Members,
};

/// Intersecting combinator
///
/// Every child sees the original batch; a candidate is admitted only if
/// every child admits it. Children are always all evaluated, even after a
/// rejection is known; their side effects (seen sets, claims, discard
/// callbacks) happen regardless of the verdict.
///
/// A composite with no children admits everything.
pub struct CompositeFilter<C> {
	members: Members<C>,
}

impl<C> CompositeFilter<C> {
	pub fn new() -> Self {
		Self {
			members: Members::new(),
		}
	}

	pub fn from_filters<I>(filters: I) -> Self
	where
		I: IntoIterator<Item = Arc<dyn CandidateFilter<C>>>,
	{
		let mut composite = Self::new();
		for filter in filters {
			composite.add_filter(filter);
		}
		composite
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

impl<C> Default for CompositeFilter<C> {
	fn default() -> Self {
		Self::new()
	}
}

impl<C> CandidateFilter<C> for CompositeFilter<C>
where
	C: Clone + Eq + Hash + Send + Sync,
{
	fn name(&self) -> &'static str {
		"CompositeFilter"
	}

	fn capabilities(&self) -> Capabilities {
		self.members.capabilities()
	}

	fn filter_candidates(&self, candidates: &[C]) -> Result<Vec<C>, FilterError> {
		let mut outputs = Vec::with_capacity(self.members.len());
		for (index, filter) in self.members.filters().iter().enumerate() {
			match filter.filter_candidates(candidates) {
				Ok(admitted) => outputs.push((index, admitted)),
				Err(e) => {
					self.members.unwind(&outputs);
					return Err(e);
				}
			}
		}
		let verdicts: Vec<HashSet<&C>> = outputs
			.iter()
			.map(|(_, admitted)| admitted.iter().collect())
			.collect();

		let mut emitted = HashSet::new();
		Ok(candidates
			.iter()
			.filter(|c| verdicts.iter().all(|accepted| accepted.contains(c)))
			.filter(|c| emitted.insert(*c))
			.cloned()
			.collect())
	}

	fn accept(&self, candidate: &C) -> Result<bool, FilterError> {
		if !self.capabilities().supports_single_candidate() {
			return Err(FilterError::unsupported(self.name(), "accept"));
		}

		let mut accepted = true;
		for filter in self.members.filters() {
			// No short-circuit: every child observes the candidate
			accepted &= filter.accept(candidate)?;
		}
		Ok(accepted)
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

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use super::*;
	use crate::{accept_once::AcceptOnceFilter, filter::PredicateFilter};

	fn recorder() -> (Arc<Mutex<Vec<u32>>>, DiscardCallback<u32>) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();
		(seen, Arc::new(move |c: &u32| sink.lock().unwrap().push(*c)))
	}

	#[test]
	fn test_intersection_of_independent_children() {
		let composite = CompositeFilter::<u32>::from_filters([
			Arc::new(PredicateFilter::new("even", |n: &u32| n % 2 == 0)) as Arc<dyn CandidateFilter<u32>>,
			Arc::new(PredicateFilter::new("small", |n: &u32| *n < 5)),
		]);

		let accepted = composite.filter_candidates(&[1, 2, 3, 4, 6, 8]).unwrap();
		assert_eq!(accepted, vec![2, 4]);
	}

	#[test]
	fn test_children_see_original_batch() {
		let once = Arc::new(AcceptOnceFilter::<u32>::new());
		let composite = CompositeFilter::from_filters([
			Arc::new(PredicateFilter::new("even", |n: &u32| n % 2 == 0)) as Arc<dyn CandidateFilter<u32>>,
			once.clone(),
		]);

		composite.filter_candidates(&[1, 2, 3]).unwrap();
		// The accept-once child recorded odd candidates too
		assert_eq!(once.seen_count(), 3);
	}

	#[test]
	fn test_accept_evaluates_every_child() {
		let composite = CompositeFilter::<u32>::from_filters([
			Arc::new(PredicateFilter::new("never", |_: &u32| false)) as Arc<dyn CandidateFilter<u32>>,
			Arc::new(PredicateFilter::new("small", |n: &u32| *n < 5)),
		]);
		let (discarded, callback) = recorder();
		composite.set_discard_callback(callback).unwrap();

		assert!(!composite.accept(&7).unwrap());
		// Both children rejected 7 and both reported it
		assert_eq!(*discarded.lock().unwrap(), vec![7, 7]);
	}

	#[test]
	fn test_callback_reaches_children_added_later() {
		let mut composite = CompositeFilter::<u32>::new();
		composite.add_filter(Arc::new(PredicateFilter::new("even", |n: &u32| n % 2 == 0)));
		let (discarded, callback) = recorder();
		composite.set_discard_callback(callback).unwrap();

		composite.add_filter(Arc::new(PredicateFilter::new("small", |n: &u32| *n < 5)));
		composite.filter_candidates(&[6]).unwrap();

		assert_eq!(*discarded.lock().unwrap(), vec![6]);
	}

	#[test]
	fn test_rollback_and_remove_reach_capable_children() {
		let once = Arc::new(AcceptOnceFilter::<u32>::new());
		let composite = CompositeFilter::from_filters([
			Arc::new(PredicateFilter::new("any", |_: &u32| true)) as Arc<dyn CandidateFilter<u32>>,
			once.clone(),
		]);
		assert!(composite.capabilities().supports_rollback());
		assert!(!composite.capabilities().supports_commit());

		let batch = composite.filter_candidates(&[1, 2, 3]).unwrap();
		composite.rollback(&2, &batch).unwrap();
		assert_eq!(once.seen_count(), 1);

		assert!(composite.remove(&1).unwrap());
		assert!(!composite.remove(&1).unwrap());
		assert!(matches!(
			composite.commit(&1),
			Err(FilterError::Unsupported { .. })
		));
	}

	#[test]
	fn test_failing_child_unwinds_earlier_children() {
		let once = Arc::new(AcceptOnceFilter::<u32>::new());
		let composite = CompositeFilter::from_filters([
			once.clone() as Arc<dyn CandidateFilter<u32>>,
			Arc::new(Failing),
		]);

		assert!(composite.filter_candidates(&[1, 2]).is_err());
		assert_eq!(once.seen_count(), 0);
	}

	/// Fails every batch
	struct Failing;

	impl CandidateFilter<u32> for Failing {
		fn name(&self) -> &'static str {
			"Failing"
		}

		fn capabilities(&self) -> Capabilities {
			Capabilities::NONE
		}

		fn filter_candidates(&self, _candidates: &[u32]) -> Result<Vec<u32>, FilterError> {
			Err(FilterError::InvalidConfig("unavailable".to_string()))
		}
	}

	#[test]
	fn test_empty_composite_admits_everything() {
		let composite = CompositeFilter::<u32>::new();
		assert!(composite.is_empty());
		assert_eq!(composite.filter_candidates(&[1, 2]).unwrap(), vec![1, 2]);
		assert!(composite.accept(&1).unwrap());
	}

	#[test]
	fn test_duplicates_in_batch_emitted_once() {
		let composite = CompositeFilter::<u32>::from_filters([Arc::new(PredicateFilter::new(
			"any",
			|_: &u32| true,
		)) as Arc<dyn CandidateFilter<u32>>]);

		assert_eq!(composite.filter_candidates(&[1, 1, 2]).unwrap(), vec![1, 2]);
	}
}
