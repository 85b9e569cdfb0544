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
	collections::{HashMap, VecDeque},
	hash::Hash,
	num::NonZeroUsize,
	sync::{Mutex, MutexGuard},
};

/// Capacity bound for a seen set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
	Unbounded,
	Bounded(NonZeroUsize),
}

impl Capacity {
	fn limit(&self) -> Option<usize> {
		match self {
			Capacity::Unbounded => None,
			Capacity::Bounded(n) => Some(n.get()),
		}
	}
}

/// Insertion-ordered set with a capacity bound
///
/// Membership is a hash lookup. Eviction removes the oldest admitted member
/// (FIFO, not LRU: re-inserting an existing member does not refresh it).
///
/// Members are indexed by an admission sequence number. The order queue may
/// hold entries for members that were removed explicitly; those are skipped
/// when evicting and compacted away once they outnumber the live members.
#[derive(Debug)]
pub struct BoundedOrderedSet<T> {
	members: HashMap<T, u64>,
	order: VecDeque<(u64, T)>,
	capacity: Capacity,
	next_seq: u64,
}

impl<T> BoundedOrderedSet<T>
where
	T: Hash + Eq + Clone,
{
	pub fn new(capacity: Capacity) -> Self {
		Self {
			members: HashMap::new(),
			order: VecDeque::new(),
			capacity,
			next_seq: 0,
		}
	}

	pub fn unbounded() -> Self {
		Self::new(Capacity::Unbounded)
	}

	pub fn capacity(&self) -> Capacity {
		self.capacity
	}

	/// Insert a member, evicting the oldest members if the bound is reached
	///
	/// Returns false if the member was already present.
	pub fn insert(&mut self, item: T) -> bool {
		if self.members.contains_key(&item) {
			return false;
		}

		if let Some(limit) = self.capacity.limit() {
			while self.members.len() >= limit {
				if self.evict_oldest().is_none() {
					break;
				}
			}
		}

		let seq = self.next_seq;
		self.next_seq += 1;
		self.members.insert(item.clone(), seq);
		self.order.push_back((seq, item));
		true
	}

	pub fn remove(&mut self, item: &T) -> bool {
		let removed = self.members.remove(item).is_some();
		if removed {
			self.compact_if_sparse();
		}
		removed
	}

	pub fn contains(&self, item: &T) -> bool {
		self.members.contains_key(item)
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	pub fn clear(&mut self) {
		self.members.clear();
		self.order.clear();
	}

	/// Remove and return the oldest live member
	fn evict_oldest(&mut self) -> Option<T> {
		while let Some((seq, item)) = self.order.pop_front() {
			if self.members.get(&item) == Some(&seq) {
				self.members.remove(&item);
				return Some(item);
			}
		}
		None
	}

	fn compact_if_sparse(&mut self) {
		if self.order.len() > 2 * self.members.len() + 16 {
			let members = &self.members;
			self.order
				.retain(|(seq, item)| members.get(item) == Some(seq));
		}
	}
}

/// Thread-safe seen set shared by one filter instance
///
/// A single mutex guards the ordered set; callers never touch the set
/// directly.
#[derive(Debug)]
pub struct SeenSetCache<T> {
	inner: Mutex<BoundedOrderedSet<T>>,
}

impl<T> SeenSetCache<T>
where
	T: Hash + Eq + Clone,
{
	pub fn new(capacity: Capacity) -> Self {
		Self {
			inner: Mutex::new(BoundedOrderedSet::new(capacity)),
		}
	}

	fn lock(&self) -> MutexGuard<'_, BoundedOrderedSet<T>> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Record `item` as seen; true if it was not seen before
	pub fn admit(&self, item: &T) -> bool {
		let mut set = self.lock();
		if set.contains(item) {
			return false;
		}
		set.insert(item.clone())
	}

	pub fn forget(&self, item: &T) -> bool {
		self.lock().remove(item)
	}

	/// Forget every item under one acquisition of the lock
	pub fn forget_all<'a, I>(&self, items: I) -> usize
	where
		I: IntoIterator<Item = &'a T>,
		T: 'a,
	{
		let mut set = self.lock();
		items.into_iter().filter(|item| set.remove(item)).count()
	}

	pub fn contains(&self, item: &T) -> bool {
		self.lock().contains(item)
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	pub fn capacity(&self) -> Capacity {
		self.lock().capacity()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bounded(n: usize) -> Capacity {
		Capacity::Bounded(NonZeroUsize::new(n).unwrap())
	}

	#[test]
	fn test_fifo_eviction() {
		let mut set = BoundedOrderedSet::new(bounded(2));

		assert!(set.insert("a"));
		assert!(set.insert("b"));
		assert!(set.insert("c"));

		assert!(!set.contains(&"a"));
		assert!(set.contains(&"b"));
		assert!(set.contains(&"c"));
		assert_eq!(set.len(), 2);
	}

	#[test]
	fn test_reinsert_does_not_refresh_order() {
		let mut set = BoundedOrderedSet::new(bounded(2));

		set.insert("a");
		set.insert("b");
		assert!(!set.insert("a"));
		set.insert("c");

		// "a" is still the oldest admission
		assert!(!set.contains(&"a"));
		assert!(set.contains(&"b"));
	}

	#[test]
	fn test_remove_keeps_remaining_order() {
		let mut set = BoundedOrderedSet::new(bounded(3));

		set.insert(1);
		set.insert(2);
		set.insert(3);
		assert!(set.remove(&2));
		assert!(!set.remove(&2));

		set.insert(4);
		assert_eq!(set.len(), 3);
		set.insert(5);

		assert!(!set.contains(&1));
		assert!(set.contains(&3));
		assert!(set.contains(&4));
		assert!(set.contains(&5));
	}

	#[test]
	fn test_removed_then_reinserted_member_is_youngest() {
		let mut set = BoundedOrderedSet::new(bounded(2));

		set.insert("a");
		set.insert("b");
		set.remove(&"a");
		set.insert("a");
		set.insert("c");

		assert!(!set.contains(&"b"));
		assert!(set.contains(&"a"));
		assert!(set.contains(&"c"));
	}

	#[test]
	fn test_stale_order_entries_are_compacted() {
		let mut set = BoundedOrderedSet::unbounded();

		for i in 0..100 {
			set.insert(i);
		}
		for i in 0..90 {
			set.remove(&i);
		}

		assert_eq!(set.len(), 10);
		assert!(set.order.len() <= 2 * set.len() + 16);
	}

	#[test]
	fn test_unbounded_never_evicts() {
		let mut set = BoundedOrderedSet::unbounded();
		for i in 0..10_000 {
			assert!(set.insert(i));
		}
		assert_eq!(set.len(), 10_000);
		assert!(set.contains(&0));
	}

	#[test]
	fn test_cache_admit_and_forget() {
		let cache = SeenSetCache::new(bounded(2));

		assert!(cache.admit(&"a".to_string()));
		assert!(!cache.admit(&"a".to_string()));
		assert!(cache.forget(&"a".to_string()));
		assert!(cache.admit(&"a".to_string()));

		cache.admit(&"b".to_string());
		let forgotten = cache.forget_all([&"a".to_string(), &"z".to_string()]);
		assert_eq!(forgotten, 1);
		assert_eq!(cache.len(), 1);
	}
}
