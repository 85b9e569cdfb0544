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

use std::{collections::BTreeMap, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};

use super::{Listeners, MetadataStore, MetadataStoreListener, StoreError};

/// In-memory metadata store
///
/// Backed by a sharded concurrent map; each primitive holds the shard lock
/// of its key for the duration of the check and the write, which gives the
/// per-key atomicity the filters rely on.
///
/// Characteristics:
/// - No durability: state is lost with the process
/// - Safe for any number of concurrent callers
/// - Shareable between filter instances of one process via `Arc`
#[derive(Default)]
pub struct SimpleMetadataStore {
	entries: DashMap<String, String>,
	listeners: Listeners,
}

impl SimpleMetadataStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn from_entries(entries: BTreeMap<String, String>) -> Self {
		Self {
			entries: entries.into_iter().collect(),
			listeners: Listeners::default(),
		}
	}

	/// Copy of the current contents, ordered by key
	pub fn snapshot(&self) -> BTreeMap<String, String> {
		self.entries
			.iter()
			.map(|e| (e.key().clone(), e.value().clone()))
			.collect()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn add_listener(&self, listener: Arc<dyn MetadataStoreListener>) {
		self.listeners.add(listener);
	}

	pub fn remove_listener(&self, listener: &Arc<dyn MetadataStoreListener>) -> bool {
		self.listeners.remove(listener)
	}
}

impl MetadataStore for SimpleMetadataStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.entries.get(key).map(|v| v.value().clone()))
	}

	fn put_if_absent(&self, key: &str, value: &str) -> Result<Option<String>, StoreError> {
		let previous = match self.entries.entry(key.to_string()) {
			Entry::Occupied(existing) => Some(existing.get().clone()),
			Entry::Vacant(vacant) => {
				vacant.insert(value.to_string());
				None
			}
		};

		if previous.is_none() {
			self.listeners.added(key, value);
		}
		Ok(previous)
	}

	fn compare_and_replace(
		&self,
		key: &str,
		expected: &str,
		new_value: &str,
	) -> Result<bool, StoreError> {
		let replaced = match self.entries.get_mut(key) {
			Some(mut current) if current.value() == expected => {
				*current = new_value.to_string();
				true
			}
			_ => false,
		};

		if replaced {
			self.listeners.updated(key, new_value);
		}
		Ok(replaced)
	}

	fn remove(&self, key: &str) -> Result<Option<String>, StoreError> {
		let removed = self.entries.remove(key).map(|(_, v)| v);
		if let Some(old_value) = &removed {
			self.listeners.removed(key, old_value);
		}
		Ok(removed)
	}
}
