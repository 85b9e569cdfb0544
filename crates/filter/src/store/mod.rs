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

mod file;
mod memory;

use std::sync::{Arc, RwLock};

use thiserror::Error;

pub use file::FileMetadataStore;
pub use memory::SimpleMetadataStore;

/// Error types for metadata store operations
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Metadata store I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Metadata store serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
	#[error("Metadata store backend error: {0}")]
	Backend(String),
}

/// Metadata Store trait - the shared state behind the persistent filters
///
/// An associative string store that several filter instances (possibly in
/// different processes) mutate concurrently. All mutation goes through the
/// atomic primitives below; there is deliberately no unconditional `put`.
///
/// Key semantic constraints:
/// - `put_if_absent` inserts only when the key is missing and returns the
///   existing value otherwise
/// - `compare_and_replace` succeeds only if the current value equals
///   `expected`, and must be linearizable per key
/// - No ordering is promised between different keys
///
/// This abstraction is implementation-agnostic: it can be backed by an
/// in-memory map, a local file, a distributed cache or a database row.
pub trait MetadataStore: Send + Sync {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Insert `value` unless `key` is present
	///
	/// Returns the previous value, or None if this call inserted.
	fn put_if_absent(&self, key: &str, value: &str) -> Result<Option<String>, StoreError>;

	/// Atomically swap `expected` for `new_value`
	///
	/// Returns false if the key is missing or holds a different value.
	fn compare_and_replace(
		&self,
		key: &str,
		expected: &str,
		new_value: &str,
	) -> Result<bool, StoreError>;

	/// Remove `key`, returning the value it held
	fn remove(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Push buffered state to durable storage
	///
	/// Stores without buffering keep the default no-op.
	fn flush(&self) -> Result<(), StoreError> {
		Ok(())
	}
}

/// Observer of store mutations
///
/// Called after the mutation took effect and outside of any store lock.
/// Failed CAS attempts do not produce notifications.
pub trait MetadataStoreListener: Send + Sync {
	fn on_add(&self, _key: &str, _value: &str) {}

	fn on_remove(&self, _key: &str, _old_value: &str) {}

	fn on_update(&self, _key: &str, _new_value: &str) {}
}

/// Registered listeners of one store
#[derive(Default)]
pub(crate) struct Listeners {
	listeners: RwLock<Vec<Arc<dyn MetadataStoreListener>>>,
}

impl Listeners {
	pub(crate) fn add(&self, listener: Arc<dyn MetadataStoreListener>) {
		self.listeners
			.write()
			.unwrap_or_else(|e| e.into_inner())
			.push(listener);
	}

	pub(crate) fn remove(&self, listener: &Arc<dyn MetadataStoreListener>) -> bool {
		let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
		let before = listeners.len();
		listeners.retain(|l| !Arc::ptr_eq(l, listener));
		listeners.len() != before
	}

	fn snapshot(&self) -> Vec<Arc<dyn MetadataStoreListener>> {
		self.listeners
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}

	pub(crate) fn added(&self, key: &str, value: &str) {
		for listener in self.snapshot() {
			listener.on_add(key, value);
		}
	}

	pub(crate) fn removed(&self, key: &str, old_value: &str) {
		for listener in self.snapshot() {
			listener.on_remove(key, old_value);
		}
	}

	pub(crate) fn updated(&self, key: &str, new_value: &str) {
		for listener in self.snapshot() {
			listener.on_update(key, new_value);
		}
	}
}
