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
	collections::BTreeMap,
	fs, io,
	path::{Path, PathBuf},
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, Ordering},
	},
};

use tracing::{debug, info, warn};

use super::{MetadataStore, MetadataStoreListener, SimpleMetadataStore, StoreError};

/// Metadata store persisted to a local JSON file
///
/// All primitives run against an in-memory map with the same atomicity as
/// `SimpleMetadataStore`; `flush` writes the whole map to disk. The file
/// is replaced atomically (write to a sibling temp file, then rename), so a
/// crash mid-flush leaves the previous contents intact.
///
/// Mutations since the last flush are lost on a crash. Filters that cannot
/// tolerate this enable `flush_on_update`.
pub struct FileMetadataStore {
	path: PathBuf,
	inner: SimpleMetadataStore,
	dirty: AtomicBool,
	flush_lock: Mutex<()>,
}

impl FileMetadataStore {
	/// Open the store at `path`, loading existing contents if the file exists
	pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
		let path = path.as_ref().to_path_buf();

		let entries: BTreeMap<String, String> = match fs::read(&path) {
			Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
			Ok(bytes) => serde_json::from_slice(&bytes)?,
			Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
			Err(e) => return Err(e.into()),
		};

		info!(
			target: "store",
			path = %path.display(),
			entries = entries.len(),
			"Metadata store opened"
		);

		Ok(Self {
			path,
			inner: SimpleMetadataStore::from_entries(entries),
			dirty: AtomicBool::new(false),
			flush_lock: Mutex::new(()),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn add_listener(&self, listener: Arc<dyn MetadataStoreListener>) {
		self.inner.add_listener(listener);
	}

	pub fn remove_listener(&self, listener: &Arc<dyn MetadataStoreListener>) -> bool {
		self.inner.remove_listener(listener)
	}

	fn mark_dirty(&self) {
		self.dirty.store(true, Ordering::Release);
	}

	fn write_snapshot(&self) -> Result<usize, StoreError> {
		if let Some(parent) = self.path.parent()
			&& !parent.as_os_str().is_empty()
		{
			fs::create_dir_all(parent)?;
		}

		let snapshot = self.inner.snapshot();
		let bytes = serde_json::to_vec_pretty(&snapshot)?;

		let tmp_path = self.path.with_extension("tmp");
		fs::write(&tmp_path, bytes)?;
		fs::rename(&tmp_path, &self.path)?;

		Ok(snapshot.len())
	}
}

impl MetadataStore for FileMetadataStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		self.inner.get(key)
	}

	fn put_if_absent(&self, key: &str, value: &str) -> Result<Option<String>, StoreError> {
		let previous = self.inner.put_if_absent(key, value)?;
		if previous.is_none() {
			self.mark_dirty();
		}
		Ok(previous)
	}

	fn compare_and_replace(
		&self,
		key: &str,
		expected: &str,
		new_value: &str,
	) -> Result<bool, StoreError> {
		let replaced = self.inner.compare_and_replace(key, expected, new_value)?;
		if replaced {
			self.mark_dirty();
		}
		Ok(replaced)
	}

	fn remove(&self, key: &str) -> Result<Option<String>, StoreError> {
		let removed = self.inner.remove(key)?;
		if removed.is_some() {
			self.mark_dirty();
		}
		Ok(removed)
	}

	fn flush(&self) -> Result<(), StoreError> {
		let _guard = self.flush_lock.lock().unwrap_or_else(|e| e.into_inner());

		if !self.dirty.swap(false, Ordering::AcqRel) {
			return Ok(());
		}

		match self.write_snapshot() {
			Ok(entries) => {
				debug!(
					target: "store",
					path = %self.path.display(),
					entries = entries,
					"Metadata store flushed"
				);
				Ok(())
			}
			Err(e) => {
				self.mark_dirty();
				Err(e)
			}
		}
	}
}

impl Drop for FileMetadataStore {
	fn drop(&mut self) {
		if let Err(e) = self.flush() {
			warn!(
				target: "store",
				path = %self.path.display(),
				error = %e,
				"Failed to flush metadata store on drop"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn temp_store_path(name: &str) -> PathBuf {
		std::env::temp_dir()
			.join(format!("gleaner-store-{}-{}", std::process::id(), name))
			.join("metadata.json")
	}

	#[test]
	fn test_flush_and_reopen() {
		let path = temp_store_path("reopen");
		let _ = fs::remove_file(&path);

		{
			let store = FileMetadataStore::open(&path).unwrap();
			store.put_if_absent("a", "1").unwrap();
			store.put_if_absent("b", "2").unwrap();
			store.compare_and_replace("b", "2", "3").unwrap();
			store.flush().unwrap();
		}

		let reopened = FileMetadataStore::open(&path).unwrap();
		assert_eq!(reopened.len(), 2);
		assert_eq!(reopened.get("a").unwrap(), Some("1".to_string()));
		assert_eq!(reopened.get("b").unwrap(), Some("3".to_string()));

		fs::remove_dir_all(path.parent().unwrap()).ok();
	}

	#[test]
	fn test_drop_flushes_pending_updates() {
		let path = temp_store_path("drop");
		let _ = fs::remove_file(&path);

		{
			let store = FileMetadataStore::open(&path).unwrap();
			store.put_if_absent("a", "1").unwrap();
		}

		let reopened = FileMetadataStore::open(&path).unwrap();
		assert_eq!(reopened.get("a").unwrap(), Some("1".to_string()));

		fs::remove_dir_all(path.parent().unwrap()).ok();
	}

	#[test]
	fn test_clean_store_skips_write() {
		let path = temp_store_path("clean");
		let _ = fs::remove_file(&path);

		let store = FileMetadataStore::open(&path).unwrap();
		store.put_if_absent("a", "1").unwrap();
		// Lost race: nothing changed, nothing to write
		store.put_if_absent("a", "2").unwrap();
		store.flush().unwrap();
		assert!(path.exists());

		fs::remove_file(&path).unwrap();
		store.flush().unwrap();
		assert!(!path.exists());

		drop(store);
		fs::remove_dir_all(path.parent().unwrap()).ok();
	}

	#[test]
	fn test_corrupt_file_is_rejected() {
		let path = temp_store_path("corrupt");
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(&path, b"{ not json").unwrap();

		let result = FileMetadataStore::open(&path);
		assert!(matches!(result, Err(StoreError::Serialization(_))));

		fs::remove_dir_all(path.parent().unwrap()).ok();
	}
}
