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
	fs,
	hash::{Hash, Hasher},
	io,
	path::{Path, PathBuf},
	sync::Arc,
	time::SystemTime,
};

use chrono::{DateTime, Utc};

/// Projections of a candidate used by the persistent filters
///
/// The filters never look inside a candidate. They only need:
/// - a stable string identity (`key`)
/// - a comparison value that changes when the candidate does (`stamp`)
///
/// Adapters are supplied by whatever resource type is being polled, so the
/// same candidate type can be keyed differently (full path vs. file name).
pub trait CandidateKeyAdapter<C>: Send + Sync {
	/// Stable identity of the candidate, without any store prefix
	fn key(&self, candidate: &C) -> String;

	/// Comparison value, typically a modification time in milliseconds
	fn stamp(&self, candidate: &C) -> i64;

	/// Re-check that the underlying resource still exists
	///
	/// Used to close the window where a resource disappears between listing
	/// and filtering. Resources that cannot be re-checked are assumed present.
	fn exists(&self, _candidate: &C) -> bool {
		true
	}
}

/// Source of candidates for one poll cycle
///
/// Each call produces a finite, ordered listing. Nothing else is assumed.
pub trait CandidateLister<C> {
	type Error: std::error::Error + Send + Sync + 'static;

	fn list(&self) -> Result<Vec<C>, Self::Error>;
}

/// Snapshot of one listed file
///
/// Two entries are equal when they name the same path; the modification
/// time and length are what the listing observed at the time.
#[derive(Debug, Clone)]
pub struct FileEntry {
	pub path: PathBuf,
	/// Last modification time (unix milliseconds)
	pub modified_millis: i64,
	pub len: u64,
}

impl FileEntry {
	pub fn new(path: impl Into<PathBuf>, modified_millis: i64, len: u64) -> Self {
		Self {
			path: path.into(),
			modified_millis,
			len,
		}
	}

	/// Build an entry from the filesystem metadata of `path`
	pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
		let path = path.as_ref();
		let metadata = fs::metadata(path)?;
		let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

		Ok(Self {
			path: path.to_path_buf(),
			modified_millis: DateTime::<Utc>::from(modified).timestamp_millis(),
			len: metadata.len(),
		})
	}

	pub fn file_name(&self) -> Option<&str> {
		self.path.file_name().and_then(|n| n.to_str())
	}
}

impl PartialEq for FileEntry {
	fn eq(&self, other: &Self) -> bool {
		self.path == other.path
	}
}

impl Eq for FileEntry {}

impl Hash for FileEntry {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.path.hash(state);
	}
}

/// Keys files by their full path and stamps them with the modification time
#[derive(Debug, Default, Clone, Copy)]
pub struct FileEntryAdapter;

impl CandidateKeyAdapter<FileEntry> for FileEntryAdapter {
	fn key(&self, candidate: &FileEntry) -> String {
		candidate.path.to_string_lossy().into_owned()
	}

	fn stamp(&self, candidate: &FileEntry) -> i64 {
		candidate.modified_millis
	}

	fn exists(&self, candidate: &FileEntry) -> bool {
		candidate.path.exists()
	}
}

/// Keys files by their final path component only
///
/// For listings where the directory part is not a stable identity
/// (mounted at different locations on different hosts).
#[derive(Debug, Default, Clone, Copy)]
pub struct FileNameAdapter;

impl CandidateKeyAdapter<FileEntry> for FileNameAdapter {
	fn key(&self, candidate: &FileEntry) -> String {
		candidate.file_name().unwrap_or_default().to_string()
	}

	fn stamp(&self, candidate: &FileEntry) -> i64 {
		candidate.modified_millis
	}
}

type KeyFn<C> = Arc<dyn Fn(&C) -> String + Send + Sync>;
type StampFn<C> = Arc<dyn Fn(&C) -> i64 + Send + Sync>;

/// Adapter assembled from two closures
pub struct FnKeyAdapter<C> {
	key: KeyFn<C>,
	stamp: StampFn<C>,
}

impl<C> FnKeyAdapter<C> {
	pub fn new<K, S>(key: K, stamp: S) -> Self
	where
		K: Fn(&C) -> String + Send + Sync + 'static,
		S: Fn(&C) -> i64 + Send + Sync + 'static,
	{
		Self {
			key: Arc::new(key),
			stamp: Arc::new(stamp),
		}
	}
}

impl<C> Clone for FnKeyAdapter<C> {
	fn clone(&self) -> Self {
		Self {
			key: self.key.clone(),
			stamp: self.stamp.clone(),
		}
	}
}

impl<C> CandidateKeyAdapter<C> for FnKeyAdapter<C> {
	fn key(&self, candidate: &C) -> String {
		(self.key)(candidate)
	}

	fn stamp(&self, candidate: &C) -> i64 {
		(self.stamp)(candidate)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_file_entry_equality_uses_path_only() {
		let a = FileEntry::new("/data/in/a.csv", 1000, 10);
		let b = FileEntry::new("/data/in/a.csv", 2000, 20);
		let c = FileEntry::new("/data/in/c.csv", 1000, 10);

		assert_eq!(a, b);
		assert_ne!(a, c);
	}

	#[test]
	fn test_path_and_name_adapters() {
		let entry = FileEntry::new("/data/in/a.csv", 1234, 10);

		assert_eq!(FileEntryAdapter.key(&entry), "/data/in/a.csv");
		assert_eq!(FileNameAdapter.key(&entry), "a.csv");
		assert_eq!(FileEntryAdapter.stamp(&entry), 1234);
		assert_eq!(FileNameAdapter.stamp(&entry), 1234);
	}

	#[test]
	fn test_missing_file_does_not_exist() {
		let entry = FileEntry::new("/definitely/not/here/a.csv", 1, 1);
		assert!(!FileEntryAdapter.exists(&entry));
		assert!(FileNameAdapter.exists(&entry));
	}

	#[test]
	fn test_from_path_reads_metadata() {
		let path = std::env::temp_dir().join(format!("gleaner-candidate-{}", std::process::id()));
		fs::write(&path, b"hello").unwrap();

		let entry = FileEntry::from_path(&path).unwrap();
		assert_eq!(entry.len, 5);
		assert!(entry.modified_millis > 0);
		assert!(FileEntryAdapter.exists(&entry));

		fs::remove_file(&path).unwrap();
		assert!(!FileEntryAdapter.exists(&entry));
	}

	#[test]
	fn test_fn_adapter() {
		let adapter = FnKeyAdapter::new(|s: &(String, i64)| s.0.clone(), |s: &(String, i64)| s.1);
		let candidate = ("object/key".to_string(), 42);

		assert_eq!(adapter.key(&candidate), "object/key");
		assert_eq!(adapter.stamp(&candidate), 42);
		assert!(adapter.exists(&candidate));
	}
}
