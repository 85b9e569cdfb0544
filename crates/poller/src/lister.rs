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
	fs, io,
	path::{Path, PathBuf},
};

use gleaner_filter::{CandidateLister, FileEntry};
use thiserror::Error;
use tracing::debug;

/// Error types for directory listing
#[derive(Debug, Error)]
pub enum ListerError {
	#[error("Failed to read directory {path}: {source}")]
	ReadDir {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("Failed to stat {path}: {source}")]
	Metadata {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// Lists the regular files of one directory, sorted by path
///
/// Subdirectories are not descended into. A file removed between the
/// directory read and its stat is silently skipped.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
	dir: PathBuf,
}

impl DirectoryLister {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}
}

impl CandidateLister<FileEntry> for DirectoryLister {
	type Error = ListerError;

	fn list(&self) -> Result<Vec<FileEntry>, ListerError> {
		let read_dir_err = |source| ListerError::ReadDir {
			path: self.dir.clone(),
			source,
		};

		let mut entries = Vec::new();
		for dir_entry in fs::read_dir(&self.dir).map_err(read_dir_err)? {
			let path = dir_entry.map_err(read_dir_err)?.path();
			if !path.is_file() {
				continue;
			}
			match FileEntry::from_path(&path) {
				Ok(entry) => entries.push(entry),
				Err(e) if e.kind() == io::ErrorKind::NotFound => {
					debug!(target: "poller", path = %path.display(), "File vanished during listing");
				}
				Err(source) => return Err(ListerError::Metadata { path, source }),
			}
		}

		entries.sort_by(|a, b| a.path.cmp(&b.path));
		Ok(entries)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn temp_dir() -> PathBuf {
		let dir = std::env::temp_dir().join(format!("gleaner-lister-{}", uuid::Uuid::new_v4()));
		fs::create_dir_all(&dir).unwrap();
		dir
	}

	#[test]
	fn test_lists_regular_files_sorted() {
		let dir = temp_dir();
		fs::write(dir.join("b.csv"), "b").unwrap();
		fs::write(dir.join("a.csv"), "aa").unwrap();
		fs::create_dir(dir.join("nested")).unwrap();

		let entries = DirectoryLister::new(&dir).list().unwrap();
		let names: Vec<_> = entries.iter().filter_map(|e| e.file_name()).collect();
		assert_eq!(names, vec!["a.csv", "b.csv"]);
		assert_eq!(entries[0].len, 2);

		fs::remove_dir_all(&dir).unwrap();
	}

	#[test]
	fn test_missing_directory_is_an_error() {
		let lister = DirectoryLister::new("/definitely/not/a/dir");
		assert!(matches!(lister.list(), Err(ListerError::ReadDir { .. })));
	}
}
