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
	path::PathBuf,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
	thread::{self, JoinHandle},
	time::Duration,
};

use gleaner_filter::{CandidateFilter, FileEntry};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dispatch::{DispatchError, DispatchReceiver};

/// How long an idle worker waits before re-checking the shutdown flag
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Error types for candidate processing
#[derive(Debug, Error)]
pub enum ProcessError {
	#[error("I/O error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("Candidate rejected by processor: {0}")]
	Rejected(String),
}

/// Downstream handling of one dispatched file
///
/// A processor must tolerate being handed the same file again: a claim
/// that was not committed in time is reclaimed and re-dispatched.
pub trait CandidateProcessor: Send + Sync {
	fn process(&self, entry: &FileEntry) -> Result<(), ProcessError>;
}

/// Copies each file into an output directory, overwriting earlier copies
pub struct CopyProcessor {
	output_dir: PathBuf,
}

impl CopyProcessor {
	pub fn new(output_dir: impl Into<PathBuf>) -> Self {
		Self {
			output_dir: output_dir.into(),
		}
	}
}

impl CandidateProcessor for CopyProcessor {
	fn process(&self, entry: &FileEntry) -> Result<(), ProcessError> {
		let name = entry
			.path
			.file_name()
			.ok_or_else(|| ProcessError::Rejected(format!("{} has no file name", entry.path.display())))?;

		fs::create_dir_all(&self.output_dir).map_err(|source| ProcessError::Io {
			path: self.output_dir.clone(),
			source,
		})?;

		let target = self.output_dir.join(name);
		let bytes = fs::copy(&entry.path, &target).map_err(|source| ProcessError::Io {
			path: entry.path.clone(),
			source,
		})?;

		debug!(
			target: "worker",
			from = %entry.path.display(),
			to = %target.display(),
			bytes = bytes,
			"File copied"
		);
		Ok(())
	}
}

/// Only logs what it receives
#[derive(Debug, Default)]
pub struct LogProcessor;

impl CandidateProcessor for LogProcessor {
	fn process(&self, entry: &FileEntry) -> Result<(), ProcessError> {
		info!(
			target: "worker",
			path = %entry.path.display(),
			len = entry.len,
			modified_millis = entry.modified_millis,
			"Candidate received"
		);
		Ok(())
	}
}

/// Counters shared by all workers of a pool
#[derive(Debug, Default)]
pub struct WorkerStats {
	processed: AtomicU64,
	failed: AtomicU64,
}

impl WorkerStats {
	pub fn processed(&self) -> u64 {
		self.processed.load(Ordering::Relaxed)
	}

	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}
}

/// Fixed set of named threads draining the dispatch queue
///
/// Each worker processes an entry and then commits it on the filter. A
/// failed entry is not committed; its claim stays PROCESSING until the TTL
/// expires and a later poll reclaims it.
///
/// Entries still queued at shutdown are dropped uncommitted and follow the
/// same TTL path.
pub struct WorkerPool {
	handles: Vec<JoinHandle<()>>,
	shutdown: Arc<AtomicBool>,
	stats: Arc<WorkerStats>,
}

impl WorkerPool {
	pub fn start(
		workers: usize,
		receiver: DispatchReceiver<FileEntry>,
		processor: Arc<dyn CandidateProcessor>,
		filter: Arc<dyn CandidateFilter<FileEntry>>,
	) -> io::Result<Self> {
		let shutdown = Arc::new(AtomicBool::new(false));
		let stats = Arc::new(WorkerStats::default());

		let mut pool = Self {
			handles: Vec::with_capacity(workers),
			shutdown: shutdown.clone(),
			stats: stats.clone(),
		};

		for id in 0..workers {
			let receiver = receiver.clone();
			let processor = processor.clone();
			let filter = filter.clone();
			let shutdown = shutdown.clone();
			let stats = stats.clone();

			// On spawn failure, dropping `pool` stops the workers already started
			let handle = thread::Builder::new()
				.name(format!("gleaner-worker-{id}"))
				.spawn(move || {
					debug!(target: "worker", worker = id, "Worker started");
					Self::run_worker_loop(
						&receiver,
						processor.as_ref(),
						filter.as_ref(),
						&shutdown,
						&stats,
					);
					debug!(target: "worker", worker = id, "Worker stopped");
				})?;
			pool.handles.push(handle);
		}

		info!(target: "worker", workers = workers, "Worker pool started");
		Ok(pool)
	}

	fn run_worker_loop(
		receiver: &DispatchReceiver<FileEntry>,
		processor: &dyn CandidateProcessor,
		filter: &dyn CandidateFilter<FileEntry>,
		shutdown: &AtomicBool,
		stats: &WorkerStats,
	) {
		let commit = filter.capabilities().supports_commit();

		loop {
			if shutdown.load(Ordering::Relaxed) {
				break;
			}

			let entry = match receiver.recv_timeout(IDLE_WAIT) {
				Ok(entry) => entry,
				Err(DispatchError::Empty) => continue,
				Err(DispatchError::Disconnected) => {
					debug!(target: "worker", "Dispatch queue disconnected");
					break;
				}
				Err(DispatchError::Full) => {
					error!(target: "worker", "Unexpected Full error on receive");
					continue;
				}
			};

			if let Err(e) = processor.process(&entry) {
				stats.failed.fetch_add(1, Ordering::Relaxed);
				warn!(
					target: "worker",
					path = %entry.path.display(),
					error = %e,
					"Processing failed, claim left to expire"
				);
				continue;
			}

			if commit && let Err(e) = filter.commit(&entry) {
				stats.failed.fetch_add(1, Ordering::Relaxed);
				error!(
					target: "worker",
					path = %entry.path.display(),
					error = %e,
					"Failed to commit processed candidate"
				);
				continue;
			}

			stats.processed.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub fn stats(&self) -> Arc<WorkerStats> {
		self.stats.clone()
	}

	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}

	pub fn shutdown(mut self) {
		info!(target: "worker", "Shutting down worker pool");
		self.stop();
	}

	fn stop(&mut self) {
		self.shutdown.store(true, Ordering::Relaxed);
		for handle in self.handles.drain(..) {
			if let Err(e) = handle.join() {
				warn!(target: "worker", error = ?e, "Worker thread panicked");
			}
		}
	}
}

impl Drop for WorkerPool {
	fn drop(&mut self) {
		self.stop();
	}
}

#[cfg(test)]
mod tests {
	use std::{sync::Mutex, time::Instant};

	use gleaner_filter::{FilterError, PredicateFilter};

	use super::*;
	use crate::dispatch::DispatchQueue;

	/// Records commits; accepts everything
	#[derive(Default)]
	struct CommitLog {
		committed: Mutex<Vec<PathBuf>>,
	}

	impl CandidateFilter<FileEntry> for CommitLog {
		fn name(&self) -> &'static str {
			"CommitLog"
		}

		fn capabilities(&self) -> gleaner_filter::Capabilities {
			gleaner_filter::Capabilities::NONE.with_commit()
		}

		fn filter_candidates(&self, candidates: &[FileEntry]) -> Result<Vec<FileEntry>, FilterError> {
			Ok(candidates.to_vec())
		}

		fn commit(&self, candidate: &FileEntry) -> Result<(), FilterError> {
			self.committed.lock().unwrap().push(candidate.path.clone());
			Ok(())
		}
	}

	struct FailOn(&'static str);

	impl CandidateProcessor for FailOn {
		fn process(&self, entry: &FileEntry) -> Result<(), ProcessError> {
			if entry.file_name() == Some(self.0) {
				return Err(ProcessError::Rejected("boom".to_string()));
			}
			Ok(())
		}
	}

	fn wait_until(cond: impl Fn() -> bool) {
		let deadline = Instant::now() + Duration::from_secs(5);
		while !cond() {
			assert!(Instant::now() < deadline, "condition not reached in time");
			thread::sleep(Duration::from_millis(10));
		}
	}

	#[test]
	fn test_successful_entries_are_committed() {
		let (sender, receiver) = DispatchQueue::new(8).split();
		let filter = Arc::new(CommitLog::default());
		let pool = WorkerPool::start(2, receiver, Arc::new(FailOn("bad.csv")), filter.clone()).unwrap();
		let stats = pool.stats();

		sender.try_dispatch(FileEntry::new("/in/a.csv", 1, 1)).unwrap();
		sender.try_dispatch(FileEntry::new("/in/bad.csv", 1, 1)).unwrap();
		sender.try_dispatch(FileEntry::new("/in/c.csv", 1, 1)).unwrap();

		wait_until(|| stats.processed() + stats.failed() == 3);
		pool.shutdown();

		let mut committed = filter.committed.lock().unwrap().clone();
		committed.sort();
		assert_eq!(
			committed,
			vec![PathBuf::from("/in/a.csv"), PathBuf::from("/in/c.csv")]
		);
		assert_eq!(stats.failed(), 1);
	}

	#[test]
	fn test_filters_without_commit_are_not_committed() {
		let (sender, receiver) = DispatchQueue::new(8).split();
		let filter: Arc<dyn CandidateFilter<FileEntry>> =
			Arc::new(PredicateFilter::new("any", |_: &FileEntry| true));
		let pool = WorkerPool::start(1, receiver, Arc::new(LogProcessor), filter).unwrap();
		let stats = pool.stats();

		sender.try_dispatch(FileEntry::new("/in/a.csv", 1, 1)).unwrap();
		wait_until(|| stats.processed() == 1);
		assert_eq!(stats.failed(), 0);
		assert_eq!(pool.len(), 1);
	}

	#[test]
	fn test_copy_processor_copies_into_output_dir() {
		let root = std::env::temp_dir().join(format!("gleaner-worker-{}", uuid::Uuid::new_v4()));
		let input = root.join("in");
		fs::create_dir_all(&input).unwrap();
		fs::write(input.join("a.csv"), "payload").unwrap();

		let processor = CopyProcessor::new(root.join("out"));
		let entry = FileEntry::from_path(input.join("a.csv")).unwrap();
		processor.process(&entry).unwrap();

		assert_eq!(fs::read_to_string(root.join("out/a.csv")).unwrap(), "payload");

		let missing = FileEntry::new(input.join("gone.csv"), 1, 1);
		assert!(matches!(
			processor.process(&missing),
			Err(ProcessError::Io { .. })
		));

		fs::remove_dir_all(&root).unwrap();
	}
}
