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

use anyhow::{Context, Result};
use gleaner_filter::{
	CandidateFilter, ChainFilter, FileEntry, FileEntryAdapter, FileMetadataStore, FileNameAdapter,
	MetadataStore, PersistentLifecycleFilter, PredicateFilter,
};
use tracing::info;

use crate::{
	config::PollerConfig,
	dispatch::DispatchQueue,
	lister::DirectoryLister,
	poller::{PollError, PollReport, Poller},
	worker::{CandidateProcessor, CopyProcessor, LogProcessor, WorkerPool, WorkerStats},
};

/// Fully wired poller: store, filter chain, queue, workers
///
/// The chain is an optional file-suffix predicate followed by the
/// lifecycle filter, so files of other types never touch the store.
pub struct PollerService {
	poller: Arc<Poller<DirectoryLister>>,
	pool: WorkerPool,
	store: Arc<FileMetadataStore>,
	lifecycle: Arc<PersistentLifecycleFilter<FileEntry>>,
}

impl PollerService {
	pub fn start(config: &PollerConfig) -> Result<Self> {
		config.validate()?;

		let store = Arc::new(
			FileMetadataStore::open(&config.store_path).with_context(|| {
				format!(
					"Failed to open metadata store {}",
					config.store_path.display()
				)
			})?,
		);
		let shared: Arc<dyn MetadataStore> = store.clone();

		let lifecycle = Arc::new(if config.key_by_file_name {
			config.filter.lifecycle_filter(shared, FileNameAdapter)
		} else {
			config.filter.lifecycle_filter(shared, FileEntryAdapter)
		});

		let mut chain = ChainFilter::new();
		if let Some(suffix) = config.file_suffix.clone() {
			chain.add_filter(Arc::new(PredicateFilter::new(
				"FileSuffixFilter",
				move |entry: &FileEntry| entry.file_name().is_some_and(|n| n.ends_with(&suffix)),
			)));
		}
		chain.add_filter(lifecycle.clone());
		let filter: Arc<dyn CandidateFilter<FileEntry>> = Arc::new(chain);

		let processor: Arc<dyn CandidateProcessor> = match &config.output_dir {
			Some(dir) => Arc::new(CopyProcessor::new(dir)),
			None => Arc::new(LogProcessor),
		};

		let (sender, receiver) = DispatchQueue::new(config.queue_capacity).split();
		let pool = WorkerPool::start(config.workers, receiver, processor, filter.clone())
			.context("Failed to spawn worker threads")?;
		let poller = Arc::new(Poller::new(
			DirectoryLister::new(&config.input_dir),
			filter,
			sender,
		));

		info!(
			target: "poller",
			input_dir = %config.input_dir.display(),
			store = %config.store_path.display(),
			workers = config.workers,
			queue_capacity = config.queue_capacity,
			"Poller service started"
		);

		Ok(Self {
			poller,
			pool,
			store,
			lifecycle,
		})
	}

	pub fn poll_once(&self) -> Result<PollReport, PollError> {
		self.poller.poll_once()
	}

	/// Shared handle for running polls off the async runtime
	pub fn poller(&self) -> Arc<Poller<DirectoryLister>> {
		self.poller.clone()
	}

	pub fn lifecycle(&self) -> &Arc<PersistentLifecycleFilter<FileEntry>> {
		&self.lifecycle
	}

	pub fn stats(&self) -> Arc<WorkerStats> {
		self.pool.stats()
	}

	/// Stop the workers and flush the store
	pub fn shutdown(self) -> Result<()> {
		self.pool.shutdown();
		self.store
			.flush()
			.context("Failed to flush metadata store on shutdown")?;
		info!(target: "poller", "Poller service stopped");
		Ok(())
	}
}
