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

use gleaner_filter::{CandidateFilter, CandidateLister, FileEntry, FilterError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchError, DispatchSender};

/// Error types for one poll cycle
#[derive(Debug, Error)]
pub enum PollError {
	#[error("Failed to list candidates: {0}")]
	Lister(#[source] Box<dyn std::error::Error + Send + Sync>),
	#[error("Filter error: {0}")]
	Filter(#[from] FilterError),
	#[error("Dispatch error: {0}")]
	Dispatch(#[from] DispatchError),
}

/// Outcome of one poll cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
	/// Entries returned by the lister
	pub listed: usize,
	/// Entries admitted by the filter
	pub admitted: usize,
	/// Admitted entries handed to the workers
	pub dispatched: usize,
	/// Admitted entries rolled back because the queue was full
	pub deferred: usize,
}

/// One listing source, one filter, one dispatch queue
///
/// `poll_once` never leaves an admitted entry stranded: whatever cannot be
/// queued is rolled back on the filter and comes back on a later poll.
pub struct Poller<L> {
	lister: L,
	filter: Arc<dyn CandidateFilter<FileEntry>>,
	sender: DispatchSender<FileEntry>,
}

impl<L> Poller<L>
where
	L: CandidateLister<FileEntry>,
{
	pub fn new(
		lister: L,
		filter: Arc<dyn CandidateFilter<FileEntry>>,
		sender: DispatchSender<FileEntry>,
	) -> Self {
		Self {
			lister,
			filter,
			sender,
		}
	}

	pub fn filter(&self) -> &Arc<dyn CandidateFilter<FileEntry>> {
		&self.filter
	}

	/// List, filter, and dispatch once
	pub fn poll_once(&self) -> Result<PollReport, PollError> {
		let listed = self
			.lister
			.list()
			.map_err(|e| PollError::Lister(Box::new(e)))?;
		let admitted = self.filter.filter_candidates(&listed)?;

		let mut report = PollReport {
			listed: listed.len(),
			admitted: admitted.len(),
			..PollReport::default()
		};

		for entry in &admitted {
			match self.sender.try_dispatch(entry.clone()) {
				Ok(()) => report.dispatched += 1,
				Err(e) => {
					report.deferred = admitted.len() - report.dispatched;
					self.release(entry, &admitted)?;
					if e == DispatchError::Full {
						warn!(
							target: "poller",
							deferred = report.deferred,
							"Dispatch queue full, deferring remaining candidates"
						);
						break;
					}
					return Err(e.into());
				}
			}
		}

		if report.admitted > 0 {
			info!(
				target: "poller",
				listed = report.listed,
				admitted = report.admitted,
				dispatched = report.dispatched,
				deferred = report.deferred,
				"Poll completed"
			);
		} else {
			debug!(target: "poller", listed = report.listed, "Nothing new");
		}
		Ok(report)
	}

	/// Undo admission of `entry` and everything after it
	fn release(&self, entry: &FileEntry, admitted: &[FileEntry]) -> Result<(), PollError> {
		if self.filter.capabilities().supports_rollback() {
			self.filter.rollback(entry, admitted)?;
		} else {
			warn!(
				target: "poller",
				filter = self.filter.name(),
				"Filter cannot roll back; undispatched candidates are lost until they change"
			);
		}
		Ok(())
	}
}
