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

//! Gleaner directory poller
//!
//! Wires the candidate filters into a running service:
//! - `DirectoryLister`: lists the input directory on every poll
//! - `Poller`: list -> filter chain -> dispatch, rolling back what the
//!   queue cannot take
//! - `DispatchQueue`: bounded crossbeam channel to the workers
//! - `WorkerPool`: processes files and commits them on the filter

pub mod config;
pub mod dispatch;
pub mod lister;
pub mod logging;
pub mod poller;
pub mod service;
pub mod worker;

pub use dispatch::{DispatchError, DispatchQueue, DispatchReceiver, DispatchSender};
pub use lister::{DirectoryLister, ListerError};
pub use poller::{PollError, PollReport, Poller};
pub use service::PollerService;
pub use worker::{
	CandidateProcessor, CopyProcessor, LogProcessor, ProcessError, WorkerPool, WorkerStats,
};
