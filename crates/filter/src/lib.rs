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

//! Gleaner candidate filters
//!
//! This crate decides which entries of a repeatedly polled listing have
//! already been handed downstream, so a poller never re-emits an entry it
//! delivered before while still allowing re-delivery after a failed or
//! abandoned processing attempt.
//!
//! Architecture:
//! - `AcceptOnceFilter`: bounded in-memory seen set, FIFO eviction
//! - `PersistentAcceptOnceFilter`: CAS over a shared `MetadataStore`, keyed by stamp
//! - `PersistentLifecycleFilter`: PROCESSING / PROCESSED / REJECTED state machine
//!   with TTL reclaim, retry limits and an explicit commit step
//! - `CompositeFilter` / `ChainFilter`: intersecting and pipelining combinators
//!
//! The metadata store is an external collaborator reached only through
//! `put_if_absent` / `compare_and_replace`; two backends are provided
//! (`SimpleMetadataStore`, `FileMetadataStore`).

pub mod accept_once;
pub mod candidate;
pub mod chain;
pub mod clock;
pub mod composite;
pub mod config;
pub mod filter;
pub mod lifecycle;
mod members;
pub mod persistent;
pub mod record;
pub mod seen;
pub mod store;

pub use accept_once::AcceptOnceFilter;
pub use candidate::{
	CandidateKeyAdapter, CandidateLister, FileEntry, FileEntryAdapter, FileNameAdapter,
	FnKeyAdapter,
};
pub use chain::ChainFilter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use composite::CompositeFilter;
pub use config::FilterConfig;
pub use filter::{
	Capabilities, CandidateFilter, DiscardCallback, DiscardSlot, FilterError, PredicateFilter,
};
pub use lifecycle::{LifecycleConfig, PersistentLifecycleFilter};
pub use persistent::PersistentAcceptOnceFilter;
pub use record::{LifecycleRecord, ProcessingStatus};
pub use seen::{BoundedOrderedSet, Capacity, SeenSetCache};
pub use store::{
	FileMetadataStore, MetadataStore, MetadataStoreListener, SimpleMetadataStore, StoreError,
};
