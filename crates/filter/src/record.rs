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

//! Values written to the metadata store
//!
//! - Accept-once filters store the candidate stamp as a decimal string.
//! - Lifecycle filters store a `LifecycleRecord` as a compact JSON object,
//!   e.g. `{"status":"PROCESSING","stamp":1700000000000,"last_retry_at_millis":1700000000123,"retry_count":0}`.
//!
//! Every update is a compare-and-replace against the exact string that was
//! read, so encoding must be deterministic for a given record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::FilterError;

/// Processing state of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
	/// Claimed by a worker, not yet committed
	Processing,
	/// Committed; never admitted again
	Processed,
	/// Retry budget exhausted; never admitted again
	Rejected,
}

impl ProcessingStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, ProcessingStatus::Processed | ProcessingStatus::Rejected)
	}
}

impl fmt::Display for ProcessingStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ProcessingStatus::Processing => "PROCESSING",
			ProcessingStatus::Processed => "PROCESSED",
			ProcessingStatus::Rejected => "REJECTED",
		};
		f.write_str(s)
	}
}

/// Stored lifecycle of one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRecord {
	pub status: ProcessingStatus,
	/// Candidate stamp observed when the record was created
	pub stamp: i64,
	/// Wall-clock time of the latest claim (unix milliseconds)
	pub last_retry_at_millis: i64,
	/// Number of reclaims after the first claim
	pub retry_count: u32,
}

impl LifecycleRecord {
	/// Fresh claim for a candidate seen for the first time
	pub fn processing(stamp: i64, now_millis: i64) -> Self {
		Self {
			status: ProcessingStatus::Processing,
			stamp,
			last_retry_at_millis: now_millis,
			retry_count: 0,
		}
	}

	pub fn processed(stamp: i64, now_millis: i64) -> Self {
		Self {
			status: ProcessingStatus::Processed,
			..Self::processing(stamp, now_millis)
		}
	}

	/// Whether the claim is older than `ttl_millis` at `now_millis`
	pub fn claim_expired(&self, now_millis: i64, ttl_millis: i64) -> bool {
		now_millis.saturating_sub(self.last_retry_at_millis) >= ttl_millis
	}

	pub fn encode(&self) -> Result<String, FilterError> {
		serde_json::to_string(self).map_err(|e| FilterError::Store(e.into()))
	}

	pub fn decode(key: &str, value: &str) -> Result<Self, FilterError> {
		serde_json::from_str(value).map_err(|e| FilterError::CorruptRecord {
			key: key.to_string(),
			reason: e.to_string(),
		})
	}
}

pub fn encode_stamp(stamp: i64) -> String {
	stamp.to_string()
}

pub fn decode_stamp(key: &str, value: &str) -> Result<i64, FilterError> {
	value.trim().parse().map_err(|_| FilterError::CorruptRecord {
		key: key.to_string(),
		reason: format!("not a decimal stamp: {value:?}"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_record_encoding_is_stable() {
		let record = LifecycleRecord {
			status: ProcessingStatus::Rejected,
			stamp: -5,
			last_retry_at_millis: 1_700_000_000_123,
			retry_count: 3,
		};

		let encoded = record.encode().unwrap();
		assert_eq!(
			encoded,
			r#"{"status":"REJECTED","stamp":-5,"last_retry_at_millis":1700000000123,"retry_count":3}"#
		);
		assert_eq!(record.encode().unwrap(), encoded);
		assert_eq!(LifecycleRecord::decode("k", &encoded).unwrap(), record);
	}

	#[test]
	fn test_decode_rejects_garbage() {
		let err = LifecycleRecord::decode("in/a.csv", "12345").unwrap_err();
		assert!(matches!(err, FilterError::CorruptRecord { ref key, .. } if key == "in/a.csv"));
	}

	#[test]
	fn test_claim_expiry() {
		let record = LifecycleRecord::processing(1, 1_000);

		assert!(!record.claim_expired(1_099, 100));
		assert!(record.claim_expired(1_100, 100));
		// Clock moved backwards: treat as fresh
		assert!(!record.claim_expired(900, 100));
	}

	#[test]
	fn test_terminal_states() {
		assert!(!ProcessingStatus::Processing.is_terminal());
		assert!(ProcessingStatus::Processed.is_terminal());
		assert!(ProcessingStatus::Rejected.is_terminal());
		assert_eq!(ProcessingStatus::Processed.to_string(), "PROCESSED");
	}

	#[test]
	fn test_stamp_encoding() {
		assert_eq!(encode_stamp(1_700_000_000_000), "1700000000000");
		assert_eq!(decode_stamp("k", "42").unwrap(), 42);
		assert!(decode_stamp("k", "forty-two").is_err());
	}
}
