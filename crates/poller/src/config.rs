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

use std::{path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use gleaner_filter::FilterConfig;
use serde::{Deserialize, Serialize};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "poller";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Poller configuration constants
/// Environment variable prefix, e.g. `GLEANER_POLLER_INPUT_DIR`
///
/// Nested filter settings use a double underscore:
/// `GLEANER_POLLER_FILTER__MAX_RETRIES`.
pub const ENV_PREFIX: &str = "GLEANER_POLLER";

/// Default directory watched for new files
pub const DEFAULT_INPUT_DIR: &str = "data/inbox";

/// Default location of the metadata store file
pub const DEFAULT_STORE_PATH: &str = "data/gleaner-store.json";

/// Default interval between two listings
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default number of worker threads
pub const DEFAULT_WORKERS: usize = 4;

/// Default dispatch queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Poller service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
	/// Directory listed on every poll
	pub input_dir: PathBuf,
	/// Processed files are copied here; when unset they are only logged
	pub output_dir: Option<PathBuf>,
	/// JSON file backing the metadata store
	pub store_path: PathBuf,
	pub poll_interval_ms: u64,
	pub workers: usize,
	pub queue_capacity: usize,
	/// Only files whose name ends with this suffix are considered
	pub file_suffix: Option<String>,
	/// Key files by name instead of full path
	pub key_by_file_name: bool,
	pub filter: FilterConfig,
}

impl Default for PollerConfig {
	fn default() -> Self {
		Self {
			input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
			output_dir: None,
			store_path: PathBuf::from(DEFAULT_STORE_PATH),
			poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
			workers: DEFAULT_WORKERS,
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
			file_suffix: None,
			key_by_file_name: false,
			filter: FilterConfig::default(),
		}
	}
}

impl PollerConfig {
	fn environment() -> config::Environment {
		config::Environment::with_prefix(ENV_PREFIX)
			.prefix_separator("_")
			.separator("__")
			.try_parsing(true)
	}

	/// Load configuration from `.env` and environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		let cfg = config::Config::builder()
			.add_source(Self::environment())
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file, with environment overrides
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(Self::environment())
			.build()?;

		cfg.try_deserialize()
	}

	pub fn validate(&self) -> Result<()> {
		if self.workers == 0 {
			bail!("workers must be at least 1");
		}
		if self.queue_capacity == 0 {
			bail!("queue_capacity must be at least 1");
		}
		if self.poll_interval_ms == 0 {
			bail!("poll_interval_ms must be positive");
		}
		if self.output_dir.as_ref() == Some(&self.input_dir) {
			bail!(
				"output_dir must differ from input_dir ({})",
				self.input_dir.display()
			);
		}
		Ok(())
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}
