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

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
	candidate::CandidateKeyAdapter,
	lifecycle::{LifecycleConfig, PersistentLifecycleFilter},
	persistent::PersistentAcceptOnceFilter,
	store::MetadataStore,
};

/// Environment variable prefix, e.g. `GLEANER_FILTER_MAX_RETRIES`
pub const ENV_PREFIX: &str = "GLEANER_FILTER";

/// Default namespace for metadata store keys
pub const DEFAULT_KEY_PREFIX: &str = "gleaner:";

/// Default lifecycle claim TTL in milliseconds
pub const DEFAULT_PROCESSING_TTL_MS: u64 = 30_000;

/// Filter configuration
///
/// Numeric limits use 0 for "unlimited" so every field has a plain
/// environment representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
	/// Prepended to every candidate key in the metadata store
	pub key_prefix: String,
	/// Lifecycle reclaims before rejection, 0 = unlimited
	pub max_retries: u32,
	/// Lifecycle claim TTL
	pub processing_ttl_ms: u64,
	/// Lifecycle admissions per batch, 0 = unlimited
	pub max_accepted_per_run: usize,
	/// Flush the store after every successful update
	pub flush_on_update: bool,
	/// Re-check candidate existence after a persistent admission
	pub check_existence: bool,
}

impl Default for FilterConfig {
	fn default() -> Self {
		Self {
			key_prefix: DEFAULT_KEY_PREFIX.to_string(),
			max_retries: 0,
			processing_ttl_ms: DEFAULT_PROCESSING_TTL_MS,
			max_accepted_per_run: 0,
			flush_on_update: false,
			check_existence: false,
		}
	}
}

impl FilterConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file, with environment overrides
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
			.build()?;

		cfg.try_deserialize()
	}

	pub fn lifecycle(&self) -> LifecycleConfig {
		LifecycleConfig {
			max_retries: self.max_retries,
			processing_ttl: Duration::from_millis(self.processing_ttl_ms),
			max_accepted_per_run: NonZeroUsize::new(self.max_accepted_per_run),
		}
	}

	/// Build a lifecycle filter over `store` with these settings
	pub fn lifecycle_filter<C, A>(
		&self,
		store: Arc<dyn MetadataStore>,
		adapter: A,
	) -> PersistentLifecycleFilter<C>
	where
		A: CandidateKeyAdapter<C> + 'static,
	{
		PersistentLifecycleFilter::new(store, self.key_prefix.clone(), adapter, self.lifecycle())
			.flush_on_update(self.flush_on_update)
	}

	/// Build a persistent accept-once filter over `store` with these settings
	pub fn accept_once_filter<C, A>(
		&self,
		store: Arc<dyn MetadataStore>,
		adapter: A,
	) -> PersistentAcceptOnceFilter<C>
	where
		A: CandidateKeyAdapter<C> + 'static,
	{
		PersistentAcceptOnceFilter::new(store, self.key_prefix.clone(), adapter)
			.flush_on_update(self.flush_on_update)
			.check_existence(self.check_existence)
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use super::*;
	use crate::{
		candidate::FnKeyAdapter,
		filter::CandidateFilter,
		store::SimpleMetadataStore,
	};

	#[test]
	fn test_defaults() {
		let config = FilterConfig::default();
		assert_eq!(config.key_prefix, "gleaner:");

		let lifecycle = config.lifecycle();
		assert_eq!(lifecycle, LifecycleConfig::default());
	}

	#[test]
	fn test_lifecycle_conversion() {
		let config = FilterConfig {
			max_retries: 3,
			processing_ttl_ms: 250,
			max_accepted_per_run: 10,
			..FilterConfig::default()
		};

		let lifecycle = config.lifecycle();
		assert_eq!(lifecycle.max_retries, 3);
		assert_eq!(lifecycle.processing_ttl, Duration::from_millis(250));
		assert_eq!(lifecycle.max_accepted_per_run, NonZeroUsize::new(10));
	}

	#[test]
	fn test_from_file_fills_missing_fields() {
		let path = std::env::temp_dir().join(format!("gleaner-filter-{}.toml", uuid::Uuid::new_v4()));
		fs::write(&path, "key_prefix = \"inbox:\"\nmax_retries = 5\n").unwrap();

		let config = FilterConfig::from_file(path.to_str().unwrap()).unwrap();
		fs::remove_file(&path).unwrap();

		assert_eq!(config.key_prefix, "inbox:");
		assert_eq!(config.max_retries, 5);
		assert_eq!(config.processing_ttl_ms, DEFAULT_PROCESSING_TTL_MS);
		assert!(!config.flush_on_update);
	}

	#[test]
	fn test_built_filters_use_key_prefix() {
		let store = Arc::new(SimpleMetadataStore::new());
		let config = FilterConfig {
			key_prefix: "cfg:".to_string(),
			..FilterConfig::default()
		};
		let adapter = || FnKeyAdapter::new(|n: &u32| n.to_string(), |n: &u32| i64::from(*n));

		let once = config.accept_once_filter(store.clone(), adapter());
		assert!(once.accept(&1).unwrap());
		assert_eq!(store.get("cfg:1").unwrap(), Some("1".to_string()));

		let lifecycle = config.lifecycle_filter(store.clone(), adapter());
		assert!(lifecycle.accept(&2).unwrap());
		assert!(store.get("cfg:2").unwrap().is_some());
	}
}
