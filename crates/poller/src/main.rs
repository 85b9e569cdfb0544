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

//! Poller service entry point
//!
//! Polls `input_dir` on a fixed interval until Ctrl-C, then stops the
//! workers and flushes the metadata store.

use anyhow::{Context, Result};
use tokio::{signal, task, time};
use tracing::{error, info};

use gleaner_poller::{PollerService, config::PollerConfig, logging::init_logging};

#[tokio::main]
async fn main() -> Result<()> {
	// Initialize logging first
	init_logging()?;

	let config = match std::env::args().nth(1) {
		Some(path) => PollerConfig::from_file(&path)
			.with_context(|| format!("Failed to load configuration from {}", path))?,
		None => PollerConfig::from_env().unwrap_or_else(|e| {
			info!(target: "poller", error = %e, "Using default configuration");
			PollerConfig::default()
		}),
	};

	info!(target: "poller", "Starting Gleaner poller");
	info!(target: "poller", "Input directory: {}", config.input_dir.display());
	info!(target: "poller", "Poll interval: {}ms", config.poll_interval_ms);

	let service = PollerService::start(&config)?;
	let poller = service.poller();
	let mut ticker = time::interval(config.poll_interval());
	ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				let poller = poller.clone();
				match task::spawn_blocking(move || poller.poll_once()).await {
					Ok(Ok(_)) => {}
					Ok(Err(e)) => error!(target: "poller", error = %e, "Poll failed"),
					Err(e) => error!(target: "poller", error = %e, "Poll task panicked"),
				}
			}
			_ = signal::ctrl_c() => {
				info!(target: "poller", "Shutting down...");
				break;
			}
		}
	}

	let stats = service.stats();
	service.shutdown()?;
	info!(
		target: "poller",
		processed = stats.processed(),
		failed = stats.failed(),
		"Shutdown complete"
	);
	Ok(())
}
