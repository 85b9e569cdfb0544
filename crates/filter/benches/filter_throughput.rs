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

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use gleaner_filter::{
	AcceptOnceFilter, CandidateFilter, ChainFilter, FnKeyAdapter, LifecycleConfig, MetadataStore,
	PersistentAcceptOnceFilter, PersistentLifecycleFilter, PredicateFilter, SimpleMetadataStore,
};

const BATCH_SIZES: &[usize] = &[100, 1_000, 10_000];

type Item = (String, i64);

fn listing(size: usize) -> Vec<Item> {
	(0..size).map(|i| (format!("file-{i:06}.csv"), i as i64)).collect()
}

fn adapter() -> FnKeyAdapter<Item> {
	FnKeyAdapter::new(|c: &Item| c.0.clone(), |c: &Item| c.1)
}

/// First poll admits everything, steady-state polls admit nothing
fn bench_accept_once(c: &mut Criterion) {
	let mut group = c.benchmark_group("accept_once");

	for &size in BATCH_SIZES {
		let batch = listing(size);

		group.bench_with_input(BenchmarkId::new("first_poll", size), &batch, |b, batch| {
			b.iter(|| {
				let filter = AcceptOnceFilter::<Item>::new();
				black_box(filter.filter_candidates(batch).unwrap())
			});
		});

		let warm = AcceptOnceFilter::<Item>::new();
		warm.filter_candidates(&batch).unwrap();
		group.bench_with_input(BenchmarkId::new("steady_state", size), &batch, |b, batch| {
			b.iter(|| black_box(warm.filter_candidates(batch).unwrap()));
		});
	}

	group.finish();
}

fn bench_persistent(c: &mut Criterion) {
	let mut group = c.benchmark_group("persistent_accept_once");

	for &size in BATCH_SIZES {
		let batch = listing(size);

		group.bench_with_input(BenchmarkId::new("first_poll", size), &batch, |b, batch| {
			b.iter(|| {
				let store: Arc<dyn MetadataStore> = Arc::new(SimpleMetadataStore::new());
				let filter = PersistentAcceptOnceFilter::new(store, "in:", adapter());
				black_box(filter.filter_candidates(batch).unwrap())
			});
		});

		let store: Arc<dyn MetadataStore> = Arc::new(SimpleMetadataStore::new());
		let warm = PersistentAcceptOnceFilter::new(store, "in:", adapter());
		warm.filter_candidates(&batch).unwrap();
		group.bench_with_input(BenchmarkId::new("steady_state", size), &batch, |b, batch| {
			b.iter(|| black_box(warm.filter_candidates(batch).unwrap()));
		});
	}

	group.finish();
}

fn bench_lifecycle_chain(c: &mut Criterion) {
	let mut group = c.benchmark_group("lifecycle_chain");

	for &size in BATCH_SIZES {
		let batch = listing(size);

		group.bench_with_input(BenchmarkId::new("claim_and_commit", size), &batch, |b, batch| {
			b.iter(|| {
				let store: Arc<dyn MetadataStore> = Arc::new(SimpleMetadataStore::new());
				let lifecycle = Arc::new(PersistentLifecycleFilter::new(
					store,
					"lc:",
					adapter(),
					LifecycleConfig::default(),
				));
				let chain = ChainFilter::from_filters([
					Arc::new(PredicateFilter::new("csv", |c: &Item| c.0.ends_with(".csv")))
						as Arc<dyn CandidateFilter<Item>>,
					lifecycle,
				]);

				let claimed = chain.filter_candidates(batch).unwrap();
				for candidate in &claimed {
					chain.commit(candidate).unwrap();
				}
				black_box(claimed)
			});
		});
	}

	group.finish();
}

criterion_group!(benches, bench_accept_once, bench_persistent, bench_lifecycle_chain);
criterion_main!(benches);
