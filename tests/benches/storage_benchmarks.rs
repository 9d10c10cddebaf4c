//! # Rumor Storage Benchmarks
//!
//! | Path | Operation |
//! |------|-----------|
//! | rm-01 key codec | index key construction |
//! | rm-01 driver | critical zone: buffer N writes, release as one batch |
//! | rm-01 sequence | leased `next()` at several bandwidths |
//! | runtime | one block through `Mantle::inject` with the tx indexer |

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rm_01_kv_storage::keys::{encode_u64, index_key};
use rm_01_kv_storage::{InMemoryKVStore, Sequence, StorageDriver};
use rm_04_mantlemint::test_utils::TestChain;
use rm_04_mantlemint::{ExecutorKind, KvStoreApp, ReplayPolicy};
use rumor_runtime::{Mantle, TxIndexer};

fn driver() -> Arc<StorageDriver> {
    Arc::new(StorageDriver::new(Arc::new(InMemoryKVStore::new())))
}

fn bench_index_key(c: &mut Criterion) {
    c.bench_function("rm-01-index-key", |b| {
        let mut id = 0u64;
        b.iter(|| {
            id += 1;
            black_box(index_key("tx", "height", &encode_u64(id / 8), &encode_u64(id)))
        })
    });
}

fn bench_critical_zone(c: &mut Criterion) {
    let mut group = c.benchmark_group("rm-01-critical-zone");

    for writes in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(writes));
        group.bench_with_input(BenchmarkId::new("release", writes), &writes, |b, &writes| {
            let driver = driver();
            b.iter(|| {
                driver.set_critical_zone().unwrap();
                for i in 0..writes {
                    driver.set(&encode_u64(i), b"value").unwrap();
                }
                driver.release_critical_zone().unwrap();
            })
        });
    }
    group.finish();
}

fn bench_sequence(c: &mut Criterion) {
    let mut group = c.benchmark_group("rm-01-sequence");

    for bandwidth in [1u64, 100, 10_000] {
        group.bench_with_input(
            BenchmarkId::new("next", bandwidth),
            &bandwidth,
            |b, &bandwidth| {
                let sequence = Sequence::new(driver(), b"seq:bench".to_vec(), bandwidth).unwrap();
                b.iter(|| black_box(sequence.next().unwrap()))
            },
        );
    }
    group.finish();
}

fn bench_inject(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("runtime-inject-block", |b| {
        b.iter_batched(
            || {
                let storage = driver();
                let app = KvStoreApp::new(storage.clone()).unwrap();
                let txs = TxIndexer::new(storage.clone()).unwrap();
                Mantle::new(
                    Box::new(app),
                    storage,
                    &TestChain::genesis(),
                    ExecutorKind::Standard,
                    ReplayPolicy::Trusted,
                )
                .unwrap()
                .with_indexer(Arc::new(txs))
            },
            |mantle| {
                let block = TestChain::block_with_txs(
                    1,
                    (0..50).map(|i| format!("k{i}=v{i}").into_bytes()).collect(),
                );
                runtime.block_on(mantle.inject(&block)).unwrap();
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_index_key,
    bench_critical_zone,
    bench_sequence,
    bench_inject
);
criterion_main!(benches);
