//! Buffer pool and graph benchmarks.
//!
//! Measures:
//! - Fix/unfix on resident pages (cache hits)
//! - Eviction under memory pressure
//! - Page writes with flush
//! - BFS over a populated graph

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pagegraph::storage::{BufferPool, DiskManager, PageId, PAGE_SIZE};
use pagegraph::{Database, DatabaseConfig};
use tempfile::TempDir;

fn create_pool(capacity: usize, pages: u32) -> (BufferPool, TempDir) {
    let temp_dir = TempDir::new().expect("create temp dir");
    let db_path = temp_dir.path().join("bench.db");
    let disk_manager = DiskManager::create(&db_path).expect("create disk manager");
    disk_manager
        .extend_to(PageId::new(pages))
        .expect("extend file");
    let pool = BufferPool::new(capacity, disk_manager).expect("create pool");
    (pool, temp_dir)
}

/// Benchmark sequential page access (cache hits)
fn bench_sequential_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_pool_sequential");
    let (pool, _temp) = create_pool(128, 100);

    group.throughput(Throughput::Elements(100));
    group.bench_function("100_pages_resident", |b| {
        b.iter(|| {
            for i in 1..=100 {
                let handle = pool.fix(PageId::new(i)).expect("fix page");
                black_box(handle.data()[0]);
            }
        });
    });

    group.finish();
}

/// Benchmark eviction under memory pressure
fn bench_eviction_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_pool_eviction");

    for pool_size in &[10, 32, 64] {
        let (pool, _temp) = create_pool(*pool_size, 100);

        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::from_parameter(pool_size), pool_size, |b, _| {
            b.iter(|| {
                // More pages than frames: every pass evicts.
                for i in 1..=100 {
                    let handle = pool.fix(PageId::new(i)).expect("fix page");
                    black_box(handle.data()[0]);
                }
            });
        });
    }

    group.finish();
}

/// Benchmark page write operations
fn bench_page_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_pool_write");
    let (pool, _temp) = create_pool(64, 50);

    group.throughput(Throughput::Bytes(PAGE_SIZE as u64 * 50));
    group.bench_function("50_pages_write_flush", |b| {
        b.iter(|| {
            for i in 1..=50 {
                let page_id = PageId::new(i);
                {
                    let mut handle = pool.fix(page_id).expect("fix page");
                    handle.data_mut().fill(0x42);
                }
                pool.flush(page_id).expect("flush page");
            }
        });
    });

    group.finish();
}

/// Benchmark nth-degree traversal on a ring of users with chords
fn bench_nth_degree(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_nth_degree");

    let temp_dir = TempDir::new().expect("create temp dir");
    let config = DatabaseConfig {
        truncate: true,
        ..DatabaseConfig::default()
    };
    let mut db = Database::open(&temp_dir.path().join("graph.db"), config).expect("open db");
    let graph = db.graph_mut();
    let users = 100u32;
    for i in 0..users {
        graph
            .create_node([("type", "user".to_string()), ("name", format!("user{i}"))])
            .expect("create node");
    }
    for i in 1..=users {
        let next = i % users + 1;
        let chord = (i + 7 - 1) % users + 1;
        for target in [next, chord] {
            graph
                .create_edge(i, target, [("relationship", "friends")], false)
                .expect("create edge");
        }
    }

    for degree in &[1usize, 2, 3] {
        group.bench_with_input(BenchmarkId::from_parameter(degree), degree, |b, &degree| {
            b.iter(|| {
                black_box(
                    db.graph()
                        .find_nth_degree_connections(1, degree)
                        .expect("bfs"),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_access,
    bench_eviction_pressure,
    bench_page_write,
    bench_nth_degree,
);
criterion_main!(benches);
