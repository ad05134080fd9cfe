//! Page cache microbenchmarks: hit/miss/insert-with-eviction overhead on
//! the intrusive-LRU `PageCache`.

use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use seraph_dsm::address::AetherAddr;
use seraph_dsm::page::PageCache;

fn page(n: u16) -> AetherAddr {
    AetherAddr::new(n, 0).unwrap()
}

fn bench_page_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_cache");

    group.bench_function("get_hit", |b| {
        let mut cache = PageCache::new(64, 4096);
        for n in 0..64 {
            cache.insert(page(n), vec![0u8; 4096]);
        }
        b.iter(|| black_box(cache.get(black_box(page(10)))));
    });

    group.bench_function("insert_with_eviction", |b| {
        let mut cache = PageCache::new(16, 4096);
        for n in 0..16 {
            cache.insert(page(n), vec![0u8; 4096]);
        }
        let mut next = 16u16;
        b.iter(|| {
            cache.insert(black_box(page(next)), vec![0u8; 4096]);
            next = next.wrapping_add(1);
        });
    });

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().warm_up_time(Duration::from_millis(200)).measurement_time(Duration::from_secs(2));
    targets = bench_page_cache
);
criterion_main!(benches);
