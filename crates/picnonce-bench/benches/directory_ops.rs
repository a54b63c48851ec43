//! Criterion micro-benchmarks for slot-directory lookups.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use picnonce_bench::{cache_names, registered_directory};
use picnonce_shm::SharedRegion;
use picnonce_store::{DirectoryReader, NonceDirectory};

fn bench_lookup(c: &mut Criterion) {
    let (block, _directory) = registered_directory(100);
    let store = block.store();
    let names = cache_names(100);
    let mut reader = DirectoryReader::default();
    reader.refresh(store).expect("directory parses");

    c.bench_function("directory_lookup_cached", |b| {
        b.iter(|| black_box(reader.lookup(store, black_box(&names[73]))))
    });

    c.bench_function("directory_refresh_full", |b| {
        b.iter(|| {
            let mut fresh = DirectoryReader::default();
            black_box(fresh.refresh(store))
        })
    });
}

fn bench_system_region(c: &mut Criterion) {
    let server = SharedRegion::create().expect("region");
    let app = server.read_only();
    let mut directory = NonceDirectory::new();
    let block = server.system_nonce_block().expect("mutable handle");
    let slot = directory.register(block, "package_info").expect("register");

    let nonces = app.system_nonces();
    let stamp = nonces.stamp(slot);
    c.bench_function("shm_stamp_is_current", |b| {
        b.iter(|| black_box(nonces.is_current(black_box(&stamp))))
    });
}

criterion_group!(benches, bench_lookup, bench_system_region);
criterion_main!(benches);
