//! Benchmark: path resolution and content extraction on a synthesized image.
//!
//! The sparse file exercises the hole fast path; the dense file exercises
//! the direct, single-indirect and double-indirect read paths.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mfs_block::MemByteDevice;
use mfs_core::{Filesystem, OpenOptions};
use mfs_harness::{ImageBuilder, pattern};
use mfs_types::InodeNumber;

/// 7 direct + 256 single-indirect + 64 double-indirect zones of 1 KiB.
const DENSE_LEN: usize = (7 + 256 + 64) * 1024;

fn bench_image() -> Filesystem {
    let mut b = ImageBuilder::new(1024, 0);
    let data = b.mkdir(InodeNumber::ROOT, "data").expect("mkdir");
    b.add_file(data, "dense.bin", &pattern(DENSE_LEN, 9))
        .expect("dense");
    b.add_sparse_file(
        data,
        "sparse.bin",
        u32::try_from(DENSE_LEN).expect("fits"),
        &[(0, vec![1; 4096])],
    )
    .expect("sparse");
    let image = b.build().expect("build");
    Filesystem::from_device(Box::new(MemByteDevice::new(image)), &OpenOptions::default())
        .expect("open")
}

fn bench_extract(c: &mut Criterion) {
    let fs = bench_image();
    let mut group = c.benchmark_group("extract");

    group.bench_function("dense_327k", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(DENSE_LEN);
            black_box(fs.read_file(black_box("/data/dense.bin"), &mut out)).expect("read");
        });
    });

    group.bench_function("sparse_327k", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(DENSE_LEN);
            black_box(fs.read_file(black_box("/data/sparse.bin"), &mut out)).expect("read");
        });
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let fs = bench_image();
    c.bench_function("resolve_nested", |b| {
        b.iter(|| fs.resolve(black_box("//data///dense.bin/")).expect("resolve"));
    });
}

criterion_group!(core, bench_extract, bench_resolve);
criterion_main!(core);
