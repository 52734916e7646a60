#![forbid(unsafe_code)]

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mfs_harness::load_sparse_fixture;
use mfs_ondisk::{DirEntryIter, MinixInode, MinixSuperblock, parse_indirect_table};
use std::path::Path;

fn fixture_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("workspace root")
        .join("conformance/fixtures")
        .join(name)
}

fn bench_superblock_parse(c: &mut Criterion) {
    let data = load_sparse_fixture(&fixture_path("minix_superblock.json"))
        .expect("load superblock fixture");

    c.bench_function("minix_superblock_parse", |b| {
        b.iter(|| {
            MinixSuperblock::parse_superblock_region(black_box(&data)).expect("superblock parse")
        });
    });
}

fn bench_inode_parse(c: &mut Criterion) {
    let data = load_sparse_fixture(&fixture_path("minix_inode_regular_file.json"))
        .expect("load inode fixture");

    c.bench_function("minix_inode_parse", |b| {
        b.iter(|| MinixInode::parse_from_bytes(black_box(&data)).expect("inode parse"));
    });
}

fn bench_dir_zone_scan(c: &mut Criterion) {
    let data =
        load_sparse_fixture(&fixture_path("minix_dir_zone.json")).expect("load dir zone fixture");

    c.bench_function("minix_dir_zone_scan", |b| {
        b.iter(|| black_box(DirEntryIter::new(black_box(&data)).count()));
    });
}

fn bench_indirect_table_parse(c: &mut Criterion) {
    let table: Vec<u8> = (0_u32..1024).flat_map(u32::to_le_bytes).collect();

    c.bench_function("minix_indirect_table_4k", |b| {
        b.iter(|| black_box(parse_indirect_table(black_box(&table))));
    });
}

criterion_group!(
    ondisk,
    bench_superblock_parse,
    bench_inode_parse,
    bench_dir_zone_scan,
    bench_indirect_table_parse,
);
criterion_main!(ondisk);
