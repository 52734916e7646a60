#![forbid(unsafe_code)]

//! End-to-end reads of synthesized MINIX images.

use mfs_block::{ByteDevice, MemByteDevice};
use mfs_core::{Filesystem, Listing, OpenOptions, SubpartitionAddressing};
use mfs_error::MfsError;
use mfs_harness::{
    ImageBuilder, SAMPLE_HELLO, pattern, sample_image, wrap_in_partition, wrap_in_subpartition,
};
use mfs_types::{ByteOffset, InodeNumber};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

fn open(image: Vec<u8>, options: &OpenOptions) -> mfs_error::Result<Filesystem> {
    Filesystem::from_device(Box::new(MemByteDevice::new(image)), options)
}

fn open_plain(image: Vec<u8>) -> Filesystem {
    open(image, &OpenOptions::default()).expect("open image")
}

/// Records every read issued against the wrapped device.
struct RecordingDevice {
    inner: MemByteDevice,
    reads: Rc<RefCell<Vec<(u64, usize)>>>,
}

impl ByteDevice for RecordingDevice {
    fn len_bytes(&self) -> u64 {
        self.inner.len_bytes()
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> mfs_error::Result<()> {
        self.reads.borrow_mut().push((offset.0, buf.len()));
        self.inner.read_exact_at(offset, buf)
    }
}

#[test]
fn hello_txt_spans_direct_and_single_indirect_zones() {
    let content = pattern(5000, 42);
    let mut b = ImageBuilder::new(512, 0);
    let ino = b
        .add_file(InodeNumber::ROOT, "hello.txt", &content)
        .expect("add file");
    assert_eq!(ino, InodeNumber(2));
    let fs = open_plain(b.build().expect("build"));

    let file = fs.resolve("/hello.txt").expect("resolve");
    assert_eq!(file.ino, InodeNumber(2));
    assert_eq!(file.inode.size, 5000);
    assert!(file.inode.zones.iter().all(|z| !z.is_hole()));
    assert!(!file.inode.indirect.is_hole());

    let mut out = Vec::new();
    assert_eq!(fs.extract(&file, &mut out).expect("extract"), 5000);
    assert_eq!(out, content);
}

#[test]
fn missing_boot_signature_stops_before_superblock() {
    let image = ImageBuilder::new(1024, 0).build().expect("build");
    let reads = Rc::new(RefCell::new(Vec::new()));
    let dev = RecordingDevice {
        inner: MemByteDevice::new(image),
        reads: Rc::clone(&reads),
    };

    let err = Filesystem::from_device(Box::new(dev), &OpenOptions::default().partition(0))
        .expect_err("no signature");
    assert!(matches!(err, MfsError::InvalidSignature { offset: 0 }));
    assert_eq!(*reads.borrow(), vec![(0, 512)]);
}

#[test]
fn unallocated_double_indirect_reads_as_zeroes() {
    let zone = 512_u64;
    let size = u32::try_from(zone * (7 + 128 + 5)).expect("fits");
    let mut b = ImageBuilder::new(512, 0);
    b.add_sparse_file(InodeNumber::ROOT, "tail-hole", size, &[(0, vec![0xEE; 16])])
        .expect("sparse");
    let fs = open_plain(b.build().expect("build"));

    let file = fs.resolve("/tail-hole").expect("resolve");
    assert!(file.inode.double_indirect.is_hole());
    assert!(file.inode.indirect.is_hole());

    let data = fs.read_to_vec("/tail-hole").expect("pure hole is not an error");
    assert_eq!(data.len(), usize::try_from(size).expect("fits"));
    assert_eq!(data[..16], [0xEE; 16]);
    assert!(data[16..].iter().all(|b| *b == 0));
}

#[test]
fn sample_image_lists_and_reads() {
    let fs = open_plain(sample_image().expect("sample"));

    let Listing::Directory { entries, .. } = fs.list("/").expect("list root") else {
        panic!("root lists as a directory");
    };
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec![".", "..", "hello.txt", "hello-link", "docs"]);
    assert_eq!(entries[2].inode_number, entries[3].inode_number);
    assert_eq!(entries[4].permission_string(), "drwxr-xr-x");

    assert_eq!(fs.read_to_vec("/hello-link").expect("link"), SAMPLE_HELLO);
    assert_eq!(
        fs.read_to_vec("/docs/big.bin").expect("big"),
        pattern(12 * 1024, 7)
    );
    assert_eq!(
        fs.read_to_vec("docs/after-hole.txt").expect("after hole"),
        b"still here\n"
    );
    assert!(matches!(
        fs.resolve("/old.txt"),
        Err(MfsError::NotFound { ref path }) if path == "/old.txt"
    ));
}

#[test]
fn sample_sparse_file_matches_model() {
    let fs = open_plain(sample_image().expect("sample"));
    let data = fs.read_to_vec("/docs/sparse.dat").expect("sparse");

    let zone = 1024;
    let double_start = (7 + 256) * zone;
    let mut expected = vec![0_u8; double_start + 3 * zone + 100];
    expected[..100].copy_from_slice(&pattern(100, 1));
    expected[9 * zone..9 * zone + 200].copy_from_slice(&pattern(200, 2));
    let tail = double_start + 2 * zone;
    expected[tail..].copy_from_slice(&pattern(1024 + 100, 3));
    assert_eq!(data.len(), expected.len());
    assert!(data == expected, "sparse content diverges from model");
}

#[test]
fn partitioned_image_opens_selected_entry_only() {
    let image = wrap_in_partition(&sample_image().expect("sample"), 2, 63).expect("wrap");

    let fs = open(image.clone(), &OpenOptions::default().partition(2)).expect("partition 2");
    assert_eq!(fs.base_offset(), ByteOffset(63 * 512));
    assert_eq!(fs.read_to_vec("/hello.txt").expect("read"), SAMPLE_HELLO);

    let err = open(image.clone(), &OpenOptions::default().partition(1)).expect_err("empty slot");
    assert!(matches!(
        err,
        MfsError::WrongPartitionType { index: 1, found: 0 }
    ));

    let err = open(image, &OpenOptions::default()).expect_err("unpartitioned read");
    assert!(matches!(err, MfsError::BadMagic { .. }));
}

#[test]
fn subpartition_addressing_modes() {
    let fs_image = sample_image().expect("sample");

    let absolute = wrap_in_subpartition(&fs_image, (1, 16), (3, 40), false).expect("wrap");
    let options = OpenOptions::default().partition(1).subpartition(3);
    let fs = open(absolute, &options).expect("absolute");
    assert_eq!(fs.base_offset(), ByteOffset(40 * 512));
    assert_eq!(fs.read_to_vec("/hello.txt").expect("read"), SAMPLE_HELLO);

    let relative = wrap_in_subpartition(&fs_image, (1, 16), (3, 40), true).expect("wrap");
    assert!(matches!(
        open(relative.clone(), &options),
        Err(MfsError::BadMagic { found: 0 })
    ));
    let fs = open(
        relative,
        &options.subpartition_addressing(SubpartitionAddressing::RelativeToPartition),
    )
    .expect("relative");
    assert_eq!(fs.base_offset(), ByteOffset(40 * 512));
}

#[test]
fn zones_larger_than_blocks() {
    let content = pattern(2048 * 9 + 5, 3);
    let mut b = ImageBuilder::new(1024, 1);
    let dir = b.mkdir(InodeNumber::ROOT, "d").expect("mkdir");
    b.add_file(dir, "f", &content).expect("file");
    let fs = open_plain(b.build().expect("build"));

    assert_eq!(fs.zone_size(), 2048);
    assert_eq!(fs.block_size(), 1024);
    assert_eq!(fs.read_to_vec("/d/f").expect("read"), content);
}

#[test]
fn inode_numbers_are_bounded_by_table() {
    let fs = open_plain(ImageBuilder::new(1024, 0).with_inode_count(16).build().expect("build"));
    assert!(fs.read_inode(InodeNumber(16)).is_ok());
    for ino in [0, 17] {
        assert!(matches!(
            fs.read_inode(InodeNumber(ino)),
            Err(MfsError::InvalidInodeNumber { max: 16, .. })
        ));
    }
}

#[test]
fn truncated_image_fails_with_io() {
    let mut image = sample_image().expect("sample");
    let fs = open_plain(image.clone());
    let big = fs.resolve("/docs/big.bin").expect("resolve");
    let last = big.inode.zones[6];
    image.truncate(usize::try_from(last.0).expect("fits") * 1024);

    let fs = open_plain(image);
    assert!(matches!(
        fs.read_to_vec("/docs/big.bin"),
        Err(MfsError::Io(_))
    ));
}

#[test]
fn listing_serializes_with_kind_tag() {
    let fs = open_plain(sample_image().expect("sample"));
    let json = serde_json::to_value(fs.list("/docs").expect("list")).expect("json");
    assert_eq!(json["kind"], "directory");
    assert_eq!(json["path"], "/docs");
    assert_eq!(json["entries"][2]["name"], "big.bin");
    assert_eq!(json["entries"][2]["size"], 12 * 1024);

    let json = serde_json::to_value(fs.list("/hello.txt").expect("list")).expect("json");
    assert_eq!(json["kind"], "file");
    assert_eq!(json["name"], "hello.txt");
}

fn sparse_layout() -> impl Strategy<Value = (u32, Vec<(u64, Vec<u8>)>)> {
    (1_u32..512 * 160).prop_flat_map(|size| {
        let write = (0..u64::from(size), prop::collection::vec(any::<u8>(), 1..700))
            .prop_map(move |(offset, mut bytes)| {
                let room = usize::try_from(u64::from(size) - offset).expect("fits");
                bytes.truncate(room);
                (offset, bytes)
            });
        (Just(size), prop::collection::vec(write, 0..6))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn extraction_matches_written_bytes((size, writes) in sparse_layout()) {
        let mut expected = vec![0_u8; usize::try_from(size).expect("fits")];
        for (offset, bytes) in &writes {
            let start = usize::try_from(*offset).expect("fits");
            expected[start..start + bytes.len()].copy_from_slice(bytes);
        }

        let mut b = ImageBuilder::new(512, 0);
        b.add_sparse_file(InodeNumber::ROOT, "f", size, &writes).expect("sparse");
        let fs = open_plain(b.build().expect("build"));

        let mut out = Vec::new();
        let n = fs.read_file("/f", &mut out).expect("extract");
        prop_assert_eq!(n, u64::from(size));
        prop_assert!(out == expected);
    }

    #[test]
    fn messy_paths_resolve_like_canonical(slashes in prop::collection::vec(1_usize..4, 3)) {
        let mut b = ImageBuilder::new(1024, 0);
        let a = b.mkdir(InodeNumber::ROOT, "a").expect("mkdir");
        let leaf = b.add_file(a, "b", b"x").expect("file");
        let fs = open_plain(b.build().expect("build"));

        let messy = format!(
            "{}a{}b{}",
            "/".repeat(slashes[0]),
            "/".repeat(slashes[1]),
            "/".repeat(slashes[2] - 1),
        );
        let resolved = fs.resolve(&messy).expect("resolve messy");
        prop_assert_eq!(resolved.ino, leaf);
        prop_assert_eq!(resolved.path, "/a/b");
        prop_assert_eq!(fs.resolve("/a/b").expect("resolve").ino, leaf);
    }
}
