#![forbid(unsafe_code)]

//! Test fixtures for the MINIX reader: sparse JSON fixtures for the record
//! decoders and a builder that synthesizes whole filesystem images.

use anyhow::{Context, Result, bail, ensure};
use mfs_ondisk::{
    DirEntryIter, MinixDirEntry, MinixInode, MinixSuperblock, PartitionEntry, check_boot_signature,
    encode_boot_sector, encode_dir_entry, encode_indirect_table, partition_entry,
};
use mfs_types::{
    InodeNumber, MINIX_INODE_SIZE, MINIX_MAGIC, MINIX_RESERVED_BLOCKS, MINIX_SUPERBLOCK_OFFSET,
    S_IFDIR, S_IFMT, S_IFREG, SECTOR_SIZE, ZONE_NUMBER_SIZE, ZoneNumber,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

// ── Sparse JSON fixtures ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SparseFixture {
    pub size: usize,
    pub writes: Vec<FixtureWrite>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureWrite {
    pub offset: usize,
    pub hex: String,
}

pub fn load_sparse_fixture(path: &Path) -> Result<Vec<u8>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    let fixture: SparseFixture = serde_json::from_str(&text)
        .with_context(|| format!("invalid fixture json {}", path.display()))?;

    let mut bytes = vec![0_u8; fixture.size];
    for write in fixture.writes {
        let payload = hex::decode(write.hex)
            .with_context(|| format!("invalid hex at offset {}", write.offset))?;

        let end = write
            .offset
            .checked_add(payload.len())
            .context("fixture offset overflow")?;
        if end > bytes.len() {
            bail!(
                "fixture write out of bounds: offset={} payload={} size={}",
                write.offset,
                payload.len(),
                bytes.len()
            );
        }

        bytes[write.offset..end].copy_from_slice(&payload);
    }

    Ok(bytes)
}

pub fn validate_superblock_fixture(path: &Path) -> Result<MinixSuperblock> {
    let data = load_sparse_fixture(path)?;
    let sb = MinixSuperblock::parse_superblock_region(&data)
        .with_context(|| format!("failed superblock parse for fixture {}", path.display()))?;
    sb.validate_geometry()
        .with_context(|| format!("bad geometry in fixture {}", path.display()))?;
    Ok(sb)
}

pub fn validate_inode_fixture(path: &Path) -> Result<MinixInode> {
    let data = load_sparse_fixture(path)?;
    MinixInode::parse_from_bytes(&data)
        .with_context(|| format!("failed inode parse for fixture {}", path.display()))
}

/// Live entries of a directory zone fixture.
pub fn validate_dir_zone_fixture(path: &Path) -> Result<Vec<MinixDirEntry>> {
    let data = load_sparse_fixture(path)?;
    Ok(DirEntryIter::new(&data).map(|e| e.to_owned()).collect())
}

pub fn validate_boot_sector_fixture(path: &Path, index: u8) -> Result<PartitionEntry> {
    let data = load_sparse_fixture(path)?;
    check_boot_signature(&data)
        .with_context(|| format!("missing boot signature in fixture {}", path.display()))?;
    partition_entry(&data, index)
        .with_context(|| format!("failed partition entry parse for fixture {}", path.display()))
}

// ── Image builder ───────────────────────────────────────────────────────────

/// Timestamp stamped on every synthesized inode.
pub const FIXED_TIME: i32 = 1_700_000_000;

const DEFAULT_INODE_COUNT: u32 = 64;

#[derive(Debug, Clone)]
struct Node {
    mode: u16,
    links: u16,
    data: Vec<u8>,
    /// Logical blocks left unallocated.
    holes: BTreeSet<usize>,
}

/// Builds MINIX v3 filesystem images in memory.
///
/// Inode 1 is the root directory. Later inodes are numbered from 2 in the
/// order they are created. Zones are allocated sequentially after the
/// inode table when [`build`](Self::build) runs: each inode's data zones
/// first, then its indirect tables.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    block_size: u16,
    log_zone_size: u16,
    zone_size: usize,
    inode_count: u32,
    nodes: Vec<Node>,
}

impl ImageBuilder {
    /// # Panics
    ///
    /// If `block_size << log_zone_size` does not fit in `usize`.
    #[must_use]
    pub fn new(block_size: u16, log_zone_size: u16) -> Self {
        let zone_size = usize::from(block_size)
            .checked_shl(u32::from(log_zone_size))
            .expect("zone size fits usize");
        let root = Node {
            mode: S_IFDIR | 0o755,
            links: 2,
            data: Vec::new(),
            holes: BTreeSet::new(),
        };
        let mut builder = Self {
            block_size,
            log_zone_size,
            zone_size,
            inode_count: DEFAULT_INODE_COUNT,
            nodes: vec![root],
        };
        let root = InodeNumber::ROOT;
        for name in [".", ".."] {
            builder
                .push_entry(root, root.0, name)
                .expect("root entries encode");
        }
        builder
    }

    /// Size of the inode table, which bounds how many nodes can be added.
    #[must_use]
    pub fn with_inode_count(mut self, count: u32) -> Self {
        self.inode_count = count;
        self
    }

    #[must_use]
    pub fn zone_size(&self) -> usize {
        self.zone_size
    }

    /// Entries per indirect table.
    #[must_use]
    pub fn entries_per_table(&self) -> usize {
        self.zone_size / ZONE_NUMBER_SIZE
    }

    pub fn mkdir(&mut self, parent: InodeNumber, name: &str) -> Result<InodeNumber> {
        self.ensure_dir(parent)?;
        let ino = self.alloc(S_IFDIR | 0o755, 2, Vec::new(), BTreeSet::new())?;
        self.push_entry(ino, ino.0, ".")?;
        self.push_entry(ino, parent.0, "..")?;
        self.push_entry(parent, ino.0, name)?;
        self.node_mut(parent)?.links += 1;
        Ok(ino)
    }

    /// A regular file with every block allocated.
    pub fn add_file(
        &mut self,
        parent: InodeNumber,
        name: &str,
        content: &[u8],
    ) -> Result<InodeNumber> {
        self.ensure_dir(parent)?;
        let ino = self.alloc(S_IFREG | 0o644, 1, content.to_vec(), BTreeSet::new())?;
        self.push_entry(parent, ino.0, name)?;
        Ok(ino)
    }

    /// A regular file of `size` bytes whose only allocated blocks are those
    /// touched by `writes` (byte offset, payload). Every other block is a
    /// hole.
    pub fn add_sparse_file(
        &mut self,
        parent: InodeNumber,
        name: &str,
        size: u32,
        writes: &[(u64, Vec<u8>)],
    ) -> Result<InodeNumber> {
        self.ensure_dir(parent)?;
        let mut data = vec![0_u8; usize::try_from(size)?];
        let mut touched = BTreeSet::new();
        for (offset, payload) in writes {
            let start = usize::try_from(*offset)?;
            let end = start
                .checked_add(payload.len())
                .context("sparse write offset overflow")?;
            ensure!(
                end <= data.len(),
                "sparse write {start}..{end} past file size {size}"
            );
            if payload.is_empty() {
                continue;
            }
            data[start..end].copy_from_slice(payload);
            touched.extend(start / self.zone_size..=(end - 1) / self.zone_size);
        }
        let blocks = data.len().div_ceil(self.zone_size);
        let holes = (0..blocks).filter(|b| !touched.contains(b)).collect();
        let ino = self.alloc(S_IFREG | 0o644, 1, data, holes)?;
        self.push_entry(parent, ino.0, name)?;
        Ok(ino)
    }

    /// Add a second name for an existing inode.
    pub fn link(&mut self, parent: InodeNumber, name: &str, target: InodeNumber) -> Result<()> {
        self.ensure_dir(parent)?;
        self.node_mut(target)?.links += 1;
        self.push_entry(parent, target.0, name)
    }

    /// A slot that still carries `name` but whose inode field is 0.
    pub fn add_deleted_entry(&mut self, parent: InodeNumber, name: &str) -> Result<()> {
        self.ensure_dir(parent)?;
        self.push_entry(parent, 0, name)
    }

    /// Pad `dir` to a zone boundary and leave the next zone unallocated.
    pub fn push_dir_hole(&mut self, dir: InodeNumber) -> Result<()> {
        self.ensure_dir(dir)?;
        let zone_size = self.zone_size;
        let node = self.node_mut(dir)?;
        let padded = node.data.len().next_multiple_of(zone_size);
        node.data.resize(padded, 0);
        node.holes.insert(padded / zone_size);
        node.data.resize(padded + zone_size, 0);
        Ok(())
    }

    /// Overwrite the full mode word of `ino`.
    pub fn set_mode(&mut self, ino: InodeNumber, mode: u16) -> Result<()> {
        self.node_mut(ino)?.mode = mode;
        Ok(())
    }

    /// Lay out the image.
    ///
    /// Block 0 is the boot block and block 1 the superblock. One block each
    /// for the inode and zone bitmaps follows, then the inode table, then
    /// data zones.
    pub fn build(&self) -> Result<Vec<u8>> {
        let node_count = u32::try_from(self.nodes.len())?;
        ensure!(
            node_count <= self.inode_count,
            "{node_count} inodes do not fit a table of {}",
            self.inode_count
        );

        let block_size = usize::from(self.block_size);
        let table_block = usize::try_from(MINIX_RESERVED_BLOCKS)? + 2;
        let table_bytes = usize::try_from(self.inode_count)? * MINIX_INODE_SIZE;
        let meta_end = table_block * block_size + table_bytes;
        let first_data_zone = meta_end.div_ceil(self.zone_size);

        let mut image = vec![0_u8; first_data_zone * self.zone_size];
        for (index, node) in self.nodes.iter().enumerate() {
            let inode = self.place(&mut image, node)?;
            let at = table_block * block_size + index * MINIX_INODE_SIZE;
            image[at..at + MINIX_INODE_SIZE].copy_from_slice(&inode.to_bytes());
        }

        let sb_at = usize::try_from(MINIX_SUPERBLOCK_OFFSET)?;
        if image.len() < sb_at + block_size {
            image.resize(sb_at + block_size, 0);
        }
        let sb = MinixSuperblock {
            inodes_count: self.inode_count,
            inode_bitmap_blocks: 1,
            zone_bitmap_blocks: 1,
            first_data_zone: u16::try_from(first_data_zone)?,
            log_zone_size: i16::try_from(self.log_zone_size)?,
            max_file: 0x7FFF_FFFF,
            zones_count: u32::try_from(image.len() / self.zone_size)?,
            magic: MINIX_MAGIC,
            block_size: self.block_size,
            subversion: 0,
        };
        image[sb_at..sb_at + sb.to_bytes().len()].copy_from_slice(&sb.to_bytes());
        Ok(image)
    }

    /// Allocate `node`'s zones at the end of `image` and return its inode.
    fn place(&self, image: &mut Vec<u8>, node: &Node) -> Result<MinixInode> {
        let per_table = self.entries_per_table();
        let mut map = Vec::new();
        for (block, chunk) in node.data.chunks(self.zone_size).enumerate() {
            if node.holes.contains(&block) {
                map.push(ZoneNumber::HOLE);
            } else {
                map.push(self.append_zone(image, chunk)?);
            }
        }

        let mut inode = MinixInode {
            mode: node.mode,
            links_count: node.links,
            size: u32::try_from(node.data.len())?,
            atime: FIXED_TIME,
            mtime: FIXED_TIME,
            ctime: FIXED_TIME,
            ..MinixInode::default()
        };

        let direct = map.len().min(inode.zones.len());
        inode.zones[..direct].copy_from_slice(&map[..direct]);
        let rest = &map[direct..];

        let single = &rest[..rest.len().min(per_table)];
        inode.indirect = self.append_table(image, single)?;

        let double = &rest[single.len()..];
        ensure!(
            double.len() <= per_table * per_table,
            "file of {} bytes exceeds the double-indirect range",
            node.data.len()
        );
        let mut second_level = Vec::new();
        for chunk in double.chunks(per_table) {
            second_level.push(self.append_table(image, chunk)?);
        }
        inode.double_indirect = self.append_table(image, &second_level)?;
        Ok(inode)
    }

    fn append_zone(&self, image: &mut Vec<u8>, bytes: &[u8]) -> Result<ZoneNumber> {
        let zone = ZoneNumber(u32::try_from(image.len() / self.zone_size)?);
        image.extend_from_slice(bytes);
        image.resize(image.len().next_multiple_of(self.zone_size), 0);
        Ok(zone)
    }

    /// Allocate an indirect table unless every entry is a hole.
    fn append_table(&self, image: &mut Vec<u8>, zones: &[ZoneNumber]) -> Result<ZoneNumber> {
        if zones.iter().all(|z| z.is_hole()) {
            return Ok(ZoneNumber::HOLE);
        }
        let table = encode_indirect_table(zones, self.zone_size)?;
        self.append_zone(image, &table)
    }

    fn alloc(
        &mut self,
        mode: u16,
        links: u16,
        data: Vec<u8>,
        holes: BTreeSet<usize>,
    ) -> Result<InodeNumber> {
        self.nodes.push(Node {
            mode,
            links,
            data,
            holes,
        });
        Ok(InodeNumber(u32::try_from(self.nodes.len())?))
    }

    fn node_mut(&mut self, ino: InodeNumber) -> Result<&mut Node> {
        let index = ino
            .table_index()
            .with_context(|| format!("inode {ino} has no table slot"))?;
        self.nodes
            .get_mut(usize::try_from(index)?)
            .with_context(|| format!("inode {ino} was never created"))
    }

    fn ensure_dir(&mut self, ino: InodeNumber) -> Result<()> {
        let mode = self.node_mut(ino)?.mode;
        ensure!(mode & S_IFMT == S_IFDIR, "inode {ino} is not a directory");
        Ok(())
    }

    fn push_entry(&mut self, dir: InodeNumber, target: u32, name: &str) -> Result<()> {
        let slot = encode_dir_entry(target, name.as_bytes())
            .with_context(|| format!("cannot encode entry {name:?}"))?;
        self.node_mut(dir)?.data.extend_from_slice(&slot);
        Ok(())
    }
}

// ── Partition wrapping ──────────────────────────────────────────────────────

fn sectors_for(len: usize) -> Result<u32> {
    Ok(u32::try_from(u64::try_from(len)?.div_ceil(SECTOR_SIZE))?)
}

fn sector_start(sector: u32) -> Result<usize> {
    Ok(usize::try_from(u64::from(sector) * SECTOR_SIZE)?)
}

/// Place `fs` at `first_sector` behind a boot sector whose entry `index`
/// is a MINIX partition. The other entries are empty.
pub fn wrap_in_partition(fs: &[u8], index: u8, first_sector: u32) -> Result<Vec<u8>> {
    ensure!(index < 4, "partition index {index} out of range");
    ensure!(first_sector > 0, "partition would overlap the boot sector");
    let start = sector_start(first_sector)?;

    let mut entries = [PartitionEntry::default(); 4];
    entries[usize::from(index)] = PartitionEntry::minix(first_sector, sectors_for(fs.len())?);

    let mut out = vec![0_u8; start + fs.len()];
    let boot = encode_boot_sector(&entries);
    out[..boot.len()].copy_from_slice(&boot);
    out[start..].copy_from_slice(fs);
    Ok(out)
}

/// Place `fs` inside a subpartition of a partition.
///
/// `part` and `sub` are (table index, absolute first sector). The
/// subpartition table sits in the partition's first sector. With
/// `relative` set the subpartition entry stores its first sector relative
/// to the partition start; otherwise it stores the absolute sector.
pub fn wrap_in_subpartition(
    fs: &[u8],
    part: (u8, u32),
    sub: (u8, u32),
    relative: bool,
) -> Result<Vec<u8>> {
    let (part_index, part_first) = part;
    let (sub_index, sub_first) = sub;
    ensure!(
        part_index < 4 && sub_index < 4,
        "partition indices must be 0-3"
    );
    ensure!(part_first > 0, "partition would overlap the boot sector");
    ensure!(
        sub_first > part_first,
        "subpartition would overlap the partition table"
    );

    let part_start = sector_start(part_first)?;
    let sub_start = sector_start(sub_first)?;
    let total = sub_start + fs.len();

    let mut outer = [PartitionEntry::default(); 4];
    outer[usize::from(part_index)] =
        PartitionEntry::minix(part_first, sectors_for(total - part_start)?);
    let stored = if relative {
        sub_first - part_first
    } else {
        sub_first
    };
    let mut inner = [PartitionEntry::default(); 4];
    inner[usize::from(sub_index)] = PartitionEntry::minix(stored, sectors_for(fs.len())?);

    let mut out = vec![0_u8; total];
    let outer = encode_boot_sector(&outer);
    out[..outer.len()].copy_from_slice(&outer);
    let inner = encode_boot_sector(&inner);
    out[part_start..part_start + inner.len()].copy_from_slice(&inner);
    out[sub_start..].copy_from_slice(fs);
    Ok(out)
}

// ── Sample image ────────────────────────────────────────────────────────────

/// Deterministic non-zero filler bytes.
#[must_use]
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| {
            #[allow(clippy::cast_possible_truncation)]
            let byte = (i.wrapping_mul(31).wrapping_add(usize::from(seed)) % 251) as u8;
            byte + 1
        })
        .collect()
}

pub const SAMPLE_HELLO: &[u8] = b"Hello, MINIX!\n";

/// A small 1 KiB-zone image:
///
/// ```text
/// /hello.txt        SAMPLE_HELLO
/// /hello-link       hard link to hello.txt
/// /old.txt          deleted slot
/// /docs/            directory with a hole zone before its last entry
/// /docs/big.bin     12 KiB, reaches into the single-indirect range
/// /docs/sparse.dat  holes in the direct, single and double ranges
/// ```
pub fn sample_image() -> Result<Vec<u8>> {
    let mut b = ImageBuilder::new(1024, 0);
    let root = InodeNumber::ROOT;
    let hello = b.add_file(root, "hello.txt", SAMPLE_HELLO)?;
    b.link(root, "hello-link", hello)?;
    b.add_deleted_entry(root, "old.txt")?;

    let docs = b.mkdir(root, "docs")?;
    b.add_file(docs, "big.bin", &pattern(12 * 1024, 7))?;
    let zone = 1024_u64;
    let double_start = (7 + 256) * zone;
    b.add_sparse_file(
        docs,
        "sparse.dat",
        u32::try_from(double_start + 3 * zone + 100)?,
        &[
            (0, pattern(100, 1)),
            (9 * zone, pattern(200, 2)),
            (double_start + 2 * zone, pattern(1024 + 100, 3)),
        ],
    )?;
    b.push_dir_hole(docs)?;
    b.add_file(docs, "after-hole.txt", b"still here\n")?;
    b.build()
}
