//! MINIX v3 superblock, inode, directory entry, and indirect zone table.
//!
//! All multi-byte fields are little-endian. Decoders only see byte slices;
//! locating the records on the device is the caller's job.

use mfs_types::{
    BlockSize, MAX_LOG_ZONE_SIZE, MINIX_DIR_ENTRY_SIZE, MINIX_DIRECT_ZONES, MINIX_INODE_SIZE,
    MINIX_MAGIC, MINIX_NAME_LEN, MINIX_RESERVED_BLOCKS, MINIX_SUPERBLOCK_SIZE, ParseError,
    S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG, S_IFSOCK, ZONE_NUMBER_SIZE,
    ZoneNumber, ensure_slice, nul_terminated, read_le_i16, read_le_i32, read_le_u16, read_le_u32,
    read_u8,
};
use serde::{Deserialize, Serialize};

// ── Superblock ──────────────────────────────────────────────────────────────

const SB_NINODES: usize = 0;
const SB_PAD1: usize = 4;
const SB_I_BLOCKS: usize = 6;
const SB_Z_BLOCKS: usize = 8;
const SB_FIRSTDATA: usize = 10;
const SB_LOG_ZONE_SIZE: usize = 12;
const SB_PAD2: usize = 14;
const SB_MAX_FILE: usize = 16;
const SB_ZONES: usize = 20;
const SB_MAGIC: usize = 24;
const SB_PAD3: usize = 26;
const SB_BLOCKSIZE: usize = 28;
const SB_SUBVERSION: usize = 30;

/// Decoded MINIX v3 superblock (the first 32 bytes of block 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinixSuperblock {
    pub inodes_count: u32,
    pub inode_bitmap_blocks: i16,
    pub zone_bitmap_blocks: i16,
    pub first_data_zone: u16,
    pub log_zone_size: i16,
    pub max_file: u32,
    pub zones_count: u32,
    pub magic: u16,
    pub block_size: u16,
    pub subversion: u8,
}

impl MinixSuperblock {
    /// Parse the superblock from the bytes starting at offset 1024 of the
    /// filesystem. Only the magic is checked here; geometry is checked by
    /// [`validate_geometry`](Self::validate_geometry).
    pub fn parse_superblock_region(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < MINIX_SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: MINIX_SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic = read_le_u16(region, SB_MAGIC)?;
        if magic != MINIX_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: u64::from(MINIX_MAGIC),
                actual: u64::from(magic),
            });
        }

        Ok(Self {
            inodes_count: read_le_u32(region, SB_NINODES)?,
            inode_bitmap_blocks: read_le_i16(region, SB_I_BLOCKS)?,
            zone_bitmap_blocks: read_le_i16(region, SB_Z_BLOCKS)?,
            first_data_zone: read_le_u16(region, SB_FIRSTDATA)?,
            log_zone_size: read_le_i16(region, SB_LOG_ZONE_SIZE)?,
            max_file: read_le_u32(region, SB_MAX_FILE)?,
            zones_count: read_le_u32(region, SB_ZONES)?,
            magic,
            block_size: read_le_u16(region, SB_BLOCKSIZE)?,
            subversion: read_u8(region, SB_SUBVERSION)?,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; MINIX_SUPERBLOCK_SIZE] {
        let mut out = [0_u8; MINIX_SUPERBLOCK_SIZE];
        out[SB_NINODES..SB_PAD1].copy_from_slice(&self.inodes_count.to_le_bytes());
        out[SB_I_BLOCKS..SB_Z_BLOCKS].copy_from_slice(&self.inode_bitmap_blocks.to_le_bytes());
        out[SB_Z_BLOCKS..SB_FIRSTDATA].copy_from_slice(&self.zone_bitmap_blocks.to_le_bytes());
        out[SB_FIRSTDATA..SB_LOG_ZONE_SIZE].copy_from_slice(&self.first_data_zone.to_le_bytes());
        out[SB_LOG_ZONE_SIZE..SB_PAD2].copy_from_slice(&self.log_zone_size.to_le_bytes());
        out[SB_MAX_FILE..SB_ZONES].copy_from_slice(&self.max_file.to_le_bytes());
        out[SB_ZONES..SB_MAGIC].copy_from_slice(&self.zones_count.to_le_bytes());
        out[SB_MAGIC..SB_PAD3].copy_from_slice(&self.magic.to_le_bytes());
        out[SB_BLOCKSIZE..SB_SUBVERSION].copy_from_slice(&self.block_size.to_le_bytes());
        out[SB_SUBVERSION] = self.subversion;
        out
    }

    /// The block size as a validated `BlockSize`.
    pub fn block_size(&self) -> Result<BlockSize, ParseError> {
        BlockSize::new(u32::from(self.block_size))
    }

    /// Zone size in bytes: `block_size << log_zone_size`.
    pub fn zone_size(&self) -> Result<u32, ParseError> {
        let block_size = self.block_size()?;
        let log = u16::try_from(self.log_zone_size).map_err(|_| ParseError::InvalidField {
            field: "log_zone_size",
            reason: "negative shift",
        })?;
        if log > MAX_LOG_ZONE_SIZE {
            return Err(ParseError::InvalidField {
                field: "log_zone_size",
                reason: "shift larger than 16",
            });
        }
        block_size.zone_size(log).ok_or(ParseError::InvalidField {
            field: "log_zone_size",
            reason: "zone size overflows u32",
        })
    }

    /// First block of the inode table: boot block, superblock, then the
    /// two bitmaps.
    pub fn inode_table_block(&self) -> Result<u64, ParseError> {
        let imap = u64::try_from(self.inode_bitmap_blocks).map_err(|_| {
            ParseError::InvalidField {
                field: "inode_bitmap_blocks",
                reason: "negative block count",
            }
        })?;
        let zmap = u64::try_from(self.zone_bitmap_blocks).map_err(|_| {
            ParseError::InvalidField {
                field: "zone_bitmap_blocks",
                reason: "negative block count",
            }
        })?;
        Ok(MINIX_RESERVED_BLOCKS + imap + zmap)
    }

    /// Check every field the reader derives addresses from.
    pub fn validate_geometry(&self) -> Result<(), ParseError> {
        self.zone_size()?;
        self.inode_table_block()?;
        Ok(())
    }
}

// ── Inode ───────────────────────────────────────────────────────────────────

const IN_MODE: usize = 0;
const IN_LINKS: usize = 2;
const IN_UID: usize = 4;
const IN_GID: usize = 6;
const IN_SIZE: usize = 8;
const IN_ATIME: usize = 12;
const IN_MTIME: usize = 16;
const IN_CTIME: usize = 20;
const IN_ZONES: usize = 24;
const IN_INDIRECT: usize = 52;
const IN_DOUBLE: usize = 56;
const IN_UNUSED: usize = 60;

/// File type as encoded in the upper four bits of `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinixFileType {
    Unknown,
    RegFile,
    Dir,
    Chrdev,
    Blkdev,
    Fifo,
    Sock,
    Symlink,
}

impl MinixFileType {
    #[must_use]
    pub fn from_mode(mode: u16) -> Self {
        match mode & S_IFMT {
            S_IFREG => Self::RegFile,
            S_IFDIR => Self::Dir,
            S_IFCHR => Self::Chrdev,
            S_IFBLK => Self::Blkdev,
            S_IFIFO => Self::Fifo,
            S_IFSOCK => Self::Sock,
            S_IFLNK => Self::Symlink,
            _ => Self::Unknown,
        }
    }
}

/// A 64-byte MINIX v3 inode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinixInode {
    pub mode: u16,
    pub links_count: u16,
    pub uid: u16,
    pub gid: u16,
    pub size: u32,
    pub atime: i32,
    pub mtime: i32,
    pub ctime: i32,
    pub zones: [ZoneNumber; MINIX_DIRECT_ZONES],
    pub indirect: ZoneNumber,
    pub double_indirect: ZoneNumber,
    pub unused: u32,
}

impl MinixInode {
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        ensure_slice(bytes, 0, MINIX_INODE_SIZE)?;

        let mut zones = [ZoneNumber::HOLE; MINIX_DIRECT_ZONES];
        for (i, zone) in zones.iter_mut().enumerate() {
            *zone = ZoneNumber(read_le_u32(bytes, IN_ZONES + i * ZONE_NUMBER_SIZE)?);
        }

        Ok(Self {
            mode: read_le_u16(bytes, IN_MODE)?,
            links_count: read_le_u16(bytes, IN_LINKS)?,
            uid: read_le_u16(bytes, IN_UID)?,
            gid: read_le_u16(bytes, IN_GID)?,
            size: read_le_u32(bytes, IN_SIZE)?,
            atime: read_le_i32(bytes, IN_ATIME)?,
            mtime: read_le_i32(bytes, IN_MTIME)?,
            ctime: read_le_i32(bytes, IN_CTIME)?,
            zones,
            indirect: ZoneNumber(read_le_u32(bytes, IN_INDIRECT)?),
            double_indirect: ZoneNumber(read_le_u32(bytes, IN_DOUBLE)?),
            unused: read_le_u32(bytes, IN_UNUSED)?,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; MINIX_INODE_SIZE] {
        let mut out = [0_u8; MINIX_INODE_SIZE];
        out[IN_MODE..IN_LINKS].copy_from_slice(&self.mode.to_le_bytes());
        out[IN_LINKS..IN_UID].copy_from_slice(&self.links_count.to_le_bytes());
        out[IN_UID..IN_GID].copy_from_slice(&self.uid.to_le_bytes());
        out[IN_GID..IN_SIZE].copy_from_slice(&self.gid.to_le_bytes());
        out[IN_SIZE..IN_ATIME].copy_from_slice(&self.size.to_le_bytes());
        out[IN_ATIME..IN_MTIME].copy_from_slice(&self.atime.to_le_bytes());
        out[IN_MTIME..IN_CTIME].copy_from_slice(&self.mtime.to_le_bytes());
        out[IN_CTIME..IN_ZONES].copy_from_slice(&self.ctime.to_le_bytes());
        for (i, zone) in self.zones.iter().enumerate() {
            let at = IN_ZONES + i * ZONE_NUMBER_SIZE;
            out[at..at + ZONE_NUMBER_SIZE].copy_from_slice(&zone.0.to_le_bytes());
        }
        out[IN_INDIRECT..IN_DOUBLE].copy_from_slice(&self.indirect.0.to_le_bytes());
        out[IN_DOUBLE..IN_UNUSED].copy_from_slice(&self.double_indirect.0.to_le_bytes());
        out[IN_UNUSED..].copy_from_slice(&self.unused.to_le_bytes());
        out
    }

    #[must_use]
    pub fn file_type(&self) -> MinixFileType {
        MinixFileType::from_mode(self.mode)
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    /// The nine rwx permission bits.
    #[must_use]
    pub fn permission_bits(&self) -> u16 {
        self.mode & 0o777
    }

    /// Ten-character listing string, e.g. `drwxr-xr-x`.
    #[must_use]
    pub fn permission_string(&self) -> String {
        permission_string(self.mode)
    }
}

/// Render `mode` as `d` or `-` followed by owner, group and other rwx
/// triples. Only directories get a type letter.
#[must_use]
pub fn permission_string(mode: u16) -> String {
    const FLAGS: [(u16, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    let mut out = String::with_capacity(10);
    out.push(if mode & S_IFMT == S_IFDIR { 'd' } else { '-' });
    for (bit, ch) in FLAGS {
        out.push(if mode & bit != 0 { ch } else { '-' });
    }
    out
}

// ── Directory entries ───────────────────────────────────────────────────────

const DE_INODE: usize = 0;
const DE_NAME: usize = 4;

/// An owned directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinixDirEntry {
    pub inode: u32,
    pub name: Vec<u8>,
}

impl MinixDirEntry {
    /// Decode one 64-byte slot. Deleted slots (inode 0) decode normally;
    /// [`DirEntryIter`] is what skips them.
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let entry = MinixDirEntryRef::parse_from_bytes(bytes)?;
        Ok(entry.to_owned())
    }

    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// A borrowed directory entry; `name` points into the zone buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinixDirEntryRef<'a> {
    pub inode: u32,
    pub name: &'a [u8],
}

impl<'a> MinixDirEntryRef<'a> {
    pub fn parse_from_bytes(bytes: &'a [u8]) -> Result<Self, ParseError> {
        ensure_slice(bytes, 0, MINIX_DIR_ENTRY_SIZE)?;
        Ok(Self {
            inode: read_le_u32(bytes, DE_INODE)?,
            name: nul_terminated(ensure_slice(bytes, DE_NAME, MINIX_NAME_LEN)?),
        })
    }

    #[must_use]
    pub fn to_owned(&self) -> MinixDirEntry {
        MinixDirEntry {
            inode: self.inode,
            name: self.name.to_vec(),
        }
    }

    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(self.name).into_owned()
    }

    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.name == b"."
    }

    #[must_use]
    pub fn is_dotdot(&self) -> bool {
        self.name == b".."
    }
}

/// Encode a directory slot. Names longer than 60 bytes are rejected; a
/// name of exactly 60 bytes is stored without a terminator.
pub fn encode_dir_entry(inode: u32, name: &[u8]) -> Result<[u8; MINIX_DIR_ENTRY_SIZE], ParseError> {
    if name.len() > MINIX_NAME_LEN {
        return Err(ParseError::InvalidField {
            field: "dir_entry_name",
            reason: "longer than 60 bytes",
        });
    }
    let mut out = [0_u8; MINIX_DIR_ENTRY_SIZE];
    out[DE_INODE..DE_NAME].copy_from_slice(&inode.to_le_bytes());
    out[DE_NAME..DE_NAME + name.len()].copy_from_slice(name);
    Ok(out)
}

/// Iterates the live entries of a buffer of directory slots.
///
/// Slots with inode 0 are skipped. A trailing fragment shorter than a full
/// slot is ignored.
pub struct DirEntryIter<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> DirEntryIter<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }
}

impl<'a> Iterator for DirEntryIter<'a> {
    type Item = MinixDirEntryRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let slot = self
                .buf
                .get(self.offset..self.offset.checked_add(MINIX_DIR_ENTRY_SIZE)?)?;
            self.offset += MINIX_DIR_ENTRY_SIZE;
            // A full slot always decodes.
            let entry = MinixDirEntryRef::parse_from_bytes(slot).ok()?;
            if entry.inode != 0 {
                return Some(entry);
            }
        }
    }
}

// ── Indirect zone tables ────────────────────────────────────────────────────

/// Decode an indirect zone: a packed array of little-endian zone numbers.
#[must_use]
pub fn parse_indirect_table(bytes: &[u8]) -> Vec<ZoneNumber> {
    bytes
        .chunks_exact(ZONE_NUMBER_SIZE)
        .map(|c| ZoneNumber(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
        .collect()
}

/// Encode `zones` into a zone-sized buffer, zero-filling the rest.
pub fn encode_indirect_table(zones: &[ZoneNumber], zone_size: usize) -> Result<Vec<u8>, ParseError> {
    if zones.len() * ZONE_NUMBER_SIZE > zone_size {
        return Err(ParseError::InvalidField {
            field: "indirect_table",
            reason: "more entries than fit in one zone",
        });
    }
    let mut out = vec![0_u8; zone_size];
    for (chunk, zone) in out.chunks_exact_mut(ZONE_NUMBER_SIZE).zip(zones) {
        chunk.copy_from_slice(&zone.0.to_le_bytes());
    }
    Ok(out)
}
