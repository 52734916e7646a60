#![forbid(unsafe_code)]
//! Shared vocabulary for the MINIX image reader.
//!
//! Unit-carrying newtypes (`InodeNumber`, `ZoneNumber`, `ByteOffset`),
//! on-disk layout constants, the byte-level `ParseError`, and the
//! little-endian read/write helpers every decoder is built on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ── Partition table (MBR layout) ────────────────────────────────────────────

pub const SECTOR_SIZE: u64 = 512;
pub const BOOT_SECTOR_SIZE: usize = 512;
pub const BOOT_SIGNATURE_OFFSET: usize = 510;
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const PARTITION_TABLE_OFFSET: usize = 0x1BE;
pub const PARTITION_ENTRY_SIZE: usize = 16;
pub const PARTITION_COUNT: u8 = 4;
pub const MINIX_PARTITION_TYPE: u8 = 0x81;

// ── Filesystem layout ───────────────────────────────────────────────────────

pub const MINIX_SUPERBLOCK_OFFSET: u64 = 1024;
/// Bytes of the superblock that carry decoded fields (31 used, one pad).
pub const MINIX_SUPERBLOCK_SIZE: usize = 32;
pub const MINIX_MAGIC: u16 = 0x4D5A;

/// Block 0 is the boot block, block 1 the superblock; bitmaps follow.
pub const MINIX_RESERVED_BLOCKS: u64 = 2;

pub const MINIX_INODE_SIZE: usize = 64;
pub const MINIX_DIRECT_ZONES: usize = 7;

pub const MINIX_DIR_ENTRY_SIZE: usize = 64;
pub const MINIX_NAME_LEN: usize = 60;

/// On-disk width of a zone number inside an indirect table.
pub const ZONE_NUMBER_SIZE: usize = 4;

pub const MIN_BLOCK_SIZE: u32 = 512;
pub const MAX_BLOCK_SIZE: u32 = 65536;
pub const MAX_LOG_ZONE_SIZE: u16 = 16;

// ── Identifiers ─────────────────────────────────────────────────────────────

/// 1-based MINIX inode number. Inode 0 never names a real inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeNumber(pub u32);

impl InodeNumber {
    pub const ROOT: Self = Self(1);

    /// Zero-based slot in the inode table, or `None` for inode 0.
    #[must_use]
    pub fn table_index(self) -> Option<u32> {
        self.0.checked_sub(1)
    }
}

/// Physical zone number. Zone 0 is never allocated: it marks a hole.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ZoneNumber(pub u32);

impl ZoneNumber {
    pub const HOLE: Self = Self(0);

    #[must_use]
    pub fn is_hole(self) -> bool {
        self.0 == 0
    }

    /// The zone as an allocated zone, `None` for a hole.
    #[must_use]
    pub fn allocated(self) -> Option<Self> {
        if self.is_hole() { None } else { Some(self) }
    }
}

/// Byte offset on a `ByteDevice` (pread semantics).
///
/// This is a unit-carrying wrapper to prevent mixing bytes with zones or blocks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ByteOffset(pub u64);

impl ByteOffset {
    pub const ZERO: Self = Self(0);

    /// Add a byte count, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, bytes: u64) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }

    /// Multiply by a scalar, returning `None` on overflow.
    #[must_use]
    pub fn checked_mul(self, factor: u64) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    /// Narrow to `usize`, returning `ParseError::IntegerConversion` on overflow.
    pub fn to_usize(self) -> Result<usize, ParseError> {
        usize::try_from(self.0).map_err(|_| ParseError::IntegerConversion {
            field: "byte_offset",
        })
    }
}

/// Validated block size (must be a power of two in 512..=65536).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockSize(u32);

impl BlockSize {
    /// Create a `BlockSize` if `value` is a power of two in [512, 65536].
    pub fn new(value: u32) -> Result<Self, ParseError> {
        if !value.is_power_of_two() || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&value) {
            return Err(ParseError::InvalidField {
                field: "block_size",
                reason: "must be power of two in 512..=65536",
            });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Zone size for a `log_zone_size` shift, `None` if it overflows `u32`.
    #[must_use]
    pub fn zone_size(self, log_zone_size: u16) -> Option<u32> {
        if log_zone_size > MAX_LOG_ZONE_SIZE {
            return None;
        }
        let zone = u64::from(self.0) << log_zone_size;
        u32::try_from(zone).ok()
    }
}

// ── Parse errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, got {actual}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        actual: usize,
    },
    #[error("invalid magic: expected {expected:#x}, got {actual:#x}")]
    InvalidMagic { expected: u64, actual: u64 },
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("integer conversion failed: {field}")]
    IntegerConversion { field: &'static str },
}

// ── Little-endian helpers ───────────────────────────────────────────────────

#[inline]
pub fn ensure_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    let Some(end) = offset.checked_add(len) else {
        return Err(ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        });
    };

    if end > data.len() {
        return Err(ParseError::InsufficientData {
            needed: len,
            offset,
            actual: data.len().saturating_sub(offset),
        });
    }

    Ok(&data[offset..end])
}

#[inline]
pub fn read_u8(data: &[u8], offset: usize) -> Result<u8, ParseError> {
    Ok(ensure_slice(data, offset, 1)?[0])
}

#[inline]
pub fn read_le_u16(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes = ensure_slice(data, offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn read_le_i16(data: &[u8], offset: usize) -> Result<i16, ParseError> {
    let bytes = ensure_slice(data, offset, 2)?;
    Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn read_le_u32(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_le_i32(data: &[u8], offset: usize) -> Result<i32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Copy `value` into `buf` at `offset`. Encoders size their buffers up
/// front, so an out-of-range write is a programming error in the caller.
#[inline]
pub fn write_bytes(buf: &mut [u8], offset: usize, value: &[u8]) -> Result<(), ParseError> {
    let Some(end) = offset.checked_add(value.len()) else {
        return Err(ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        });
    };
    let actual = buf.len().saturating_sub(offset);
    let dst = buf
        .get_mut(offset..end)
        .ok_or(ParseError::InsufficientData {
            needed: value.len(),
            offset,
            actual,
        })?;
    dst.copy_from_slice(value);
    Ok(())
}

/// Bytes of a fixed-width name field up to (not including) the first NUL.
///
/// A field filled to its full width carries no terminator; the whole field
/// is the name in that case.
#[must_use]
pub fn nul_terminated(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Narrow a `u64` to `usize` with an explicit error path.
pub fn u64_to_usize(value: u64, field: &'static str) -> Result<usize, ParseError> {
    usize::try_from(value).map_err(|_| ParseError::IntegerConversion { field })
}

// ── POSIX file mode constants ────────────────────────────────────────────────

/// File type mask (upper 4 bits of mode).
pub const S_IFMT: u16 = 0o170_000;
/// Named pipe (FIFO).
pub const S_IFIFO: u16 = 0o010_000;
/// Character device.
pub const S_IFCHR: u16 = 0o020_000;
/// Directory.
pub const S_IFDIR: u16 = 0o040_000;
/// Block device.
pub const S_IFBLK: u16 = 0o060_000;
/// Regular file.
pub const S_IFREG: u16 = 0o100_000;
/// Symbolic link.
pub const S_IFLNK: u16 = 0o120_000;
/// Socket.
pub const S_IFSOCK: u16 = 0o140_000;

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ZoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ByteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
