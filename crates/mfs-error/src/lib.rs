#![forbid(unsafe_code)]
//! Error types for the MINIX image reader.
//!
//! # Error Taxonomy
//!
//! The workspace uses a two-layer error model:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `mfs-types` | Byte-level decode failures in `mfs-ondisk` |
//! | Runtime | `MfsError` | `mfs-error` (this crate) | Errors surfaced by `mfs-core` and the CLI |
//!
//! `mfs-error` does not depend on `mfs-types`; the conversion from
//! `ParseError` to `MfsError` lives in `mfs-core`, which knows the device
//! offset the failing record was read from and reports it as `Corruption`.
//!
//! Every variant is terminal for the operation that produced it. A malformed
//! image or a bad request does not get better on retry.
//!
//! ## errno Mapping
//!
//! | Variant | errno |
//! |---------|-------|
//! | `Io` | raw OS error, else `EIO` |
//! | `Corruption` | `EIO` |
//! | `AddressingOverflow` | `EFBIG` |
//! | `InvalidSignature` / `WrongPartitionType` / `BadMagic` / `InvalidGeometry` | `EINVAL` |
//! | `InvalidPartitionIndex` / `InvalidInodeNumber` / `InvalidConfig` | `EINVAL` |
//! | `NotFound` | `ENOENT` |
//! | `NotDirectory` | `ENOTDIR` |
//! | `NotRegularFile` | `EISDIR` |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MfsError {
    /// Seek, read, short read, or output-sink write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The 0x55AA marker is missing from the boot sector at `offset`.
    #[error("bad boot sector signature at byte offset {offset}")]
    InvalidSignature { offset: u64 },

    /// Partition or subpartition index outside 0..=3.
    #[error("invalid partition index {index} (must be 0-3)")]
    InvalidPartitionIndex { index: u8 },

    /// The selected partition table entry is not a MINIX partition.
    #[error("partition {index} is not a MINIX partition (type {found:#04x})")]
    WrongPartitionType { index: u8, found: u8 },

    /// Superblock magic mismatch: not a MINIX filesystem.
    #[error("bad magic number ({found:#06x}): this does not look like a MINIX filesystem")]
    BadMagic { found: u16 },

    /// Superblock decoded but its geometry is unusable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Inode number 0 or beyond the superblock's inode count.
    #[error("invalid inode number {inode} (filesystem has {max} inodes)")]
    InvalidInodeNumber { inode: u32, max: u32 },

    /// A path component other than the last is not a directory, or a
    /// directory operation was attempted on a non-directory.
    #[error("not a directory: {path}")]
    NotDirectory { path: String },

    /// No live directory entry matched a path component.
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// Content extraction requested on something other than a regular file.
    #[error("inode {inode} is not a regular file")]
    NotRegularFile { inode: u32 },

    /// The declared size needs a block beyond what direct, single-indirect
    /// and double-indirect zones can address.
    #[error("inode {inode}: file block {block} is beyond the double-indirect addressing limit")]
    AddressingOverflow { inode: u32, block: u64 },

    /// Metadata located at a known offset failed to decode.
    #[error("corrupt metadata at byte offset {offset}: {detail}")]
    Corruption { offset: u64, detail: String },

    /// The caller's configuration record is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MfsError {
    /// Convert this error into a POSIX errno, used as the CLI exit status.
    ///
    /// The mapping is exhaustive: adding a variant is a compile error until
    /// its errno is assigned.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::Corruption { .. } => libc::EIO,
            Self::AddressingOverflow { .. } => libc::EFBIG,
            Self::InvalidSignature { .. }
            | Self::InvalidPartitionIndex { .. }
            | Self::WrongPartitionType { .. }
            | Self::BadMagic { .. }
            | Self::InvalidGeometry(_)
            | Self::InvalidInodeNumber { .. }
            | Self::InvalidConfig(_) => libc::EINVAL,
            Self::NotFound { .. } => libc::ENOENT,
            Self::NotDirectory { .. } => libc::ENOTDIR,
            Self::NotRegularFile { .. } => libc::EISDIR,
        }
    }
}

/// Result alias using `MfsError`.
pub type Result<T> = std::result::Result<T, MfsError>;
