//! Inode Table: maps 1-based inode numbers to records on the device.

use crate::parse_to_mfs_error;
use crate::superblock::Geometry;
use mfs_block::ByteDevice;
use mfs_error::{MfsError, Result};
use mfs_ondisk::MinixInode;
use mfs_types::{ByteOffset, InodeNumber, MINIX_INODE_SIZE};
use tracing::trace;

/// Read-only view of the inode table.
#[derive(Clone, Copy)]
pub struct InodeTable<'a> {
    dev: &'a dyn ByteDevice,
    geometry: &'a Geometry,
}

impl<'a> InodeTable<'a> {
    #[must_use]
    pub fn new(dev: &'a dyn ByteDevice, geometry: &'a Geometry) -> Self {
        Self { dev, geometry }
    }

    /// Device offset of inode `ino`.
    ///
    /// Fails with `InvalidInodeNumber` for inode 0 or any number above the
    /// superblock's inode count; no read happens in that case.
    pub fn offset_of(&self, ino: InodeNumber) -> Result<ByteOffset> {
        let invalid = || MfsError::InvalidInodeNumber {
            inode: ino.0,
            max: self.geometry.inodes_count,
        };
        if ino.0 > self.geometry.inodes_count {
            return Err(invalid());
        }
        let index = ino.table_index().ok_or_else(invalid)?;
        self.geometry
            .inode_table_offset()?
            .checked_add(u64::from(index) * MINIX_INODE_SIZE as u64)
            .ok_or_else(|| MfsError::Corruption {
                offset: self.geometry.base_offset.0,
                detail: format!("inode {ino} offset overflows u64"),
            })
    }

    /// Read and decode inode `ino`.
    pub fn get(&self, ino: InodeNumber) -> Result<MinixInode> {
        let offset = self.offset_of(ino)?;
        let mut buf = [0_u8; MINIX_INODE_SIZE];
        self.dev.read_exact_at(offset, &mut buf)?;
        trace!(ino = ino.0, offset = offset.0, "read inode");
        MinixInode::parse_from_bytes(&buf).map_err(|e| parse_to_mfs_error(offset, &e))
    }
}
