//! Superblock Reader and the geometry derived from it.

use mfs_block::ByteDevice;
use mfs_error::{MfsError, Result};
use mfs_ondisk::MinixSuperblock;
use mfs_types::{
    ByteOffset, MINIX_DIRECT_ZONES, MINIX_SUPERBLOCK_OFFSET, MINIX_SUPERBLOCK_SIZE, ParseError,
    ZONE_NUMBER_SIZE, ZoneNumber,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Addressing constants computed once at open time.
///
/// Every device offset the reader produces is derived from these values,
/// so all reads stay relative to `base_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub base_offset: ByteOffset,
    pub block_size: u32,
    pub zone_size: u32,
    /// First block of the inode table, relative to `base_offset`.
    pub inode_table_block: u64,
    pub inodes_count: u32,
}

impl Geometry {
    fn from_superblock(base_offset: ByteOffset, sb: &MinixSuperblock) -> Result<Self> {
        let block_size = sb.block_size().map_err(|e| geometry_error(&e))?.get();
        let zone_size = sb.zone_size().map_err(|e| geometry_error(&e))?;
        let inode_table_block = sb.inode_table_block().map_err(|e| geometry_error(&e))?;
        Ok(Self {
            base_offset,
            block_size,
            zone_size,
            inode_table_block,
            inodes_count: sb.inodes_count,
        })
    }

    /// Zone numbers per indirect table (`E`): the whole zone is the table.
    #[must_use]
    pub fn entries_per_table(&self) -> u64 {
        u64::from(self.zone_size) / ZONE_NUMBER_SIZE as u64
    }

    /// Number of file blocks reachable through direct, single-indirect and
    /// double-indirect zones.
    #[must_use]
    pub fn max_file_blocks(&self) -> u64 {
        let e = self.entries_per_table();
        MINIX_DIRECT_ZONES as u64 + e + e * e
    }

    /// Device offset of the first byte of `zone`.
    pub fn zone_offset(&self, zone: ZoneNumber) -> Result<ByteOffset> {
        ByteOffset(u64::from(zone.0))
            .checked_mul(u64::from(self.zone_size))
            .and_then(|rel| self.base_offset.checked_add(rel.0))
            .ok_or_else(|| MfsError::Corruption {
                offset: self.base_offset.0,
                detail: format!("zone {zone} offset overflows u64"),
            })
    }

    /// Device offset of the inode table.
    pub fn inode_table_offset(&self) -> Result<ByteOffset> {
        ByteOffset(self.inode_table_block)
            .checked_mul(u64::from(self.block_size))
            .and_then(|rel| self.base_offset.checked_add(rel.0))
            .ok_or_else(|| {
                MfsError::InvalidGeometry("inode table offset overflows u64".into())
            })
    }
}

/// Read the superblock at `base_offset + 1024`, check the magic, and derive
/// the geometry. Nothing past the superblock is read when this fails.
pub fn read_superblock(
    dev: &dyn ByteDevice,
    base_offset: ByteOffset,
) -> Result<(MinixSuperblock, Geometry)> {
    let offset = base_offset
        .checked_add(MINIX_SUPERBLOCK_OFFSET)
        .ok_or_else(|| MfsError::InvalidGeometry("superblock offset overflows u64".into()))?;
    let mut region = [0_u8; MINIX_SUPERBLOCK_SIZE];
    dev.read_exact_at(offset, &mut region)?;

    let sb = MinixSuperblock::parse_superblock_region(&region).map_err(|e| match e {
        ParseError::InvalidMagic { actual, .. } => MfsError::BadMagic {
            found: u16::try_from(actual).unwrap_or(u16::MAX),
        },
        other => crate::parse_to_mfs_error(offset, &other),
    })?;
    let geometry = Geometry::from_superblock(base_offset, &sb)?;

    debug!(
        base_offset = base_offset.0,
        block_size = geometry.block_size,
        zone_size = geometry.zone_size,
        inodes = sb.inodes_count,
        zones = sb.zones_count,
        inode_table_block = geometry.inode_table_block,
        "superblock validated"
    );
    Ok((sb, geometry))
}

fn geometry_error(e: &ParseError) -> MfsError {
    match e {
        ParseError::InvalidField { field, reason } => {
            MfsError::InvalidGeometry(format!("{field}: {reason}"))
        }
        other => MfsError::InvalidGeometry(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfs_block::MemByteDevice;
    use mfs_types::MINIX_MAGIC;

    fn sample_superblock() -> MinixSuperblock {
        MinixSuperblock {
            inodes_count: 64,
            inode_bitmap_blocks: 1,
            zone_bitmap_blocks: 1,
            first_data_zone: 8,
            log_zone_size: 1,
            max_file: 0x7FFF_FFFF,
            zones_count: 128,
            magic: MINIX_MAGIC,
            block_size: 1024,
            subversion: 0,
        }
    }

    fn image_with(sb: &MinixSuperblock, base: usize) -> Vec<u8> {
        let mut image = vec![0_u8; base + 4096];
        let at = base + 1024;
        image[at..at + MINIX_SUPERBLOCK_SIZE].copy_from_slice(&sb.to_bytes());
        image
    }

    #[test]
    fn geometry_is_derived_from_header() {
        let dev = MemByteDevice::new(image_with(&sample_superblock(), 512));
        let (sb, geo) = read_superblock(&dev, ByteOffset(512)).expect("superblock");
        assert_eq!(sb.inodes_count, 64);
        assert_eq!(geo.block_size, 1024);
        assert_eq!(geo.zone_size, 2048);
        assert_eq!(geo.inode_table_block, 4);
        assert_eq!(geo.inode_table_offset().expect("offset"), ByteOffset(512 + 4 * 1024));
        assert_eq!(geo.entries_per_table(), 512);
        assert_eq!(geo.max_file_blocks(), 7 + 512 + 512 * 512);
        assert_eq!(geo.zone_offset(ZoneNumber(3)).expect("zone"), ByteOffset(512 + 3 * 2048));
    }

    #[test]
    fn bad_magic_is_reported() {
        let mut sb = sample_superblock();
        sb.magic = 0x137F;
        let dev = MemByteDevice::new(image_with(&sb, 0));
        let err = read_superblock(&dev, ByteOffset::ZERO).expect_err("bad magic");
        assert!(matches!(err, MfsError::BadMagic { found: 0x137F }));
    }

    #[test]
    fn unusable_geometry_is_reported() {
        let mut sb = sample_superblock();
        sb.block_size = 3000;
        let dev = MemByteDevice::new(image_with(&sb, 0));
        let err = read_superblock(&dev, ByteOffset::ZERO).expect_err("bad block size");
        assert!(matches!(err, MfsError::InvalidGeometry(ref msg) if msg.contains("block_size")));

        let mut sb = sample_superblock();
        sb.log_zone_size = 40;
        let dev = MemByteDevice::new(image_with(&sb, 0));
        assert!(matches!(
            read_superblock(&dev, ByteOffset::ZERO),
            Err(MfsError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn truncated_image_is_io_error() {
        let dev = MemByteDevice::new(vec![0_u8; 1030]);
        assert!(matches!(
            read_superblock(&dev, ByteOffset::ZERO),
            Err(MfsError::Io(_))
        ));
    }
}
