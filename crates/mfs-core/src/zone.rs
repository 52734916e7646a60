//! Zone Map Resolver: file block index to physical zone.
//!
//! Block `b` of a file is found through one of three regions:
//!
//! | Region | Blocks | Lookup |
//! |--------|--------|--------|
//! | direct | `b < 7` | `inode.zones[b]` |
//! | single-indirect | `7 <= b < 7 + E` | `indirect[b - 7]` |
//! | double-indirect | `7 + E <= b < 7 + E + E*E` | `double[l1]` then `[l2]` |
//!
//! where `E = zone_size / 4`. Zone 0 anywhere on the path means the block
//! is a hole.

use crate::parse_to_mfs_error;
use crate::superblock::Geometry;
use mfs_block::{ByteDevice, read_vec};
use mfs_error::{MfsError, Result};
use mfs_ondisk::{MinixInode, parse_indirect_table};
use mfs_types::{InodeNumber, MINIX_DIRECT_ZONES, ZoneNumber, u64_to_usize};
use tracing::trace;

/// Resolves block indices for one inode.
///
/// Indirect tables are loaded on first use and dropped with the map. The
/// second-level table is cached by its first-level index, so walking a
/// file in block order reads each table once.
pub struct ZoneMap<'a> {
    dev: &'a dyn ByteDevice,
    geometry: &'a Geometry,
    ino: InodeNumber,
    inode: &'a MinixInode,
    single: Option<Vec<ZoneNumber>>,
    double: Option<Vec<ZoneNumber>>,
    second: Option<(u64, Vec<ZoneNumber>)>,
}

impl<'a> ZoneMap<'a> {
    #[must_use]
    pub fn new(
        dev: &'a dyn ByteDevice,
        geometry: &'a Geometry,
        ino: InodeNumber,
        inode: &'a MinixInode,
    ) -> Self {
        Self {
            dev,
            geometry,
            ino,
            inode,
            single: None,
            double: None,
            second: None,
        }
    }

    /// Physical zone holding file block `block`, or `None` for a hole.
    ///
    /// Fails with `AddressingOverflow` when `block` lies past the
    /// double-indirect region.
    pub fn resolve(&mut self, block: u64) -> Result<Option<ZoneNumber>> {
        let direct = MINIX_DIRECT_ZONES as u64;
        if block < direct {
            return Ok(self.inode.zones[self.index(block)?].allocated());
        }

        let e = self.geometry.entries_per_table();
        let i = block - direct;
        if i < e {
            if self.inode.indirect.is_hole() {
                return Ok(None);
            }
            if self.single.is_none() {
                self.single = Some(self.load_table(self.inode.indirect, 1)?);
            }
            let idx = self.index(i)?;
            return Ok(self
                .single
                .as_deref()
                .and_then(|table| table.get(idx))
                .and_then(|zone| zone.allocated()));
        }

        let i = i - e;
        let (l1, l2) = (i / e, i % e);
        if l1 >= e {
            return Err(self.overflow(block));
        }
        if self.inode.double_indirect.is_hole() {
            return Ok(None);
        }
        if self.double.is_none() {
            self.double = Some(self.load_table(self.inode.double_indirect, 2)?);
        }
        let l1_idx = self.index(l1)?;
        let l1_zone = self
            .double
            .as_deref()
            .and_then(|table| table.get(l1_idx).copied())
            .unwrap_or(ZoneNumber::HOLE);
        if l1_zone.is_hole() {
            return Ok(None);
        }

        let cached = matches!(&self.second, Some((key, _)) if *key == l1);
        if cached {
            trace!(ino = self.ino.0, l1, "second-level table cache hit");
        } else {
            trace!(ino = self.ino.0, l1, "second-level table cache miss");
            let table = self.load_table(l1_zone, 2)?;
            self.second = Some((l1, table));
        }
        let l2_idx = self.index(l2)?;
        Ok(self
            .second
            .as_ref()
            .and_then(|(_, table)| table.get(l2_idx))
            .and_then(|zone| zone.allocated()))
    }

    fn load_table(&self, zone: ZoneNumber, level: u8) -> Result<Vec<ZoneNumber>> {
        let offset = self.geometry.zone_offset(zone)?;
        let len = u64_to_usize(u64::from(self.geometry.zone_size), "zone_size")
            .map_err(|e| parse_to_mfs_error(offset, &e))?;
        let bytes = read_vec(self.dev, offset, len)?;
        trace!(ino = self.ino.0, zone = zone.0, level, "loaded indirect table");
        Ok(parse_indirect_table(&bytes))
    }

    fn index(&self, value: u64) -> Result<usize> {
        usize::try_from(value).map_err(|_| self.overflow(value))
    }

    fn overflow(&self, block: u64) -> MfsError {
        MfsError::AddressingOverflow {
            inode: self.ino.0,
            block,
        }
    }
}
