//! Partition Resolver: turns partition/subpartition selections into the
//! byte offset where the filesystem starts.

use crate::options::{OpenOptions, SubpartitionAddressing};
use crate::parse_to_mfs_error;
use mfs_block::ByteDevice;
use mfs_error::{MfsError, Result};
use mfs_ondisk::{PartitionEntry, check_boot_signature, partition_entry};
use mfs_types::{BOOT_SECTOR_SIZE, ByteOffset};
use tracing::{debug, trace};

/// Compute the filesystem base offset selected by `options`.
///
/// With no partition selected the filesystem starts at byte 0. Otherwise
/// the boot sector at the current base must carry the 0x55AA signature and
/// the chosen entry must be a MINIX partition; the same check repeats for a
/// subpartition inside the chosen partition.
pub fn resolve_base_offset(dev: &dyn ByteDevice, options: &OpenOptions) -> Result<ByteOffset> {
    options.validate()?;

    let Some(part_index) = options.partition else {
        debug!(base_offset = 0, "no partition selected");
        return Ok(ByteOffset::ZERO);
    };

    let part = read_minix_entry(dev, ByteOffset::ZERO, part_index)?;
    let part_base = ByteOffset(part.start_byte());
    debug!(
        partition = part_index,
        first_sector = part.first_sector,
        base_offset = part_base.0,
        "resolved partition"
    );

    let Some(sub_index) = options.subpartition else {
        return Ok(part_base);
    };

    let sub = read_minix_entry(dev, part_base, sub_index)?;
    let sub_base = match options.subpartition_addressing {
        SubpartitionAddressing::Absolute => ByteOffset(sub.start_byte()),
        SubpartitionAddressing::RelativeToPartition => {
            part_base
                .checked_add(sub.start_byte())
                .ok_or_else(|| MfsError::Corruption {
                    offset: part_base.0,
                    detail: "subpartition offset overflows u64".into(),
                })?
        }
    };
    debug!(
        subpartition = sub_index,
        first_sector = sub.first_sector,
        addressing = ?options.subpartition_addressing,
        base_offset = sub_base.0,
        "resolved subpartition"
    );
    Ok(sub_base)
}

/// Read the boot sector at `table_base` and return entry `index`, which
/// must be a MINIX partition.
fn read_minix_entry(
    dev: &dyn ByteDevice,
    table_base: ByteOffset,
    index: u8,
) -> Result<PartitionEntry> {
    let mut sector = [0_u8; BOOT_SECTOR_SIZE];
    dev.read_exact_at(table_base, &mut sector)?;
    trace!(table_base = table_base.0, index, "read partition table");

    if check_boot_signature(&sector).is_err() {
        return Err(MfsError::InvalidSignature {
            offset: table_base.0,
        });
    }

    let entry =
        partition_entry(&sector, index).map_err(|e| parse_to_mfs_error(table_base, &e))?;
    if !entry.is_minix() {
        return Err(MfsError::WrongPartitionType {
            index,
            found: entry.part_type,
        });
    }
    Ok(entry)
}
