//! MBR-style boot sector and partition table entries.
//!
//! The same layout wraps both primary partitions and the subpartition
//! table stored in the first sector of a MINIX partition.

use mfs_types::{
    BOOT_SECTOR_SIZE, BOOT_SIGNATURE, BOOT_SIGNATURE_OFFSET, MINIX_PARTITION_TYPE,
    PARTITION_COUNT, PARTITION_ENTRY_SIZE, PARTITION_TABLE_OFFSET, ParseError, SECTOR_SIZE,
    ensure_slice, read_le_u32, read_u8,
};
use serde::{Deserialize, Serialize};

// Field offsets within a 16-byte partition table entry.
const PE_BOOT_INDICATOR: usize = 0x00;
const PE_START_HEAD: usize = 0x01;
const PE_START_SECTOR: usize = 0x02;
const PE_START_CYLINDER: usize = 0x03;
const PE_TYPE: usize = 0x04;
const PE_END_HEAD: usize = 0x05;
const PE_END_SECTOR: usize = 0x06;
const PE_END_CYLINDER: usize = 0x07;
const PE_FIRST_SECTOR: usize = 0x08;
const PE_SECTOR_COUNT: usize = 0x0C;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    pub boot_indicator: u8,
    pub start_head: u8,
    pub start_sector: u8,
    pub start_cylinder: u8,
    pub part_type: u8,
    pub end_head: u8,
    pub end_sector: u8,
    pub end_cylinder: u8,
    /// First sector (LBA). Absolute from the start of the device.
    pub first_sector: u32,
    pub sector_count: u32,
}

impl PartitionEntry {
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        ensure_slice(bytes, 0, PARTITION_ENTRY_SIZE)?;
        Ok(Self {
            boot_indicator: read_u8(bytes, PE_BOOT_INDICATOR)?,
            start_head: read_u8(bytes, PE_START_HEAD)?,
            start_sector: read_u8(bytes, PE_START_SECTOR)?,
            start_cylinder: read_u8(bytes, PE_START_CYLINDER)?,
            part_type: read_u8(bytes, PE_TYPE)?,
            end_head: read_u8(bytes, PE_END_HEAD)?,
            end_sector: read_u8(bytes, PE_END_SECTOR)?,
            end_cylinder: read_u8(bytes, PE_END_CYLINDER)?,
            first_sector: read_le_u32(bytes, PE_FIRST_SECTOR)?,
            sector_count: read_le_u32(bytes, PE_SECTOR_COUNT)?,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; PARTITION_ENTRY_SIZE] {
        let mut out = [0_u8; PARTITION_ENTRY_SIZE];
        out[PE_BOOT_INDICATOR] = self.boot_indicator;
        out[PE_START_HEAD] = self.start_head;
        out[PE_START_SECTOR] = self.start_sector;
        out[PE_START_CYLINDER] = self.start_cylinder;
        out[PE_TYPE] = self.part_type;
        out[PE_END_HEAD] = self.end_head;
        out[PE_END_SECTOR] = self.end_sector;
        out[PE_END_CYLINDER] = self.end_cylinder;
        out[PE_FIRST_SECTOR..PE_FIRST_SECTOR + 4].copy_from_slice(&self.first_sector.to_le_bytes());
        out[PE_SECTOR_COUNT..PE_SECTOR_COUNT + 4].copy_from_slice(&self.sector_count.to_le_bytes());
        out
    }

    /// A MINIX partition entry covering `sector_count` sectors from `first_sector`.
    #[must_use]
    pub fn minix(first_sector: u32, sector_count: u32) -> Self {
        Self {
            part_type: MINIX_PARTITION_TYPE,
            first_sector,
            sector_count,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_minix(&self) -> bool {
        self.part_type == MINIX_PARTITION_TYPE
    }

    /// Byte offset of the first sector, measured from the start of the device.
    #[must_use]
    pub fn start_byte(&self) -> u64 {
        u64::from(self.first_sector) * SECTOR_SIZE
    }
}

/// Verify the 0x55AA marker at the end of a boot sector.
pub fn check_boot_signature(sector: &[u8]) -> Result<(), ParseError> {
    let sig = ensure_slice(sector, BOOT_SIGNATURE_OFFSET, BOOT_SIGNATURE.len())?;
    if sig != BOOT_SIGNATURE {
        return Err(ParseError::InvalidMagic {
            expected: u64::from(u16::from_be_bytes(BOOT_SIGNATURE)),
            actual: u64::from(u16::from_be_bytes([sig[0], sig[1]])),
        });
    }
    Ok(())
}

/// Decode table entry `index` (0..=3) from a boot sector.
///
/// The signature is not checked here; callers verify it first.
pub fn partition_entry(sector: &[u8], index: u8) -> Result<PartitionEntry, ParseError> {
    if index >= PARTITION_COUNT {
        return Err(ParseError::InvalidField {
            field: "partition_index",
            reason: "must be 0-3",
        });
    }
    let offset = PARTITION_TABLE_OFFSET + usize::from(index) * PARTITION_ENTRY_SIZE;
    PartitionEntry::parse_from_bytes(ensure_slice(sector, offset, PARTITION_ENTRY_SIZE)?)
}

/// Encode a full boot sector carrying `entries` and a valid signature.
#[must_use]
pub fn encode_boot_sector(entries: &[PartitionEntry; PARTITION_COUNT as usize]) -> Vec<u8> {
    let mut sector = vec![0_u8; BOOT_SECTOR_SIZE];
    for (i, entry) in entries.iter().enumerate() {
        let offset = PARTITION_TABLE_OFFSET + i * PARTITION_ENTRY_SIZE;
        sector[offset..offset + PARTITION_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
    }
    sector[BOOT_SIGNATURE_OFFSET..BOOT_SIGNATURE_OFFSET + BOOT_SIGNATURE.len()]
        .copy_from_slice(&BOOT_SIGNATURE);
    sector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partition_entry_fields() {
        let mut raw = [0_u8; 16];
        raw[0] = 0x80;
        raw[4] = 0x81;
        raw[8..12].copy_from_slice(&63_u32.to_le_bytes());
        raw[12..16].copy_from_slice(&2048_u32.to_le_bytes());

        let entry = PartitionEntry::parse_from_bytes(&raw).expect("parse");
        assert_eq!(entry.boot_indicator, 0x80);
        assert!(entry.is_minix());
        assert_eq!(entry.first_sector, 63);
        assert_eq!(entry.sector_count, 2048);
        assert_eq!(entry.start_byte(), 63 * 512);
        assert_eq!(entry.to_bytes(), raw);
    }

    #[test]
    fn short_entry_is_rejected() {
        assert!(matches!(
            PartitionEntry::parse_from_bytes(&[0_u8; 15]),
            Err(ParseError::InsufficientData { needed: 16, .. })
        ));
    }

    #[test]
    fn boot_signature_check() {
        let mut sector = vec![0_u8; BOOT_SECTOR_SIZE];
        assert_eq!(
            check_boot_signature(&sector),
            Err(ParseError::InvalidMagic {
                expected: 0x55AA,
                actual: 0,
            })
        );
        sector[510] = 0x55;
        sector[511] = 0xAA;
        assert!(check_boot_signature(&sector).is_ok());
    }

    #[test]
    fn encoded_boot_sector_exposes_all_four_entries() {
        let entries = [
            PartitionEntry::minix(16, 100),
            PartitionEntry {
                part_type: 0x83,
                first_sector: 200,
                ..PartitionEntry::default()
            },
            PartitionEntry::default(),
            PartitionEntry::minix(400, 8),
        ];
        let sector = encode_boot_sector(&entries);
        assert!(check_boot_signature(&sector).is_ok());
        for (i, expected) in entries.iter().enumerate() {
            let index = u8::try_from(i).expect("index fits");
            assert_eq!(partition_entry(&sector, index).expect("entry"), *expected);
        }
    }

    #[test]
    fn partition_index_out_of_range() {
        let sector = encode_boot_sector(&[PartitionEntry::default(); 4]);
        assert!(matches!(
            partition_entry(&sector, 4),
            Err(ParseError::InvalidField {
                field: "partition_index",
                ..
            })
        ));
    }
}
