#![forbid(unsafe_code)]
//! On-disk format parsing for MINIX v3 images.
//!
//! Pure parsing crate: no I/O, no side effects. Decodes byte slices into
//! typed records (boot sector partition entries, superblock, inodes,
//! directory slots, indirect zone tables) and encodes them back for
//! fixture builders.

pub mod minix;
pub mod partition;

pub use minix::{
    DirEntryIter, MinixDirEntry, MinixDirEntryRef, MinixFileType, MinixInode, MinixSuperblock,
    encode_dir_entry, encode_indirect_table, parse_indirect_table, permission_string,
};
pub use partition::{PartitionEntry, check_boot_signature, encode_boot_sector, partition_entry};
