//! Content Extractor: streams a regular file's bytes to a sink.

use crate::superblock::Geometry;
use crate::zone::ZoneMap;
use mfs_block::ByteDevice;
use mfs_error::{MfsError, Result};
use mfs_ondisk::MinixInode;
use mfs_types::{ByteOffset, InodeNumber};
use std::io::Write;
use tracing::{debug, trace};

/// Largest single read or zero-fill issued while copying one zone.
const COPY_CHUNK: usize = 64 * 1024;

static ZEROES: [u8; COPY_CHUNK] = [0; COPY_CHUNK];

/// Write exactly `inode.size` bytes of file content to `sink`.
///
/// Holes come out as zero bytes of the same length. A declared size that
/// needs blocks beyond the double-indirect region fails with
/// `AddressingOverflow` before anything is written.
pub fn extract_to<W: Write + ?Sized>(
    dev: &dyn ByteDevice,
    geometry: &Geometry,
    ino: InodeNumber,
    inode: &MinixInode,
    sink: &mut W,
) -> Result<u64> {
    if !inode.is_regular() {
        return Err(MfsError::NotRegularFile { inode: ino.0 });
    }

    let size = u64::from(inode.size);
    let zone_size = u64::from(geometry.zone_size);
    let blocks = size.div_ceil(zone_size);
    if blocks > geometry.max_file_blocks() {
        return Err(MfsError::AddressingOverflow {
            inode: ino.0,
            block: geometry.max_file_blocks(),
        });
    }
    debug!(ino = ino.0, size, blocks, "extract start");

    let mut zones = ZoneMap::new(dev, geometry, ino, inode);
    let chunk = usize::try_from(geometry.zone_size).map_or(COPY_CHUNK, |z| z.min(COPY_CHUNK));
    let mut buf = vec![0_u8; chunk];
    let mut remaining = size;
    let mut block = 0_u64;
    while remaining > 0 {
        let len = remaining.min(zone_size);
        match zones.resolve(block)? {
            Some(zone) => {
                let mut offset = geometry.zone_offset(zone)?;
                copy_range(dev, &mut offset, len, &mut buf, sink)?;
            }
            None => {
                trace!(ino = ino.0, block, len, "hole");
                write_zeroes(len, sink)?;
            }
        }
        remaining -= len;
        block += 1;
    }

    debug!(ino = ino.0, size, "extract done");
    Ok(size)
}

fn copy_range<W: Write + ?Sized>(
    dev: &dyn ByteDevice,
    offset: &mut ByteOffset,
    mut len: u64,
    buf: &mut [u8],
    sink: &mut W,
) -> Result<()> {
    while len > 0 {
        let n = usize::try_from(len).map_or(buf.len(), |l| l.min(buf.len()));
        dev.read_exact_at(*offset, &mut buf[..n])?;
        sink.write_all(&buf[..n])?;
        *offset = offset.checked_add(n as u64).ok_or_else(|| MfsError::Corruption {
            offset: offset.0,
            detail: "zone read overflows u64".into(),
        })?;
        len -= n as u64;
    }
    Ok(())
}

fn write_zeroes<W: Write + ?Sized>(mut len: u64, sink: &mut W) -> Result<()> {
    while len > 0 {
        let n = usize::try_from(len).map_or(COPY_CHUNK, |l| l.min(COPY_CHUNK));
        sink.write_all(&ZEROES[..n])?;
        len -= n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfs_block::MemByteDevice;
    use mfs_ondisk::encode_indirect_table;
    use mfs_types::{S_IFDIR, S_IFREG, ZoneNumber};

    fn geometry() -> Geometry {
        Geometry {
            base_offset: ByteOffset::ZERO,
            block_size: 512,
            zone_size: 512,
            inode_table_block: 4,
            inodes_count: 8,
        }
    }

    fn fill_zone(image: &mut [u8], zone: usize, byte: u8) {
        image[zone * 512..(zone + 1) * 512].fill(byte);
    }

    #[test]
    fn holes_keep_offsets_aligned() {
        let geo = geometry();
        let mut image = vec![0_u8; 512 * 32];
        fill_zone(&mut image, 10, 0xAA);
        fill_zone(&mut image, 11, 0xBB);
        let inode = MinixInode {
            mode: S_IFREG | 0o644,
            size: 512 * 2 + 100,
            zones: [10, 0, 11, 0, 0, 0, 0].map(ZoneNumber),
            ..MinixInode::default()
        };
        let dev = MemByteDevice::new(image);

        let mut out = Vec::new();
        let n = extract_to(&dev, &geo, InodeNumber(2), &inode, &mut out).expect("extract");
        assert_eq!(n, 1124);
        assert_eq!(out.len(), 1124);
        assert!(out[..512].iter().all(|b| *b == 0xAA));
        assert!(out[512..1024].iter().all(|b| *b == 0));
        assert!(out[1024..].iter().all(|b| *b == 0xBB));
    }

    #[test]
    fn single_indirect_data_is_followed() {
        let geo = geometry();
        let mut image = vec![0_u8; 512 * 32];
        for zone in 1..=8 {
            fill_zone(&mut image, zone, u8::try_from(zone).expect("small"));
        }
        let table = encode_indirect_table(&[ZoneNumber(8)], 512).expect("table");
        image[20 * 512..21 * 512].copy_from_slice(&table);
        let inode = MinixInode {
            mode: S_IFREG | 0o644,
            size: 512 * 7 + 10,
            zones: [1, 2, 3, 4, 5, 6, 7].map(ZoneNumber),
            indirect: ZoneNumber(20),
            ..MinixInode::default()
        };
        let dev = MemByteDevice::new(image);

        let mut out = Vec::new();
        extract_to(&dev, &geo, InodeNumber(2), &inode, &mut out).expect("extract");
        assert_eq!(out.len(), 512 * 7 + 10);
        assert_eq!(out[512 * 7..], [8_u8; 10]);
    }

    #[test]
    fn missing_double_indirect_is_all_zeroes() {
        let geo = geometry();
        let dev = MemByteDevice::new(Vec::new());
        let size = 512 * (7 + 128 + 3);
        let inode = MinixInode {
            mode: S_IFREG | 0o644,
            size,
            ..MinixInode::default()
        };
        let mut out = Vec::new();
        extract_to(&dev, &geo, InodeNumber(2), &inode, &mut out).expect("pure hole");
        assert_eq!(out.len(), size as usize);
        assert!(out.iter().all(|b| *b == 0));
    }

    #[test]
    fn oversized_file_fails_before_writing() {
        let geo = geometry();
        let dev = MemByteDevice::new(Vec::new());
        let inode = MinixInode {
            mode: S_IFREG | 0o644,
            size: u32::try_from(geo.max_file_blocks() * 512 + 1).expect("fits"),
            ..MinixInode::default()
        };
        let mut out = Vec::new();
        let err = extract_to(&dev, &geo, InodeNumber(4), &inode, &mut out).expect_err("overflow");
        assert!(matches!(err, MfsError::AddressingOverflow { inode: 4, .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn directories_are_not_extracted() {
        let geo = geometry();
        let dev = MemByteDevice::new(Vec::new());
        let inode = MinixInode {
            mode: S_IFDIR | 0o755,
            ..MinixInode::default()
        };
        let mut out = Vec::new();
        assert!(matches!(
            extract_to(&dev, &geo, InodeNumber(1), &inode, &mut out),
            Err(MfsError::NotRegularFile { inode: 1 })
        ));
    }

    #[test]
    fn empty_file_writes_nothing() {
        let geo = geometry();
        let dev = MemByteDevice::new(Vec::new());
        let inode = MinixInode {
            mode: S_IFREG,
            ..MinixInode::default()
        };
        let mut out = Vec::new();
        assert_eq!(
            extract_to(&dev, &geo, InodeNumber(2), &inode, &mut out).expect("empty"),
            0
        );
        assert!(out.is_empty());
    }
}
