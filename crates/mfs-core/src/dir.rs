//! Directory Scanner.
//!
//! Directory content lives in the same zone address space as file data.
//! The scan walks zones in block order; a hole consumes one zone's worth of
//! the declared size without a read, and slots with inode 0 are skipped.

use crate::parse_to_mfs_error;
use crate::superblock::Geometry;
use crate::zone::ZoneMap;
use mfs_block::{ByteDevice, read_vec};
use mfs_error::{MfsError, Result};
use mfs_ondisk::{DirEntryIter, MinixDirEntry, MinixDirEntryRef, MinixInode};
use mfs_types::{InodeNumber, MINIX_DIR_ENTRY_SIZE, u64_to_usize};
use tracing::{trace, warn};

/// Walks a directory's zones, yielding each chunk of entry bytes.
struct ZoneWalk<'a> {
    dev: &'a dyn ByteDevice,
    geometry: &'a Geometry,
    ino: InodeNumber,
    zones: ZoneMap<'a>,
    block: u64,
    remaining: u64,
}

impl<'a> ZoneWalk<'a> {
    fn new(
        dev: &'a dyn ByteDevice,
        geometry: &'a Geometry,
        ino: InodeNumber,
        inode: &'a MinixInode,
    ) -> Self {
        Self {
            dev,
            geometry,
            ino,
            zones: ZoneMap::new(dev, geometry, ino, inode),
            block: 0,
            remaining: u64::from(inode.size),
        }
    }

    /// Next chunk of directory bytes: `min(remaining, zone_size)` bytes of
    /// the next allocated zone. Holes are passed over. `None` at the end.
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        while self.remaining > 0 {
            let block = self.block;
            let len = self.remaining.min(u64::from(self.geometry.zone_size));
            let zone = self.zones.resolve(block)?;
            self.block += 1;
            self.remaining -= len;

            let Some(zone) = zone else {
                warn!(ino = self.ino.0, block, "hole in directory");
                continue;
            };
            let offset = self.geometry.zone_offset(zone)?;
            let len = u64_to_usize(len, "dir_chunk").map_err(|e| parse_to_mfs_error(offset, &e))?;
            trace!(ino = self.ino.0, block, zone = zone.0, len, "scan directory zone");
            return read_vec(self.dev, offset, len).map(Some);
        }
        Ok(None)
    }
}

/// `NotDirectory` naming `path` unless `inode` is a directory.
fn ensure_dir(path: &str, inode: &MinixInode) -> Result<()> {
    if inode.is_dir() {
        Ok(())
    } else {
        Err(MfsError::NotDirectory {
            path: path.to_owned(),
        })
    }
}

/// Look up `name` in the directory at `path`. Returns the first live entry
/// whose name matches exactly. Names longer than 60 bytes never match.
pub fn lookup(
    dev: &dyn ByteDevice,
    geometry: &Geometry,
    path: &str,
    ino: InodeNumber,
    inode: &MinixInode,
    name: &[u8],
) -> Result<Option<InodeNumber>> {
    ensure_dir(path, inode)?;
    let mut walk = ZoneWalk::new(dev, geometry, ino, inode);
    while let Some(chunk) = walk.next_chunk()? {
        if let Some(entry) = DirEntryIter::new(&chunk).find(|entry| entry.name == name) {
            return Ok(Some(InodeNumber(entry.inode)));
        }
    }
    Ok(None)
}

/// Lazy enumeration of a directory's live entries, in on-disk order.
///
/// Zones are read one at a time as the iterator advances. After the first
/// error the iterator is fused.
pub struct DirEntries<'a> {
    walk: ZoneWalk<'a>,
    chunk: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<'a> DirEntries<'a> {
    /// Fails with `NotDirectory` naming `path` before any zone is read if
    /// `inode` is not a directory.
    pub fn new(
        dev: &'a dyn ByteDevice,
        geometry: &'a Geometry,
        path: &str,
        ino: InodeNumber,
        inode: &'a MinixInode,
    ) -> Result<Self> {
        ensure_dir(path, inode)?;
        Ok(Self {
            walk: ZoneWalk::new(dev, geometry, ino, inode),
            chunk: Vec::new(),
            pos: 0,
            done: false,
        })
    }
}

impl Iterator for DirEntries<'_> {
    type Item = Result<MinixDirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(slot) = self.chunk.get(self.pos..self.pos + MINIX_DIR_ENTRY_SIZE) {
                self.pos += MINIX_DIR_ENTRY_SIZE;
                // A full slot always decodes.
                match MinixDirEntryRef::parse_from_bytes(slot) {
                    Ok(entry) if entry.inode != 0 => return Some(Ok(entry.to_owned())),
                    _ => continue,
                }
            }
            match self.walk.next_chunk() {
                Ok(Some(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Ok(None) => {
                    self.done = true;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
