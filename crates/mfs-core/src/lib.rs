#![forbid(unsafe_code)]
//! Read-only access to MINIX v3 filesystem images.
//!
//! Opening an image runs the Partition Resolver and the Superblock Reader
//! once and yields an immutable [`Filesystem`]. Every later operation
//! (inode reads, path walks, directory listings, file extraction) reads
//! relative to the base offset fixed at open time.
//!
//! # Opening a filesystem
//!
//! ```ignore
//! let fs = Filesystem::open("disk.img", &OpenOptions::default().partition(0))?;
//! let bytes = fs.read_to_vec("/etc/motd")?;
//! ```

pub mod dir;
pub mod extract;
pub mod inode;
pub mod listing;
pub mod options;
pub mod partition;
pub mod path;
pub mod superblock;
pub mod zone;

pub use dir::DirEntries;
pub use inode::InodeTable;
pub use listing::{ListEntry, Listing};
pub use options::{OpenOptions, SubpartitionAddressing};
pub use path::normalize_path;
pub use superblock::Geometry;
pub use zone::ZoneMap;

use mfs_block::{ByteDevice, FileByteDevice};
use mfs_error::{MfsError, Result};
use mfs_ondisk::{MinixInode, MinixSuperblock};
use mfs_types::{ByteOffset, InodeNumber, ParseError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// A path resolved to its inode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolved {
    /// Canonical form of the requested path.
    pub path: String,
    pub ino: InodeNumber,
    pub inode: MinixInode,
}

/// An opened MINIX filesystem.
pub struct Filesystem {
    dev: Box<dyn ByteDevice>,
    options: OpenOptions,
    superblock: MinixSuperblock,
    geometry: Geometry,
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("options", &self.options)
            .field("superblock", &self.superblock)
            .field("geometry", &self.geometry)
            .field("dev_len", &self.dev.len_bytes())
            .finish()
    }
}

impl Filesystem {
    /// Open the image file at `path` read-only.
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        options.validate()?;
        let dev = FileByteDevice::open(path.as_ref())?;
        Self::from_device(Box::new(dev), options)
    }

    /// Open a filesystem on an already-opened device.
    pub fn from_device(dev: Box<dyn ByteDevice>, options: &OpenOptions) -> Result<Self> {
        let base_offset = partition::resolve_base_offset(&*dev, options)?;
        let (superblock, geometry) = superblock::read_superblock(&*dev, base_offset)?;
        Ok(Self {
            dev,
            options: options.clone(),
            superblock,
            geometry,
        })
    }

    #[must_use]
    pub fn device(&self) -> &dyn ByteDevice {
        &*self.dev
    }

    #[must_use]
    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// The decoded superblock, for diagnostic dumps.
    #[must_use]
    pub fn superblock(&self) -> &MinixSuperblock {
        &self.superblock
    }

    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[must_use]
    pub fn base_offset(&self) -> ByteOffset {
        self.geometry.base_offset
    }

    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.geometry.block_size
    }

    #[must_use]
    pub fn zone_size(&self) -> u32 {
        self.geometry.zone_size
    }

    #[must_use]
    pub fn inode_table(&self) -> InodeTable<'_> {
        InodeTable::new(&*self.dev, &self.geometry)
    }

    pub fn read_inode(&self, ino: InodeNumber) -> Result<MinixInode> {
        self.inode_table().get(ino)
    }

    // ── Path resolution ─────────────────────────────────────────────────

    /// Resolve `path` starting from the root inode.
    ///
    /// Every component but the last must name a directory
    /// (`NotDirectory` otherwise); a component with no live entry fails
    /// with `NotFound`. `/` resolves to the root without a directory read.
    pub fn resolve(&self, path: &str) -> Result<Resolved> {
        let canonical = normalize_path(Some(path));
        let mut ino = InodeNumber::ROOT;
        let mut inode = self.read_inode(ino)?;
        let mut walked = String::with_capacity(canonical.len());

        for component in path::components(&canonical) {
            let dir_path = if walked.is_empty() { "/" } else { walked.as_str() };
            let child = dir::lookup(
                &*self.dev,
                &self.geometry,
                dir_path,
                ino,
                &inode,
                component.as_bytes(),
            )?;
            walked.push('/');
            walked.push_str(component);
            ino = child.ok_or_else(|| MfsError::NotFound {
                path: walked.clone(),
            })?;
            inode = self.read_inode(ino)?;
        }

        debug!(path = %canonical, ino = ino.0, "resolved path");
        Ok(Resolved {
            path: canonical,
            ino,
            inode,
        })
    }

    // ── Directories ─────────────────────────────────────────────────────

    /// Lazily enumerate the live entries of a resolved directory.
    pub fn read_dir<'a>(&'a self, dir: &'a Resolved) -> Result<DirEntries<'a>> {
        DirEntries::new(&*self.dev, &self.geometry, &dir.path, dir.ino, &dir.inode)
    }

    /// Lazily enumerate a directory, reading each child's inode for its
    /// mode and size.
    pub fn list_entries<'a>(
        &'a self,
        dir: &'a Resolved,
    ) -> Result<impl Iterator<Item = Result<ListEntry>> + 'a> {
        let entries = self.read_dir(dir)?;
        Ok(entries.map(move |entry| {
            let entry = entry?;
            let child = self.read_inode(InodeNumber(entry.inode))?;
            Ok(ListEntry {
                name: entry.name_str(),
                inode_number: entry.inode,
                mode: child.mode,
                size: child.size,
            })
        }))
    }

    /// What `ls` shows for `path`: the entries of a directory, or the
    /// target itself for anything else.
    pub fn list(&self, path: &str) -> Result<Listing> {
        let target = self.resolve(path)?;
        if target.inode.is_dir() {
            let entries = self.list_entries(&target)?.collect::<Result<Vec<_>>>()?;
            return Ok(Listing::Directory {
                path: target.path.clone(),
                entries,
            });
        }
        Ok(Listing::File {
            name: path::display_name(&target.path).to_owned(),
            inode_number: target.ino.0,
            inode: target.inode,
        })
    }

    // ── File content ────────────────────────────────────────────────────

    /// Stream the content of a resolved regular file to `sink`.
    pub fn extract<W: Write + ?Sized>(&self, file: &Resolved, sink: &mut W) -> Result<u64> {
        extract::extract_to(&*self.dev, &self.geometry, file.ino, &file.inode, sink)
    }

    /// Resolve `path` and stream its content to `sink`. Returns the number
    /// of bytes written, which always equals the inode's size.
    pub fn read_file<W: Write + ?Sized>(&self, path: &str, sink: &mut W) -> Result<u64> {
        let file = self.resolve(path)?;
        self.extract(&file, sink)
    }

    pub fn read_to_vec(&self, path: &str) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_file(path, &mut out)?;
        Ok(out)
    }
}

/// Convert a decode failure on metadata read from `offset`.
pub(crate) fn parse_to_mfs_error(offset: ByteOffset, e: &ParseError) -> MfsError {
    MfsError::Corruption {
        offset: offset.0,
        detail: e.to_string(),
    }
}
