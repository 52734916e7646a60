#![forbid(unsafe_code)]
//! Read-only byte device layer.
//!
//! Provides the `ByteDevice` trait (pread semantics, no shared seek
//! position), a file-backed implementation, and an in-memory one used by
//! fixtures and tests.

use mfs_error::{MfsError, Result};
use mfs_types::ByteOffset;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Byte-addressed, read-only device for fixed-offset I/O.
pub trait ByteDevice {
    /// Total length in bytes.
    fn len_bytes(&self) -> u64;

    /// Read exactly `buf.len()` bytes from `offset` into `buf`.
    ///
    /// A read that would run past the end of the device fails with
    /// `MfsError::Io` of kind `UnexpectedEof`.
    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()>;
}

impl<T: ByteDevice + ?Sized> ByteDevice for &T {
    fn len_bytes(&self) -> u64 {
        (**self).len_bytes()
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        (**self).read_exact_at(offset, buf)
    }
}

impl<T: ByteDevice + ?Sized> ByteDevice for Box<T> {
    fn len_bytes(&self) -> u64 {
        (**self).len_bytes()
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        (**self).read_exact_at(offset, buf)
    }
}

/// Read `len` bytes at `offset` into a fresh buffer.
pub fn read_vec(dev: &dyn ByteDevice, offset: ByteOffset, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0_u8; len];
    dev.read_exact_at(offset, &mut buf)?;
    Ok(buf)
}

fn check_bounds(offset: ByteOffset, len: usize, device_len: u64) -> Result<()> {
    let end = u64::try_from(len)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .ok_or_else(|| {
            MfsError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("read range overflows u64: offset={offset} len={len}"),
            ))
        })?;
    if end.0 > device_len {
        return Err(MfsError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("read out of bounds: offset={offset} len={len} device_len={device_len}"),
        )));
    }
    Ok(())
}

/// File-backed byte device using `pread`-style positioned reads.
///
/// `std::os::unix::fs::FileExt` does not touch the file's seek position,
/// so every read names its own absolute offset.
#[derive(Debug)]
pub struct FileByteDevice {
    file: File,
    len: u64,
}

impl FileByteDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file(File::open(path.as_ref())?)
    }

    pub fn from_file(file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteDevice for FileByteDevice {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        check_bounds(offset, buf.len(), self.len)?;
        self.file.read_exact_at(buf, offset.0)?;
        Ok(())
    }
}

/// In-memory byte device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemByteDevice {
    bytes: Vec<u8>,
}

impl MemByteDevice {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<Vec<u8>> for MemByteDevice {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl ByteDevice for MemByteDevice {
    fn len_bytes(&self) -> u64 {
        u64::try_from(self.bytes.len()).unwrap_or(u64::MAX)
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        check_bounds(offset, buf.len(), self.len_bytes())?;
        // In bounds, so the offset fits in usize.
        let start = usize::try_from(offset.0).map_err(|_| {
            MfsError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "offset exceeds address space",
            ))
        })?;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }
}
