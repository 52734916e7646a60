//! Caller configuration for locating and opening a filesystem.

use mfs_error::{MfsError, Result};
use mfs_types::PARTITION_COUNT;
use serde::{Deserialize, Serialize};

/// How a subpartition table's `first_sector` values are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubpartitionAddressing {
    /// Sectors count from the start of the whole device.
    #[default]
    Absolute,
    /// Sectors count from the start of the enclosing partition.
    RelativeToPartition,
}

/// Options controlling how an image is opened.
///
/// Built once by the caller and passed by reference into
/// [`Filesystem::open`](crate::Filesystem::open). The default reads an
/// unpartitioned image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOptions {
    /// Primary partition index (0-3).
    pub partition: Option<u8>,
    /// Subpartition index (0-3) inside `partition`.
    pub subpartition: Option<u8>,
    pub subpartition_addressing: SubpartitionAddressing,
    /// Request diagnostic dumps. The core only records the request; the
    /// caller decides how to render them.
    pub verbose: bool,
}

impl OpenOptions {
    #[must_use]
    pub fn partition(mut self, index: u8) -> Self {
        self.partition = Some(index);
        self
    }

    #[must_use]
    pub fn subpartition(mut self, index: u8) -> Self {
        self.subpartition = Some(index);
        self
    }

    #[must_use]
    pub fn subpartition_addressing(mut self, addressing: SubpartitionAddressing) -> Self {
        self.subpartition_addressing = addressing;
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Reject inconsistent settings before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.subpartition.is_some() && self.partition.is_none() {
            return Err(MfsError::InvalidConfig(
                "a subpartition requires a partition".into(),
            ));
        }
        for index in [self.partition, self.subpartition].into_iter().flatten() {
            if index >= PARTITION_COUNT {
                return Err(MfsError::InvalidPartitionIndex { index });
            }
        }
        Ok(())
    }
}
