//! Structured listing records handed to the boundary layer.

use mfs_ondisk::{MinixInode, permission_string};
use serde::{Deserialize, Serialize};

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub name: String,
    pub inode_number: u32,
    pub mode: u16,
    pub size: u32,
}

impl ListEntry {
    #[must_use]
    pub fn permission_string(&self) -> String {
        permission_string(self.mode)
    }
}

/// What `ls` shows for a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Listing {
    Directory {
        /// Canonical directory path.
        path: String,
        entries: Vec<ListEntry>,
    },
    File {
        /// Canonical path without its leading `/`.
        name: String,
        inode_number: u32,
        inode: MinixInode,
    },
}
