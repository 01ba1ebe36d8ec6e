// SPDX-License-Identifier: GPL-3.0-only

//! Mount table and filesystem usage snapshots

use serde::{Deserialize, Serialize};

/// How many mount table entries share the device mounted at a path.
///
/// A path that is not a mount point has `count == 0` and no device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountReferences {
    pub device: Option<String>,
    pub count: usize,
}

impl MountReferences {
    pub fn is_mounted(&self) -> bool {
        self.count > 0
    }
}

/// Byte and inode usage of a mounted filesystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemStats {
    pub available_bytes: u64,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
    pub used_inodes: u64,
}
