// SPDX-License-Identifier: GPL-3.0-only

//! Host-side operations for the shared-LVM CSI driver
//!
//! This crate talks to the machine the driver runs on:
//! - LVM command construction, execution and output parsing
//! - Mount table inspection, formatting and (bind) mounting
//! - Online filesystem growth
//! - Block device and filesystem usage statistics
//!
//! Everything here needs root and is only called from storage-service.

pub mod error;
pub mod exec;
pub mod lvm;
pub mod mount;
pub mod resize;
pub mod stats;

pub use error::{Result, SysError};
pub use exec::ProcessExecutor;
pub use lvm::{LvmClient, OWNERSHIP_TAG};
pub use mount::HostMountOps;
pub use resize::HostResizer;
pub use stats::HostVolumeStats;

/// Programs the controller shells out to.
pub const CONTROLLER_TOOLS: &[&str] = &["lvcreate", "lvs", "lvremove", "lvextend", "vgs"];

/// Programs the node shells out to.
pub const NODE_TOOLS: &[&str] = &[
    "lvs",
    "lvchange",
    "blkid",
    "blockdev",
    "mount",
    "umount",
    "mkfs.ext4",
    "resize2fs",
    "dumpe2fs",
];

/// The subset of `tools` that cannot be found on `PATH`.
pub fn missing_tools<'a>(tools: &[&'a str]) -> Vec<&'a str> {
    tools
        .iter()
        .copied()
        .filter(|tool| which::which(tool).is_err())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_tools_absent_from_path() {
        let missing = missing_tools(&["sh", "definitely-not-an-lvm-tool"]);
        assert_eq!(missing, vec!["definitely-not-an-lvm-tool"]);
    }
}
