// SPDX-License-Identifier: GPL-3.0-only

//! Helpers over `VolumeCapability`.

use crate::csi::VolumeCapability;
use crate::csi::volume_capability::{AccessType, MountVolume};

/// Filesystem used when a mount capability does not name one.
pub(crate) const DEFAULT_FS_TYPE: &str = "ext4";

pub(crate) fn is_block(capability: Option<&VolumeCapability>) -> bool {
    matches!(
        capability.and_then(|cap| cap.access_type.as_ref()),
        Some(AccessType::Block(_))
    )
}

fn mount_volume(capability: &VolumeCapability) -> Option<&MountVolume> {
    match capability.access_type.as_ref() {
        Some(AccessType::Mount(mount)) => Some(mount),
        _ => None,
    }
}

/// Requested filesystem type, or `None` when the capability leaves it open.
pub(crate) fn fs_type(capability: &VolumeCapability) -> Option<&str> {
    mount_volume(capability)
        .map(|mount| mount.fs_type.as_str())
        .filter(|fs| !fs.is_empty())
}

pub(crate) fn mount_flags(capability: &VolumeCapability) -> Vec<String> {
    mount_volume(capability)
        .map(|mount| mount.mount_flags.clone())
        .unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{block, mount};
    use super::*;

    #[test]
    fn distinguishes_block_from_mount() {
        assert!(is_block(Some(&block())));
        assert!(!is_block(Some(&mount("", &[]))));
        assert!(!is_block(None));
    }

    #[test]
    fn reads_fs_type_and_flags() {
        let cap = mount("xfs", &["noatime"]);
        assert_eq!(fs_type(&cap), Some("xfs"));
        assert_eq!(mount_flags(&cap), vec!["noatime".to_string()]);

        assert_eq!(fs_type(&mount("", &[])), None);
        assert_eq!(fs_type(&block()), None);
        assert!(mount_flags(&block()).is_empty());
    }
}
