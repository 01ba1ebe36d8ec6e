// SPDX-License-Identifier: GPL-3.0-only

//! LVM (Logical Volume Manager) types
//!
//! Point-in-time snapshots of logical volumes and volume groups as reported
//! by the LVM tools. Nothing here is cached; every query re-reads the tools.

use serde::{Deserialize, Serialize};

/// Position of the activation state in the `lv_attr` string.
const ACTIVATION_INDEX: usize = 4;

/// Raw `lv_attr` string as printed by `lvs`.
///
/// Only the activation axis is interpreted; every other position is kept
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LvAttr(String);

impl LvAttr {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the volume is active. A truncated string reads as inactive.
    pub fn is_active(&self) -> bool {
        self.0.as_bytes().get(ACTIVATION_INDEX) == Some(&b'a')
    }
}

impl From<&str> for LvAttr {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Logical volume information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalVolume {
    /// Logical volume name, unique within its group
    pub name: String,

    /// Owning volume group name
    pub vg_name: String,

    /// Allocated size in bytes (may exceed the requested size after extent rounding)
    pub size: u64,

    /// Tags attached with `--addtag`
    pub tags: Vec<String>,

    /// Raw attribute string
    pub attr: LvAttr,
}

impl LogicalVolume {
    pub fn is_active(&self) -> bool {
        self.attr.is_active()
    }

    /// Device node the kernel exposes once the volume is active.
    pub fn device_path(&self) -> String {
        device_path(&self.vg_name, &self.name)
    }
}

/// Volume group information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeGroup {
    /// Volume group name
    pub name: String,

    /// Unallocated space in bytes
    pub free: u64,
}

/// `/dev/<vg>/<lv>` for a logical volume.
pub fn device_path(vg_name: &str, lv_name: &str) -> String {
    format!("/dev/{vg_name}/{lv_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_reads_fifth_attr_character() {
        assert!(LvAttr::from("-wi-a-----").is_active());
        assert!(!LvAttr::from("-wi-------").is_active());
        assert!(!LvAttr::from("-wi-s-----").is_active());
    }

    #[test]
    fn short_attr_is_inactive() {
        assert!(!LvAttr::from("-wi").is_active());
        assert!(!LvAttr::default().is_active());
    }

    #[test]
    fn device_path_uses_group_and_name() {
        let lv = LogicalVolume {
            name: "pvc-1".to_string(),
            vg_name: "shared".to_string(),
            size: 4 * 1024 * 1024,
            tags: Vec::new(),
            attr: LvAttr::from("-wi-a-----"),
        };
        assert_eq!(lv.device_path(), "/dev/shared/pvc-1");
    }
}
