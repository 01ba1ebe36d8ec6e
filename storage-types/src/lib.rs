// SPDX-License-Identifier: GPL-3.0-only

//! Domain models shared by the LVM CSI driver
//!
//! - **storage-sys**: parses LVM tool output into these types
//! - **storage-contracts**: capability traits speak in these types
//! - **storage-service**: maps them onto CSI messages

pub mod lvm;
pub mod mount;
pub mod volume_id;

pub use lvm::{LogicalVolume, LvAttr, VolumeGroup, device_path};
pub use mount::{FilesystemStats, MountReferences};
pub use volume_id::{InvalidVolumeId, VolumeId};
