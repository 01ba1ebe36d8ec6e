// SPDX-License-Identifier: GPL-3.0-only

mod host;
pub mod mountinfo;

pub use host::HostMountOps;
pub use mountinfo::{MountEntry, parse_mountinfo};
