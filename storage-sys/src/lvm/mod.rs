// SPDX-License-Identifier: GPL-3.0-only

//! LVM command gateway: argument construction, execution and output parsing.

mod client;
pub mod tools;

pub use client::LvmClient;
pub use tools::NotFoundMatcher;

/// Tag attached to every logical volume this driver creates.
pub const OWNERSHIP_TAG: &str = "csi-shared-lvm.storage.dev";
