// SPDX-License-Identifier: GPL-3.0-only

//! Shared-LVM CSI plugin
//!
//! Implements the CSI Identity, Controller and Node services on top of LVM
//! volume groups that live on a block device shared by every node. The
//! controller carves logical volumes out of a group; each node activates,
//! formats and mounts them on demand.

/// CSI v1 generated types
pub mod csi {
    tonic::include_proto!("csi.v1");
}

pub mod config;
pub mod controller;
pub mod endpoint;
pub mod error;
pub mod identity;
pub mod locks;
pub mod node;
pub mod server;

mod capability;

pub use controller::ControllerService;
pub use endpoint::Endpoint;
pub use error::{Result, ServiceError};
pub use identity::IdentityService;
pub use node::NodeService;
pub use server::Services;

/// Name the plugin reports to the orchestrator.
pub const DRIVER_NAME: &str = "csi-shared-lvm.storage.dev";

/// Creation parameter naming the volume group to allocate from.
pub const VOLUME_GROUP_PARAMETER: &str = "volumeGroup";
