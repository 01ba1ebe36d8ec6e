// SPDX-License-Identifier: GPL-3.0-only

//! Capability contracts between the CSI services and the host
//!
//! Services receive these as `Arc<dyn Trait>` at construction time so tests
//! can substitute recording fakes.

pub mod protocol;
pub mod traits;

pub use protocol::{StorageError, StorageErrorKind};
pub use traits::{
    CommandExecutor, CommandOutput, FilesystemResizer, LvmGateway, MountOps, VolumeStatsProvider,
};
