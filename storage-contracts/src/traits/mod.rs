// SPDX-License-Identifier: GPL-3.0-only

pub mod exec;
pub mod lvm;
pub mod mount;
pub mod resize;
pub mod stats;

pub use exec::{CommandExecutor, CommandOutput};
pub use lvm::LvmGateway;
pub use mount::MountOps;
pub use resize::FilesystemResizer;
pub use stats::VolumeStatsProvider;
