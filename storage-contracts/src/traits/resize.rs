// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use async_trait::async_trait;

use crate::StorageError;

#[async_trait]
pub trait FilesystemResizer: Send + Sync {
    /// Whether the filesystem on `device` is smaller than the device itself.
    async fn needs_resize(&self, device: &str, mount_path: &Path) -> Result<bool, StorageError>;

    /// Grow the filesystem on `device`, mounted at `mount_path`, to fill the device.
    async fn resize(&self, device: &str, mount_path: &Path) -> Result<(), StorageError>;
}
