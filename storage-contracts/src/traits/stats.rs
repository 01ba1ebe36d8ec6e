// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use async_trait::async_trait;

use storage_types::FilesystemStats;

use crate::StorageError;

#[async_trait]
pub trait VolumeStatsProvider: Send + Sync {
    async fn path_exists(&self, path: &Path) -> Result<bool, StorageError>;

    async fn is_block_device(&self, path: &Path) -> Result<bool, StorageError>;

    async fn block_device_size(&self, path: &Path) -> Result<u64, StorageError>;

    async fn filesystem_stats(&self, path: &Path) -> Result<FilesystemStats, StorageError>;
}
