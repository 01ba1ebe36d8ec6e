// SPDX-License-Identifier: GPL-3.0-only

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use nix::sys::statvfs::{Statvfs, statvfs};
use storage_contracts::{CommandExecutor, StorageError, VolumeStatsProvider};
use storage_types::FilesystemStats;

use crate::exec::run_checked;
use crate::resize::parse_device_size;
use crate::{Result, SysError};

/// [`VolumeStatsProvider`] backed by `statvfs(3)` and `blockdev`.
#[derive(Clone)]
pub struct HostVolumeStats {
    executor: Arc<dyn CommandExecutor>,
}

impl HostVolumeStats {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

fn to_stats(vfs: &Statvfs) -> FilesystemStats {
    let unit = u64::from(vfs.fragment_size());
    let blocks = u64::from(vfs.blocks());
    let free = u64::from(vfs.blocks_free());
    let files = u64::from(vfs.files());
    let files_free = u64::from(vfs.files_free());

    FilesystemStats {
        available_bytes: u64::from(vfs.blocks_available()).saturating_mul(unit),
        total_bytes: blocks.saturating_mul(unit),
        used_bytes: blocks.saturating_sub(free).saturating_mul(unit),
        total_inodes: files,
        free_inodes: files_free,
        used_inodes: files.saturating_sub(files_free),
    }
}

async fn filesystem_stats(path: PathBuf) -> Result<FilesystemStats> {
    let vfs = tokio::task::spawn_blocking(move || statvfs(&path))
        .await
        .map_err(std::io::Error::other)?
        .map_err(std::io::Error::from)?;
    Ok(to_stats(&vfs))
}

#[async_trait]
impl VolumeStatsProvider for HostVolumeStats {
    async fn path_exists(&self, path: &Path) -> std::result::Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(path).await.map_err(SysError::from)?)
    }

    async fn is_block_device(&self, path: &Path) -> std::result::Result<bool, StorageError> {
        let metadata = tokio::fs::metadata(path).await.map_err(SysError::from)?;
        Ok(metadata.file_type().is_block_device())
    }

    async fn block_device_size(&self, path: &Path) -> std::result::Result<u64, StorageError> {
        let output = run_checked(
            self.executor.as_ref(),
            "blockdev",
            &["--getsize64".to_string(), path.display().to_string()],
        )
        .await?;

        Ok(parse_device_size(&output.stdout)?)
    }

    async fn filesystem_stats(&self, path: &Path) -> std::result::Result<FilesystemStats, StorageError> {
        Ok(filesystem_stats(path.to_path_buf()).await?)
    }
}
