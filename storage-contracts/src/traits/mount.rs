// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use async_trait::async_trait;

use storage_types::MountReferences;

use crate::StorageError;

#[async_trait]
pub trait MountOps: Send + Sync {
    /// `false` for a path that is not mounted or does not exist.
    async fn is_mount_point(&self, path: &Path) -> Result<bool, StorageError>;

    async fn mount_references(&self, path: &Path) -> Result<MountReferences, StorageError>;

    /// Format `device` when it carries no filesystem, then mount it at `target`.
    async fn format_and_mount(
        &self,
        device: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), StorageError>;

    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: Option<&str>,
        options: &[String],
    ) -> Result<(), StorageError>;

    async fn unmount(&self, target: &Path) -> Result<(), StorageError>;

    /// Unmount `target` if mounted and remove the mount point directory.
    async fn cleanup_mount_point(&self, target: &Path) -> Result<(), StorageError>;

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError>;

    async fn ensure_file(&self, path: &Path) -> Result<(), StorageError>;

    /// Remove a file or empty directory; a missing path is not an error.
    async fn remove_path(&self, path: &Path) -> Result<(), StorageError>;
}
