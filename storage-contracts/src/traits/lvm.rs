// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use storage_types::{LogicalVolume, VolumeGroup};

use crate::StorageError;

/// Logical volume lifecycle operations backed by the LVM tools.
///
/// Lookups return `Ok(None)` when the volume or its group does not exist;
/// `Err` is reserved for real failures.
#[async_trait]
pub trait LvmGateway: Send + Sync {
    async fn create_lv(
        &self,
        vg_name: &str,
        lv_name: &str,
        size: u64,
        tags: &[String],
    ) -> Result<(), StorageError>;

    async fn get_lv(&self, vg_name: &str, lv_name: &str)
    -> Result<Option<LogicalVolume>, StorageError>;

    async fn delete_lv(&self, vg_name: &str, lv_name: &str) -> Result<(), StorageError>;

    /// Extend to an absolute size, not a delta.
    async fn resize_lv(&self, vg_name: &str, lv_name: &str, size: u64)
    -> Result<(), StorageError>;

    async fn activate_lv(&self, vg_name: &str, lv_name: &str) -> Result<(), StorageError>;

    async fn deactivate_lv(&self, vg_name: &str, lv_name: &str) -> Result<(), StorageError>;

    async fn get_vg(&self, vg_name: &str) -> Result<Option<VolumeGroup>, StorageError>;
}
