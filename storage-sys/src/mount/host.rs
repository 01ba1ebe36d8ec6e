// SPDX-License-Identifier: GPL-3.0-only

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use storage_contracts::{CommandExecutor, MountOps, StorageError};
use storage_types::MountReferences;

use super::mountinfo::{self, MountEntry};
use crate::exec::run_checked;
use crate::{Result, SysError};

const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// `blkid` exit status when the device carries no recognised signature.
const BLKID_NOTHING_FOUND: i32 = 2;

/// What `blkid` found on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DeviceContent {
    Blank,
    Filesystem(String),
    PartitionTable(String),
}

/// [`MountOps`] against the host mount table and the util-linux tools.
#[derive(Clone)]
pub struct HostMountOps {
    executor: Arc<dyn CommandExecutor>,
    mountinfo_path: PathBuf,
}

impl HostMountOps {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            mountinfo_path: PathBuf::from(MOUNTINFO_PATH),
        }
    }

    /// Read the mount table from somewhere other than procfs.
    pub fn with_mountinfo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mountinfo_path = path.into();
        self
    }

    async fn mount_table(&self) -> Result<Vec<MountEntry>> {
        let raw = tokio::fs::read_to_string(&self.mountinfo_path).await?;
        mountinfo::parse_mountinfo(&raw)
    }

    async fn probe(&self, device: &str) -> Result<DeviceContent> {
        let args = ["-p", "-s", "TYPE", "-s", "PTTYPE", "-o", "export", device]
            .map(String::from)
            .to_vec();
        let output = self
            .executor
            .run("blkid", &args)
            .await
            .map_err(|source| SysError::Spawn {
                command: "blkid".to_string(),
                source,
            })?;

        if output.code == Some(BLKID_NOTHING_FOUND) {
            return Ok(DeviceContent::Blank);
        }
        if !output.success() {
            return Err(SysError::CommandFailed {
                command: format!("blkid {}", args.join(" ")),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(parse_blkid_export(&output.stdout))
    }

    async fn format(&self, device: &str, fs_type: &str) -> Result<()> {
        let mut args = Vec::new();
        if fs_type.starts_with("ext") {
            args.push("-F".to_string());
        } else if fs_type == "xfs" {
            args.push("-f".to_string());
        }
        args.push(device.to_string());

        tracing::info!(device, fs_type, "Formatting device");
        run_checked(self.executor.as_ref(), &format!("mkfs.{fs_type}"), &args).await?;
        Ok(())
    }

    async fn canonical(path: &Path) -> PathBuf {
        tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn parse_blkid_export(output: &str) -> DeviceContent {
    let mut fs_type = None;
    let mut pt_type = None;
    for line in output.lines() {
        match line.trim().split_once('=') {
            Some(("TYPE", value)) => fs_type = Some(value.to_string()),
            Some(("PTTYPE", value)) => pt_type = Some(value.to_string()),
            _ => {}
        }
    }

    match (fs_type, pt_type) {
        (Some(fs), _) => DeviceContent::Filesystem(fs),
        (None, Some(pt)) => DeviceContent::PartitionTable(pt),
        (None, None) => DeviceContent::Blank,
    }
}

fn mount_args(source: &str, target: &Path, fs_type: Option<&str>, options: &[String]) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(fs_type) = fs_type.filter(|fs| !fs.is_empty()) {
        args.push("-t".to_string());
        args.push(fs_type.to_string());
    }
    if !options.is_empty() {
        args.push("-o".to_string());
        args.push(options.join(","));
    }
    args.push(source.to_string());
    args.push(target.display().to_string());
    args
}

#[async_trait]
impl MountOps for HostMountOps {
    async fn is_mount_point(&self, path: &Path) -> std::result::Result<bool, StorageError> {
        if !tokio::fs::try_exists(path).await.map_err(SysError::from)? {
            return Ok(false);
        }

        let path = Self::canonical(path).await;
        let table = self.mount_table().await?;
        Ok(mountinfo::is_mount_point(&table, &path))
    }

    async fn mount_references(
        &self,
        path: &Path,
    ) -> std::result::Result<MountReferences, StorageError> {
        let path = Self::canonical(path).await;
        let table = self.mount_table().await?;
        Ok(mountinfo::references(&table, &path))
    }

    async fn format_and_mount(
        &self,
        device: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> std::result::Result<(), StorageError> {
        self.ensure_directory(target).await?;

        match self.probe(device).await? {
            DeviceContent::Blank => self.format(device, fs_type).await?,
            DeviceContent::Filesystem(existing) if existing != fs_type => {
                tracing::warn!(
                    device,
                    existing = %existing,
                    requested = fs_type,
                    "Device already carries a different filesystem"
                );
            }
            DeviceContent::Filesystem(_) => {}
            DeviceContent::PartitionTable(pt) => {
                return Err(StorageError::internal(format!(
                    "{device} holds a {pt} partition table, refusing to format"
                )));
            }
        }

        self.mount(device, target, Some(fs_type), options).await
    }

    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: Option<&str>,
        options: &[String],
    ) -> std::result::Result<(), StorageError> {
        let args = mount_args(source, target, fs_type, options);
        run_checked(self.executor.as_ref(), "mount", &args).await?;
        tracing::info!(source, path = %target.display(), "Mounted");
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> std::result::Result<(), StorageError> {
        run_checked(
            self.executor.as_ref(),
            "umount",
            &[target.display().to_string()],
        )
        .await?;
        tracing::info!(path = %target.display(), "Unmounted");
        Ok(())
    }

    async fn cleanup_mount_point(&self, target: &Path) -> std::result::Result<(), StorageError> {
        if self.is_mount_point(target).await? {
            self.unmount(target).await?;
        }
        self.remove_path(target).await
    }

    async fn ensure_directory(&self, path: &Path) -> std::result::Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(SysError::from)?;
        Ok(())
    }

    async fn ensure_file(&self, path: &Path) -> std::result::Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(SysError::from)?;
        }
        tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .await
            .map_err(SysError::from)?;
        Ok(())
    }

    async fn remove_path(&self, path: &Path) -> std::result::Result<(), StorageError> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(SysError::from(err).into()),
        };

        let removed = if metadata.is_dir() {
            tokio::fs::remove_dir(path).await
        } else {
            tokio::fs::remove_file(path).await
        };

        match removed {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SysError::from(err).into()),
        }
    }
}
