// SPDX-License-Identifier: GPL-3.0-only

//! Online filesystem growth for ext2/3/4 and xfs.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use storage_contracts::{CommandExecutor, FilesystemResizer, StorageError};

use crate::exec::run_checked;
use crate::{Result, SysError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FsFamily {
    Ext,
    Xfs,
}

impl FsFamily {
    fn from_type(fs_type: &str) -> Option<Self> {
        match fs_type {
            "ext2" | "ext3" | "ext4" => Some(Self::Ext),
            "xfs" => Some(Self::Xfs),
            _ => None,
        }
    }
}

/// Size of a filesystem as reported by its own tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FsGeometry {
    block_size: u64,
    block_count: u64,
}

impl FsGeometry {
    fn bytes(&self) -> u64 {
        self.block_size.saturating_mul(self.block_count)
    }
}

/// [`FilesystemResizer`] that detects the filesystem with `blkid` and grows
/// it with `resize2fs` or `xfs_growfs`.
#[derive(Clone)]
pub struct HostResizer {
    executor: Arc<dyn CommandExecutor>,
}

impl HostResizer {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        Ok(run_checked(self.executor.as_ref(), program, &args)
            .await?
            .stdout)
    }

    async fn fs_family(&self, device: &str) -> Result<FsFamily> {
        let stdout = self
            .run("blkid", &["-p", "-s", "TYPE", "-o", "value", device])
            .await?;
        let fs_type = stdout.trim();
        FsFamily::from_type(fs_type).ok_or_else(|| {
            SysError::Unsupported(format!("resizing {fs_type:?} filesystems on {device}"))
        })
    }

    async fn device_size(&self, device: &str) -> Result<u64> {
        let stdout = self.run("blockdev", &["--getsize64", device]).await?;
        parse_device_size(&stdout)
    }

    async fn fs_geometry(&self, family: FsFamily, device: &str, mount_path: &Path) -> Result<FsGeometry> {
        match family {
            FsFamily::Ext => {
                let stdout = self.run("dumpe2fs", &["-h", device]).await?;
                parse_dumpe2fs(&stdout)
            }
            FsFamily::Xfs => {
                let mount_path = mount_path.display().to_string();
                let stdout = self.run("xfs_io", &["-c", "statfs", &mount_path]).await?;
                parse_xfs_statfs(&stdout)
            }
        }
    }
}

pub(crate) fn parse_device_size(output: &str) -> Result<u64> {
    output.trim().parse().map_err(|_| SysError::Parse {
        what: "block device size",
        output: output.to_string(),
    })
}

fn field<'a>(output: &'a str, key: &str, separator: char) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let (name, value) = line.split_once(separator)?;
        (name.trim() == key).then(|| value.trim())
    })
}

fn numeric_field(output: &str, key: &str, separator: char, what: &'static str) -> Result<u64> {
    field(output, key, separator)
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| SysError::Parse {
            what,
            output: output.to_string(),
        })
}

fn parse_dumpe2fs(output: &str) -> Result<FsGeometry> {
    Ok(FsGeometry {
        block_size: numeric_field(output, "Block size", ':', "dumpe2fs block size")?,
        block_count: numeric_field(output, "Block count", ':', "dumpe2fs block count")?,
    })
}

fn parse_xfs_statfs(output: &str) -> Result<FsGeometry> {
    Ok(FsGeometry {
        block_size: numeric_field(output, "geom.bsize", '=', "xfs block size")?,
        block_count: numeric_field(output, "geom.datablocks", '=', "xfs data blocks")?,
    })
}

#[async_trait]
impl FilesystemResizer for HostResizer {
    async fn needs_resize(&self, device: &str, mount_path: &Path) -> std::result::Result<bool, StorageError> {
        let family = self.fs_family(device).await?;
        let device_size = self.device_size(device).await?;
        let geometry = self.fs_geometry(family, device, mount_path).await?;

        let needed = device_size > geometry.bytes().saturating_add(geometry.block_size);
        tracing::debug!(
            device,
            device_size,
            fs_size = geometry.bytes(),
            needed,
            "Checked filesystem size"
        );
        Ok(needed)
    }

    async fn resize(&self, device: &str, mount_path: &Path) -> std::result::Result<(), StorageError> {
        let family = self.fs_family(device).await?;
        tracing::info!(device, path = %mount_path.display(), ?family, "Growing filesystem");

        match family {
            FsFamily::Ext => self.run("resize2fs", &[device]).await?,
            FsFamily::Xfs => {
                let mount_path = mount_path.display().to_string();
                self.run("xfs_growfs", &["-d", &mount_path]).await?
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use storage_contracts::StorageErrorKind;

    use super::*;
    use crate::exec::testing::FakeExecutor;

    const DUMPE2FS: &str = "\
dumpe2fs 1.47.0 (5-Feb-2023)
Filesystem volume name:   <none>
Block count:              262144
Reserved block count:     13107
Block size:               4096
";

    const XFS_STATFS: &str = "\
fd.path = \"/mnt/data\"
statfs.f_bsize = 4096
geom.bsize = 4096
geom.agcount = 4
geom.datablocks = 524288
";

    #[test]
    fn parses_ext_geometry() {
        let geometry = parse_dumpe2fs(DUMPE2FS).expect("parse");
        assert_eq!(geometry.block_count, 262144);
        assert_eq!(geometry.bytes(), 1024 * 1024 * 1024);
    }

    #[test]
    fn parses_xfs_geometry() {
        let geometry = parse_xfs_statfs(XFS_STATFS).expect("parse");
        assert_eq!(geometry.bytes(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn missing_fields_are_parse_errors() {
        assert!(parse_dumpe2fs("Block count: 12\n").is_err());
        assert!(parse_device_size("lots").is_err());
    }

    #[tokio::test]
    async fn ext_needs_resize_when_device_grew() {
        let executor = FakeExecutor::default();
        executor
            .reply(0, "ext4\n", "")
            .reply(0, "2147483648\n", "")
            .reply(0, DUMPE2FS, "");
        let resizer = HostResizer::new(Arc::new(executor.clone()));

        let needed = resizer
            .needs_resize("/dev/vg1/lv1", Path::new("/staging"))
            .await
            .expect("check");
        assert!(needed);
        assert_eq!(
            executor.take_calls(),
            vec![
                "blkid -p -s TYPE -o value /dev/vg1/lv1".to_string(),
                "blockdev --getsize64 /dev/vg1/lv1".to_string(),
                "dumpe2fs -h /dev/vg1/lv1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn slack_within_one_block_needs_no_resize() {
        let executor = FakeExecutor::default();
        executor
            .reply(0, "xfs\n", "")
            .reply(0, "2147487744\n", "")
            .reply(0, XFS_STATFS, "");
        let resizer = HostResizer::new(Arc::new(executor.clone()));

        assert!(
            !resizer
                .needs_resize("/dev/vg1/lv1", Path::new("/mnt/data"))
                .await
                .expect("check")
        );
    }

    #[tokio::test]
    async fn grows_with_filesystem_specific_tool() {
        let executor = FakeExecutor::default();
        executor.reply(0, "ext4\n", "");
        executor.reply(0, "", "");
        executor.reply(0, "xfs\n", "");
        let resizer = HostResizer::new(Arc::new(executor.clone()));

        resizer
            .resize("/dev/vg1/lv1", Path::new("/staging"))
            .await
            .expect("ext resize");
        resizer
            .resize("/dev/vg1/lv2", Path::new("/mnt/data"))
            .await
            .expect("xfs resize");

        let calls = executor.take_calls();
        assert_eq!(calls[1], "resize2fs /dev/vg1/lv1");
        assert_eq!(calls[3], "xfs_growfs -d /mnt/data");
    }

    #[tokio::test]
    async fn unknown_filesystem_is_unsupported() {
        let executor = FakeExecutor::default();
        executor.reply(0, "vfat\n", "");
        let resizer = HostResizer::new(Arc::new(executor.clone()));

        let err = resizer
            .resize("/dev/vg1/lv1", Path::new("/staging"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::Unsupported);
    }
}
