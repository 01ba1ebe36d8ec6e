// SPDX-License-Identifier: GPL-3.0-only

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storage_contracts::{MountOps, StorageError};
use storage_types::MountReferences;

use crate::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    FormatAndMount {
        device: String,
        target: PathBuf,
        fs_type: String,
        options: Vec<String>,
    },
    Mount {
        source: String,
        target: PathBuf,
        fs_type: Option<String>,
        options: Vec<String>,
    },
    Unmount(PathBuf),
    CleanupMountPoint(PathBuf),
    EnsureDirectory(PathBuf),
    EnsureFile(PathBuf),
    RemovePath(PathBuf),
}

#[derive(Default)]
struct State {
    /// Mount point to the device backing it.
    mounts: BTreeMap<PathBuf, String>,
    paths: BTreeSet<PathBuf>,
    fail_mounts: Option<String>,
    calls: Vec<MountCall>,
}

impl State {
    fn attach(&mut self, source: &str, target: &Path) {
        let device = self
            .mounts
            .get(Path::new(source))
            .cloned()
            .unwrap_or_else(|| source.to_string());
        self.mounts.insert(target.to_path_buf(), device);
        self.paths.insert(target.to_path_buf());
    }

    fn check(&self) -> Result<(), StorageError> {
        match &self.fail_mounts {
            Some(message) => Err(StorageError::internal(message.clone())),
            None => Ok(()),
        }
    }
}

/// Mount table kept in memory.
///
/// Bind-mounting an existing mount point shares its device, so reference
/// counts behave like the kernel's.
#[derive(Clone, Default)]
pub struct FakeMounter {
    state: Arc<Mutex<State>>,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mount(self, device: &str, target: impl Into<PathBuf>) -> Self {
        lock(&self.state).attach(device, &target.into());
        self
    }

    /// Make format and mount operations fail.
    pub fn fail_mounts(&self, message: &str) {
        lock(&self.state).fail_mounts = Some(message.to_string());
    }

    pub fn is_mounted(&self, target: impl AsRef<Path>) -> bool {
        lock(&self.state).mounts.contains_key(target.as_ref())
    }

    pub fn path_exists(&self, path: impl AsRef<Path>) -> bool {
        lock(&self.state).paths.contains(path.as_ref())
    }

    pub fn calls(&self) -> Vec<MountCall> {
        lock(&self.state).calls.clone()
    }

    pub fn take_calls(&self) -> Vec<MountCall> {
        std::mem::take(&mut lock(&self.state).calls)
    }
}

#[async_trait]
impl MountOps for FakeMounter {
    async fn is_mount_point(&self, path: &Path) -> Result<bool, StorageError> {
        Ok(lock(&self.state).mounts.contains_key(path))
    }

    async fn mount_references(&self, path: &Path) -> Result<MountReferences, StorageError> {
        let state = lock(&self.state);
        let Some(device) = state.mounts.get(path) else {
            return Ok(MountReferences::default());
        };

        let count = state.mounts.values().filter(|other| *other == device).count();
        Ok(MountReferences {
            device: Some(device.clone()),
            count,
        })
    }

    async fn format_and_mount(
        &self,
        device: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(MountCall::FormatAndMount {
            device: device.to_string(),
            target: target.to_path_buf(),
            fs_type: fs_type.to_string(),
            options: options.to_vec(),
        });
        state.check()?;
        state.attach(device, target);
        Ok(())
    }

    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: Option<&str>,
        options: &[String],
    ) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(MountCall::Mount {
            source: source.to_string(),
            target: target.to_path_buf(),
            fs_type: fs_type.map(str::to_string),
            options: options.to_vec(),
        });
        state.check()?;
        state.attach(source, target);
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(MountCall::Unmount(target.to_path_buf()));
        state.mounts.remove(target);
        Ok(())
    }

    async fn cleanup_mount_point(&self, target: &Path) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state
            .calls
            .push(MountCall::CleanupMountPoint(target.to_path_buf()));
        state.mounts.remove(target);
        state.paths.remove(target);
        Ok(())
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(MountCall::EnsureDirectory(path.to_path_buf()));
        state.paths.insert(path.to_path_buf());
        Ok(())
    }

    async fn ensure_file(&self, path: &Path) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(MountCall::EnsureFile(path.to_path_buf()));
        state.paths.insert(path.to_path_buf());
        Ok(())
    }

    async fn remove_path(&self, path: &Path) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(MountCall::RemovePath(path.to_path_buf()));
        state.paths.remove(path);
        Ok(())
    }
}
