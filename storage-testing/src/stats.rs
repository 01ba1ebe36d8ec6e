// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storage_contracts::{StorageError, VolumeStatsProvider};
use storage_types::FilesystemStats;

use crate::lock;

#[derive(Debug, Clone, Copy)]
enum Entry {
    Block(u64),
    Filesystem(FilesystemStats),
}

/// [`VolumeStatsProvider`] over a fixed set of paths.
#[derive(Clone, Default)]
pub struct FakeStats {
    entries: Arc<Mutex<HashMap<PathBuf, Entry>>>,
}

impl FakeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_device(self, path: impl Into<PathBuf>, size: u64) -> Self {
        lock(&self.entries).insert(path.into(), Entry::Block(size));
        self
    }

    pub fn with_filesystem(self, path: impl Into<PathBuf>, stats: FilesystemStats) -> Self {
        lock(&self.entries).insert(path.into(), Entry::Filesystem(stats));
        self
    }

    fn entry(&self, path: &Path) -> Result<Entry, StorageError> {
        lock(&self.entries)
            .get(path)
            .copied()
            .ok_or_else(|| StorageError::internal(format!("{} does not exist", path.display())))
    }
}

#[async_trait]
impl VolumeStatsProvider for FakeStats {
    async fn path_exists(&self, path: &Path) -> Result<bool, StorageError> {
        Ok(lock(&self.entries).contains_key(path))
    }

    async fn is_block_device(&self, path: &Path) -> Result<bool, StorageError> {
        Ok(matches!(self.entry(path)?, Entry::Block(_)))
    }

    async fn block_device_size(&self, path: &Path) -> Result<u64, StorageError> {
        match self.entry(path)? {
            Entry::Block(size) => Ok(size),
            Entry::Filesystem(_) => Err(StorageError::internal(format!(
                "{} is not a block device",
                path.display()
            ))),
        }
    }

    async fn filesystem_stats(&self, path: &Path) -> Result<FilesystemStats, StorageError> {
        match self.entry(path)? {
            Entry::Filesystem(stats) => Ok(stats),
            Entry::Block(_) => Err(StorageError::internal(format!(
                "{} holds no filesystem",
                path.display()
            ))),
        }
    }
}
