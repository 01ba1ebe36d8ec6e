// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storage_contracts::{FilesystemResizer, StorageError};

use crate::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeCall {
    NeedsResize { device: String, path: PathBuf },
    Resize { device: String, path: PathBuf },
}

#[derive(Default)]
struct State {
    needs_resize: bool,
    fail: Option<String>,
    calls: Vec<ResizeCall>,
}

/// [`FilesystemResizer`] fake; by default nothing needs growing.
#[derive(Clone, Default)]
pub struct FakeResizer {
    state: Arc<Mutex<State>>,
}

impl FakeResizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_needs_resize(&self, needed: bool) {
        lock(&self.state).needs_resize = needed;
    }

    pub fn fail(&self, message: &str) {
        lock(&self.state).fail = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<ResizeCall> {
        lock(&self.state).calls.clone()
    }
}

#[async_trait]
impl FilesystemResizer for FakeResizer {
    async fn needs_resize(&self, device: &str, mount_path: &Path) -> Result<bool, StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(ResizeCall::NeedsResize {
            device: device.to_string(),
            path: mount_path.to_path_buf(),
        });
        Ok(state.needs_resize)
    }

    async fn resize(&self, device: &str, mount_path: &Path) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(ResizeCall::Resize {
            device: device.to_string(),
            path: mount_path.to_path_buf(),
        });
        if let Some(message) = &state.fail {
            return Err(StorageError::internal(message.clone()));
        }
        state.needs_resize = false;
        Ok(())
    }
}
