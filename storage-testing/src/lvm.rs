// SPDX-License-Identifier: GPL-3.0-only

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storage_contracts::{LvmGateway, StorageError};
use storage_types::{LogicalVolume, LvAttr, VolumeGroup};

use crate::lock;

/// LVM allocates in whole extents; the default extent is 4 MiB.
pub const EXTENT_SIZE: u64 = 4 * 1024 * 1024;

const ACTIVE_ATTR: &str = "-wi-a-----";
const INACTIVE_ATTR: &str = "-wi-------";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LvmCall {
    CreateLv {
        vg_name: String,
        lv_name: String,
        size: u64,
        tags: Vec<String>,
    },
    DeleteLv {
        vg_name: String,
        lv_name: String,
    },
    ResizeLv {
        vg_name: String,
        lv_name: String,
        size: u64,
    },
    ActivateLv {
        vg_name: String,
        lv_name: String,
    },
    DeactivateLv {
        vg_name: String,
        lv_name: String,
    },
}

/// Gateway operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LvmOp {
    Create,
    Get,
    Delete,
    Resize,
    Activate,
    Deactivate,
}

#[derive(Default)]
struct State {
    groups: BTreeMap<String, u64>,
    volumes: BTreeMap<(String, String), LogicalVolume>,
    failing_groups: BTreeSet<String>,
    failures: HashMap<LvmOp, String>,
    lose_created: bool,
    calls: Vec<LvmCall>,
}

impl State {
    fn check(&self, op: LvmOp) -> Result<(), StorageError> {
        match self.failures.get(&op) {
            Some(message) => Err(StorageError::internal(message.clone())),
            None => Ok(()),
        }
    }

    fn set_attr(&mut self, vg_name: &str, lv_name: &str, attr: &str) {
        if let Some(lv) = self
            .volumes
            .get_mut(&(vg_name.to_string(), lv_name.to_string()))
        {
            lv.attr = LvAttr::from(attr);
        }
    }
}

/// Stateful [`LvmGateway`] fake.
///
/// Queries are not recorded; every mutation is, whether or not it succeeds.
#[derive(Clone, Default)]
pub struct FakeLvm {
    state: Arc<Mutex<State>>,
}

impl FakeLvm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, name: &str, free: u64) -> Self {
        lock(&self.state).groups.insert(name.to_string(), free);
        self
    }

    pub fn with_volume(self, vg_name: &str, lv_name: &str, size: u64, active: bool) -> Self {
        let lv = LogicalVolume {
            name: lv_name.to_string(),
            vg_name: vg_name.to_string(),
            size,
            tags: Vec::new(),
            attr: LvAttr::from(if active { ACTIVE_ATTR } else { INACTIVE_ATTR }),
        };
        lock(&self.state)
            .volumes
            .insert((vg_name.to_string(), lv_name.to_string()), lv);
        self
    }

    /// Make `get_vg` fail for one group.
    pub fn with_failing_group(self, name: &str) -> Self {
        lock(&self.state).failing_groups.insert(name.to_string());
        self
    }

    /// Make every call of `op` fail with an internal error.
    pub fn fail(&self, op: LvmOp, message: &str) {
        lock(&self.state).failures.insert(op, message.to_string());
    }

    /// Accept `create_lv` without the volume ever showing up.
    pub fn lose_created_volumes(&self) {
        lock(&self.state).lose_created = true;
    }

    pub fn volume(&self, vg_name: &str, lv_name: &str) -> Option<LogicalVolume> {
        lock(&self.state)
            .volumes
            .get(&(vg_name.to_string(), lv_name.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<LvmCall> {
        lock(&self.state).calls.clone()
    }

    pub fn take_calls(&self) -> Vec<LvmCall> {
        std::mem::take(&mut lock(&self.state).calls)
    }
}

fn round_to_extent(size: u64) -> u64 {
    size.div_ceil(EXTENT_SIZE).max(1) * EXTENT_SIZE
}

#[async_trait]
impl LvmGateway for FakeLvm {
    async fn create_lv(
        &self,
        vg_name: &str,
        lv_name: &str,
        size: u64,
        tags: &[String],
    ) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(LvmCall::CreateLv {
            vg_name: vg_name.to_string(),
            lv_name: lv_name.to_string(),
            size,
            tags: tags.to_vec(),
        });
        state.check(LvmOp::Create)?;

        if state.lose_created {
            return Ok(());
        }

        let lv = LogicalVolume {
            name: lv_name.to_string(),
            vg_name: vg_name.to_string(),
            size: round_to_extent(size),
            tags: tags.to_vec(),
            attr: LvAttr::from(INACTIVE_ATTR),
        };
        state
            .volumes
            .insert((vg_name.to_string(), lv_name.to_string()), lv);
        Ok(())
    }

    async fn get_lv(
        &self,
        vg_name: &str,
        lv_name: &str,
    ) -> Result<Option<LogicalVolume>, StorageError> {
        let state = lock(&self.state);
        state.check(LvmOp::Get)?;
        Ok(state
            .volumes
            .get(&(vg_name.to_string(), lv_name.to_string()))
            .cloned())
    }

    async fn delete_lv(&self, vg_name: &str, lv_name: &str) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(LvmCall::DeleteLv {
            vg_name: vg_name.to_string(),
            lv_name: lv_name.to_string(),
        });
        state.check(LvmOp::Delete)?;
        state
            .volumes
            .remove(&(vg_name.to_string(), lv_name.to_string()));
        Ok(())
    }

    async fn resize_lv(&self, vg_name: &str, lv_name: &str, size: u64) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(LvmCall::ResizeLv {
            vg_name: vg_name.to_string(),
            lv_name: lv_name.to_string(),
            size,
        });
        state.check(LvmOp::Resize)?;

        match state
            .volumes
            .get_mut(&(vg_name.to_string(), lv_name.to_string()))
        {
            Some(lv) => {
                lv.size = round_to_extent(size);
                Ok(())
            }
            None => Err(StorageError::internal(format!(
                "Failed to find logical volume \"{vg_name}/{lv_name}\""
            ))),
        }
    }

    async fn activate_lv(&self, vg_name: &str, lv_name: &str) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(LvmCall::ActivateLv {
            vg_name: vg_name.to_string(),
            lv_name: lv_name.to_string(),
        });
        state.check(LvmOp::Activate)?;
        state.set_attr(vg_name, lv_name, ACTIVE_ATTR);
        Ok(())
    }

    async fn deactivate_lv(&self, vg_name: &str, lv_name: &str) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.calls.push(LvmCall::DeactivateLv {
            vg_name: vg_name.to_string(),
            lv_name: lv_name.to_string(),
        });
        state.check(LvmOp::Deactivate)?;
        state.set_attr(vg_name, lv_name, INACTIVE_ATTR);
        Ok(())
    }

    async fn get_vg(&self, vg_name: &str) -> Result<Option<VolumeGroup>, StorageError> {
        let state = lock(&self.state);
        if state.failing_groups.contains(vg_name) {
            return Err(StorageError::internal(format!(
                "vgs {vg_name} exited with Some(3)"
            )));
        }
        Ok(state.groups.get(vg_name).map(|free| VolumeGroup {
            name: vg_name.to_string(),
            free: *free,
        }))
    }
}
