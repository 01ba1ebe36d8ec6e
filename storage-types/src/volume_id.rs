// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lvm::device_path;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid volume id: {0}")]
pub struct InvalidVolumeId(pub String);

/// External volume identity, `<vg>/<lv>` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VolumeId {
    pub vg_name: String,
    pub lv_name: String,
}

impl VolumeId {
    pub fn new(vg_name: impl Into<String>, lv_name: impl Into<String>) -> Self {
        Self {
            vg_name: vg_name.into(),
            lv_name: lv_name.into(),
        }
    }

    /// Split `<vg>/<lv>`; anything other than two non-empty segments is rejected.
    pub fn parse(raw: &str) -> Result<Self, InvalidVolumeId> {
        let mut parts = raw.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(vg), Some(lv), None) if !vg.is_empty() && !lv.is_empty() => {
                Ok(Self::new(vg, lv))
            }
            _ => Err(InvalidVolumeId(raw.to_string())),
        }
    }

    pub fn device_path(&self) -> String {
        device_path(&self.vg_name, &self.lv_name)
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vg_name, self.lv_name)
    }
}

impl FromStr for VolumeId {
    type Err = InvalidVolumeId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VolumeId {
    type Error = InvalidVolumeId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VolumeId> for String {
    fn from(value: VolumeId) -> Self {
        value.to_string()
    }
}
