// SPDX-License-Identifier: GPL-3.0-only

//! `/proc/self/mountinfo` parsing.

use std::path::{Path, PathBuf};

use storage_types::MountReferences;

use crate::{Result, SysError};

/// One line of the kernel mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// `major:minor` of the mounted device.
    pub device_number: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
    /// Mount source as the kernel reports it, e.g. `/dev/mapper/vg-lv`.
    pub source: String,
}

pub fn parse_mountinfo(input: &str) -> Result<Vec<MountEntry>> {
    let invalid = |line: &str| SysError::Parse {
        what: "mountinfo line",
        output: line.to_string(),
    };

    let mut entries = Vec::new();
    for line in input.lines().filter(|line| !line.trim().is_empty()) {
        let (left, right) = line.split_once(" - ").ok_or_else(|| invalid(line))?;

        let left_fields: Vec<&str> = left.split_whitespace().collect();
        if left_fields.len() < 5 {
            return Err(invalid(line));
        }

        let mut right_fields = right.split_whitespace();
        let fs_type = right_fields.next().ok_or_else(|| invalid(line))?;
        let source = right_fields.next().unwrap_or_default();

        entries.push(MountEntry {
            device_number: left_fields[2].to_string(),
            mount_point: PathBuf::from(unescape_mount_field(left_fields[4])),
            fs_type: fs_type.to_string(),
            source: unescape_mount_field(source),
        });
    }

    Ok(entries)
}

/// The device mounted at `path` and how many mount entries share it.
///
/// Bind mounts of the same device count as references; a path with no
/// entry has zero references.
pub fn references(entries: &[MountEntry], path: &Path) -> MountReferences {
    let Some(entry) = entries.iter().rev().find(|entry| entry.mount_point == path) else {
        return MountReferences::default();
    };

    let count = entries
        .iter()
        .filter(|other| other.device_number == entry.device_number)
        .count();

    MountReferences {
        device: Some(entry.source.clone()),
        count,
    }
}

pub fn is_mount_point(entries: &[MountEntry], path: &Path) -> bool {
    entries.iter().any(|entry| entry.mount_point == path)
}

fn unescape_mount_field(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..index + 4].iter().all(u8::is_ascii_digit)
        {
            if let Ok(num) = u8::from_str_radix(&value[index + 1..index + 4], 8) {
                output.push(num);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}
