// SPDX-License-Identifier: GPL-3.0-only

//! Argument builders and output parsers for the LVM command line tools.

use regex::Regex;
use storage_contracts::CommandOutput;
use storage_types::{LogicalVolume, LvAttr, VolumeGroup};

use crate::{Result, SysError};

/// Exit status the LVM tools use for "not found" (and a few other failures).
const NOT_FOUND_EXIT_CODE: i32 = 5;

const LV_NOT_FOUND_PATTERN: &str = r#"Failed to find logical volume "(.*?)""#;
const VG_NOT_FOUND_PATTERN: &str = r#"Volume group "(.*?)" not found"#;

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LvmCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

impl LvmCommand {
    fn new<I, S>(program: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program,
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

fn lv_path(vg_name: &str, lv_name: &str) -> String {
    format!("{vg_name}/{lv_name}")
}

fn size_arg(size: u64) -> String {
    format!("{size}b")
}

/// Created inactive: activation is an explicit node-side step.
pub fn lvcreate(vg_name: &str, lv_name: &str, size: u64, tags: &[String]) -> LvmCommand {
    let mut args = vec![
        "--name".to_string(),
        lv_name.to_string(),
        "--wipesignatures".to_string(),
        "y".to_string(),
        "--yes".to_string(),
        "--size".to_string(),
        size_arg(size),
        "--setautoactivation".to_string(),
        "n".to_string(),
    ];
    for tag in tags {
        args.push("--addtag".to_string());
        args.push(tag.clone());
    }
    args.push(vg_name.to_string());

    LvmCommand::new("lvcreate", args)
}

pub fn lvs(vg_name: &str, lv_name: &str) -> LvmCommand {
    LvmCommand::new(
        "lvs",
        [
            "--noheadings".to_string(),
            "--nosuffix".to_string(),
            "--units".to_string(),
            "b".to_string(),
            "-o".to_string(),
            "lv_name,lv_size,lv_attr,lv_tags".to_string(),
            lv_path(vg_name, lv_name),
        ],
    )
}

pub fn lvremove(vg_name: &str, lv_name: &str) -> LvmCommand {
    LvmCommand::new("lvremove", ["-f".to_string(), lv_path(vg_name, lv_name)])
}

pub fn lvextend(vg_name: &str, lv_name: &str, size: u64) -> LvmCommand {
    LvmCommand::new(
        "lvextend",
        ["-L".to_string(), size_arg(size), lv_path(vg_name, lv_name)],
    )
}

pub fn lvchange_activate(vg_name: &str, lv_name: &str) -> LvmCommand {
    LvmCommand::new("lvchange", ["-ay".to_string(), lv_path(vg_name, lv_name)])
}

pub fn lvchange_deactivate(vg_name: &str, lv_name: &str) -> LvmCommand {
    LvmCommand::new("lvchange", ["-an".to_string(), lv_path(vg_name, lv_name)])
}

pub fn vgs(vg_name: &str) -> LvmCommand {
    LvmCommand::new(
        "vgs",
        [
            "--noheadings",
            "--nosuffix",
            "--units",
            "b",
            "-o",
            "vg_name,vg_free",
            vg_name,
        ],
    )
}

/// Recognises the "no such volume / group" failures of the LVM tools.
///
/// The tools reuse one exit status for several conditions, so both the
/// status and the stderr text have to agree.
#[derive(Debug, Clone)]
pub struct NotFoundMatcher {
    lv_not_found: Regex,
    vg_not_found: Regex,
}

impl NotFoundMatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            lv_not_found: Regex::new(LV_NOT_FOUND_PATTERN)?,
            vg_not_found: Regex::new(VG_NOT_FOUND_PATTERN)?,
        })
    }

    pub fn is_not_found(&self, output: &CommandOutput) -> bool {
        if output.code != Some(NOT_FOUND_EXIT_CODE) {
            return false;
        }

        self.lv_not_found.is_match(&output.stderr) || self.vg_not_found.is_match(&output.stderr)
    }
}

fn parse_size(raw: &str) -> Result<u64> {
    raw.strip_suffix('B')
        .unwrap_or(raw)
        .parse()
        .map_err(|_| SysError::Parse {
            what: "size",
            output: raw.to_string(),
        })
}

fn first_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Parse `lvs -o lv_name,lv_size,lv_attr,lv_tags` output.
///
/// Empty output means the volume does not exist.
pub fn parse_lvs(vg_name: &str, output: &str) -> Result<Option<LogicalVolume>> {
    let Some(line) = first_line(output) else {
        return Ok(None);
    };

    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() < 3 {
        return Err(SysError::Parse {
            what: "lvs output",
            output: line.to_string(),
        });
    }

    let tags = cols
        .get(3)
        .map(|raw| {
            raw.split(',')
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(LogicalVolume {
        name: cols[0].to_string(),
        vg_name: vg_name.to_string(),
        size: parse_size(cols[1])?,
        tags,
        attr: LvAttr::from(cols[2]),
    }))
}

/// Parse `vgs -o vg_name,vg_free` output.
pub fn parse_vgs(output: &str) -> Result<Option<VolumeGroup>> {
    let Some(line) = first_line(output) else {
        return Ok(None);
    };

    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() < 2 {
        return Err(SysError::Parse {
            what: "vgs output",
            output: line.to_string(),
        });
    }

    Ok(Some(VolumeGroup {
        name: cols[0].to_string(),
        free: parse_size(cols[1])?,
    }))
}
