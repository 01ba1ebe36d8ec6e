// SPDX-License-Identifier: GPL-3.0-only

//! Command line and config file handling
//!
//! Settings come from an optional TOML file first, then command line flags
//! override whatever the file set. Anything left unset falls back to a
//! built-in default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::endpoint::Endpoint;

pub const DEFAULT_ENDPOINT: &str = "unix:///tmp/csi.sock";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Parser)]
#[command(name = "csi-shared-lvm", version)]
#[command(about = "CSI plugin provisioning volumes from shared LVM volume groups")]
pub struct Cli {
    /// TOML file with default settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level for the plugin's own crates (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Debug, Subcommand)]
pub enum Mode {
    /// Serve Identity and Controller
    Controller(ControllerArgs),
    /// Serve Identity and Node
    Node(NodeArgs),
}

#[derive(Debug, Args)]
pub struct ControllerArgs {
    /// unix://<path> or tcp://<host:port>
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Volume group volumes may be created in; repeat for several
    #[arg(long = "volume-group")]
    pub volume_groups: Vec<String>,
}

#[derive(Debug, Args)]
pub struct NodeArgs {
    /// unix://<path> or tcp://<host:port>
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Identifier reported to the orchestrator, the host name by default
    #[arg(long)]
    pub node_id: Option<String>,
}

/// On-disk configuration; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub allowed_volume_groups: Vec<String>,
    pub node_id: Option<String>,
    pub log_level: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Controller { allowed_volume_groups: Vec<String> },
    Node { node_id: String },
}

/// Fully resolved start-up settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: Endpoint,
    pub log_level: String,
    pub role: Role,
}

impl Settings {
    /// Read the config file named on the command line, if any, and merge.
    pub fn load(cli: Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file, host_name)
    }

    /// Merge flags over file values. `host_name` is only consulted when no
    /// node id was given anywhere.
    pub fn resolve(
        cli: Cli,
        file: FileConfig,
        host_name: impl FnOnce() -> Result<String>,
    ) -> Result<Self> {
        let log_level = cli
            .log_level
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let (endpoint, role) = match cli.mode {
            Mode::Controller(args) => {
                let allowed_volume_groups = if args.volume_groups.is_empty() {
                    file.allowed_volume_groups
                } else {
                    args.volume_groups
                };
                (
                    args.endpoint,
                    Role::Controller {
                        allowed_volume_groups,
                    },
                )
            }
            Mode::Node(args) => {
                let node_id = match args.node_id.or(file.node_id) {
                    Some(id) => id,
                    None => host_name().context("Failed to determine node id from host name")?,
                };
                (args.endpoint, Role::Node { node_id })
            }
        };

        let raw_endpoint = endpoint
            .or(file.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = raw_endpoint
            .parse::<Endpoint>()
            .with_context(|| format!("Invalid endpoint '{raw_endpoint}'"))?;

        Ok(Self {
            endpoint,
            log_level,
            role,
        })
    }
}

fn host_name() -> Result<String> {
    let name = nix::unistd::gethostname().context("gethostname failed")?;
    name.into_string()
        .map_err(|raw| anyhow::anyhow!("host name {raw:?} is not valid UTF-8"))
}
