// SPDX-License-Identifier: GPL-3.0-only

//! Shared-LVM CSI plugin entry point
//!
//! One binary runs either the controller or the node half of the plugin,
//! selected by subcommand. Both halves also serve Identity.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use storage_contracts::CommandExecutor;
use storage_service::config::{Cli, Role, Settings};
use storage_service::server::{self, Services};
use storage_service::{ControllerService, DRIVER_NAME, NodeService};
use storage_sys::{
    CONTROLLER_TOOLS, HostMountOps, HostResizer, HostVolumeStats, LvmClient, NODE_TOOLS,
    ProcessExecutor,
};
use tracing_subscriber::{EnvFilter, fmt};

fn init_logging(level: &str) {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "storage_service={level},storage_sys={level},csi_shared_lvm={level},warn"
            ))
        }))
        .with_writer(std::io::stderr)
        .init();
}

fn warn_missing_tools(tools: &[&str]) {
    let missing = storage_sys::missing_tools(tools);
    if !missing.is_empty() {
        tracing::warn!(
            missing = ?missing,
            "Required tools not found on PATH; affected operations will fail"
        );
    }
}

fn build_services(role: Role, executor: Arc<dyn CommandExecutor>) -> Result<Services> {
    let lvm = Arc::new(LvmClient::new(executor.clone())?);

    let services = match role {
        Role::Controller {
            allowed_volume_groups,
        } => {
            warn_missing_tools(CONTROLLER_TOOLS);
            tracing::info!(
                allowed_volume_groups = ?allowed_volume_groups,
                "Starting controller"
            );
            Services::controller(ControllerService::new(lvm, allowed_volume_groups))
        }
        Role::Node { node_id } => {
            warn_missing_tools(NODE_TOOLS);
            tracing::info!(node_id = %node_id, "Starting node");
            Services::node(NodeService::new(
                lvm,
                Arc::new(HostMountOps::new(executor.clone())),
                Arc::new(HostResizer::new(executor.clone())),
                Arc::new(HostVolumeStats::new(executor)),
                node_id,
            ))
        }
    };

    Ok(services)
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load(Cli::parse())?;
    init_logging(&settings.log_level);

    tracing::info!(
        "Starting {} v{}",
        DRIVER_NAME,
        env!("CARGO_PKG_VERSION")
    );

    let executor: Arc<dyn CommandExecutor> = Arc::new(ProcessExecutor::new());
    let services = build_services(settings.role, executor)?;

    server::serve(&settings.endpoint, services, server::shutdown_signal()).await
}
