// SPDX-License-Identifier: GPL-3.0-only

//! gRPC server lifecycle

use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, UnixListener};
use tokio::signal::unix::{SignalKind, signal};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tonic::transport::Server;
use tonic::transport::server::Router;

use crate::controller::ControllerService;
use crate::csi::controller_server::ControllerServer;
use crate::csi::identity_server::IdentityServer;
use crate::csi::node_server::NodeServer;
use crate::endpoint::Endpoint;
use crate::identity::IdentityService;
use crate::node::NodeService;

/// The services one process hosts. Identity is always served; a controller
/// process adds Controller and a node process adds Node.
pub struct Services {
    pub identity: IdentityService,
    pub controller: Option<ControllerService>,
    pub node: Option<NodeService>,
}

impl Services {
    pub fn controller(controller: ControllerService) -> Self {
        Self {
            identity: IdentityService::new(),
            controller: Some(controller),
            node: None,
        }
    }

    pub fn node(node: NodeService) -> Self {
        Self {
            identity: IdentityService::new(),
            controller: None,
            node: Some(node),
        }
    }

    pub fn into_router(self) -> Router {
        Server::builder()
            .add_service(IdentityServer::new(self.identity))
            .add_optional_service(self.controller.map(ControllerServer::new))
            .add_optional_service(self.node.map(NodeServer::new))
    }
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    endpoint: &Endpoint,
    services: Services,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let router = services.into_router();

    match endpoint {
        Endpoint::Unix(path) => {
            let listener = bind_unix(path).await?;
            tracing::info!(endpoint = %endpoint, "Listening");

            let served = router
                .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown)
                .await;

            if let Err(err) = tokio::fs::remove_file(path).await
                && err.kind() != ErrorKind::NotFound
            {
                tracing::warn!(path = %path.display(), error = %err, "Failed to remove socket");
            }
            served.context("gRPC server failed")?;
        }
        Endpoint::Tcp(addr) => {
            let listener = TcpListener::bind(addr.as_str())
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            tracing::info!(endpoint = %endpoint, "Listening");

            router
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
                .await
                .context("gRPC server failed")?;
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Bind a unix socket, replacing a stale socket file left by an earlier run.
async fn bind_unix(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create socket directory {}", parent.display()))?;
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::info!(path = %path.display(), "Removed stale socket"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to remove {}", path.display()));
        }
    }

    UnixListener::bind(path).with_context(|| format!("Failed to bind {}", path.display()))
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
