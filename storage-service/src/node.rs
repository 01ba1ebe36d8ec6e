// SPDX-License-Identifier: GPL-3.0-only

//! CSI Node service
//!
//! A volume moves through `inactive -> active -> staged -> published` on
//! each node. Staging activates the logical volume and, for filesystem
//! volumes, formats and mounts it at the staging path; publishing bind-mounts
//! the result into the consumer's path. Every step checks the host first so
//! a retried call converges instead of failing.

use std::path::Path;
use std::sync::Arc;

use storage_contracts::{FilesystemResizer, LvmGateway, MountOps, VolumeStatsProvider};
use tonic::{Request, Response, Status};

use crate::capability::{self, DEFAULT_FS_TYPE};
use crate::controller::{to_wire_bytes, volume_id};
use crate::csi::node_server::Node;
use crate::csi::node_service_capability::{self, rpc};
use crate::csi::volume_usage::Unit;
use crate::csi::*;
use crate::error::{Result, ServiceError, respond};
use crate::locks::VolumeLocks;

fn required_path<'a>(path: &'a str, what: &str) -> Result<&'a Path> {
    if path.is_empty() {
        return Err(ServiceError::invalid_argument(format!("{what} is required")));
    }
    Ok(Path::new(path))
}

fn required_capability(capability: Option<&VolumeCapability>) -> Result<&VolumeCapability> {
    capability.ok_or_else(|| ServiceError::invalid_argument("volume capability is required"))
}

pub struct NodeService {
    lvm: Arc<dyn LvmGateway>,
    mounter: Arc<dyn MountOps>,
    resizer: Arc<dyn FilesystemResizer>,
    stats: Arc<dyn VolumeStatsProvider>,
    node_id: String,
    locks: VolumeLocks,
}

impl NodeService {
    pub fn new(
        lvm: Arc<dyn LvmGateway>,
        mounter: Arc<dyn MountOps>,
        resizer: Arc<dyn FilesystemResizer>,
        stats: Arc<dyn VolumeStatsProvider>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            lvm,
            mounter,
            resizer,
            stats,
            node_id: node_id.into(),
            locks: VolumeLocks::new(),
        }
    }

    async fn stage(&self, req: NodeStageVolumeRequest) -> Result<NodeStageVolumeResponse> {
        let id = volume_id(&req.volume_id)?;
        let staging = required_path(&req.staging_target_path, "staging target path")?;
        let cap = required_capability(req.volume_capability.as_ref())?;
        let _guard = self.locks.acquire(&req.volume_id).await;

        let lv = self
            .lvm
            .get_lv(&id.vg_name, &id.lv_name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("volume '{id}' not found")))?;

        if lv.is_active() {
            tracing::debug!(volume_id = %id, "Volume already active");
        } else {
            tracing::info!(volume_id = %id, "Activating volume");
            self.lvm.activate_lv(&id.vg_name, &id.lv_name).await?;
        }

        if capability::is_block(Some(cap)) {
            return Ok(NodeStageVolumeResponse {});
        }

        let device = lv.device_path();
        if self.mounter.is_mount_point(staging).await? {
            tracing::info!(
                volume_id = %id,
                path = %staging.display(),
                "Staging path already mounted"
            );
        } else {
            let fs_type = capability::fs_type(cap).unwrap_or(DEFAULT_FS_TYPE);
            let flags = capability::mount_flags(cap);
            tracing::info!(
                volume_id = %id,
                device = %device,
                path = %staging.display(),
                fs_type,
                "Formatting and mounting volume"
            );
            self.mounter
                .format_and_mount(&device, staging, fs_type, &flags)
                .await?;
        }

        // The volume may have been extended while it was not staged anywhere.
        if self.resizer.needs_resize(&device, staging).await? {
            tracing::info!(volume_id = %id, device = %device, "Growing filesystem to fill volume");
            self.resizer.resize(&device, staging).await?;
        }

        Ok(NodeStageVolumeResponse {})
    }

    async fn unstage(&self, req: NodeUnstageVolumeRequest) -> Result<NodeUnstageVolumeResponse> {
        let id = volume_id(&req.volume_id)?;
        let staging = required_path(&req.staging_target_path, "staging target path")?;
        let _guard = self.locks.acquire(&req.volume_id).await;

        let refs = self.mounter.mount_references(staging).await?;
        if !refs.is_mounted() {
            tracing::info!(
                path = %staging.display(),
                "Staging path not mounted, assuming unstaged"
            );
            return Ok(NodeUnstageVolumeResponse {});
        }
        if refs.count > 1 {
            tracing::info!(
                path = %staging.display(),
                device = ?refs.device,
                references = refs.count,
                "Device still mounted elsewhere"
            );
        }

        tracing::info!(volume_id = %id, path = %staging.display(), "Unmounting staging path");
        self.mounter.cleanup_mount_point(staging).await?;

        match self.lvm.get_lv(&id.vg_name, &id.lv_name).await? {
            None => {
                tracing::info!(volume_id = %id, "Volume not found, assuming unstaged");
            }
            Some(lv) if !lv.is_active() => {
                tracing::info!(volume_id = %id, "Volume already inactive");
            }
            Some(_) => {
                tracing::info!(volume_id = %id, "Deactivating volume");
                self.lvm.deactivate_lv(&id.vg_name, &id.lv_name).await?;
            }
        }

        Ok(NodeUnstageVolumeResponse {})
    }

    async fn publish(&self, req: NodePublishVolumeRequest) -> Result<NodePublishVolumeResponse> {
        let id = volume_id(&req.volume_id)?;
        let staging = required_path(&req.staging_target_path, "staging target path")?;
        let target = required_path(&req.target_path, "target path")?;
        let cap = required_capability(req.volume_capability.as_ref())?;
        let _guard = self.locks.acquire(&req.volume_id).await;

        if self.mounter.is_mount_point(target).await? {
            tracing::info!(path = %target.display(), "Target already mounted");
            return Ok(NodePublishVolumeResponse {});
        }

        let mut options = vec!["bind".to_string()];
        if req.readonly {
            options.push("ro".to_string());
        }

        if capability::is_block(Some(cap)) {
            let device = id.device_path();
            tracing::info!(
                volume_id = %id,
                path = %target.display(),
                "Publishing block volume"
            );
            self.mounter.ensure_file(target).await?;
            self.mounter.mount(&device, target, None, &options).await?;
        } else {
            options.extend(capability::mount_flags(cap));
            let staging_source = staging.display().to_string();
            tracing::info!(
                volume_id = %id,
                path = %target.display(),
                "Publishing filesystem volume"
            );
            self.mounter.ensure_directory(target).await?;
            self.mounter
                .mount(&staging_source, target, capability::fs_type(cap), &options)
                .await?;
        }

        Ok(NodePublishVolumeResponse {})
    }

    async fn unpublish(
        &self,
        req: NodeUnpublishVolumeRequest,
    ) -> Result<NodeUnpublishVolumeResponse> {
        volume_id(&req.volume_id)?;
        let target = required_path(&req.target_path, "target path")?;
        let _guard = self.locks.acquire(&req.volume_id).await;

        if !self.mounter.is_mount_point(target).await? {
            tracing::info!(
                path = %target.display(),
                "Target not mounted, assuming unpublished"
            );
            return Ok(NodeUnpublishVolumeResponse {});
        }

        tracing::info!(path = %target.display(), "Unmounting target");
        self.mounter.unmount(target).await?;
        self.mounter.remove_path(target).await?;

        Ok(NodeUnpublishVolumeResponse {})
    }

    async fn volume_stats(
        &self,
        req: NodeGetVolumeStatsRequest,
    ) -> Result<NodeGetVolumeStatsResponse> {
        volume_id(&req.volume_id)?;
        let path = required_path(&req.volume_path, "volume path")?;

        if !self.stats.path_exists(path).await? {
            return Err(ServiceError::NotFound(format!(
                "volume path {} not found",
                path.display()
            )));
        }

        let usage = if self.stats.is_block_device(path).await? {
            let total = self.stats.block_device_size(path).await?;
            vec![VolumeUsage {
                total: to_wire_bytes(total),
                unit: Unit::Bytes as i32,
                ..Default::default()
            }]
        } else {
            let fs = self.stats.filesystem_stats(path).await?;
            vec![
                VolumeUsage {
                    available: to_wire_bytes(fs.available_bytes),
                    total: to_wire_bytes(fs.total_bytes),
                    used: to_wire_bytes(fs.used_bytes),
                    unit: Unit::Bytes as i32,
                },
                VolumeUsage {
                    available: to_wire_bytes(fs.free_inodes),
                    total: to_wire_bytes(fs.total_inodes),
                    used: to_wire_bytes(fs.used_inodes),
                    unit: Unit::Inodes as i32,
                },
            ]
        };

        Ok(NodeGetVolumeStatsResponse {
            usage,
            volume_condition: None,
        })
    }

    async fn expand(&self, req: NodeExpandVolumeRequest) -> Result<NodeExpandVolumeResponse> {
        let id = volume_id(&req.volume_id)?;
        let path = required_path(&req.volume_path, "volume path")?;
        let capacity_bytes = req
            .capacity_range
            .as_ref()
            .map(|range| range.required_bytes)
            .unwrap_or_default();

        if capability::is_block(req.volume_capability.as_ref()) {
            tracing::info!(volume_id = %id, "Block volume, skipping filesystem resize");
            return Ok(NodeExpandVolumeResponse { capacity_bytes });
        }

        let _guard = self.locks.acquire(&req.volume_id).await;
        let device = id.device_path();
        tracing::info!(
            volume_id = %id,
            device = %device,
            path = %path.display(),
            "Resizing filesystem"
        );
        self.resizer.resize(&device, path).await?;

        Ok(NodeExpandVolumeResponse { capacity_bytes })
    }
}

fn rpc_capability(kind: rpc::Type) -> NodeServiceCapability {
    NodeServiceCapability {
        r#type: Some(node_service_capability::Type::Rpc(
            node_service_capability::Rpc {
                r#type: kind as i32,
            },
        )),
    }
}

#[tonic::async_trait]
impl Node for NodeService {
    async fn node_stage_volume(
        &self,
        request: Request<NodeStageVolumeRequest>,
    ) -> std::result::Result<Response<NodeStageVolumeResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            volume_id = %req.volume_id,
            staging_path = %req.staging_target_path,
            "NodeStageVolume called"
        );
        respond("NodeStageVolume", self.stage(req).await)
    }

    async fn node_unstage_volume(
        &self,
        request: Request<NodeUnstageVolumeRequest>,
    ) -> std::result::Result<Response<NodeUnstageVolumeResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            volume_id = %req.volume_id,
            staging_path = %req.staging_target_path,
            "NodeUnstageVolume called"
        );
        respond("NodeUnstageVolume", self.unstage(req).await)
    }

    async fn node_publish_volume(
        &self,
        request: Request<NodePublishVolumeRequest>,
    ) -> std::result::Result<Response<NodePublishVolumeResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            volume_id = %req.volume_id,
            target_path = %req.target_path,
            readonly = req.readonly,
            "NodePublishVolume called"
        );
        respond("NodePublishVolume", self.publish(req).await)
    }

    async fn node_unpublish_volume(
        &self,
        request: Request<NodeUnpublishVolumeRequest>,
    ) -> std::result::Result<Response<NodeUnpublishVolumeResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            volume_id = %req.volume_id,
            target_path = %req.target_path,
            "NodeUnpublishVolume called"
        );
        respond("NodeUnpublishVolume", self.unpublish(req).await)
    }

    async fn node_get_volume_stats(
        &self,
        request: Request<NodeGetVolumeStatsRequest>,
    ) -> std::result::Result<Response<NodeGetVolumeStatsResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!(volume_id = %req.volume_id, path = %req.volume_path, "NodeGetVolumeStats called");
        respond("NodeGetVolumeStats", self.volume_stats(req).await)
    }

    async fn node_expand_volume(
        &self,
        request: Request<NodeExpandVolumeRequest>,
    ) -> std::result::Result<Response<NodeExpandVolumeResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            volume_id = %req.volume_id,
            path = %req.volume_path,
            "NodeExpandVolume called"
        );
        respond("NodeExpandVolume", self.expand(req).await)
    }

    async fn node_get_capabilities(
        &self,
        _request: Request<NodeGetCapabilitiesRequest>,
    ) -> std::result::Result<Response<NodeGetCapabilitiesResponse>, Status> {
        tracing::debug!("NodeGetCapabilities called");
        Ok(Response::new(NodeGetCapabilitiesResponse {
            capabilities: vec![
                rpc_capability(rpc::Type::StageUnstageVolume),
                rpc_capability(rpc::Type::ExpandVolume),
                rpc_capability(rpc::Type::GetVolumeStats),
            ],
        }))
    }

    async fn node_get_info(
        &self,
        _request: Request<NodeGetInfoRequest>,
    ) -> std::result::Result<Response<NodeGetInfoResponse>, Status> {
        tracing::debug!("NodeGetInfo called");
        Ok(Response::new(NodeGetInfoResponse {
            node_id: self.node_id.clone(),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use storage_testing::{
        FakeLvm, FakeMounter, FakeResizer, FakeStats, LvmCall, LvmOp, MountCall, ResizeCall,
    };
    use storage_types::FilesystemStats;
    use tonic::Code;

    use super::*;
    use crate::capability::fixtures;

    const GIB: u64 = 1024 * 1024 * 1024;
    const STAGING: &str = "/var/lib/kubelet/staging/pvc-1";
    const TARGET: &str = "/var/lib/kubelet/pods/abc/volumes/pvc-1";
    const DEVICE: &str = "/dev/vg1/pvc-1";

    struct Harness {
        lvm: FakeLvm,
        mounter: FakeMounter,
        resizer: FakeResizer,
        service: NodeService,
    }

    fn harness(lvm: FakeLvm, mounter: FakeMounter) -> Harness {
        harness_with_stats(lvm, mounter, FakeStats::new())
    }

    fn harness_with_stats(lvm: FakeLvm, mounter: FakeMounter, stats: FakeStats) -> Harness {
        let resizer = FakeResizer::new();
        let service = NodeService::new(
            Arc::new(lvm.clone()),
            Arc::new(mounter.clone()),
            Arc::new(resizer.clone()),
            Arc::new(stats),
            "node-a",
        );
        Harness {
            lvm,
            mounter,
            resizer,
            service,
        }
    }

    fn stage_request(cap: VolumeCapability) -> NodeStageVolumeRequest {
        NodeStageVolumeRequest {
            volume_id: "vg1/pvc-1".to_string(),
            staging_target_path: STAGING.to_string(),
            volume_capability: Some(cap),
            ..Default::default()
        }
    }

    fn unstage_request() -> NodeUnstageVolumeRequest {
        NodeUnstageVolumeRequest {
            volume_id: "vg1/pvc-1".to_string(),
            staging_target_path: STAGING.to_string(),
        }
    }

    fn publish_request(cap: VolumeCapability, readonly: bool) -> NodePublishVolumeRequest {
        NodePublishVolumeRequest {
            volume_id: "vg1/pvc-1".to_string(),
            staging_target_path: STAGING.to_string(),
            target_path: TARGET.to_string(),
            volume_capability: Some(cap),
            readonly,
            ..Default::default()
        }
    }

    fn activate_call() -> LvmCall {
        LvmCall::ActivateLv {
            vg_name: "vg1".to_string(),
            lv_name: "pvc-1".to_string(),
        }
    }

    #[tokio::test]
    async fn stage_activates_then_formats_and_mounts() {
        let h = harness(
            FakeLvm::new().with_volume("vg1", "pvc-1", GIB, false),
            FakeMounter::new(),
        );

        h.service
            .node_stage_volume(Request::new(stage_request(fixtures::mount("", &["noatime"]))))
            .await
            .expect("stage");

        assert_eq!(h.lvm.calls(), vec![activate_call()]);
        assert_eq!(
            h.mounter.calls(),
            vec![MountCall::FormatAndMount {
                device: DEVICE.to_string(),
                target: PathBuf::from(STAGING),
                fs_type: DEFAULT_FS_TYPE.to_string(),
                options: vec!["noatime".to_string()],
            }]
        );
        assert!(h.mounter.is_mounted(STAGING));
        assert_eq!(
            h.resizer.calls(),
            vec![ResizeCall::NeedsResize {
                device: DEVICE.to_string(),
                path: PathBuf::from(STAGING),
            }]
        );
    }

    #[tokio::test]
    async fn stage_of_active_mounted_volume_is_noop() {
        let h = harness(
            FakeLvm::new().with_volume("vg1", "pvc-1", GIB, true),
            FakeMounter::new().with_mount(DEVICE, STAGING),
        );

        h.service
            .node_stage_volume(Request::new(stage_request(fixtures::mount("xfs", &[]))))
            .await
            .expect("stage");

        assert!(h.lvm.calls().is_empty());
        assert!(h.mounter.calls().is_empty());
    }

    #[tokio::test]
    async fn stage_grows_filesystem_after_offline_expansion() {
        let h = harness(
            FakeLvm::new().with_volume("vg1", "pvc-1", GIB, true),
            FakeMounter::new().with_mount(DEVICE, STAGING),
        );
        h.resizer.set_needs_resize(true);

        h.service
            .node_stage_volume(Request::new(stage_request(fixtures::mount("ext4", &[]))))
            .await
            .expect("stage");

        assert!(h.resizer.calls().contains(&ResizeCall::Resize {
            device: DEVICE.to_string(),
            path: PathBuf::from(STAGING),
        }));
    }

    #[tokio::test]
    async fn stage_of_block_volume_only_activates() {
        let h = harness(
            FakeLvm::new().with_volume("vg1", "pvc-1", GIB, false),
            FakeMounter::new(),
        );

        h.service
            .node_stage_volume(Request::new(stage_request(fixtures::block())))
            .await
            .expect("stage");

        assert_eq!(h.lvm.calls(), vec![activate_call()]);
        assert!(h.mounter.calls().is_empty());
        assert!(h.resizer.calls().is_empty());
    }

    #[tokio::test]
    async fn stage_errors() {
        let h = harness(FakeLvm::new(), FakeMounter::new());

        let err = h
            .service
            .node_stage_volume(Request::new(stage_request(fixtures::block())))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        let mut req = stage_request(fixtures::block());
        req.volume_capability = None;
        let err = h.service.node_stage_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let mut req = stage_request(fixtures::block());
        req.staging_target_path.clear();
        let err = h.service.node_stage_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let mut req = stage_request(fixtures::block());
        req.volume_id = "pvc-1".to_string();
        let err = h.service.node_stage_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn stage_surfaces_mount_failures() {
        let h = harness(
            FakeLvm::new().with_volume("vg1", "pvc-1", GIB, true),
            FakeMounter::new(),
        );
        h.mounter.fail_mounts("wrong fs type");

        let err = h
            .service
            .node_stage_volume(Request::new(stage_request(fixtures::mount("ext4", &[]))))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().contains("wrong fs type"));
    }

    #[tokio::test]
    async fn unstage_of_unmounted_path_leaves_activation_alone() {
        let h = harness(
            FakeLvm::new().with_volume("vg1", "pvc-1", GIB, true),
            FakeMounter::new(),
        );

        h.service
            .node_unstage_volume(Request::new(unstage_request()))
            .await
            .expect("unstage");

        assert!(h.lvm.calls().is_empty());
        assert!(h.mounter.calls().is_empty());
    }

    #[tokio::test]
    async fn unstage_unmounts_and_deactivates() {
        let h = harness(
            FakeLvm::new().with_volume("vg1", "pvc-1", GIB, true),
            FakeMounter::new().with_mount(DEVICE, STAGING),
        );

        h.service
            .node_unstage_volume(Request::new(unstage_request()))
            .await
            .expect("unstage");

        assert_eq!(
            h.mounter.calls(),
            vec![MountCall::CleanupMountPoint(PathBuf::from(STAGING))]
        );
        assert_eq!(
            h.lvm.calls(),
            vec![LvmCall::DeactivateLv {
                vg_name: "vg1".to_string(),
                lv_name: "pvc-1".to_string(),
            }]
        );
        assert!(!h.lvm.volume("vg1", "pvc-1").expect("volume").is_active());
    }

    #[tokio::test]
    async fn unstage_skips_deactivation_when_inactive_or_gone() {
        for lvm in [
            FakeLvm::new().with_volume("vg1", "pvc-1", GIB, false),
            FakeLvm::new(),
        ] {
            let h = harness(lvm, FakeMounter::new().with_mount(DEVICE, STAGING));

            h.service
                .node_unstage_volume(Request::new(unstage_request()))
                .await
                .expect("unstage");

            assert!(h.lvm.calls().is_empty());
            assert!(!h.mounter.is_mounted(STAGING));
        }
    }

    #[tokio::test]
    async fn unstage_reports_deactivation_failure() {
        let h = harness(
            FakeLvm::new().with_volume("vg1", "pvc-1", GIB, true),
            FakeMounter::new().with_mount(DEVICE, STAGING),
        );
        h.lvm.fail(LvmOp::Deactivate, "Logical volume in use");

        let err = h
            .service
            .node_unstage_volume(Request::new(unstage_request()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }

    #[tokio::test]
    async fn publish_filesystem_bind_mounts_staging_path() {
        let h = harness(FakeLvm::new(), FakeMounter::new().with_mount(DEVICE, STAGING));

        h.service
            .node_publish_volume(Request::new(publish_request(
                fixtures::mount("xfs", &["noatime"]),
                true,
            )))
            .await
            .expect("publish");

        assert_eq!(
            h.mounter.calls(),
            vec![
                MountCall::EnsureDirectory(PathBuf::from(TARGET)),
                MountCall::Mount {
                    source: STAGING.to_string(),
                    target: PathBuf::from(TARGET),
                    fs_type: Some("xfs".to_string()),
                    options: vec![
                        "bind".to_string(),
                        "ro".to_string(),
                        "noatime".to_string()
                    ],
                },
            ]
        );
    }

    #[tokio::test]
    async fn publish_block_bind_mounts_device() {
        let h = harness(FakeLvm::new(), FakeMounter::new());

        h.service
            .node_publish_volume(Request::new(publish_request(fixtures::block(), false)))
            .await
            .expect("publish");

        assert_eq!(
            h.mounter.calls(),
            vec![
                MountCall::EnsureFile(PathBuf::from(TARGET)),
                MountCall::Mount {
                    source: DEVICE.to_string(),
                    target: PathBuf::from(TARGET),
                    fs_type: None,
                    options: vec!["bind".to_string()],
                },
            ]
        );
    }

    #[tokio::test]
    async fn publish_to_mounted_target_is_noop() {
        let h = harness(FakeLvm::new(), FakeMounter::new().with_mount(DEVICE, TARGET));

        h.service
            .node_publish_volume(Request::new(publish_request(fixtures::block(), false)))
            .await
            .expect("publish");
        assert!(h.mounter.calls().is_empty());

        let mut req = publish_request(fixtures::block(), false);
        req.target_path.clear();
        let err = h.service.node_publish_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn unpublish_unmounts_and_removes_target() {
        let h = harness(FakeLvm::new(), FakeMounter::new().with_mount(DEVICE, TARGET));
        let req = || NodeUnpublishVolumeRequest {
            volume_id: "vg1/pvc-1".to_string(),
            target_path: TARGET.to_string(),
        };

        h.service
            .node_unpublish_volume(Request::new(req()))
            .await
            .expect("unpublish");
        assert_eq!(
            h.mounter.take_calls(),
            vec![
                MountCall::Unmount(PathBuf::from(TARGET)),
                MountCall::RemovePath(PathBuf::from(TARGET)),
            ]
        );

        h.service
            .node_unpublish_volume(Request::new(req()))
            .await
            .expect("second unpublish");
        assert!(h.mounter.calls().is_empty());
    }

    #[tokio::test]
    async fn stats_for_block_and_filesystem_volumes() {
        let fs = FilesystemStats {
            available_bytes: 700,
            total_bytes: 1000,
            used_bytes: 300,
            total_inodes: 64,
            free_inodes: 60,
            used_inodes: 4,
        };
        let stats = FakeStats::new()
            .with_block_device("/dev/block-target", GIB)
            .with_filesystem(TARGET, fs);
        let h = harness_with_stats(FakeLvm::new(), FakeMounter::new(), stats);

        let stats_for = |path: &str| NodeGetVolumeStatsRequest {
            volume_id: "vg1/pvc-1".to_string(),
            volume_path: path.to_string(),
            ..Default::default()
        };

        let usage = h
            .service
            .node_get_volume_stats(Request::new(stats_for("/dev/block-target")))
            .await
            .expect("block stats")
            .into_inner()
            .usage;
        assert_eq!(
            usage,
            vec![VolumeUsage {
                available: 0,
                total: GIB as i64,
                used: 0,
                unit: Unit::Bytes as i32,
            }]
        );

        let usage = h
            .service
            .node_get_volume_stats(Request::new(stats_for(TARGET)))
            .await
            .expect("fs stats")
            .into_inner()
            .usage;
        assert_eq!(usage.len(), 2);
        assert_eq!((usage[0].available, usage[0].total, usage[0].used), (700, 1000, 300));
        assert_eq!(usage[1].unit, Unit::Inodes as i32);
        assert_eq!((usage[1].available, usage[1].total, usage[1].used), (60, 64, 4));

        let err = h
            .service
            .node_get_volume_stats(Request::new(stats_for("/missing")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn expand_resizes_filesystem_but_not_block() {
        let h = harness(FakeLvm::new(), FakeMounter::new());
        let req = |cap: VolumeCapability| NodeExpandVolumeRequest {
            volume_id: "vg1/pvc-1".to_string(),
            volume_path: TARGET.to_string(),
            capacity_range: Some(CapacityRange {
                required_bytes: 2 * GIB as i64,
                limit_bytes: 0,
            }),
            volume_capability: Some(cap),
            ..Default::default()
        };

        let resp = h
            .service
            .node_expand_volume(Request::new(req(fixtures::block())))
            .await
            .expect("block expand")
            .into_inner();
        assert_eq!(resp.capacity_bytes, 2 * GIB as i64);
        assert!(h.resizer.calls().is_empty());

        h.service
            .node_expand_volume(Request::new(req(fixtures::mount("ext4", &[]))))
            .await
            .expect("fs expand");
        assert_eq!(
            h.resizer.calls(),
            vec![ResizeCall::Resize {
                device: DEVICE.to_string(),
                path: PathBuf::from(TARGET),
            }]
        );

        h.resizer.fail("resize2fs: Device or resource busy");
        let err = h
            .service
            .node_expand_volume(Request::new(req(fixtures::mount("ext4", &[]))))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }

    #[tokio::test]
    async fn reports_capabilities_and_node_id() {
        let h = harness(FakeLvm::new(), FakeMounter::new());

        let caps = h
            .service
            .node_get_capabilities(Request::new(NodeGetCapabilitiesRequest {}))
            .await
            .expect("capabilities")
            .into_inner()
            .capabilities;
        assert_eq!(
            caps,
            vec![
                rpc_capability(rpc::Type::StageUnstageVolume),
                rpc_capability(rpc::Type::ExpandVolume),
                rpc_capability(rpc::Type::GetVolumeStats),
            ]
        );

        let info = h
            .service
            .node_get_info(Request::new(NodeGetInfoRequest {}))
            .await
            .expect("info")
            .into_inner();
        assert_eq!(info.node_id, "node-a");
        assert!(info.accessible_topology.is_none());
    }
}
