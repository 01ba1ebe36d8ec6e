// SPDX-License-Identifier: GPL-3.0-only

//! CSI Controller service
//!
//! Provisioning happens centrally: volumes are carved out of a shared volume
//! group and handed out as `<group>/<name>` identifiers. Nothing is cached;
//! every call re-reads the LVM state, which keeps each operation safe to
//! retry after a partial failure.

use std::sync::Arc;

use storage_contracts::LvmGateway;
use storage_sys::OWNERSHIP_TAG;
use storage_types::VolumeId;
use tonic::{Request, Response, Status};

use crate::capability;
use crate::csi::controller_server::Controller;
use crate::csi::controller_service_capability::{self, rpc};
use crate::csi::*;
use crate::error::{Result, ServiceError, respond};
use crate::locks::VolumeLocks;
use crate::VOLUME_GROUP_PARAMETER;

/// Clamp a byte count into the signed range CSI uses on the wire.
pub(crate) fn to_wire_bytes(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

/// Requested size of a capacity range. A zero minimum is legal CSI but this
/// driver needs an explicit size to allocate.
fn required_bytes(range: Option<&CapacityRange>) -> Result<u64> {
    let range = range.ok_or_else(|| ServiceError::invalid_argument("capacity range is required"))?;
    u64::try_from(range.required_bytes)
        .ok()
        .filter(|bytes| *bytes > 0)
        .ok_or_else(|| {
            ServiceError::invalid_argument(format!(
                "this driver needs an explicit minimum size (required_bytes > 0), got {}",
                range.required_bytes
            ))
        })
}

pub(crate) fn volume_id(raw: &str) -> Result<VolumeId> {
    if raw.is_empty() {
        return Err(ServiceError::invalid_argument("volume id is required"));
    }
    Ok(VolumeId::parse(raw)?)
}

pub struct ControllerService {
    lvm: Arc<dyn LvmGateway>,
    allowed_volume_groups: Vec<String>,
    locks: VolumeLocks,
}

impl ControllerService {
    /// An empty allow-list accepts any named group for creation but gives
    /// an implicit capacity query nothing to sum.
    pub fn new(lvm: Arc<dyn LvmGateway>, allowed_volume_groups: Vec<String>) -> Self {
        Self {
            lvm,
            allowed_volume_groups,
            locks: VolumeLocks::new(),
        }
    }

    fn check_allowed(&self, vg_name: &str) -> Result<()> {
        if self.allowed_volume_groups.is_empty()
            || self.allowed_volume_groups.iter().any(|vg| vg == vg_name)
        {
            return Ok(());
        }
        Err(ServiceError::invalid_argument(format!(
            "volume group '{vg_name}' is not allowed"
        )))
    }

    async fn create(&self, req: CreateVolumeRequest) -> Result<CreateVolumeResponse> {
        if req.name.is_empty() {
            return Err(ServiceError::invalid_argument("name is required"));
        }
        if req.volume_capabilities.is_empty() {
            return Err(ServiceError::invalid_argument(
                "volume capabilities are required",
            ));
        }
        let size = required_bytes(req.capacity_range.as_ref())?;

        let vg_name = req
            .parameters
            .get(VOLUME_GROUP_PARAMETER)
            .filter(|vg| !vg.is_empty())
            .ok_or_else(|| {
                ServiceError::invalid_argument(format!(
                    "parameter '{VOLUME_GROUP_PARAMETER}' is required"
                ))
            })?;
        self.check_allowed(vg_name)?;

        // The name must survive the trip through the `<group>/<name>` id.
        let id = VolumeId::parse(&format!("{vg_name}/{}", req.name))?;
        let _guard = self.locks.acquire(&id.to_string()).await;

        if let Some(existing) = self.lvm.get_lv(&id.vg_name, &id.lv_name).await? {
            if existing.size >= size {
                tracing::info!(
                    volume_id = %id,
                    size = existing.size,
                    "Volume already exists with sufficient size"
                );
                return Ok(volume_response(&id, existing.size));
            }
            return Err(ServiceError::AlreadyExists(format!(
                "volume '{id}' already exists with size {} smaller than requested {size}",
                existing.size
            )));
        }

        tracing::info!(volume_id = %id, size, "Creating logical volume");
        self.lvm
            .create_lv(&id.vg_name, &id.lv_name, size, &[OWNERSHIP_TAG.to_string()])
            .await?;

        // Allocation rounds up to whole extents, so report what LVM actually made.
        let created = self
            .lvm
            .get_lv(&id.vg_name, &id.lv_name)
            .await?
            .ok_or_else(|| {
                ServiceError::internal(format!("volume '{id}' not found after creation"))
            })?;

        Ok(volume_response(&id, created.size))
    }

    async fn delete(&self, req: DeleteVolumeRequest) -> Result<DeleteVolumeResponse> {
        let id = volume_id(&req.volume_id)?;
        let _guard = self.locks.acquire(&req.volume_id).await;

        // Deletion is reported as done even when lvremove fails; the failure
        // is only logged.
        match self.lvm.delete_lv(&id.vg_name, &id.lv_name).await {
            Ok(()) => tracing::info!(volume_id = %id, "Deleted volume"),
            Err(err) => tracing::warn!(volume_id = %id, error = %err, "Failed to delete volume"),
        }

        Ok(DeleteVolumeResponse {})
    }

    async fn capacity(&self, req: GetCapacityRequest) -> Result<GetCapacityResponse> {
        let named = req
            .parameters
            .get(VOLUME_GROUP_PARAMETER)
            .filter(|vg| !vg.is_empty());

        let available = match named {
            Some(vg_name) => {
                self.check_allowed(vg_name)?;
                match self.lvm.get_vg(vg_name).await? {
                    Some(vg) => vg.free,
                    None => {
                        tracing::warn!(group = %vg_name, "Volume group not found");
                        0
                    }
                }
            }
            None => self.allowed_free_space().await,
        };

        Ok(GetCapacityResponse {
            available_capacity: to_wire_bytes(available),
            maximum_volume_size: None,
            minimum_volume_size: None,
        })
    }

    /// Free space summed over the allow-list, skipping groups that cannot
    /// be queried.
    async fn allowed_free_space(&self) -> u64 {
        let mut total: u64 = 0;
        for vg_name in &self.allowed_volume_groups {
            match self.lvm.get_vg(vg_name).await {
                Ok(Some(vg)) => total = total.saturating_add(vg.free),
                Ok(None) => tracing::warn!(group = %vg_name, "Volume group not found"),
                Err(err) => {
                    tracing::warn!(group = %vg_name, error = %err, "Failed to query volume group")
                }
            }
        }
        total
    }

    async fn expand(
        &self,
        req: ControllerExpandVolumeRequest,
    ) -> Result<ControllerExpandVolumeResponse> {
        let id = volume_id(&req.volume_id)?;
        let requested = required_bytes(req.capacity_range.as_ref())?;
        let _guard = self.locks.acquire(&req.volume_id).await;

        let lv = self
            .lvm
            .get_lv(&id.vg_name, &id.lv_name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("volume '{id}' not found")))?;

        let node_expansion_required = !capability::is_block(req.volume_capability.as_ref());

        if lv.size >= requested {
            tracing::info!(
                volume_id = %id,
                size = lv.size,
                requested,
                "Volume already at requested size"
            );
            return Ok(ControllerExpandVolumeResponse {
                capacity_bytes: to_wire_bytes(lv.size),
                node_expansion_required,
            });
        }

        tracing::info!(volume_id = %id, from = lv.size, to = requested, "Extending volume");
        self.lvm
            .resize_lv(&id.vg_name, &id.lv_name, requested)
            .await?;

        Ok(ControllerExpandVolumeResponse {
            capacity_bytes: to_wire_bytes(requested),
            node_expansion_required,
        })
    }
}

fn volume_response(id: &VolumeId, size: u64) -> CreateVolumeResponse {
    CreateVolumeResponse {
        volume: Some(Volume {
            capacity_bytes: to_wire_bytes(size),
            volume_id: id.to_string(),
            ..Default::default()
        }),
    }
}

fn rpc_capability(kind: rpc::Type) -> ControllerServiceCapability {
    ControllerServiceCapability {
        r#type: Some(controller_service_capability::Type::Rpc(
            controller_service_capability::Rpc {
                r#type: kind as i32,
            },
        )),
    }
}

#[tonic::async_trait]
impl Controller for ControllerService {
    async fn create_volume(
        &self,
        request: Request<CreateVolumeRequest>,
    ) -> std::result::Result<Response<CreateVolumeResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(name = %req.name, parameters = ?req.parameters, "CreateVolume called");
        respond("CreateVolume", self.create(req).await)
    }

    async fn delete_volume(
        &self,
        request: Request<DeleteVolumeRequest>,
    ) -> std::result::Result<Response<DeleteVolumeResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(volume_id = %req.volume_id, "DeleteVolume called");
        respond("DeleteVolume", self.delete(req).await)
    }

    async fn controller_publish_volume(
        &self,
        _request: Request<ControllerPublishVolumeRequest>,
    ) -> std::result::Result<Response<ControllerPublishVolumeResponse>, Status> {
        Err(Status::unimplemented("ControllerPublishVolume is not supported"))
    }

    async fn controller_unpublish_volume(
        &self,
        _request: Request<ControllerUnpublishVolumeRequest>,
    ) -> std::result::Result<Response<ControllerUnpublishVolumeResponse>, Status> {
        Err(Status::unimplemented("ControllerUnpublishVolume is not supported"))
    }

    async fn validate_volume_capabilities(
        &self,
        _request: Request<ValidateVolumeCapabilitiesRequest>,
    ) -> std::result::Result<Response<ValidateVolumeCapabilitiesResponse>, Status> {
        Err(Status::unimplemented("ValidateVolumeCapabilities is not supported"))
    }

    async fn list_volumes(
        &self,
        _request: Request<ListVolumesRequest>,
    ) -> std::result::Result<Response<ListVolumesResponse>, Status> {
        Err(Status::unimplemented("ListVolumes is not supported"))
    }

    async fn get_capacity(
        &self,
        request: Request<GetCapacityRequest>,
    ) -> std::result::Result<Response<GetCapacityResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(parameters = ?req.parameters, "GetCapacity called");
        respond("GetCapacity", self.capacity(req).await)
    }

    async fn controller_get_capabilities(
        &self,
        _request: Request<ControllerGetCapabilitiesRequest>,
    ) -> std::result::Result<Response<ControllerGetCapabilitiesResponse>, Status> {
        tracing::debug!("ControllerGetCapabilities called");
        Ok(Response::new(ControllerGetCapabilitiesResponse {
            capabilities: vec![
                rpc_capability(rpc::Type::CreateDeleteVolume),
                rpc_capability(rpc::Type::GetCapacity),
                rpc_capability(rpc::Type::ExpandVolume),
            ],
        }))
    }

    async fn create_snapshot(
        &self,
        _request: Request<CreateSnapshotRequest>,
    ) -> std::result::Result<Response<CreateSnapshotResponse>, Status> {
        Err(Status::unimplemented("CreateSnapshot is not supported"))
    }

    async fn delete_snapshot(
        &self,
        _request: Request<DeleteSnapshotRequest>,
    ) -> std::result::Result<Response<DeleteSnapshotResponse>, Status> {
        Err(Status::unimplemented("DeleteSnapshot is not supported"))
    }

    async fn list_snapshots(
        &self,
        _request: Request<ListSnapshotsRequest>,
    ) -> std::result::Result<Response<ListSnapshotsResponse>, Status> {
        Err(Status::unimplemented("ListSnapshots is not supported"))
    }

    async fn controller_expand_volume(
        &self,
        request: Request<ControllerExpandVolumeRequest>,
    ) -> std::result::Result<Response<ControllerExpandVolumeResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(volume_id = %req.volume_id, "ControllerExpandVolume called");
        respond("ControllerExpandVolume", self.expand(req).await)
    }

    async fn controller_get_volume(
        &self,
        _request: Request<ControllerGetVolumeRequest>,
    ) -> std::result::Result<Response<ControllerGetVolumeResponse>, Status> {
        Err(Status::unimplemented("ControllerGetVolume is not supported"))
    }

    async fn controller_modify_volume(
        &self,
        _request: Request<ControllerModifyVolumeRequest>,
    ) -> std::result::Result<Response<ControllerModifyVolumeResponse>, Status> {
        Err(Status::unimplemented("ControllerModifyVolume is not supported"))
    }
}
