// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{StorageError, StorageErrorKind};
use storage_types::InvalidVolumeId;
use thiserror::Error;
use tonic::Status;

/// Service-level errors, one variant per gRPC status the driver reports
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Unimplemented(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err.kind {
            StorageErrorKind::InvalidInput => ServiceError::InvalidArgument(err.message),
            StorageErrorKind::NotFound => ServiceError::NotFound(err.message),
            StorageErrorKind::Conflict => ServiceError::AlreadyExists(err.message),
            StorageErrorKind::Unsupported => ServiceError::Unimplemented(err.message),
            StorageErrorKind::Internal => ServiceError::Internal(err.message),
        }
    }
}

impl From<InvalidVolumeId> for ServiceError {
    fn from(err: InvalidVolumeId) -> Self {
        ServiceError::InvalidArgument(err.to_string())
    }
}

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidArgument(msg) => Status::invalid_argument(msg),
            ServiceError::NotFound(msg) => Status::not_found(msg),
            ServiceError::AlreadyExists(msg) => Status::already_exists(msg),
            ServiceError::Unimplemented(msg) => Status::unimplemented(msg),
            ServiceError::Internal(msg) => Status::internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Wrap a handler result for tonic, logging failures once at the edge.
pub(crate) fn respond<T>(
    method: &'static str,
    result: Result<T>,
) -> std::result::Result<tonic::Response<T>, Status> {
    result.map(tonic::Response::new).map_err(|err| {
        tracing::error!(method, error = %err, "Request failed");
        Status::from(err)
    })
}

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::*;

    #[test]
    fn storage_kinds_map_to_grpc_codes() {
        let cases = [
            (StorageError::invalid_input("bad"), Code::InvalidArgument),
            (StorageError::not_found("gone"), Code::NotFound),
            (StorageError::conflict("taken"), Code::AlreadyExists),
            (
                StorageError::new(StorageErrorKind::Unsupported, "vfat"),
                Code::Unimplemented,
            ),
            (StorageError::internal("boom"), Code::Internal),
        ];

        for (err, code) in cases {
            let message = err.message.clone();
            let status = Status::from(ServiceError::from(err));
            assert_eq!(status.code(), code);
            assert_eq!(status.message(), message);
        }
    }

    #[test]
    fn malformed_volume_id_is_invalid_argument() {
        let err = storage_types::VolumeId::parse("vg1").unwrap_err();
        let status = Status::from(ServiceError::from(err));
        assert_eq!(status.code(), Code::InvalidArgument);
    }
}
