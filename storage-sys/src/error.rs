// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::StorageError;
use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse {what}: {output:?}")]
    Parse { what: &'static str, output: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("not supported: {0}")]
    Unsupported(String),
}

impl From<SysError> for StorageError {
    fn from(err: SysError) -> Self {
        match err {
            SysError::Unsupported(msg) => {
                StorageError::new(storage_contracts::StorageErrorKind::Unsupported, msg)
            }
            other => StorageError::internal(other.to_string()),
        }
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
