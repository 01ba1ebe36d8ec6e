// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("unsupported endpoint scheme in '{0}', expected unix:// or tcp://")]
    UnsupportedScheme(String),

    #[error("endpoint '{0}' has no address")]
    EmptyAddress(String),
}

/// Listener address of the gRPC server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (scheme, address) = raw
            .split_once("://")
            .ok_or_else(|| EndpointError::UnsupportedScheme(raw.to_string()))?;

        if address.is_empty() {
            return Err(EndpointError::EmptyAddress(raw.to_string()));
        }

        match scheme.to_ascii_lowercase().as_str() {
            "unix" => Ok(Endpoint::Unix(PathBuf::from(address))),
            "tcp" => Ok(Endpoint::Tcp(address.to_string())),
            _ => Err(EndpointError::UnsupportedScheme(raw.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}
