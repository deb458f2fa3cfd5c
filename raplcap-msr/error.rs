use thiserror::Error;

use raplcap_raw::MsrError;

#[derive(Error, Debug)]
pub enum RaplCapError {
    #[error("Unsupported CPU: {0}")]
    UnsupportedCpu(String),

    #[error("Failed to open MSR device: {0}")]
    DeviceOpen(#[source] MsrError),

    #[error("MSR operation failed: {0}")]
    Msr(#[from] MsrError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Topology discovery failed: {0}")]
    Topology(String),

    #[error("Topology overflow: {0}")]
    TopologyOverflow(String),

    #[error("RAPLCap context not initialized")]
    NotInitialized,

    #[error("Nix error: {0}")]
    Nix(#[from] nix::Error),
}

impl RaplCapError {
    /// Whether the error means the addressed register does not exist
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RaplCapError::Msr(e) if e.is_unavailable())
    }
}

pub type Result<T> = std::result::Result<T, RaplCapError>;
