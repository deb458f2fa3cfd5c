//! MSR (Model-Specific Register) device primitives
//!
//! This module provides low-level MSR access through `/dev/cpu/*/msr` or the
//! `msr_safe` allow-listed variant. Every access is a single positional 8-byte
//! transfer, so one handle can be shared by readers without seeking.
//! For topology-aware handle sets, use the higher-level abstractions in raplcap-msr.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::os::unix::io::IntoRawFd;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, MsrError>;

/// Size of one MSR transfer in bytes
pub const MSR_TRANSFER_SIZE: usize = 8;

/// Errors that can occur during MSR operations
#[derive(Debug, thiserror::Error)]
pub enum MsrError {
    #[error("Failed to open MSR device {} for CPU {cpu}: {source}", path.display())]
    OpenFailed {
        cpu: u32,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read MSR 0x{msr:X} from {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        msr: u64,
        source: std::io::Error,
    },

    #[error("Failed to write MSR 0x{msr:X} to {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        msr: u64,
        source: std::io::Error,
    },

    #[error(
        "Short {op} of MSR 0x{msr:X} on {}: transferred {actual} of 8 bytes",
        path.display()
    )]
    ShortTransfer {
        op: &'static str,
        path: PathBuf,
        msr: u64,
        actual: usize,
    },

    #[error("Failed to close MSR device {}: {source}", path.display())]
    CloseFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl MsrError {
    /// Whether the error means the register does not exist on this CPU.
    ///
    /// The msr driver reports unimplemented registers with `EIO`; a short
    /// transfer is treated the same way.
    pub fn is_unavailable(&self) -> bool {
        match self {
            MsrError::ShortTransfer { .. } => true,
            MsrError::ReadFailed { source, .. } | MsrError::WriteFailed { source, .. } => {
                source.raw_os_error() == Some(libc::EIO)
            }
            _ => false,
        }
    }

    /// Whether opening failed because the device node does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MsrError::OpenFailed { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// An open MSR device for one logical CPU
#[derive(Debug)]
pub struct MsrDevice {
    file: File,
    path: PathBuf,
    cpu: u32,
}

impl MsrDevice {
    /// Open the MSR device at `path` for logical CPU `cpu`
    ///
    /// # Errors
    ///
    /// Returns [`MsrError::OpenFailed`] if the device cannot be opened, e.g.
    /// because the kernel module is not loaded or the caller lacks
    /// `CAP_SYS_RAWIO` / ACL access.
    pub fn open(path: impl AsRef<Path>, cpu: u32, read_only: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(&path)
            .map_err(|e| MsrError::OpenFailed {
                cpu,
                path: path.clone(),
                source: e,
            })?;

        Ok(Self { file, path, cpu })
    }

    /// Read a 64-bit value from MSR `msr`
    ///
    /// # Example
    ///
    /// ```ignore
    /// use raplcap_raw::MsrDevice;
    ///
    /// let device = MsrDevice::open("/dev/cpu/0/msr", 0, true)?;
    /// let value = device.read(0x606)?;
    /// println!("MSR 0x606 = 0x{:016X}", value);
    /// ```
    pub fn read(&self, msr: u64) -> Result<u64> {
        let mut buffer = [0u8; MSR_TRANSFER_SIZE];
        let n = self
            .file
            .read_at(&mut buffer, msr)
            .map_err(|e| MsrError::ReadFailed {
                path: self.path.clone(),
                msr,
                source: e,
            })?;

        if n != MSR_TRANSFER_SIZE {
            return Err(MsrError::ShortTransfer {
                op: "read",
                path: self.path.clone(),
                msr,
                actual: n,
            });
        }

        Ok(u64::from_ne_bytes(buffer))
    }

    /// Write a 64-bit value to MSR `msr`
    ///
    /// # Safety
    ///
    /// Not `unsafe` in the Rust sense, but writing incorrect values to MSRs can
    /// cause system instability. Callers should read-modify-write only the
    /// fields they own.
    pub fn write(&self, msr: u64, value: u64) -> Result<()> {
        let n = self
            .file
            .write_at(&value.to_ne_bytes(), msr)
            .map_err(|e| MsrError::WriteFailed {
                path: self.path.clone(),
                msr,
                source: e,
            })?;

        if n != MSR_TRANSFER_SIZE {
            return Err(MsrError::ShortTransfer {
                op: "write",
                path: self.path.clone(),
                msr,
                actual: n,
            });
        }

        Ok(())
    }

    /// Close the device, reporting the error that dropping the file would swallow
    pub fn close(self) -> Result<()> {
        let path = self.path;
        nix::unistd::close(self.file.into_raw_fd()).map_err(|e| MsrError::CloseFailed {
            path,
            source: e.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cpu(&self) -> u32 {
        self.cpu
    }
}

/// Register access for one logical CPU
///
/// [`MsrDevice`] is the hardware implementation; callers that hold a set of
/// devices work through this trait so other backings can stand in for it.
pub trait MsrAccess: std::fmt::Debug + Send + Sync {
    fn read(&self, msr: u64) -> Result<u64>;

    fn write(&self, msr: u64, value: u64) -> Result<()>;

    fn close(self: Box<Self>) -> Result<()>;

    fn path(&self) -> &Path;

    fn cpu(&self) -> u32;
}

impl MsrAccess for MsrDevice {
    fn read(&self, msr: u64) -> Result<u64> {
        MsrDevice::read(self, msr)
    }

    fn write(&self, msr: u64, value: u64) -> Result<()> {
        MsrDevice::write(self, msr, value)
    }

    fn close(self: Box<Self>) -> Result<()> {
        MsrDevice::close(*self)
    }

    fn path(&self) -> &Path {
        MsrDevice::path(self)
    }

    fn cpu(&self) -> u32 {
        MsrDevice::cpu(self)
    }
}
