use raplcap_raw::{MsrAccess, MsrDevice, MsrError};

use crate::common::topology::Topology;
use crate::config::RaplCapConfig;
use crate::error::{RaplCapError, Result};

/// One open MSR device per package/die domain, in dense-index order
#[derive(Debug)]
pub struct MsrDevices {
    devices: Vec<Box<dyn MsrAccess>>,
}

impl MsrDevices {
    /// Open the representative CPU of every domain
    ///
    /// Prefers `msr_safe` and falls back to `msr` only when the former does
    /// not exist. On failure every device opened so far is closed again.
    pub fn open(topology: &Topology, config: &RaplCapConfig) -> Result<Self> {
        let mut devices = Vec::with_capacity(topology.num_domains());

        for domain in topology.domains() {
            match open_one(config, domain.cpu) {
                Ok(device) => devices.push(Box::new(device) as Box<dyn MsrAccess>),
                Err(e) => {
                    tracing::error!("Failed to open MSR device for CPU {}: {}", domain.cpu, e);
                    if let Err(close_err) = (Self { devices }).close() {
                        tracing::error!("Cleanup after failed open: {}", close_err);
                    }
                    return Err(RaplCapError::DeviceOpen(e));
                }
            }
        }

        tracing::info!(
            "Opened {} MSR device(s){}",
            devices.len(),
            if config.read_only { " read-only" } else { "" }
        );

        Ok(Self { devices })
    }

    /// Use already opened devices, one per domain in dense-index order
    pub fn from_devices(devices: Vec<Box<dyn MsrAccess>>) -> Self {
        Self { devices }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device(&self, index: usize) -> Result<&dyn MsrAccess> {
        self.devices.get(index).map(|d| d.as_ref()).ok_or_else(|| {
            RaplCapError::InvalidParameter(format!("No MSR device for domain {index}"))
        })
    }

    /// One 8-byte read of `msr` through the device of domain `index`
    pub fn read(&self, index: usize, msr: u64) -> Result<u64> {
        let device = self.device(index)?;
        let value = device.read(msr)?;
        tracing::debug!(
            "MSR read: CPU {} MSR 0x{:08x} = 0x{:016x}",
            device.cpu(),
            msr,
            value
        );
        Ok(value)
    }

    /// One 8-byte write of `msr` through the device of domain `index`
    pub fn write(&self, index: usize, msr: u64, value: u64) -> Result<()> {
        let device = self.device(index)?;
        tracing::debug!(
            "MSR write: CPU {} MSR 0x{:08x} = 0x{:016x}",
            device.cpu(),
            msr,
            value
        );
        device.write(msr, value)?;
        Ok(())
    }

    /// Close every device, continuing past failures; returns the last error
    pub fn close(self) -> Result<()> {
        let mut last_err = None;
        for device in self.devices {
            if let Err(e) = device.close() {
                tracing::error!("{}", e);
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

fn open_one(config: &RaplCapConfig, cpu: u32) -> std::result::Result<MsrDevice, MsrError> {
    match MsrDevice::open(config.msr_safe_path(cpu), cpu, config.read_only) {
        Ok(device) => Ok(device),
        Err(e) if e.is_not_found() => {
            tracing::info!("msr_safe not available for CPU {}, falling back to msr", cpu);
            MsrDevice::open(config.msr_path(cpu), cpu, config.read_only).map_err(|e| {
                if e.is_not_found() {
                    tracing::warn!("Is the msr kernel module loaded?");
                }
                e
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::topology::CpuTopology;
    use std::path::Path;

    fn fake_msr(root: &Path, cpu: u32, name: &str) {
        let dir = root.join(cpu.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let file = std::fs::File::create(dir.join(name)).unwrap();
        file.set_len(0x700).unwrap();
    }

    fn topology(n: u32) -> Topology {
        Topology::from_cpus(
            (0..n)
                .map(|cpu| CpuTopology { cpu, pkg: cpu, die: 0 })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_prefers_msr_safe() {
        let dir = tempfile::tempdir().unwrap();
        fake_msr(dir.path(), 0, "msr_safe");
        fake_msr(dir.path(), 0, "msr");
        let config = RaplCapConfig::default().with_dev_cpu_root(dir.path());

        let devices = MsrDevices::open(&topology(1), &config).unwrap();
        assert!(devices.device(0).unwrap().path().ends_with("msr_safe"));
        devices.close().unwrap();
    }

    #[test]
    fn test_falls_back_to_msr() {
        let dir = tempfile::tempdir().unwrap();
        fake_msr(dir.path(), 0, "msr");
        fake_msr(dir.path(), 1, "msr_safe");
        let config = RaplCapConfig::default().with_dev_cpu_root(dir.path());

        let devices = MsrDevices::open(&topology(2), &config).unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices.device(0).unwrap().path().ends_with("msr"));
        assert!(devices.device(1).unwrap().path().ends_with("msr_safe"));

        devices.write(1, 0x610, 0xDEAD_BEEF).unwrap();
        assert_eq!(devices.read(1, 0x610).unwrap(), 0xDEAD_BEEF);
        assert_eq!(devices.read(0, 0x610).unwrap(), 0);
        devices.close().unwrap();
    }

    #[test]
    fn test_missing_device_fails() {
        let dir = tempfile::tempdir().unwrap();
        fake_msr(dir.path(), 0, "msr");
        let config = RaplCapConfig::default().with_dev_cpu_root(dir.path());

        let err = MsrDevices::open(&topology(2), &config).unwrap_err();
        assert!(matches!(err, RaplCapError::DeviceOpen(ref e) if e.is_not_found()));
    }

    #[test]
    fn test_read_only_rejects_write() {
        let dir = tempfile::tempdir().unwrap();
        fake_msr(dir.path(), 0, "msr");
        let config = RaplCapConfig::default()
            .with_dev_cpu_root(dir.path())
            .with_read_only(true);

        let devices = MsrDevices::open(&topology(1), &config).unwrap();
        assert!(devices.read(0, 0x606).is_ok());
        assert!(matches!(
            devices.write(0, 0x610, 1),
            Err(RaplCapError::Msr(MsrError::WriteFailed { .. }))
        ));
    }

    #[test]
    fn test_bad_index() {
        let dir = tempfile::tempdir().unwrap();
        fake_msr(dir.path(), 0, "msr");
        let config = RaplCapConfig::default().with_dev_cpu_root(dir.path());

        let devices = MsrDevices::open(&topology(1), &config).unwrap();
        assert!(matches!(
            devices.read(1, 0x606),
            Err(RaplCapError::InvalidParameter(_))
        ));
    }
}
