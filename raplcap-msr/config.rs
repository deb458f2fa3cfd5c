use std::path::{Path, PathBuf};

use crate::error::{RaplCapError, Result};

/// Environment variable that switches device handles to read-only
pub const READ_ONLY_ENV: &str = "RAPLCAP_READ_ONLY";

pub const DEFAULT_SYSFS_CPU_ROOT: &str = "/sys/devices/system/cpu";
pub const DEFAULT_DEV_CPU_ROOT: &str = "/dev/cpu";

/// Where topology and MSR devices are found, and how devices are opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaplCapConfig {
    pub sysfs_cpu_root: PathBuf,
    pub dev_cpu_root: PathBuf,
    pub read_only: bool,
}

impl Default for RaplCapConfig {
    fn default() -> Self {
        Self {
            sysfs_cpu_root: PathBuf::from(DEFAULT_SYSFS_CPU_ROOT),
            dev_cpu_root: PathBuf::from(DEFAULT_DEV_CPU_ROOT),
            read_only: false,
        }
    }
}

impl RaplCapConfig {
    /// Default paths, with `read_only` taken from `RAPLCAP_READ_ONLY`
    pub fn from_env() -> Self {
        let read_only = std::env::var(READ_ONLY_ENV)
            .ok()
            .map(|v| Self::parse_read_only(&v))
            .unwrap_or(false);

        if read_only {
            tracing::info!("{} is set, opening MSR devices read-only", READ_ONLY_ENV);
        }

        Self {
            read_only,
            ..Self::default()
        }
    }

    /// Integer flag: any non-zero value enables read-only mode, garbage counts as 0
    pub fn parse_read_only(value: &str) -> bool {
        value.trim().parse::<i64>().map(|v| v != 0).unwrap_or(false)
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_sysfs_cpu_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_cpu_root = root.into();
        self
    }

    pub fn with_dev_cpu_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.dev_cpu_root = root.into();
        self
    }

    /// `<dev_cpu_root>/<cpu>/msr_safe`
    pub fn msr_safe_path(&self, cpu: u32) -> PathBuf {
        self.dev_cpu_root.join(cpu.to_string()).join("msr_safe")
    }

    /// `<dev_cpu_root>/<cpu>/msr`
    pub fn msr_path(&self, cpu: u32) -> PathBuf {
        self.dev_cpu_root.join(cpu.to_string()).join("msr")
    }

    /// `<sysfs_cpu_root>/cpu<cpu>/topology/<attr>`
    pub fn topology_path(&self, cpu: u32, attr: &str) -> PathBuf {
        self.sysfs_cpu_root
            .join(format!("cpu{cpu}"))
            .join("topology")
            .join(attr)
    }

    /// Online logical CPUs, ascending
    ///
    /// Reads `<sysfs_cpu_root>/online`; when that file is missing, asks
    /// `sysconf(_SC_NPROCESSORS_ONLN)` and assumes CPUs `0..n`.
    pub fn detect_online_cpus(&self) -> Result<Vec<u32>> {
        let online = self.sysfs_cpu_root.join("online");
        match std::fs::read_to_string(&online) {
            Ok(s) => parse_cpu_list(&s).ok_or_else(|| {
                RaplCapError::Topology(format!(
                    "Malformed CPU list in {}: {:?}",
                    online.display(),
                    s.trim()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} not found, falling back to sysconf", online.display());
                online_cpus_from_sysconf()
            }
            Err(e) => Err(RaplCapError::Topology(format!(
                "Failed to read {}: {e}",
                online.display()
            ))),
        }
    }
}

fn online_cpus_from_sysconf() -> Result<Vec<u32>> {
    let n = nix::unistd::sysconf(nix::unistd::SysconfVar::_NPROCESSORS_ONLN)?
        .filter(|&n| n > 0)
        .ok_or_else(|| RaplCapError::Topology("No online CPUs reported by sysconf".to_string()))?;
    let n = u32::try_from(n)
        .map_err(|_| RaplCapError::TopologyOverflow(format!("{n} online CPUs")))?;
    Ok((0..n).collect())
}

/// Parse a CPU list like "0-3,8-11" into ascending, deduplicated CPU ids
pub fn parse_cpu_list(s: &str) -> Option<Vec<u32>> {
    let mut cpus = Vec::new();
    for part in s.trim().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start.trim().parse().ok()?;
            let end: u32 = end.trim().parse().ok()?;
            if start > end {
                return None;
            }
            cpus.extend(start..=end);
        } else {
            cpus.push(part.parse().ok()?);
        }
    }
    cpus.sort_unstable();
    cpus.dedup();
    Some(cpus)
}

/// Read a sysfs attribute holding one unsigned integer
pub(crate) fn read_sysfs_u32(path: &Path) -> std::io::Result<u32> {
    let s = std::fs::read_to_string(path)?;
    s.trim().parse().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {e}", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(parse_cpu_list("0-3,8-11\n"), Some(vec![0, 1, 2, 3, 8, 9, 10, 11]));
        assert_eq!(parse_cpu_list("0"), Some(vec![0]));
        assert_eq!(parse_cpu_list("4,0-1,1"), Some(vec![0, 1, 4]));
        assert_eq!(parse_cpu_list("0-x"), None);
        assert_eq!(parse_cpu_list("3-1"), None);
        assert_eq!(parse_cpu_list(""), Some(vec![]));
    }

    #[test]
    fn test_parse_read_only() {
        assert!(RaplCapConfig::parse_read_only("1"));
        assert!(RaplCapConfig::parse_read_only(" -2 "));
        assert!(!RaplCapConfig::parse_read_only("0"));
        assert!(!RaplCapConfig::parse_read_only("yes"));
        assert!(!RaplCapConfig::parse_read_only(""));
    }

    #[test]
    fn test_paths() {
        let config = RaplCapConfig::default()
            .with_dev_cpu_root("/tmp/dev/cpu")
            .with_sysfs_cpu_root("/tmp/sys/cpu");

        assert_eq!(config.msr_safe_path(3), PathBuf::from("/tmp/dev/cpu/3/msr_safe"));
        assert_eq!(config.msr_path(3), PathBuf::from("/tmp/dev/cpu/3/msr"));
        assert_eq!(
            config.topology_path(7, "die_id"),
            PathBuf::from("/tmp/sys/cpu/cpu7/topology/die_id")
        );
    }

    #[test]
    fn test_detect_online_cpus_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("online"), "0-2,5\n").unwrap();
        let config = RaplCapConfig::default().with_sysfs_cpu_root(dir.path());

        assert_eq!(config.detect_online_cpus().unwrap(), vec![0, 1, 2, 5]);
    }

    #[test]
    fn test_detect_online_cpus_sysconf_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = RaplCapConfig::default().with_sysfs_cpu_root(dir.path());

        let cpus = config.detect_online_cpus().unwrap();
        assert!(!cpus.is_empty());
        assert_eq!(cpus[0], 0);
    }

    #[test]
    fn test_detect_online_cpus_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("online"), "garbage").unwrap();
        let config = RaplCapConfig::default().with_sysfs_cpu_root(dir.path());

        assert!(matches!(
            config.detect_online_cpus(),
            Err(RaplCapError::Topology(_))
        ));
    }
}
