// Package/die topology discovery from sysfs

use crate::config::{read_sysfs_u32, RaplCapConfig};
use crate::error::{RaplCapError, Result};

/// Upper bound on `n_pkg * n_die` slots in the domain table
pub const MAX_DOMAIN_SLOTS: usize = 1 << 16;

/// Location of one logical CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTopology {
    pub cpu: u32,
    pub pkg: u32,
    pub die: u32,
}

/// Package/die domains and the logical CPU used to reach each one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    n_pkg: u32,
    n_die: u32,
    /// Representative CPU of each domain, in dense-index order
    domains: Vec<CpuTopology>,
    /// `pkg * n_die + die` -> dense index, `None` for pairs with no CPU
    slots: Vec<Option<usize>>,
}

impl Topology {
    /// Read the topology of every online CPU below `config.sysfs_cpu_root`
    pub fn discover(config: &RaplCapConfig) -> Result<Self> {
        let cpus = config.detect_online_cpus()?;
        let mut entries = Vec::with_capacity(cpus.len());

        for cpu in cpus {
            let pkg_path = config.topology_path(cpu, "physical_package_id");
            let pkg = read_sysfs_u32(&pkg_path).map_err(|e| {
                RaplCapError::Topology(format!(
                    "Failed to read package of CPU {cpu} from {}: {e}",
                    pkg_path.display()
                ))
            })?;

            let die_path = config.topology_path(cpu, "die_id");
            let die = match read_sysfs_u32(&die_path) {
                Ok(die) => die,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                Err(e) => {
                    return Err(RaplCapError::Topology(format!(
                        "Failed to read die of CPU {cpu} from {}: {e}",
                        die_path.display()
                    )))
                }
            };

            entries.push(CpuTopology { cpu, pkg, die });
        }

        Self::from_cpus(entries)
    }

    /// Group CPUs by `(pkg, die)`; the first CPU listed for a pair represents it
    pub fn from_cpus(mut cpus: Vec<CpuTopology>) -> Result<Self> {
        if cpus.is_empty() {
            return Err(RaplCapError::Topology("No online CPUs".to_string()));
        }

        // stable: the representative stays the first CPU listed for its pair
        cpus.sort_by_key(|c| (c.pkg, c.die));

        let mut domains: Vec<CpuTopology> = Vec::new();
        for c in cpus {
            if domains.last().map_or(true, |d| (d.pkg, d.die) != (c.pkg, c.die)) {
                domains.push(c);
            }
        }

        let overflow = || {
            RaplCapError::TopologyOverflow("Package/die ids exceed the domain table".to_string())
        };
        // domains is sorted, so the last entry has the largest package
        let n_pkg = domains
            .last()
            .map(|d| d.pkg)
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(overflow)?;
        let n_die = domains
            .iter()
            .map(|d| d.die)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(overflow)?;

        let n_slots = (n_pkg as usize)
            .checked_mul(n_die as usize)
            .filter(|&n| n <= MAX_DOMAIN_SLOTS)
            .ok_or_else(|| {
                RaplCapError::TopologyOverflow(format!(
                    "{n_pkg} packages x {n_die} dies exceeds {MAX_DOMAIN_SLOTS} domains"
                ))
            })?;

        let mut slots = vec![None; n_slots];
        for (index, d) in domains.iter().enumerate() {
            slots[d.pkg as usize * n_die as usize + d.die as usize] = Some(index);
        }

        tracing::debug!(
            "Topology: n_pkg={}, n_die={}, n_domains={}",
            n_pkg,
            n_die,
            domains.len()
        );

        Ok(Self {
            n_pkg,
            n_die,
            domains,
            slots,
        })
    }

    /// `max(package id) + 1`
    pub fn num_packages(&self) -> u32 {
        self.n_pkg
    }

    /// `max(die id) + 1`, assumed the same for every package
    pub fn num_die(&self) -> u32 {
        self.n_die
    }

    /// Number of distinct `(pkg, die)` pairs
    pub fn num_domains(&self) -> usize {
        self.domains.len()
    }

    /// Representative CPUs in dense-index order
    pub fn domains(&self) -> &[CpuTopology] {
        &self.domains
    }

    /// Dense index of `(pkg, die)`
    pub fn domain_index(&self, pkg: u32, die: u32) -> Result<usize> {
        if pkg >= self.n_pkg || die >= self.n_die {
            return Err(RaplCapError::InvalidParameter(format!(
                "pkg={pkg}, die={die} out of range (n_pkg={}, n_die={})",
                self.n_pkg, self.n_die
            )));
        }
        self.slots[pkg as usize * self.n_die as usize + die as usize].ok_or_else(|| {
            RaplCapError::InvalidParameter(format!("No CPU in pkg={pkg}, die={die}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn cpus(pkgs: &[u32]) -> Vec<CpuTopology> {
        pkgs.iter()
            .enumerate()
            .map(|(cpu, &pkg)| CpuTopology {
                cpu: cpu as u32,
                pkg,
                die: 0,
            })
            .collect()
    }

    fn write_cpu(root: &Path, cpu: u32, pkg: u32, die: Option<u32>) {
        let dir = root.join(format!("cpu{cpu}")).join("topology");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("physical_package_id"), format!("{pkg}\n")).unwrap();
        if let Some(die) = die {
            std::fs::write(dir.join("die_id"), format!("{die}\n")).unwrap();
        }
    }

    #[test]
    fn test_sparse_package_ids() {
        let topo = Topology::from_cpus(cpus(&[5, 5, 2, 2, 5, 5, 2, 2])).unwrap();

        assert_eq!(topo.num_packages(), 6);
        assert_eq!(topo.num_die(), 1);
        assert_eq!(topo.num_domains(), 2);

        // pkg 2 sorts first: CPUs 2,3,6,7 -> 0, CPUs 0,1,4,5 -> 1
        assert_eq!(topo.domain_index(2, 0).unwrap(), 0);
        assert_eq!(topo.domain_index(5, 0).unwrap(), 1);
        assert_eq!(topo.domains()[0].cpu, 2);
        assert_eq!(topo.domains()[1].cpu, 0);

        assert!(matches!(
            topo.domain_index(3, 0),
            Err(RaplCapError::InvalidParameter(_))
        ));
        assert!(topo.domain_index(6, 0).is_err());
        assert!(topo.domain_index(5, 1).is_err());
    }

    #[test]
    fn test_multi_die() {
        let entries = vec![
            CpuTopology { cpu: 0, pkg: 0, die: 0 },
            CpuTopology { cpu: 1, pkg: 0, die: 1 },
            CpuTopology { cpu: 2, pkg: 1, die: 0 },
            CpuTopology { cpu: 3, pkg: 1, die: 1 },
            CpuTopology { cpu: 4, pkg: 0, die: 1 },
        ];
        let topo = Topology::from_cpus(entries).unwrap();

        assert_eq!(topo.num_packages(), 2);
        assert_eq!(topo.num_die(), 2);
        assert_eq!(topo.num_domains(), 4);
        assert_eq!(topo.domain_index(1, 1).unwrap(), 3);
        assert_eq!(topo.domains()[1].cpu, 1);
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(
            Topology::from_cpus(Vec::new()),
            Err(RaplCapError::Topology(_))
        ));
    }

    #[test]
    fn test_overflow() {
        let entries = vec![CpuTopology {
            cpu: 0,
            pkg: 1 << 20,
            die: 0,
        }];
        assert!(matches!(
            Topology::from_cpus(entries),
            Err(RaplCapError::TopologyOverflow(_))
        ));

        let entries = vec![CpuTopology {
            cpu: 0,
            pkg: u32::MAX,
            die: 0,
        }];
        assert!(matches!(
            Topology::from_cpus(entries),
            Err(RaplCapError::TopologyOverflow(_))
        ));
    }

    #[test]
    fn test_discover_from_sysfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("online"), "0-3\n").unwrap();
        write_cpu(dir.path(), 0, 0, None);
        write_cpu(dir.path(), 1, 0, None);
        write_cpu(dir.path(), 2, 1, None);
        write_cpu(dir.path(), 3, 1, None);

        let config = RaplCapConfig::default().with_sysfs_cpu_root(dir.path());
        let topo = Topology::discover(&config).unwrap();
        assert_eq!(topo.num_packages(), 2);
        assert_eq!(topo.num_domains(), 2);
        assert_eq!(topo.domains()[1].cpu, 2);
    }

    #[test]
    fn test_discover_with_die_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("online"), "0-1\n").unwrap();
        write_cpu(dir.path(), 0, 0, Some(0));
        write_cpu(dir.path(), 1, 0, Some(1));

        let config = RaplCapConfig::default().with_sysfs_cpu_root(dir.path());
        let topo = Topology::discover(&config).unwrap();
        assert_eq!(topo.num_packages(), 1);
        assert_eq!(topo.num_die(), 2);
        assert_eq!(topo.num_domains(), 2);
    }

    #[test]
    fn test_discover_missing_package_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("online"), "0\n").unwrap();

        let config = RaplCapConfig::default().with_sysfs_cpu_root(dir.path());
        assert!(matches!(
            Topology::discover(&config),
            Err(RaplCapError::Topology(_))
        ));
    }
}
