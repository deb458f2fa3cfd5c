// RAPL capping context: CPU model, topology and open MSR devices

use raplcap_raw::rapl::msr::MSR_RAPL_POWER_UNIT;
use raplcap_raw::MsrValue;

use crate::codec::UnitContext;
use crate::common::arch::CpuModel;
use crate::common::{cpuid, MsrDevices, Topology};
use crate::config::RaplCapConfig;
use crate::error::{RaplCapError, Result};
use crate::types::{Constraint, Limit, Zone, ZoneLimits};

/// An initialized RAPL context
///
/// Every operation takes `(pkg, die, zone[, constraint])`, validates it before
/// any I/O, and performs at most one read and one write per register. There is
/// no internal locking: two threads running read-modify-write sequences on the
/// same register can lose an update. Wrap the context in
/// [`LockedRaplCap`](crate::orchestrator::LockedRaplCap) to serialize callers.
///
/// Dropping the context closes every device; [`RaplCap::destroy`] does the
/// same but reports close failures.
#[derive(Debug)]
pub struct RaplCap {
    units: UnitContext,
    topology: Topology,
    devices: MsrDevices,
}

impl RaplCap {
    /// Initialize with default paths and `RAPLCAP_READ_ONLY` from the environment
    pub fn new() -> Result<Self> {
        Self::with_config(&RaplCapConfig::from_env())
    }

    /// Identify the running CPU, then initialize with `config`
    pub fn with_config(config: &RaplCapConfig) -> Result<Self> {
        let model = cpuid::supported_model()?;
        Self::with_model(model, config)
    }

    /// Initialize for a known model, skipping CPUID
    pub fn with_model(model: &'static CpuModel, config: &RaplCapConfig) -> Result<Self> {
        let topology = Topology::discover(config)?;
        let devices = MsrDevices::open(&topology, config)?;
        Self::with_devices(model, topology, devices)
    }

    /// Initialize from devices already opened for `topology`; the devices are
    /// closed again if the unit register cannot be read
    pub fn with_devices(
        model: &'static CpuModel,
        topology: Topology,
        devices: MsrDevices,
    ) -> Result<Self> {
        let units_msrval = match devices.read(0, MSR_RAPL_POWER_UNIT) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Failed to read RAPL unit register: {}", e);
                if let Err(close_err) = devices.close() {
                    tracing::error!("Cleanup after failed init: {}", close_err);
                }
                return Err(e);
            }
        };

        Ok(Self::from_parts(
            UnitContext::new(model, units_msrval),
            topology,
            devices,
        ))
    }

    pub fn from_parts(units: UnitContext, topology: Topology, devices: MsrDevices) -> Self {
        tracing::info!(
            "RAPL context initialized: {}, {} package(s), {} die(s) per package, {} domain(s)",
            units.model().name,
            topology.num_packages(),
            topology.num_die(),
            topology.num_domains()
        );
        Self {
            units,
            topology,
            devices,
        }
    }

    /// Close every device; all are attempted, the last failure is returned
    pub fn destroy(self) -> Result<()> {
        tracing::debug!("Destroying RAPL context");
        self.devices.close()
    }

    pub fn model(&self) -> &'static CpuModel {
        self.units.model()
    }

    pub fn units(&self) -> &UnitContext {
        &self.units
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn num_packages(&self) -> u32 {
        self.topology.num_packages()
    }

    pub fn num_die(&self, pkg: u32) -> Result<u32> {
        if pkg >= self.topology.num_packages() {
            return Err(RaplCapError::InvalidParameter(format!(
                "pkg={pkg} out of range (n_pkg={})",
                self.topology.num_packages()
            )));
        }
        Ok(self.topology.num_die())
    }

    fn domain(&self, pkg: u32, die: u32) -> Result<usize> {
        self.topology.domain_index(pkg, die)
    }

    fn require_constraint(&self, zone: Zone, constraint: Constraint) -> Result<()> {
        if self.units.zone_config(zone).has_constraint(constraint) {
            Ok(())
        } else {
            Err(RaplCapError::InvalidParameter(format!(
                "{zone} has no {constraint} constraint on {}",
                self.model().name
            )))
        }
    }

    fn read(&self, domain: usize, msr: u64) -> Result<MsrValue> {
        self.devices.read(domain, msr).map(MsrValue::new)
    }

    fn write(&self, domain: usize, msr: u64, value: MsrValue) -> Result<()> {
        self.devices.write(domain, msr, value.raw())
    }

    /// Probe the zone's power-limit register; an absent register is `Ok(false)`
    pub fn is_zone_supported(&self, pkg: u32, die: u32, zone: Zone) -> Result<bool> {
        let domain = self.domain(pkg, die)?;
        self.probe(domain, zone.power_limit_msr())
    }

    /// Whether the zone has `constraint` and its register can be read
    pub fn is_constraint_supported(
        &self,
        pkg: u32,
        die: u32,
        zone: Zone,
        constraint: Constraint,
    ) -> Result<bool> {
        let domain = self.domain(pkg, die)?;
        if !self.units.zone_config(zone).has_constraint(constraint) {
            return Ok(false);
        }
        self.probe(domain, self.units.limit_msr(zone, constraint))
    }

    fn probe(&self, domain: usize, msr: u64) -> Result<bool> {
        match self.read(domain, msr) {
            Ok(_) => Ok(true),
            Err(e) if e.is_unavailable() => {
                tracing::debug!("MSR 0x{:X} not available: {}", msr, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Enabled iff every constraint of the zone is enabled
    pub fn is_zone_enabled(&self, pkg: u32, die: u32, zone: Zone) -> Result<bool> {
        let domain = self.domain(pkg, die)?;
        let value = self.read(domain, zone.power_limit_msr())?;
        Ok(self.units.is_zone_enabled(zone, value))
    }

    /// Set every enable bit of the zone in one write, then clamping in a
    /// second write; a clamping failure is only logged
    pub fn set_zone_enabled(&self, pkg: u32, die: u32, zone: Zone, enabled: bool) -> Result<()> {
        let domain = self.domain(pkg, die)?;
        let msr = zone.power_limit_msr();

        let value = self.read(domain, msr)?;
        let value = self.units.set_zone_enabled(zone, value, enabled);
        self.write(domain, msr, value)?;

        let clamped = self.units.set_zone_clamped(zone, value, enabled);
        if clamped != value {
            if let Err(e) = self.write(domain, msr, clamped) {
                tracing::warn!(
                    "Failed to {} clamping for {}: {}",
                    if enabled { "enable" } else { "disable" },
                    zone,
                    e
                );
            }
        }
        Ok(())
    }

    pub fn is_zone_clamped(&self, pkg: u32, die: u32, zone: Zone) -> Result<bool> {
        let domain = self.domain(pkg, die)?;
        let value = self.read(domain, zone.power_limit_msr())?;
        Ok(self.units.is_zone_clamped(zone, value))
    }

    pub fn set_zone_clamped(&self, pkg: u32, die: u32, zone: Zone, clamped: bool) -> Result<()> {
        let domain = self.domain(pkg, die)?;
        let msr = zone.power_limit_msr();
        let value = self.read(domain, msr)?;
        self.write(domain, msr, self.units.set_zone_clamped(zone, value, clamped))
    }

    /// Lock bit of the zone's power-limit register
    pub fn is_zone_locked(&self, pkg: u32, die: u32, zone: Zone) -> Result<bool> {
        self.is_locked(pkg, die, zone, Constraint::LongTerm)
    }

    /// Lock the zone's power-limit register; irreversible until reset
    pub fn set_zone_locked(&self, pkg: u32, die: u32, zone: Zone) -> Result<()> {
        self.set_locked(pkg, die, zone, Constraint::LongTerm)
    }

    /// Lock bit of the register holding `constraint`
    pub fn is_locked(&self, pkg: u32, die: u32, zone: Zone, constraint: Constraint) -> Result<bool> {
        let domain = self.domain(pkg, die)?;
        self.require_constraint(zone, constraint)?;
        let value = self.read(domain, self.units.limit_msr(zone, constraint))?;
        Ok(self.units.is_locked(zone, constraint, value))
    }

    /// Set the lock bit of the register holding `constraint`
    ///
    /// Locking twice is not detected; the hardware ignores the second write.
    pub fn set_locked(&self, pkg: u32, die: u32, zone: Zone, constraint: Constraint) -> Result<()> {
        let domain = self.domain(pkg, die)?;
        self.require_constraint(zone, constraint)?;
        let msr = self.units.limit_msr(zone, constraint);
        let value = self.read(domain, msr)?;
        self.write(domain, msr, self.units.set_locked(zone, constraint, value, true))
    }

    pub fn get_limits(&self, pkg: u32, die: u32, zone: Zone) -> Result<ZoneLimits> {
        let domain = self.domain(pkg, die)?;
        let value = self.read(domain, zone.power_limit_msr())?;
        Ok(self.units.get_limits(zone, value))
    }

    /// Write long-term and short-term limits in one read-modify-write
    ///
    /// A `0` field keeps its current value. A short-term limit on a zone
    /// without one is ignored.
    pub fn set_limits(
        &self,
        pkg: u32,
        die: u32,
        zone: Zone,
        long_term: Option<&Limit>,
        short_term: Option<&Limit>,
    ) -> Result<()> {
        let domain = self.domain(pkg, die)?;
        for limit in long_term.iter().chain(short_term.iter()) {
            validate_limit(limit)?;
        }
        if short_term.is_some() && !self.units.zone_config(zone).has_short_term() {
            tracing::debug!("{} has no short term constraint, ignoring it", zone);
        }

        let msr = zone.power_limit_msr();
        let value = self.read(domain, msr)?;
        let updated = self.units.set_limits(zone, value, long_term, short_term);
        self.write(domain, msr, updated)
    }

    pub fn get_limit(&self, pkg: u32, die: u32, zone: Zone, constraint: Constraint) -> Result<Limit> {
        let domain = self.domain(pkg, die)?;
        self.require_constraint(zone, constraint)?;
        let value = self.read(domain, self.units.limit_msr(zone, constraint))?;
        self.units
            .get_limit(zone, constraint, value)
            .ok_or_else(|| RaplCapError::InvalidParameter(format!("{zone} {constraint}")))
    }

    pub fn set_limit(
        &self,
        pkg: u32,
        die: u32,
        zone: Zone,
        constraint: Constraint,
        limit: &Limit,
    ) -> Result<()> {
        let domain = self.domain(pkg, die)?;
        self.require_constraint(zone, constraint)?;
        validate_limit(limit)?;

        let msr = self.units.limit_msr(zone, constraint);
        let value = self.read(domain, msr)?;
        let updated = self
            .units
            .set_limit(zone, constraint, value, limit)
            .ok_or_else(|| RaplCapError::InvalidParameter(format!("{zone} {constraint}")))?;
        self.write(domain, msr, updated)
    }

    /// Current energy counter in joules; wraps at [`Self::get_energy_counter_max`]
    pub fn get_energy_counter(&self, pkg: u32, die: u32, zone: Zone) -> Result<f64> {
        let domain = self.domain(pkg, die)?;
        let value = self.read(domain, zone.energy_status_msr())?;
        Ok(self.units.energy_counter(zone, value))
    }

    pub fn get_energy_counter_max(&self, pkg: u32, die: u32, zone: Zone) -> Result<f64> {
        self.domain(pkg, die)?;
        Ok(self.units.energy_counter_max(zone))
    }

    pub fn get_time_units(&self, pkg: u32, die: u32, zone: Zone) -> Result<f64> {
        self.domain(pkg, die)?;
        Ok(self.units.time_units(zone))
    }

    pub fn get_power_units(&self, pkg: u32, die: u32, zone: Zone) -> Result<f64> {
        self.domain(pkg, die)?;
        Ok(self.units.power_units(zone))
    }

    pub fn get_energy_units(&self, pkg: u32, die: u32, zone: Zone) -> Result<f64> {
        self.domain(pkg, die)?;
        Ok(self.units.energy_units(zone))
    }
}

fn validate_limit(limit: &Limit) -> Result<()> {
    let valid = |v: f64| v.is_finite() && v >= 0.0;
    if valid(limit.seconds) && valid(limit.watts) {
        Ok(())
    } else {
        Err(RaplCapError::InvalidParameter(format!(
            "limit must be finite and non-negative: {limit}"
        )))
    }
}
