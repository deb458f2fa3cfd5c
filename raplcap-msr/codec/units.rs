// Unit scales and register layouts selected once per model

use raplcap_raw::rapl::limit::{self, PowerLimitLayout};
use raplcap_raw::rapl::{msr, RaplPowerUnit};
use raplcap_raw::RegisterLayout;

use crate::codec::zone::{self, ZoneConfig, ZoneTable};
use crate::common::arch::{CpuModel, ModelClass};
use crate::types::{Constraint, Zone};

/// DRAM energy unit on server parts (15.3 µJ)
pub const ENERGY_UNIT_DRAM_SERVER: f64 = 0.0000153;

/// DRAM energy unit on Xeon Phi (61 µJ)
pub const ENERGY_UNIT_DRAM_XEON_PHI: f64 = 0.000061;

/// PSYS energy unit on server parts with platform power limits
pub const ENERGY_UNIT_PSYS_SERVER: f64 = 1.0;

/// Unit scales, zone table and layouts of the running model
///
/// Built once from the model and the raw `MSR_RAPL_POWER_UNIT` value, never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct UnitContext {
    model: &'static CpuModel,
    power_units: f64,
    energy_units: f64,
    energy_units_dram: f64,
    energy_units_psys: f64,
    time_units: f64,
    zones: &'static ZoneTable,
    psys_layout: PowerLimitLayout,
}

impl UnitContext {
    pub fn new(model: &'static CpuModel, units_msrval: u64) -> Self {
        let unit = RaplPowerUnit::from_msr_value(units_msrval);

        let power_units = match model.class {
            ModelClass::Atom | ModelClass::AtomAirmont => unit.atom_power_unit_multiplier(),
            _ => unit.power_unit_multiplier(),
        };
        let energy_units = match model.class {
            ModelClass::Atom => unit.atom_energy_unit_multiplier(),
            _ => unit.energy_unit_multiplier(),
        };
        let energy_units_dram = match model.class {
            ModelClass::Server | ModelClass::ServerPsys { .. } => ENERGY_UNIT_DRAM_SERVER,
            ModelClass::XeonPhi => ENERGY_UNIT_DRAM_XEON_PHI,
            _ => energy_units,
        };
        let (energy_units_psys, psys_layout) = match model.class {
            ModelClass::ServerPsys { psys_width: 17 } => {
                (ENERGY_UNIT_PSYS_SERVER, limit::PSYS_SERVER_17)
            }
            ModelClass::ServerPsys { .. } => (ENERGY_UNIT_PSYS_SERVER, limit::PSYS_SERVER_16),
            _ => (energy_units, limit::PSYS_DUAL),
        };

        let ctx = Self {
            model,
            power_units,
            energy_units,
            energy_units_dram,
            energy_units_psys,
            time_units: unit.time_unit_multiplier(),
            zones: zone::table_for(model.class),
            psys_layout,
        };

        tracing::debug!(
            "Unit context for {}: power_units={:.12}, energy_units={:.12}, \
             energy_units_dram={:.12}, energy_units_psys={:.12}, time_units={:.12}",
            model.name,
            ctx.power_units,
            ctx.energy_units,
            ctx.energy_units_dram,
            ctx.energy_units_psys,
            ctx.time_units
        );

        ctx
    }

    pub fn model(&self) -> &'static CpuModel {
        self.model
    }

    pub fn zone_config(&self, zone: Zone) -> &ZoneConfig {
        &self.zones[zone::index(zone)]
    }

    /// Register holding `constraint` of `zone`
    pub fn limit_msr(&self, zone: Zone, constraint: Constraint) -> u64 {
        match constraint {
            Constraint::PeakPower => msr::MSR_VR_CURRENT_CONFIG,
            Constraint::LongTerm | Constraint::ShortTerm => zone.power_limit_msr(),
        }
    }

    /// Layout of the zone's power-limit register
    pub fn zone_layout(&self, zone: Zone) -> &PowerLimitLayout {
        let has_short_term = self.zone_config(zone).has_short_term();
        match zone {
            Zone::Psys if has_short_term => &self.psys_layout,
            _ if has_short_term => &limit::PACKAGE_DUAL,
            _ => &limit::SINGLE,
        }
    }

    /// Layout of the register holding `constraint` of `zone`
    pub fn constraint_layout(&self, zone: Zone, constraint: Constraint) -> &PowerLimitLayout {
        match constraint {
            Constraint::PeakPower => &limit::PEAK_POWER,
            Constraint::LongTerm | Constraint::ShortTerm => self.zone_layout(zone),
        }
    }

    /// Watts per LSB
    pub fn power_units(&self, _zone: Zone) -> f64 {
        self.power_units
    }

    /// Joules per LSB of the zone's energy counter
    pub fn energy_units(&self, zone: Zone) -> f64 {
        match zone {
            Zone::Dram => self.energy_units_dram,
            Zone::Psys => self.energy_units_psys,
            Zone::Package | Zone::Core | Zone::Uncore => self.energy_units,
        }
    }

    /// Seconds per LSB of the zone's time-window field
    pub fn time_units(&self, zone: Zone) -> f64 {
        self.zone_config(zone).time_window.time_unit(self.time_units)
    }

    /// Raw time unit from the unit register, before any per-zone override
    pub(crate) fn base_time_units(&self) -> f64 {
        self.time_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::arch;

    fn ctx(model: u32, units: u64) -> UnitContext {
        UnitContext::new(arch::lookup(6, model).unwrap(), units)
    }

    #[test]
    fn test_sandy_bridge_units() {
        let ctx = ctx(0x2A, 0x0000_0000_000A_0E03);
        assert_eq!(ctx.power_units(Zone::Package), 0.125);
        assert_eq!(ctx.time_units(Zone::Package), 0.0009765625);
        assert_eq!(ctx.energy_units(Zone::Package), 1.0 / 16384.0);
        assert_eq!(ctx.energy_units(Zone::Dram), 1.0 / 16384.0);
    }

    #[test]
    fn test_server_energy_overrides() {
        let hsx = ctx(0x3F, 0x000A_0E03);
        assert_eq!(hsx.energy_units(Zone::Dram), ENERGY_UNIT_DRAM_SERVER);
        assert_eq!(hsx.energy_units(Zone::Psys), 1.0 / 16384.0);

        let spr = ctx(0x8F, 0x000A_0E03);
        assert_eq!(spr.energy_units(Zone::Dram), ENERGY_UNIT_DRAM_SERVER);
        assert_eq!(spr.energy_units(Zone::Psys), 1.0);

        let knl = ctx(0x57, 0x000A_0E03);
        assert_eq!(knl.energy_units(Zone::Dram), ENERGY_UNIT_DRAM_XEON_PHI);
    }

    #[test]
    fn test_atom_units() {
        let silvermont = ctx(0x37, 0x5 | (0x5 << 8));
        assert_eq!(silvermont.power_units(Zone::Package), 0.032);
        assert_eq!(silvermont.energy_units(Zone::Package), 0.000032);
        assert_eq!(silvermont.time_units(Zone::Package), 1.0);

        let airmont = ctx(0x4C, 0x5 | (0x5 << 8));
        assert_eq!(airmont.power_units(Zone::Package), 0.032);
        assert_eq!(airmont.energy_units(Zone::Package), 1.0 / 32.0);
        assert_eq!(airmont.time_units(Zone::Core), 5.0);
        assert_eq!(airmont.time_units(Zone::Package), 1.0);
    }

    #[test]
    fn test_layout_selection() {
        let skl = ctx(0x5E, 0x000A_0E03);
        assert_eq!(skl.zone_layout(Zone::Package), &limit::PACKAGE_DUAL);
        assert_eq!(skl.zone_layout(Zone::Dram), &limit::SINGLE);
        assert_eq!(skl.zone_layout(Zone::Psys), &limit::PSYS_DUAL);

        let spr = ctx(0x8F, 0x000A_0E03);
        assert_eq!(spr.zone_layout(Zone::Psys), &limit::PSYS_SERVER_17);
        assert_eq!(spr.zone_layout(Zone::Package), &limit::PACKAGE_DUAL);

        let gnr = ctx(0xAD, 0x000A_0E03);
        assert_eq!(gnr.zone_layout(Zone::Psys), &limit::PSYS_SERVER_16);

        let atom = ctx(0x37, 0x5);
        assert_eq!(atom.zone_layout(Zone::Package), &limit::SINGLE);
    }

    #[test]
    fn test_peak_power_register() {
        let adl = ctx(0x97, 0x000A_0E03);
        assert_eq!(
            adl.limit_msr(Zone::Package, Constraint::PeakPower),
            msr::MSR_VR_CURRENT_CONFIG
        );
        assert_eq!(
            adl.constraint_layout(Zone::Package, Constraint::PeakPower),
            &limit::PEAK_POWER
        );
        assert_eq!(adl.limit_msr(Zone::Package, Constraint::ShortTerm), 0x610);
    }
}
