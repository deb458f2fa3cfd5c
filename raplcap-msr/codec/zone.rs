// Per-zone constraint counts and time-window codecs for each model class

use crate::codec::time_window::TimeWindowCodec;
use crate::common::arch::ModelClass;
use crate::types::{Constraint, Zone};

/// Static description of one zone on one model class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneConfig {
    /// 1 = long term only, 2 = plus short term, 3 = plus peak power
    pub constraints: u8,
    pub time_window: TimeWindowCodec,
}

impl ZoneConfig {
    const fn new(constraints: u8, time_window: TimeWindowCodec) -> Self {
        Self {
            constraints,
            time_window,
        }
    }

    pub fn has_constraint(&self, constraint: Constraint) -> bool {
        self.constraints >= constraint.required_count()
    }

    pub fn has_short_term(&self) -> bool {
        self.has_constraint(Constraint::ShortTerm)
    }
}

/// Zone configs in [`Zone::all`] order
pub type ZoneTable = [ZoneConfig; 5];

use TimeWindowCodec::{Exponent, FiveSecond, Linear};

pub static CFG_DEFAULT: ZoneTable = [
    ZoneConfig::new(2, Exponent), // PACKAGE
    ZoneConfig::new(1, Exponent), // CORE
    ZoneConfig::new(1, Exponent), // UNCORE
    ZoneConfig::new(1, Exponent), // DRAM
    ZoneConfig::new(2, Exponent), // PSYS
];

pub static CFG_DEFAULT_PEAK_POWER: ZoneTable = [
    ZoneConfig::new(3, Exponent), // PACKAGE
    ZoneConfig::new(1, Exponent), // CORE
    ZoneConfig::new(1, Exponent), // UNCORE
    ZoneConfig::new(1, Exponent), // DRAM
    ZoneConfig::new(2, Exponent), // PSYS
];

pub static CFG_ATOM: ZoneTable = [
    ZoneConfig::new(1, Linear), // PACKAGE
    ZoneConfig::new(1, Linear), // CORE
    ZoneConfig::new(1, Linear), // UNCORE
    ZoneConfig::new(1, Linear), // DRAM
    ZoneConfig::new(2, Linear), // PSYS
];

// Only the CORE time window differs from other Atom parts
pub static CFG_ATOM_AIRMONT: ZoneTable = [
    ZoneConfig::new(1, Linear),     // PACKAGE
    ZoneConfig::new(1, FiveSecond), // CORE
    ZoneConfig::new(1, Linear),     // UNCORE
    ZoneConfig::new(1, Linear),     // DRAM
    ZoneConfig::new(2, Linear),     // PSYS
];

pub fn table_for(class: ModelClass) -> &'static ZoneTable {
    match class {
        ModelClass::Client
        | ModelClass::Server
        | ModelClass::ServerPsys { .. }
        | ModelClass::XeonPhi => &CFG_DEFAULT,
        ModelClass::ClientPeakPower => &CFG_DEFAULT_PEAK_POWER,
        ModelClass::Atom => &CFG_ATOM,
        ModelClass::AtomAirmont => &CFG_ATOM_AIRMONT,
    }
}

/// Index of `zone` in a [`ZoneTable`]
pub fn index(zone: Zone) -> usize {
    match zone {
        Zone::Package => 0,
        Zone::Core => 1,
        Zone::Uncore => 2,
        Zone::Dram => 3,
        Zone::Psys => 4,
    }
}
