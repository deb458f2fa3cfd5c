// Public value types shared by the codec, the context and the CLI

use raplcap_raw::rapl::msr;

named_enum! {
    /// A RAPL power domain
    pub enum Zone {
        Package => "PACKAGE",
        Core => "CORE",
        Uncore => "UNCORE",
        Dram => "DRAM",
        Psys => "PSYS",
    }
}

impl Zone {
    /// Power-limit register of the zone
    pub fn power_limit_msr(&self) -> u64 {
        match self {
            Zone::Package => msr::MSR_PKG_POWER_LIMIT,
            Zone::Core => msr::MSR_PP0_POWER_LIMIT,
            Zone::Uncore => msr::MSR_PP1_POWER_LIMIT,
            Zone::Dram => msr::MSR_DRAM_POWER_LIMIT,
            Zone::Psys => msr::MSR_PLATFORM_POWER_LIMIT,
        }
    }

    /// Energy-status register of the zone
    pub fn energy_status_msr(&self) -> u64 {
        match self {
            Zone::Package => msr::MSR_PKG_ENERGY_STATUS,
            Zone::Core => msr::MSR_PP0_ENERGY_STATUS,
            Zone::Uncore => msr::MSR_PP1_ENERGY_STATUS,
            Zone::Dram => msr::MSR_DRAM_ENERGY_STATUS,
            Zone::Psys => msr::MSR_PLATFORM_ENERGY_COUNTER,
        }
    }
}

named_enum! {
    /// Time scale of a limit within a zone
    pub enum Constraint {
        LongTerm => "LONG_TERM",
        ShortTerm => "SHORT_TERM",
        PeakPower => "PEAK_POWER",
    }
}

impl Constraint {
    /// Number of constraints a zone must have for this one to exist
    pub fn required_count(&self) -> u8 {
        match self {
            Constraint::LongTerm => 1,
            Constraint::ShortTerm => 2,
            Constraint::PeakPower => 3,
        }
    }
}

/// One constraint in external units
///
/// A field of exactly `0.0` in a limit passed to a setter means "leave this
/// field unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Limit {
    pub seconds: f64,
    pub watts: f64,
}

impl Limit {
    pub fn new(seconds: f64, watts: f64) -> Self {
        Self { seconds, watts }
    }
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6} s, {:.6} W", self.seconds, self.watts)
    }
}

/// Long-term and (when the zone has one) short-term limits of a zone
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZoneLimits {
    pub long_term: Limit,
    pub short_term: Option<Limit>,
}
