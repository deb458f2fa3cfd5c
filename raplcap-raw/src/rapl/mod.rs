//! RAPL (Running Average Power Limit) register definitions
//!
//! RAPL exposes per-domain power limits and energy counters. The register
//! addresses are architectural constants shared by every supported Intel
//! generation; the bit layout of the power-limit registers varies by domain
//! and model and is described by [`limit::PowerLimitLayout`].
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Section 14.10: Platform Specific Power Management Support
//! - Volume 4: Model-Specific Registers

pub mod limit;
pub mod units;

pub use limit::{ConstraintFields, PowerLimitLayout};
pub use units::RaplPowerUnit;

/// MSR addresses for RAPL
pub mod msr {
    /// RAPL Power Unit MSR - Defines energy, power, and time units
    pub const MSR_RAPL_POWER_UNIT: u64 = 0x606;

    /// VR Current Config - Holds the package peak power limit (PL4)
    pub const MSR_VR_CURRENT_CONFIG: u64 = 0x601;

    /// Package Power Limit - Configure package power limits
    pub const MSR_PKG_POWER_LIMIT: u64 = 0x610;

    /// Package Energy Status - Total package energy consumption
    pub const MSR_PKG_ENERGY_STATUS: u64 = 0x611;

    /// DRAM Power Limit - Memory power limits
    pub const MSR_DRAM_POWER_LIMIT: u64 = 0x618;

    /// DRAM Energy Status - Memory controller energy consumption
    pub const MSR_DRAM_ENERGY_STATUS: u64 = 0x619;

    /// PP0 Power Limit - Core power limits
    pub const MSR_PP0_POWER_LIMIT: u64 = 0x638;

    /// PP0 Energy Status - Core energy consumption
    pub const MSR_PP0_ENERGY_STATUS: u64 = 0x639;

    /// PP1 Power Limit - Uncore (graphics) power limits, client parts only
    pub const MSR_PP1_POWER_LIMIT: u64 = 0x640;

    /// PP1 Energy Status - Uncore energy consumption
    pub const MSR_PP1_ENERGY_STATUS: u64 = 0x641;

    /// Platform Energy Counter - PSys energy consumption (Skylake and newer)
    pub const MSR_PLATFORM_ENERGY_COUNTER: u64 = 0x64D;

    /// Platform Power Limit - PSys power limits (Skylake and newer)
    pub const MSR_PLATFORM_POWER_LIMIT: u64 = 0x65C;
}

/// Energy status registers hold a 32-bit wrapping counter in bits 31:0
pub const ENERGY_COUNTER: crate::BitRange = crate::BitRange::new(0, 31);
