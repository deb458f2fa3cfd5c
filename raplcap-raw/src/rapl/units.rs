//! RAPL unit register layout

use crate::register::{BitRange, RegisterLayout};

/// Power units field (bits 3:0)
pub const POWER_UNITS: BitRange = BitRange::new(0, 3);
/// Energy status units field (bits 12:8)
pub const ENERGY_UNITS: BitRange = BitRange::new(8, 12);
/// Time units field (bits 19:16)
pub const TIME_UNITS: BitRange = BitRange::new(16, 19);

/// RAPL Power Unit Register layout
///
/// Defines the units for energy, power, and time measurements.
///
/// ## Register Format
///
/// | Bits   | Field        | Description                           |
/// |--------|--------------|---------------------------------------|
/// | 0-3    | power_units  | Power units (1/2^PU watts)            |
/// | 4-7    | reserved     |                                       |
/// | 8-12   | energy_units | Energy units (1/2^ESU joules)         |
/// | 13-15  | reserved     |                                       |
/// | 16-19  | time_units   | Time units (1/2^TU seconds)           |
/// | 20-63  | reserved     |                                       |
///
/// Atom parts (SDM Vol. 4, Table 2-8) reinterpret the power and energy fields
/// as `2^PU` milliwatts and `2^ESU` microjoules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaplPowerUnit {
    /// Power units exponent
    pub power_units: u8,

    /// Energy units exponent
    pub energy_units: u8,

    /// Time units exponent
    pub time_units: u8,
}

impl RegisterLayout for RaplPowerUnit {
    fn to_msr_value(&self) -> u64 {
        (self.power_units as u64 & POWER_UNITS.max_value())
            | ((self.energy_units as u64 & ENERGY_UNITS.max_value()) << ENERGY_UNITS.first())
            | ((self.time_units as u64 & TIME_UNITS.max_value()) << TIME_UNITS.first())
    }

    fn from_msr_value(value: u64) -> Self {
        let value = crate::MsrValue::new(value);
        Self {
            power_units: value.bits(POWER_UNITS) as u8,
            energy_units: value.bits(ENERGY_UNITS) as u8,
            time_units: value.bits(TIME_UNITS) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.power_units > 15 {
            return Err("Power units must be <= 15 (4 bits)");
        }
        if self.energy_units > 31 {
            return Err("Energy units must be <= 31 (5 bits)");
        }
        if self.time_units > 15 {
            return Err("Time units must be <= 15 (4 bits)");
        }
        Ok(())
    }
}

impl RaplPowerUnit {
    /// Watts per LSB (SDM Section 14.10.1)
    pub fn power_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.power_units) as f64
    }

    /// Joules per LSB (SDM Section 14.10.1)
    pub fn energy_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.energy_units) as f64
    }

    /// Seconds per LSB (SDM Section 14.10.1)
    ///
    /// Atom parts hard-wire this field to 0, i.e. one second.
    pub fn time_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.time_units) as f64
    }

    /// Watts per LSB on Atom parts (milliwatt based)
    pub fn atom_power_unit_multiplier(&self) -> f64 {
        (1u64 << self.power_units) as f64 / 1_000.0
    }

    /// Joules per LSB on Atom parts (microjoule based)
    pub fn atom_energy_unit_multiplier(&self) -> f64 {
        (1u64 << self.energy_units) as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rapl_power_unit_round_trip() {
        let unit = RaplPowerUnit {
            power_units: 3,
            energy_units: 14,
            time_units: 10,
        };

        let value = unit.to_msr_value();
        assert_eq!(value, 0x000A_0E03);
        assert_eq!(RaplPowerUnit::from_msr_value(value), unit);
        assert!(unit.validate().is_ok());
    }

    #[test]
    fn test_rapl_power_unit_multipliers() {
        let unit = RaplPowerUnit::from_msr_value(0x000A_0E03);

        assert_eq!(unit.power_unit_multiplier(), 1.0 / 8.0);
        assert_eq!(unit.energy_unit_multiplier(), 1.0 / 16384.0);
        assert_eq!(unit.time_unit_multiplier(), 1.0 / 1024.0);
    }

    #[test]
    fn test_atom_multipliers() {
        // Silvermont reset value: 0101b power units, i.e. 32 mW
        let unit = RaplPowerUnit::from_msr_value(0x5);

        assert_eq!(unit.atom_power_unit_multiplier(), 0.032);
        assert_eq!(unit.atom_energy_unit_multiplier(), 0.000001);
        assert_eq!(unit.time_unit_multiplier(), 1.0);
    }

    #[test]
    fn test_reserved_bits_ignored() {
        let unit = RaplPowerUnit::from_msr_value(0xFFFF_FFFF_FFF0_E0F3);
        assert_eq!(unit.power_units, 3);
        assert_eq!(unit.energy_units, 0);
        assert_eq!(unit.time_units, 0);
    }
}
