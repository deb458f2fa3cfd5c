//! Power-limit register layouts
//!
//! A power-limit register holds one or two constraints plus a lock bit. Each
//! constraint has a power field and, depending on the register, enable and
//! clamp bits and a time-window field.
//!
//! ## Standard dual-constraint format (`MSR_PKG_POWER_LIMIT`)
//!
//! | Bits   | Field          | Description                        |
//! |--------|----------------|------------------------------------|
//! | 0-14   | power_limit_1  | Power limit 1                      |
//! | 15     | enable_1       | Enable power limit 1               |
//! | 16     | clamp_1        | Clamp to power limit 1             |
//! | 17-23  | time_window_1  | Time window 1                      |
//! | 24-31  | reserved       |                                    |
//! | 32-46  | power_limit_2  | Power limit 2                      |
//! | 47     | enable_2       | Enable power limit 2               |
//! | 48     | clamp_2        | Clamp to power limit 2             |
//! | 49-55  | time_window_2  | Time window 2                      |
//! | 56-62  | reserved       |                                    |
//! | 63     | lock           | Lock register                      |
//!
//! Single-constraint registers (PP0, PP1, DRAM) only use the low half and
//! put the lock at bit 31. Server PSYS registers widen the power fields to
//! 16 or 17 bits and shift the following fields up accordingly.

use crate::register::{BitRange, MsrValue};

/// Width of the standard power-limit field
pub const STANDARD_POWER_WIDTH: u8 = 15;

/// Width of the peak power (PL4) field
pub const PEAK_POWER_WIDTH: u8 = 13;

/// Width of the time-window field (5-bit exponent, 2-bit fraction)
pub const TIME_WINDOW_WIDTH: u8 = 7;

/// Bit positions of one constraint inside a power-limit register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintFields {
    pub power: BitRange,
    pub enable: Option<u8>,
    pub clamp: Option<u8>,
    pub time_window: Option<BitRange>,
    /// The processor picks the time window and ignores software writes
    pub time_window_read_only: bool,
}

impl ConstraintFields {
    /// Fields laid out from `base`: power `[base, base+w-1]`, enable, clamp,
    /// then a 7-bit time window.
    pub const fn packed(base: u8, power_width: u8) -> Self {
        let power_last = base + power_width - 1;
        Self {
            power: BitRange::new(base, power_last),
            enable: Some(power_last + 1),
            clamp: Some(power_last + 2),
            time_window: Some(BitRange::new(
                power_last + 3,
                power_last + 2 + TIME_WINDOW_WIDTH,
            )),
            time_window_read_only: false,
        }
    }

    const fn with_read_only_time_window(mut self) -> Self {
        self.time_window_read_only = true;
        self
    }

    pub fn is_enabled(&self, value: MsrValue) -> Option<bool> {
        self.enable.map(|bit| value.bit(bit))
    }

    pub fn is_clamped(&self, value: MsrValue) -> Option<bool> {
        self.clamp.map(|bit| value.bit(bit))
    }
}

/// Layout of a whole power-limit register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerLimitLayout {
    pub primary: ConstraintFields,
    pub secondary: Option<ConstraintFields>,
    pub lock: u8,
}

impl PowerLimitLayout {
    /// Two constraints with power fields of `power_width` bits, lock at bit 63
    pub const fn dual(power_width: u8) -> Self {
        Self {
            primary: ConstraintFields::packed(0, power_width),
            secondary: Some(ConstraintFields::packed(32, power_width)),
            lock: 63,
        }
    }

    /// One constraint with a standard power field, lock at bit 31
    pub const fn single() -> Self {
        Self {
            primary: ConstraintFields::packed(0, STANDARD_POWER_WIDTH),
            secondary: None,
            lock: 31,
        }
    }

    const fn with_read_only_secondary_time_window(mut self) -> Self {
        if let Some(secondary) = self.secondary {
            self.secondary = Some(secondary.with_read_only_time_window());
        }
        self
    }

    /// Fields of constraint slot 0 or 1
    pub fn slot(&self, index: usize) -> Option<&ConstraintFields> {
        match index {
            0 => Some(&self.primary),
            1 => self.secondary.as_ref(),
            _ => None,
        }
    }

    /// Every constraint present in the register
    pub fn constraints(&self) -> impl Iterator<Item = &ConstraintFields> {
        std::iter::once(&self.primary).chain(self.secondary.as_ref())
    }

    pub fn is_locked(&self, value: MsrValue) -> bool {
        value.bit(self.lock)
    }
}

/// `MSR_PKG_POWER_LIMIT` on every model with a short-term constraint
pub const PACKAGE_DUAL: PowerLimitLayout = PowerLimitLayout::dual(STANDARD_POWER_WIDTH);

/// PP0/PP1/DRAM, and PACKAGE on Atom
pub const SINGLE: PowerLimitLayout = PowerLimitLayout::single();

/// `MSR_PLATFORM_POWER_LIMIT` on client parts
pub const PSYS_DUAL: PowerLimitLayout =
    PowerLimitLayout::dual(STANDARD_POWER_WIDTH).with_read_only_secondary_time_window();

/// `MSR_PLATFORM_POWER_LIMIT` on server parts with 16-bit power fields
pub const PSYS_SERVER_16: PowerLimitLayout =
    PowerLimitLayout::dual(16).with_read_only_secondary_time_window();

/// `MSR_PLATFORM_POWER_LIMIT` on server parts with 17-bit power fields
pub const PSYS_SERVER_17: PowerLimitLayout =
    PowerLimitLayout::dual(17).with_read_only_secondary_time_window();

/// `MSR_VR_CURRENT_CONFIG`: peak power only, no enable/clamp/time window
pub const PEAK_POWER: PowerLimitLayout = PowerLimitLayout {
    primary: ConstraintFields {
        power: BitRange::new(0, PEAK_POWER_WIDTH - 1),
        enable: None,
        clamp: None,
        time_window: None,
        time_window_read_only: false,
    },
    secondary: None,
    lock: 31,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_dual_offsets() {
        let primary = PACKAGE_DUAL.primary;
        assert_eq!(primary.power, BitRange::new(0, 14));
        assert_eq!(primary.enable, Some(15));
        assert_eq!(primary.clamp, Some(16));
        assert_eq!(primary.time_window, Some(BitRange::new(17, 23)));

        let secondary = PACKAGE_DUAL.secondary.unwrap();
        assert_eq!(secondary.power, BitRange::new(32, 46));
        assert_eq!(secondary.enable, Some(47));
        assert_eq!(secondary.clamp, Some(48));
        assert_eq!(secondary.time_window, Some(BitRange::new(49, 55)));
        assert!(!secondary.time_window_read_only);

        assert_eq!(PACKAGE_DUAL.lock, 63);
    }

    #[test]
    fn test_single_lock_bit() {
        assert_eq!(SINGLE.lock, 31);
        assert!(SINGLE.secondary.is_none());
        assert_eq!(SINGLE.constraints().count(), 1);
    }

    #[test]
    fn test_server_psys_offsets_shift() {
        let primary = PSYS_SERVER_17.primary;
        assert_eq!(primary.power, BitRange::new(0, 16));
        assert_eq!(primary.enable, Some(17));
        assert_eq!(primary.clamp, Some(18));
        assert_eq!(primary.time_window, Some(BitRange::new(19, 25)));

        let secondary = PSYS_SERVER_17.secondary.unwrap();
        assert_eq!(secondary.power, BitRange::new(32, 48));
        assert_eq!(secondary.enable, Some(49));
        assert_eq!(secondary.clamp, Some(50));
        assert!(secondary.time_window_read_only);

        assert_eq!(PSYS_SERVER_16.primary.enable, Some(16));
        assert_eq!(PSYS_SERVER_16.secondary.unwrap().power.max_value(), 0xFFFF);
    }

    #[test]
    fn test_peak_power_layout() {
        assert_eq!(PEAK_POWER.primary.power.max_value(), 0x1FFF);
        assert_eq!(PEAK_POWER.primary.is_enabled(MsrValue::new(u64::MAX)), None);
        assert!(PEAK_POWER.is_locked(MsrValue::new(1 << 31)));
    }

    #[test]
    fn test_psys_secondary_time_window_read_only() {
        assert!(!PSYS_DUAL.primary.time_window_read_only);
        assert!(PSYS_DUAL.secondary.unwrap().time_window_read_only);
    }
}
