//! Generic register abstractions for bit-exact MSR manipulation

/// Trait for register layouts that can be converted to/from raw MSR values
///
/// This trait provides type-safe conversion between structured register
/// layouts and the raw 64-bit values that are written to/read from MSRs.
///
/// # Example
///
/// ```ignore
/// use raplcap_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct MyControl {
///     enable: bool,
///     threshold: u8,
/// }
///
/// impl RegisterLayout for MyControl {
///     fn to_msr_value(&self) -> u64 {
///         (if self.enable { 1 } else { 0 })
///             | ((self.threshold as u64) << 8)
///     }
///
///     fn from_msr_value(value: u64) -> Self {
///         Self {
///             enable: (value & 1) != 0,
///             threshold: ((value >> 8) & 0xFF) as u8,
///         }
///     }
/// }
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this register layout to a raw MSR value
    fn to_msr_value(&self) -> u64;

    /// Parse a raw MSR value into this register layout
    fn from_msr_value(value: u64) -> Self;

    /// Validate that the register values are within acceptable ranges
    ///
    /// Returns `Ok(())` if valid, or an error message if invalid.
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

/// An inclusive range of bits `[first, last]` within a 64-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    first: u8,
    last: u8,
}

impl BitRange {
    /// Create a new bit range; `first` and `last` are both inclusive.
    ///
    /// # Panics
    ///
    /// Panics if `first > last` or `last >= 64`. All ranges in this crate are
    /// constants, so this fails at compile time when misused in a `const`.
    pub const fn new(first: u8, last: u8) -> Self {
        assert!(first <= last, "bit range must not be reversed");
        assert!(last < 64, "bit range must fit in 64 bits");
        Self { first, last }
    }

    /// A range covering exactly one bit.
    pub const fn bit(pos: u8) -> Self {
        Self::new(pos, pos)
    }

    pub const fn first(self) -> u8 {
        self.first
    }

    pub const fn last(self) -> u8 {
        self.last
    }

    /// Number of bits in the range
    pub const fn width(self) -> u32 {
        (self.last - self.first + 1) as u32
    }

    /// Largest value representable by the range, right-aligned
    pub const fn max_value(self) -> u64 {
        if self.width() == 64 {
            u64::MAX
        } else {
            (1u64 << self.width()) - 1
        }
    }

    /// Mask selecting the range in place
    pub const fn mask(self) -> u64 {
        self.max_value() << self.first
    }
}

/// A raw 64-bit MSR value with named bit-range accessors.
///
/// Every mutation is a masked replace: only the bits of the addressed range
/// change, everything else is carried over untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MsrValue(u64);

impl MsrValue {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Extract the bits of `range`, shifted down to bit 0
    pub const fn bits(self, range: BitRange) -> u64 {
        (self.0 & range.mask()) >> range.first
    }

    /// Replace the bits of `range` with `data`; excess high bits of `data` are dropped
    #[must_use]
    pub const fn with_bits(self, range: BitRange, data: u64) -> Self {
        let mask = range.mask();
        Self((self.0 & !mask) | ((data << range.first) & mask))
    }

    /// Test a single bit
    pub const fn bit(self, pos: u8) -> bool {
        self.bits(BitRange::bit(pos)) == 1
    }

    /// Set or clear a single bit
    #[must_use]
    pub const fn with_bit(self, pos: u8, set: bool) -> Self {
        self.with_bits(BitRange::bit(pos), set as u64)
    }
}

impl From<u64> for MsrValue {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<MsrValue> for u64 {
    fn from(value: MsrValue) -> Self {
        value.0
    }
}

impl std::fmt::LowerHex for MsrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl std::fmt::UpperHex for MsrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::UpperHex::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_range_masks() {
        assert_eq!(BitRange::new(0, 14).max_value(), 0x7FFF);
        assert_eq!(BitRange::new(0, 14).mask(), 0x7FFF);
        assert_eq!(BitRange::new(32, 46).mask(), 0x7FFF_0000_0000);
        assert_eq!(BitRange::new(17, 23).width(), 7);
        assert_eq!(BitRange::new(0, 63).max_value(), u64::MAX);
        assert_eq!(BitRange::bit(63).mask(), 1 << 63);
    }

    #[test]
    fn test_with_bits_preserves_other_fields() {
        let value = MsrValue::new(u64::MAX);
        let updated = value.with_bits(BitRange::new(17, 23), 0x21);

        assert_eq!(updated.bits(BitRange::new(17, 23)), 0x21);
        assert_eq!(updated.raw() | BitRange::new(17, 23).mask(), u64::MAX);
        assert_eq!(updated.bits(BitRange::new(0, 16)), 0x1FFFF);
        assert_eq!(updated.bits(BitRange::new(24, 63)), (1u64 << 40) - 1);
    }

    #[test]
    fn test_with_bits_truncates_oversized_data() {
        let value = MsrValue::new(0).with_bits(BitRange::new(0, 14), 0xFFFF);
        assert_eq!(value.raw(), 0x7FFF);
    }

    #[test]
    fn test_single_bits() {
        let value = MsrValue::new(0).with_bit(15, true).with_bit(63, true);
        assert!(value.bit(15));
        assert!(value.bit(63));
        assert!(!value.bit(47));
        assert_eq!(value.with_bit(15, false).raw(), 1 << 63);
    }
}
