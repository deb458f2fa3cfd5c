// Power-limit field codec: watts = bits * power_unit

use raplcap_raw::BitRange;

pub fn decode(bits: u64, power_unit: f64) -> f64 {
    let watts = bits as f64 * power_unit;
    tracing::debug!(
        "decode power: bits=0x{:04X}, power_unit={:.12}, watts={:.12}",
        bits,
        power_unit,
        watts
    );
    watts
}

/// Distance from a whole step below which a quotient is taken as that step
const STEP_TOLERANCE: f64 = 1e-9;

/// Truncating inverse of [`decode`], saturating at the largest value `field` holds
///
/// Units such as the Atom `2^PU / 1000` are not exact in binary, so a decoded
/// value can divide back to a hair below its step; such quotients snap to the
/// step so that decoded limits write back unchanged.
pub fn encode(watts: f64, power_unit: f64, field: BitRange) -> u64 {
    let max = field.max_value();
    let steps = watts / power_unit;
    let nearest = steps.round();
    let steps = if (steps - nearest).abs() < STEP_TOLERANCE {
        nearest
    } else {
        steps
    };
    // float-to-int `as` saturates, so huge inputs cannot wrap
    let mut bits = steps as u64;
    if bits > max {
        tracing::warn!(
            "Power limit too large: {:.12} W, using max: {:.12} W",
            watts,
            max as f64 * power_unit
        );
        bits = max;
    }
    tracing::debug!(
        "encode power: watts={:.12}, power_unit={:.12}, bits=0x{:04X}",
        watts,
        power_unit,
        bits
    );
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use raplcap_raw::rapl::limit;

    const PU: f64 = 0.125;
    const STANDARD: BitRange = BitRange::new(0, 14);

    #[test]
    fn test_known_values() {
        assert_eq!(encode(25.0, PU, STANDARD), 0xC8);
        assert_eq!(decode(0xC8, PU), 25.0);
        assert_eq!(encode(15.0, PU, STANDARD), 0x78);
        assert_eq!(decode(0x78, PU), 15.0);
    }

    #[test]
    fn test_saturation() {
        assert_eq!(encode(10000.0, PU, STANDARD), 0x7FFF);
        assert_eq!(encode(f64::MAX, PU, STANDARD), 0x7FFF);
        assert_eq!(
            encode(10000.0, PU, limit::PEAK_POWER.primary.power),
            0x1FFF
        );
        assert_eq!(
            encode(100_000.0, PU, limit::PSYS_SERVER_17.primary.power),
            0x1FFFF
        );
    }

    #[test]
    fn test_tiny_truncates_to_zero() {
        assert_eq!(encode(0.0000001, PU, STANDARD), 0);
    }

    #[test]
    fn test_atom_units_reencode_every_value() {
        for pu in 0..16 {
            let power_unit = (1u64 << pu) as f64 / 1000.0;
            let mismatches: Vec<u64> = (0..=STANDARD.max_value())
                .filter(|&bits| encode(decode(bits, power_unit), power_unit, STANDARD) != bits)
                .collect();
            assert!(mismatches.is_empty(), "pu={pu}: {:?}", &mismatches[..mismatches.len().min(8)]);
        }
    }

    #[test]
    fn test_just_below_step_truncates() {
        // Well short of a whole step still truncates
        assert_eq!(encode(25.0 - 0.01, PU, STANDARD), 0xC7);
        assert_eq!(encode(2.001, 0.001, STANDARD), 2001);
    }

    #[test]
    fn test_round_trip_within_step() {
        for &pu in &[0.125, 0.032, 1.0 / 16.0] {
            let max_watts = STANDARD.max_value() as f64 * pu;
            let mut watts = 0.0;
            while watts <= max_watts {
                let decoded = decode(encode(watts, pu, STANDARD), pu);
                assert!(decoded <= watts + 1e-9, "{watts} -> {decoded}");
                assert!(watts - decoded < pu + 1e-9, "{watts} -> {decoded}");
                watts += 7.3;
            }
        }
    }
}
