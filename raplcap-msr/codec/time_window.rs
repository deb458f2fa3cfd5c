//! Time-window field codecs
//!
//! | Variant      | Decode                              | Used by                 |
//! |--------------|-------------------------------------|-------------------------|
//! | `Exponent`   | `2^Y * (1 + F/4) * time_unit`       | every non-Atom zone     |
//! | `Linear`     | `bits * time_unit`, 0 means 1 unit  | Atom zones              |
//! | `FiveSecond` | `5 * bits` seconds, 0 means 1 s     | Airmont CORE            |
//!
//! Out-of-range inputs are clamped with a warning, never rejected.

/// Largest linear (Atom) field value
const LINEAR_MAX: u64 = 0x7F;

/// Largest five-second (Airmont) field value, i.e. 50 s
const FIVE_SECOND_MAX: u64 = 0xA;

/// Seconds per LSB of the five-second encoding
pub const FIVE_SECOND_UNIT: f64 = 5.0;

/// Exponent encoding limits, in time units
const EXPONENT_MIN: f64 = 1.0;
const EXPONENT_MAX: f64 = 0xFFFF_FFFF_u32 as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindowCodec {
    /// `Y` in bits 4:0, `F` in bits 6:5 (SDM Section 14.10.3)
    Exponent,
    /// Whole time units (SDM Table 2-8)
    Linear,
    /// Multiples of five seconds (SDM Table 2-11)
    FiveSecond,
}

impl TimeWindowCodec {
    /// Seconds per LSB as reported to callers
    pub fn time_unit(&self, time_unit: f64) -> f64 {
        match self {
            TimeWindowCodec::FiveSecond => FIVE_SECOND_UNIT,
            TimeWindowCodec::Exponent | TimeWindowCodec::Linear => time_unit,
        }
    }

    pub fn decode(&self, bits: u64, time_unit: f64) -> f64 {
        let seconds = match self {
            TimeWindowCodec::Exponent => {
                let y = bits & 0x1F;
                let f = (bits >> 5) & 0x3;
                (1u64 << y) as f64 * ((4 + f) as f64 / 4.0) * time_unit
            }
            TimeWindowCodec::Linear => {
                if bits == 0 {
                    time_unit
                } else {
                    bits as f64 * time_unit
                }
            }
            TimeWindowCodec::FiveSecond => {
                if bits == 0 {
                    1.0
                } else {
                    bits as f64 * FIVE_SECOND_UNIT
                }
            }
        };
        tracing::debug!(
            "decode time window ({:?}): bits=0x{:02X}, time_unit={:.12}, seconds={:.12}",
            self,
            bits,
            time_unit,
            seconds
        );
        seconds
    }

    pub fn encode(&self, seconds: f64, time_unit: f64) -> u64 {
        let bits = match self {
            TimeWindowCodec::Exponent => encode_exponent(seconds, time_unit),
            TimeWindowCodec::Linear => encode_linear(seconds, time_unit),
            TimeWindowCodec::FiveSecond => encode_five_second(seconds),
        };
        tracing::debug!(
            "encode time window ({:?}): seconds={:.12}, time_unit={:.12}, bits=0x{:02X}",
            self,
            seconds,
            time_unit,
            bits
        );
        bits
    }
}

fn encode_exponent(seconds: f64, time_unit: f64) -> u64 {
    let mut t = seconds / time_unit;
    if t < EXPONENT_MIN {
        tracing::warn!(
            "Time window too small: {:.12} sec, using min: {:.12} sec",
            seconds,
            EXPONENT_MIN * time_unit
        );
        t = EXPONENT_MIN;
    } else if t > EXPONENT_MAX {
        tracing::warn!(
            "Time window too large: {:.12} sec, trying max: {:.12} sec",
            seconds,
            EXPONENT_MAX * time_unit
        );
        t = EXPONENT_MAX;
    }
    // t >= 1 so (t as u64) >= 1 and ilog2 cannot fail
    let y = u64::from((t as u64).ilog2());
    let f = ((4.0 * t) as u64 >> y) - 4;
    (y & 0x1F) | ((f & 0x3) << 5)
}

fn encode_linear(seconds: f64, time_unit: f64) -> u64 {
    let t = seconds / time_unit;
    if seconds < 1.0 {
        tracing::warn!(
            "Time window too small: {:.12} sec, using min: {:.12} sec",
            seconds,
            1.0
        );
        0
    } else if t > LINEAR_MAX as f64 {
        tracing::warn!(
            "Time window too large: {:.12} sec, using max: {:.12} sec",
            seconds,
            LINEAR_MAX as f64 * time_unit
        );
        LINEAR_MAX
    } else {
        (t + 0.5) as u64
    }
}

fn encode_five_second(seconds: f64) -> u64 {
    if seconds < 1.0 {
        tracing::warn!("Time window too small: {:.12} sec, using min: 1 sec", seconds);
        0
    } else if seconds > FIVE_SECOND_MAX as f64 * FIVE_SECOND_UNIT {
        tracing::warn!("Time window too large: {:.12} sec, using max: 50 sec", seconds);
        FIVE_SECOND_MAX
    } else {
        (seconds / FIVE_SECOND_UNIT + 0.5) as u64
    }
}
