//! Bit-field translation between power-limit / energy registers and caller units
//!
//! Every setter is a pure function from the current register value to the new
//! one: only the addressed fields change, all other bits are carried over.

use raplcap_raw::rapl::limit::ConstraintFields;
use raplcap_raw::rapl::ENERGY_COUNTER;
use raplcap_raw::MsrValue;

use crate::codec::power;
use crate::codec::units::UnitContext;
use crate::types::{Constraint, Limit, Zone, ZoneLimits};

impl UnitContext {
    /// Fields of `constraint` in its register, if the zone has that constraint
    pub fn constraint_fields(&self, zone: Zone, constraint: Constraint) -> Option<&ConstraintFields> {
        if !self.zone_config(zone).has_constraint(constraint) {
            return None;
        }
        let slot = match constraint {
            Constraint::LongTerm | Constraint::PeakPower => 0,
            Constraint::ShortTerm => 1,
        };
        self.constraint_layout(zone, constraint).slot(slot)
    }

    /// Enabled iff every constraint of the zone's limit register is enabled
    pub fn is_zone_enabled(&self, zone: Zone, value: MsrValue) -> bool {
        let enabled = self
            .zone_layout(zone)
            .constraints()
            .all(|c| c.is_enabled(value).unwrap_or(true));
        tracing::debug!("is_zone_enabled: zone={}, enabled={}", zone, enabled);
        enabled
    }

    pub fn set_zone_enabled(&self, zone: Zone, value: MsrValue, enabled: bool) -> MsrValue {
        tracing::debug!("set_zone_enabled: zone={}, enabled={}", zone, enabled);
        self.zone_layout(zone)
            .constraints()
            .filter_map(|c| c.enable)
            .fold(value, |v, bit| v.with_bit(bit, enabled))
    }

    /// Clamped iff every constraint of the zone's limit register is clamped
    pub fn is_zone_clamped(&self, zone: Zone, value: MsrValue) -> bool {
        let clamped = self
            .zone_layout(zone)
            .constraints()
            .all(|c| c.is_clamped(value).unwrap_or(true));
        tracing::debug!("is_zone_clamped: zone={}, clamped={}", zone, clamped);
        clamped
    }

    pub fn set_zone_clamped(&self, zone: Zone, value: MsrValue, clamped: bool) -> MsrValue {
        tracing::debug!("set_zone_clamped: zone={}, clamped={}", zone, clamped);
        self.zone_layout(zone)
            .constraints()
            .filter_map(|c| c.clamp)
            .fold(value, |v, bit| v.with_bit(bit, clamped))
    }

    /// Lock bit of the register holding `constraint`
    pub fn is_locked(&self, zone: Zone, constraint: Constraint, value: MsrValue) -> bool {
        let locked = self.constraint_layout(zone, constraint).is_locked(value);
        tracing::debug!(
            "is_locked: zone={}, constraint={}, locked={}",
            zone,
            constraint,
            locked
        );
        locked
    }

    pub fn set_locked(
        &self,
        zone: Zone,
        constraint: Constraint,
        value: MsrValue,
        locked: bool,
    ) -> MsrValue {
        tracing::debug!(
            "set_locked: zone={}, constraint={}, locked={}",
            zone,
            constraint,
            locked
        );
        let lock = self.constraint_layout(zone, constraint).lock;
        value.with_bit(lock, locked)
    }

    /// Decode one constraint; peak power has no time window and reports 0 s
    pub fn get_limit(&self, zone: Zone, constraint: Constraint, value: MsrValue) -> Option<Limit> {
        let fields = self.constraint_fields(zone, constraint)?;
        let codec = self.zone_config(zone).time_window;

        let watts = power::decode(value.bits(fields.power), self.power_units(zone));
        let seconds = match fields.time_window {
            Some(tw) => {
                if fields.time_window_read_only {
                    tracing::debug!(
                        "get_limit: {} {} time window is chosen by the processor",
                        zone,
                        constraint
                    );
                }
                codec.decode(value.bits(tw), self.base_time_units())
            }
            None => 0.0,
        };

        let limit = Limit { seconds, watts };
        tracing::debug!(
            "get_limit: zone={}, constraint={}: {}",
            zone,
            constraint,
            limit
        );
        Some(limit)
    }

    /// Encode one constraint; a field of 0 leaves the register bits unchanged
    ///
    /// Returns `None` when the zone has no such constraint.
    pub fn set_limit(
        &self,
        zone: Zone,
        constraint: Constraint,
        value: MsrValue,
        limit: &Limit,
    ) -> Option<MsrValue> {
        let fields = self.constraint_fields(zone, constraint)?;
        let codec = self.zone_config(zone).time_window;
        tracing::debug!(
            "set_limit: zone={}, constraint={}: {}",
            zone,
            constraint,
            limit
        );

        let mut value = value;
        if limit.watts > 0.0 {
            let bits = power::encode(limit.watts, self.power_units(zone), fields.power);
            value = value.with_bits(fields.power, bits);
        }
        if limit.seconds > 0.0 {
            match fields.time_window {
                Some(_) if fields.time_window_read_only => {
                    tracing::warn!(
                        "Not allowed to set {} {} time window, it is chosen by the processor",
                        zone,
                        constraint
                    );
                }
                Some(tw) => {
                    let bits = codec.encode(limit.seconds, self.base_time_units());
                    value = value.with_bits(tw, bits);
                }
                None => {
                    tracing::warn!("{} {} has no time window, ignoring seconds", zone, constraint);
                }
            }
        }
        Some(value)
    }

    /// Long-term and, when present, short-term limits
    pub fn get_limits(&self, zone: Zone, value: MsrValue) -> ZoneLimits {
        ZoneLimits {
            long_term: self
                .get_limit(zone, Constraint::LongTerm, value)
                .unwrap_or_default(),
            short_term: self.get_limit(zone, Constraint::ShortTerm, value),
        }
    }

    /// Apply `long_term` and `short_term` where given; a short-term limit on a
    /// zone without one is ignored
    pub fn set_limits(
        &self,
        zone: Zone,
        value: MsrValue,
        long_term: Option<&Limit>,
        short_term: Option<&Limit>,
    ) -> MsrValue {
        let mut value = value;
        if let Some(limit) = long_term {
            value = self
                .set_limit(zone, Constraint::LongTerm, value, limit)
                .unwrap_or(value);
        }
        if let Some(limit) = short_term {
            match self.set_limit(zone, Constraint::ShortTerm, value, limit) {
                Some(v) => value = v,
                None => tracing::debug!("{} has no short term constraint, ignoring {}", zone, limit),
            }
        }
        value
    }

    /// Joules in the low 32 bits of an energy-status value
    pub fn energy_counter(&self, zone: Zone, value: MsrValue) -> f64 {
        let joules = value.bits(ENERGY_COUNTER) as f64 * self.energy_units(zone);
        tracing::debug!("energy_counter: zone={}, joules={:.12}", zone, joules);
        joules
    }

    /// Rollover value `2^32 * energy_unit`
    pub fn energy_counter_max(&self, zone: Zone) -> f64 {
        let joules = (1u64 << ENERGY_COUNTER.width()) as f64 * self.energy_units(zone);
        tracing::debug!("energy_counter_max: zone={}, joules={:.12}", zone, joules);
        joules
    }
}
