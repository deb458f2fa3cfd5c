//! Model configuration and register codec
//!
//! [`UnitContext`] is selected once from the CPU model and the unit register;
//! it owns the per-zone [`ZoneConfig`] table and translates power-limit and
//! energy registers to and from caller units.

mod fields;
pub mod power;
pub mod time_window;
pub mod units;
pub mod zone;

pub use time_window::TimeWindowCodec;
pub use units::UnitContext;
pub use zone::ZoneConfig;
