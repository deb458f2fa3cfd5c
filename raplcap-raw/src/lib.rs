//! # raplcap-raw
//!
//! Hardware register definitions for Intel RAPL (Running Average Power Limit).
//!
//! This crate provides bit-exact abstractions over MSR (Model-Specific Register)
//! access and the RAPL register layouts shared by Intel CPUs from Sandy Bridge
//! through Lunar Lake, including the Atom and Xeon Phi lines.
//!
//! ## Usage
//!
//! ```ignore
//! use raplcap_raw::rapl::{limit, msr};
//! use raplcap_raw::{MsrDevice, MsrValue};
//!
//! let device = MsrDevice::open("/dev/cpu/0/msr", 0, false)?;
//! let value = MsrValue::new(device.read(msr::MSR_PKG_POWER_LIMIT)?);
//!
//! // Masked update: only the enable bit changes
//! let enable = limit::PACKAGE_DUAL.primary.enable.unwrap();
//! device.write(msr::MSR_PKG_POWER_LIMIT, value.with_bit(enable, true).raw())?;
//! ```

pub mod msr;
pub mod rapl;
pub mod register;

// Re-export for convenience
pub use msr::{MsrAccess, MsrDevice, MsrError, Result};
pub use register::{BitRange, MsrValue, RegisterLayout};
