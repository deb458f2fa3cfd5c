//! Intel RAPL power capping through direct MSR access
//!
//! ```ignore
//! use raplcap_msr::{Limit, RaplCap, Zone};
//!
//! let cap = RaplCap::new()?;
//! for pkg in 0..cap.num_packages() {
//!     if cap.is_zone_supported(pkg, 0, Zone::Package)? {
//!         cap.set_limits(pkg, 0, Zone::Package, Some(&Limit::new(1.0, 25.0)), None)?;
//!         cap.set_zone_enabled(pkg, 0, Zone::Package, true)?;
//!     }
//! }
//! cap.destroy()?;
//! ```

// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod codec;
pub mod common;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod types;

pub use config::RaplCapConfig;
pub use error::{RaplCapError, Result};
pub use orchestrator::{global, LockedRaplCap, RaplCap};
pub use types::{Constraint, Limit, Zone, ZoneLimits};
