pub mod context;
pub mod global;

pub use context::RaplCap;
pub use global::LockedRaplCap;
