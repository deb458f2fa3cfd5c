pub mod arch;
pub mod cpuid;
pub mod msr;
pub mod topology;

pub use arch::{CpuModel, ModelClass};
pub use cpuid::CpuIdentity;
pub use msr::MsrDevices;
pub use topology::{CpuTopology, Topology};
